//! File I/O is isolated behind this trait; the core never touches a file
//! handle directly. No format implementations live here — only the
//! contract a loader must satisfy and the fixed extension -> priority
//! table the batch engine consults when more than one loader claims the
//! same extension.

use crate::core_types::Recording;
use crate::error::LoaderError;

/// A source of `Recording`s from some external file format. Implementations
/// live outside this crate; the core only depends on this contract.
pub trait Loader: Send + Sync {
    /// Human-readable name used for priority-table lookups and logging
    /// (e.g. `"axon"`, `"generic_csv"`).
    fn name(&self) -> &'static str;

    /// File extensions this loader claims, lowercase, without the dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Loads `path` into a `Recording`. Failure is classified as
    /// `FileNotFound`, `UnsupportedFormat` or `FileReadError` — the batch
    /// engine turns any of these into an `error` row rather than
    /// unwinding.
    fn load(&self, path: &str) -> Result<Recording, LoaderError>;
}

/// Fixed extension -> loader-name priority order. When more than one
/// loader in a `LoaderRegistry` claims an extension, the first name
/// present in this list wins.
pub const EXTENSION_PRIORITY: &[(&str, &[&str])] = &[
    ("abf", &["axon"]),
    ("atf", &["axon_text"]),
    ("smr", &["spike2"]),
    ("smrx", &["spike2"]),
    ("nex", &["neuroexplorer"]),
    ("h5", &["nwb"]),
    ("nwb", &["nwb"]),
    ("wcp", &["wcp"]),
    ("ibw", &["igor"]),
    ("pxp", &["igor"]),
    ("csv", &["generic_csv"]),
    ("tsv", &["generic_csv"]),
];

/// Looks up the declared priority order of loader names for `extension`
/// (case-insensitive, leading dot optional). `None` for an extension the
/// table doesn't cover.
pub fn priority_for(extension: &str) -> Option<&'static [&'static str]> {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    EXTENSION_PRIORITY
        .iter()
        .find(|(key, _)| *key == ext)
        .map(|(_, names)| *names)
}

/// Holds a set of loaders and resolves `(path, registered loaders)` to the
/// single loader that should handle it, per `EXTENSION_PRIORITY`.
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn Loader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self { loaders: Vec::new() }
    }

    pub fn register(&mut self, loader: Box<dyn Loader>) {
        self.loaders.push(loader);
    }

    /// Selects a loader for `path` by its extension, breaking ties between
    /// multiple registered loaders via `EXTENSION_PRIORITY`. Falls back to
    /// the first registered loader claiming the extension if the table
    /// has no entry for it.
    pub fn select(&self, path: &str) -> Option<&dyn Loader> {
        let ext = std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();

        if let Some(priority) = priority_for(&ext) {
            for name in priority {
                if let Some(loader) = self.loaders.iter().find(|l| l.name() == *name) {
                    return Some(loader.as_ref());
                }
            }
        }

        self.loaders.iter().find(|l| l.extensions().contains(&ext.as_str())).map(|b| b.as_ref())
    }

    /// Loads `path` via whichever registered loader claims its extension.
    pub fn load(&self, path: &str) -> Result<Recording, LoaderError> {
        match self.select(path) {
            Some(loader) => loader.load(path),
            None => Err(LoaderError::UnsupportedFormat(path.to_string())),
        }
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
