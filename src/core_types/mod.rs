//! --------------------------
//! INFORMATION
//! --------------------------
//! Title: Core Data Model
//! Description: Recording -> Channel -> trials, and the lazy time-vector
//!              arithmetic that every analysis is built on.
//! --------------------------

mod channel;
mod recording;

pub use channel::{Channel, ElectrodeMetadata};
pub use recording::Recording;
