//! Session and device-name tracking
//!
//! This module folds lightweight analytics events into two shared documents:
//! the session collection and the device name directory.
//!
//! Pipeline: body JSON → TrackRequest → SessionLog / NameDirectory → stored JSON

pub mod names;
pub mod reducer;
pub mod types;

pub use reducer::{ReduceOutcome, SessionLog};
pub use types::{
    DeviceInfo, NameDirectory, SessionEvent, SessionEventKind, SessionRecord, TrackRequest,
    MAX_NAME_CHARS, MAX_SESSIONS,
};
