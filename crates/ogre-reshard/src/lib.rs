//! Channel resharding for OGRE.
//!
//! [`ReshardEngine`] copies every live entity of a store into an empty
//! store with a different channel count, keeping only the latest record of
//! each OID. Records are moved as raw bytes; nothing is decoded beyond the
//! frame header.

mod cancel;
mod engine;
pub mod error;
mod report;

pub use cancel::CancellationToken;
pub use engine::ReshardEngine;
pub use error::{ReshardError, ReshardResult};
pub use report::{ReshardReport, TargetChannelReport};
