//! Observations subsystem
//!
//! Typed facts pointing into specific locations of existing snapshots, with
//! staleness tracking as versions advance.

mod client;
mod resolve;

pub use client::ObservationsClient;
pub use resolve::{apply_span, resolve_path, PointerResolver, SnapshotSource};
