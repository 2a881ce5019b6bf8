//! Library crate for asset-upload-rs: the supervisor that runs an upload and reports its progress.
pub mod cancel;
pub mod config;
pub mod dryrun;
pub mod error;
pub mod events;
pub mod jsonout;
pub mod logging;
pub mod phases;
pub mod progress;
pub mod render;
pub mod supervisor;
pub mod types;
