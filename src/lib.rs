pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod handler;
pub mod sync;

pub use error::{SyncError, SyncResult};
