//! Installation storage for Grab.
//!
//! One record per installed Slack workspace, pairing its bot token with the
//! wiki account transcripts are published under.
//!
//! - `FileInstanceStore`: JSON file in the data directory (see `paths`)
//! - `MemoryInstanceStore`: process-local, for tests and development
//!
//! # Usage
//!
//! ```rust,no_run
//! use grab_core::InstanceStore;
//! use grab_storage::FileInstanceStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileInstanceStore::open_default().await?;
//! let instance = store.resolve_by_user_team("T024BE7LD").await?;
//! println!("publishing to {}", instance.wiki.url);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod file;
pub mod memory;
pub mod paths;

#[cfg(test)]
mod tests;

pub use error::{Result, StorageError};
pub use file::FileInstanceStore;
pub use memory::MemoryInstanceStore;
pub use paths::{INSTANCES_FILE, grab_data_dir, instances_path};
