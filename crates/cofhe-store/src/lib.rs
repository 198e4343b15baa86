//! # CoFHE Store
//!
//! String key/value persistence behind permits and active-permit slots.
//! The permit layer owns the key layout and JSON encoding; this crate only
//! moves strings.
//!
//! [`MemoryStore`] backs tests and short-lived clients. [`SqliteStore`]
//! persists to a file and migrates its schema on open.
//!
//! ```rust,no_run
//! use cofhe_store::{KeyValueStore, SqliteStore};
//!
//! async fn example() -> cofhe_store::Result<()> {
//!     let store = SqliteStore::open("cofhe.db")?;
//!     store.set_item("cofhe:active:1:0xabc:0", "deadbeef").await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{KeyValueStore, KeyValueStoreExt};
