//! # lsmdb core
//!
//! Types shared by every lsmdb crate: errors, configuration, format
//! constants, input validation and the page/block store.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alloc;
pub mod config;
pub mod error;
pub mod file;
pub mod format_version;
pub mod validate;

pub use alloc::BlockAllocator;
pub use config::{Config, Safety};
pub use error::{Error, Result};
pub use file::{BlockId, DbFile};
