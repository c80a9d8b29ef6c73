//! Banyan driver contracts.
//!
//! Banyan keeps its durable state in two externally provided surfaces:
//! - a **property store**: a small, atomic, string-valued key-value space
//!   shared by every process connected to the same database, which also
//!   supplies the advisory lock that serialises registry writes;
//! - an **object store**: whole-blob JSON storage organised into folders,
//!   holding one blob per collection plus optional registry backups.
//!
//! Both are injected capabilities rather than ambient globals, so tests and
//! embedders can substitute the in-memory implementations in [`memory`].

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod object;
mod property;

pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryAdvisoryLock, InMemoryObjectStore, InMemoryPropertyStore};
pub use object::{BlobInfo, ObjectStore};
pub use property::{AdvisoryLock, PropertyStore};
