//! Banyan coordination kernel.
//!
//! The master index is the process-shared registry of collections for one
//! database: a single snapshot persisted as one property-store value. It
//! carries, per collection, a storage blob reference, timestamps, an
//! advisory document count, a modification token for optimistic concurrency,
//! and an optional time-bounded lock lease.
//!
//! All state-mutating operations serialise on the [`CoarseLock`] (the
//! property store's cross-process advisory lock), so registry writes form a
//! single total order across every process connected to the same key.
//! Read-only operations go without the lock and are eventually consistent;
//! callers needing stronger guarantees use modification-token conflict
//! detection ([`MasterIndex::has_conflict`]).

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod codec;
mod error;
mod lock;
mod master;
mod metadata;
mod snapshot;
mod token;

pub use codec::{DecodedRegistry, RegistryCodec};
pub use error::{IndexError, IndexResult};
pub use lock::CoarseLock;
pub use master::{MasterIndex, MasterIndexConfig, LAST_WRITE_WINS, MIN_LOCK_TIMEOUT};
pub use metadata::{CollectionMetadata, LockLease};
pub use snapshot::{HistoryEntry, RegistrySnapshot};
pub use token::{generate_modification_token, validate_modification_token};
