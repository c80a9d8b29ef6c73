//! Banyan update engine.
//!
//! A stateless interpreter for MongoDB-style mutation operator documents.
//! [`apply`] takes a document and an update description and returns the
//! transformed document; the input is never mutated.
//!
//! ```
//! use serde_json::json;
//!
//! let doc = json!({"name": "Alice", "logins": 2});
//! let updated = banyan_update::apply(&doc, &json!({"$inc": {"logins": 1}})).unwrap();
//! assert_eq!(updated, json!({"name": "Alice", "logins": 3}));
//! ```
//!
//! Dates inside documents use a tagged representation,
//! `{"__type": "Date", "value": "<ISO8601>"}`, and compare by millisecond
//! timestamp wherever the engine compares values.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod engine;
mod error;
mod path;
mod value;

pub use engine::apply;
pub use error::{UpdateError, UpdateResult};
pub use value::{compare_values, values_equal, DATE_TYPE_NAME, DATE_TYPE_TAG};
