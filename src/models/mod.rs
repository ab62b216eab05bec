//! Data models exchanged between the HTTP layer and the service adapters.
//!
//! These values only live for the duration of a request. They serialize
//! as JSON via `serde` and carry nothing the providers do not report.

pub mod message;
pub mod object;
