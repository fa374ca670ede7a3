//! Transport implementations.
//!
//! This module contains concrete implementations of the `SqsTransport` trait.

pub mod http;
pub mod memory;

pub use http::HttpSqsTransport;
pub use memory::InMemoryTransport;
