//! Common types, protocol definitions, and errors shared across envelope crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
