//! Foundation types for blobtier.
//!
//! This crate provides the identifiers shared by every tier of the blob
//! store. Every other blobtier crate depends on `blobtier-types`.
//!
//! # Key Types
//!
//! - [`ObjectPath`] - Normalised, slash-delimited logical object path
//! - [`ByteRange`] - Inclusive `[start, end]` offset pair for ranged reads

pub mod error;
pub mod path;
pub mod range;

pub use error::TypeError;
pub use path::ObjectPath;
pub use range::ByteRange;
