//! Protocol implementations.
//!
//! - `bounce`: Echo relay that logs the BSON documents passing through it

pub mod bounce;
