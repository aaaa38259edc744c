//! Object store clients.
//!
//! The [`backend::ObjectStore`] trait is the narrow call surface the bridge
//! consumes.  Implementations exist for AWS S3 (and S3-compatible stores)
//! and for an in-process map.

pub mod aws;
pub mod backend;
pub mod memory;
