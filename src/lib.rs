//! f3 library: a file transfer protocol front end for an S3 bucket.
//!
//! The protocol engine (connection handling, command parsing, user
//! authentication) lives outside this crate and talks to it through the
//! [`driver::Driver`] contract.  Each connection gets its own
//! [`driver::s3::S3Driver`], which maps directory-oriented verbs onto a flat
//! bucket, gates them by a [`features::FeatureSet`] and reports transfer
//! sizes to a [`metrics::MetricsSender`].

pub mod auth;
pub mod config;
pub mod driver;
pub mod errors;
pub mod features;
pub mod metrics;
pub mod storage;
