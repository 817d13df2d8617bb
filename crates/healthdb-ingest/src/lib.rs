//! HealthDB Ingest
//!
//! Loads a personal health export into a SQLite store and enriches it.
//!
//! ## Stages
//!
//! - **Export ingestion** ([`export`]): streams the XML export into one table per
//!   entity kind, committing in batches
//! - **Post-processing** ([`postprocess()`]): canonical source names
//!   ([`normalize`]), normalized views, GPX workout routes ([`routes`]) and ECG
//!   recordings ([`ecg`])
//!
//! Both stages are sequential and use a single connection. Every batch is its
//! own transaction, so an interrupted run keeps what it already committed.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod db;
pub mod ecg;
pub mod error;
pub mod export;
pub mod normalize;
pub mod postprocess;
pub mod routes;
pub mod tracker;

pub use config::{IngestOptions, PostprocessOptions};
pub use error::{IngestError, Result};
pub use export::IngestSummary;
pub use postprocess::{postprocess, PostprocessSummary};
