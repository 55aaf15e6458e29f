#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    clippy::all,
    clippy::pedantic
)]
//! Telemetry primitives shared by Sluice binaries.
//!
//! Centralises logging setup so every front-end emits the same structured fields.

pub mod init;

pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
