//! csm-core: the record store behind the `csm` customer-success tracker.
//!
//! # Conventions
//!
//! - **Errors**: store and session operations return [`error::Result`];
//!   config loading uses `anyhow::Result`.
//! - **Logging**: `tracing` macros only. Subscribers are installed by the binary.

pub mod backfill;
pub mod config;
pub mod csv;
pub mod db;
pub mod error;
pub mod legacy;
pub mod model;
pub mod okr;
pub mod query;
pub mod session;
pub mod timing;
pub mod transfer;

pub use error::{CsmError, ErrorCode, Result};
pub use session::Session;
