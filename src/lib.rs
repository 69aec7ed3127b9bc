//! # Cubesweep
//!
//! A scheduled reconciliation job that detects which versioned datasets
//! ("cubes") in a knowledge graph changed since the last run and invalidates
//! the matching entries in a tag-based HTTP cache. Each invocation performs a
//! single pass — query, diff, purge, checkpoint — and exits; periodic
//! execution is left to an external scheduler.
//!
//! ## Modules
//!
//! - `config` - Explicit configuration read once from the environment
//! - `sparql` - Change source: the modified-datasets query and its HTTP client
//! - `resolver` - Core change resolution, including date-only two-phase purging
//! - `purge` - Concurrent tag-based cache purge transport
//! - `storage` - Checkpoint store abstraction with an S3 backend
//! - `sweep` - Orchestration of one full pass

pub mod config;
pub mod error;
pub mod purge;
pub mod resolver;
pub mod sparql;
pub mod storage;
pub mod sweep;
