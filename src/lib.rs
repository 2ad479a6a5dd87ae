//! # minidb
//! The storage and transaction core of a small relational engine:
//! fixed-schema tuples on page-organised heap files, a buffer pool with
//! page-level transactional locking (NO STEAL / force at commit, rollback
//! via before-images), and per-column histograms for the optimizer's
//! selectivity estimates.

/// The buffer pool and its page lock table.
pub mod buffer;
/// The table registry.
pub mod catalog;
/// Engine-wide constants and knobs.
pub mod common;
/// The error type shared by every component.
pub mod error;
/// Row predicates and aggregators.
pub mod execution;
/// Histogram-based table statistics.
pub mod optimizer;
/// Pages, heap files and the recovery log.
pub mod storage;
/// Transaction identifiers.
pub mod transaction;
/// Tuples, fields and schemas.
pub mod tuple;
