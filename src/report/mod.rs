//! Report renderers for reconciliation results.
//!
//! - [`terminal`]: colored summary box, per-status tables, diffs and source failures;
//!   respects `--verbose` / `--quiet`.
//! - JSON output is the serialized [`Report`](crate::reconcile::Report) itself.

pub mod terminal;
