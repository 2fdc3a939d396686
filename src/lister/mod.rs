//! # Listing
//!
//! Orchestrates the pagination builders into one query per request,
//! executes it through a [`Storage`] collaborator and produces either a
//! page of converted rows with a continuation token, or grouped
//! summaries.
//!
//! Single request, single query: nothing here is retried and nothing is
//! shared between requests except immutable views and an optional
//! compiled-expression cache.

mod aggregator;
mod collection;
#[allow(clippy::module_inception)]
mod lister;
mod storage;

pub use aggregator::{Aggregator, SummaryRequest, AGGREGATES, GROUP_VALUE};
pub use collection::Collection;
pub use lister::{ListRequest, ListResponse, Lister, PreparedList};
pub use storage::{PageRow, Storage, StorageError};
