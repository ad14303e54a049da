//! Faceted query engine over a read-only job postings dataset.
//!
//! Criteria are compiled through a static schema catalog into parameterized
//! SQL, executed against an embedded SQLite copy of the dataset, and hydrated
//! into nested entity views. [`service::JobBoard`] is the entry point.

#![warn(missing_docs)]

/// Board configuration.
pub mod config;
/// Dataset providers and the single-flight loader.
pub mod dataset;
/// Crate error type.
pub mod error;
/// Entity views and attribute hydration.
pub mod hydrate;
/// Criteria compilation and statement assembly.
pub mod query;
/// Filter sessions and stale facet guarding.
pub mod session;
/// Query service.
pub mod service;
/// rusqlite executor.
pub mod sqlite_adapter;
/// Descriptive statistics.
pub mod stats;

pub use config::{BoardConfig, ConfigError};
pub use dataset::{Dataset, DatasetInfo, DatasetLoader, DatasetProvider, FileProvider, StaticProvider};
pub use error::{JobscopeError, Result};
pub use hydrate::{EntityView, HydrationStrategy};
pub use query::{CombinePolicy, Criteria, CriteriaBuilder, FieldFilter, FilterState, SortKey};
pub use service::{AnalysisReport, Facet, JobBoard, Overview, PageRequest, PageResult};
pub use session::{FacetBoard, FacetTicket, FilterSession};
