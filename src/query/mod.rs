#![forbid(unsafe_code)]

//! Filter compilation and SQL assembly.
//!
//! The catalog describes every filterable field; the predicate compiler and
//! join graph read it to turn a [`Criteria`] into parameterized SQL, and the
//! assembler wraps the result into page, count, facet and attribute
//! statements.

/// Predefined exploratory aggregations.
pub mod analysis;

/// Page, count, facet and attribute statements.
pub mod assembler;

/// Fluent criteria construction with deferred validation.
pub mod builder;

/// Static mapping of field keys to tables, aliases and join columns.
pub mod catalog;

/// Structured compile errors.
pub mod errors;

/// Relational executor contract.
pub mod executor;

/// Filter state value objects.
pub mod filter;

/// LEFT JOIN set construction.
pub mod joins;

/// WHERE fragment compilation.
pub mod predicate;

/// Opt-in timing counters.
pub mod profile;

/// Scalar values bound into and read out of statements.
pub mod value;

pub use analysis::{AnalysisTemplate, Category, Pivot};
pub use assembler::{Pagination, QueryAssembler, SortKey, SqlQuery};
pub use builder::CriteriaBuilder;
pub use catalog::{FieldSpec, RelationShape, SchemaCatalog};
pub use errors::CompileError;
pub use executor::{QueryExecutor, Row, RowSet};
pub use filter::{CombinePolicy, Criteria, FieldFilter, FilterState};
pub use predicate::{PredicateCompiler, WhereClause};
pub use value::Value;
