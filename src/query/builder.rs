//! Fluent criteria builder.

use crate::query::{
    catalog::SchemaCatalog,
    errors::CompileError,
    filter::{CombinePolicy, Criteria, FieldFilter},
    predicate::PredicateCompiler,
};

/// Builds [`Criteria`] while validating keys against the catalog.
///
/// The first failure is remembered and reported by [`CriteriaBuilder::build`];
/// later calls become no-ops.
#[derive(Debug)]
pub struct CriteriaBuilder<'a> {
    catalog: &'a SchemaCatalog,
    criteria: Criteria,
    error: Option<CompileError>,
}

impl Default for CriteriaBuilder<'static> {
    fn default() -> Self {
        Self::new(SchemaCatalog::standard())
    }
}

impl<'a> CriteriaBuilder<'a> {
    /// Creates an empty builder over `catalog`.
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self {
            catalog,
            criteria: Criteria::default(),
            error: None,
        }
    }

    /// Selects labels for a categorical field.
    pub fn values<I, S>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.error.is_some() {
            return self;
        }
        if self.catalog.range(field).is_some() {
            self.error = Some(CompileError::shape_mismatch(field, "a numeric range"));
            return self;
        }
        if let Err(err) = self.catalog.field(field) {
            self.error = Some(err);
            return self;
        }
        for value in values {
            self.criteria.filters.add_value(field, value);
        }
        self
    }

    /// Selects one label for a categorical field.
    pub fn value(self, field: &str, value: impl Into<String>) -> Self {
        self.values(field, [value.into()])
    }

    /// Sets bounds on a numeric range field.
    pub fn range(mut self, field: &str, min: Option<f64>, max: Option<f64>) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.catalog.range(field).is_none() {
            self.error = Some(if self.catalog.contains(field) {
                CompileError::shape_mismatch(field, "a list of values")
            } else {
                CompileError::unknown_field(field)
            });
            return self;
        }
        self.criteria
            .filters
            .set(field, FieldFilter::Range { min, max });
        self
    }

    /// Sets free-text search.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.criteria.search = Some(term.into());
        self
    }

    /// Sets the cross-field policy.
    pub fn policy(mut self, policy: CombinePolicy) -> Self {
        self.criteria.policy = policy;
        self
    }

    /// Shorthand for OR policy.
    pub fn any(self) -> Self {
        self.policy(CombinePolicy::Or)
    }

    /// Finishes the builder, running the compiler once to surface bound errors.
    pub fn build(self) -> Result<Criteria, CompileError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        PredicateCompiler::new(self.catalog).compile(&self.criteria)?;
        Ok(self.criteria)
    }
}
