//! Filter state value objects passed into every compiler call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current predicate for one field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFilter {
    /// Selected labels. Many-to-one fields match any of them; one-to-many and
    /// many-to-many fields must carry all of them.
    Values(Vec<String>),
    /// Numeric bounds, each independently optional.
    Range {
        /// Inclusive lower bound.
        min: Option<f64>,
        /// Inclusive upper bound.
        max: Option<f64>,
    },
}

impl FieldFilter {
    /// Returns `true` when the filter constrains nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldFilter::Values(values) => values.is_empty(),
            FieldFilter::Range { min, max } => min.is_none() && max.is_none(),
        }
    }
}

/// Mapping from field key to its active predicate.
///
/// Empty predicates are never stored, so "zero selected values" and "field
/// absent" are the same state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterState {
    fields: BTreeMap<String, FieldFilter>,
}

impl FilterState {
    /// Empty state matching every entity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the predicate for `field`; empty predicates clear it.
    ///
    /// Returns `true` if the stored state changed.
    pub fn set(&mut self, field: impl Into<String>, filter: FieldFilter) -> bool {
        let field = field.into();
        if filter.is_empty() {
            return self.fields.remove(&field).is_some();
        }
        match self.fields.get(&field) {
            Some(existing) if *existing == filter => false,
            _ => {
                self.fields.insert(field, filter);
                true
            }
        }
    }

    /// Replaces the selected labels for `field`.
    pub fn set_values<I, S>(&mut self, field: impl Into<String>, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(
            field,
            FieldFilter::Values(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Adds one label to `field`, keeping first-seen order.
    pub fn add_value(&mut self, field: impl Into<String>, value: impl Into<String>) -> bool {
        let field = field.into();
        let value = value.into();
        match self.fields.get_mut(&field) {
            Some(FieldFilter::Values(values)) => {
                if values.contains(&value) {
                    return false;
                }
                values.push(value);
                true
            }
            _ => self.set(field, FieldFilter::Values(vec![value])),
        }
    }

    /// Removes one label from `field`; the field disappears with its last label.
    pub fn remove_value(&mut self, field: &str, value: &str) -> bool {
        let Some(FieldFilter::Values(values)) = self.fields.get_mut(field) else {
            return false;
        };
        let before = values.len();
        values.retain(|v| v != value);
        let changed = values.len() != before;
        if values.is_empty() {
            self.fields.remove(field);
        }
        changed
    }

    /// Sets numeric bounds for a range field.
    pub fn set_range(&mut self, field: impl Into<String>, min: Option<f64>, max: Option<f64>) -> bool {
        self.set(field, FieldFilter::Range { min, max })
    }

    /// Drops the predicate for `field`.
    pub fn clear_field(&mut self, field: &str) -> bool {
        self.fields.remove(field).is_some()
    }

    /// Drops every predicate.
    pub fn clear(&mut self) -> bool {
        let changed = !self.fields.is_empty();
        self.fields.clear();
        changed
    }

    /// Predicate for `field`, if any.
    pub fn get(&self, field: &str) -> Option<&FieldFilter> {
        self.fields.get(field)
    }

    /// Iterates predicates in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldFilter)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns `true` when no predicate is active.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of active predicates.
    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

/// How predicates on different fields combine at the top level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinePolicy {
    /// Every field predicate must hold (browsing, faceting).
    #[default]
    And,
    /// Any field predicate may hold (exploratory analysis).
    Or,
}

impl CombinePolicy {
    /// SQL connective joining top-level predicates.
    pub fn connective(self) -> &'static str {
        match self {
            CombinePolicy::And => " AND ",
            CombinePolicy::Or => " OR ",
        }
    }
}

/// Full input of the predicate compiler.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    /// Field predicates.
    #[serde(default)]
    pub filters: FilterState,
    /// Free-text search; blank means no search.
    #[serde(default)]
    pub search: Option<String>,
    /// Cross-field policy.
    #[serde(default)]
    pub policy: CombinePolicy,
}

impl Criteria {
    /// Browsing criteria (AND policy, no search).
    pub fn browse(filters: FilterState) -> Self {
        Self {
            filters,
            search: None,
            policy: CombinePolicy::And,
        }
    }

    /// Adds free-text search.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Sets the cross-field policy.
    pub fn with_policy(mut self, policy: CombinePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Trimmed search term, or `None` when blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }
}
