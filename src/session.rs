//! Mutable filter session with generation tagging.
//!
//! Every facet request is stamped with the generation of the session it was
//! issued against. A response is applied only while that generation is
//! still current; anything older is dropped on arrival.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::query::{CombinePolicy, Criteria, FieldFilter, FilterState};
use crate::service::Facet;

/// Filter state owned by one interactive user.
#[derive(Clone, Debug, Default)]
pub struct FilterSession {
    filters: FilterState,
    search: Option<String>,
    policy: CombinePolicy,
    generation: u64,
}

/// Generation stamp attached to an in-flight facet request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FacetTicket {
    /// Field being faceted.
    pub field: String,
    /// Session generation the request was issued against.
    pub generation: u64,
}

impl FilterSession {
    /// Empty browsing session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation; advances on every effective mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Active filters.
    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    /// Active search text.
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Active cross-field policy.
    pub fn policy(&self) -> CombinePolicy {
        self.policy
    }

    /// Snapshot of the session as compiler input.
    pub fn criteria(&self) -> Criteria {
        Criteria {
            filters: self.filters.clone(),
            search: self.search.clone(),
            policy: self.policy,
        }
    }

    /// Stamp for a facet request on `field`.
    pub fn ticket(&self, field: impl Into<String>) -> FacetTicket {
        FacetTicket {
            field: field.into(),
            generation: self.generation,
        }
    }

    /// Returns `true` if `ticket` was issued against the current state.
    pub fn is_current(&self, ticket: &FacetTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Replaces the selected labels of `field`.
    pub fn set_values<I, S>(&mut self, field: &str, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let changed = self.filters.set_values(field, values);
        self.bump(changed)
    }

    /// Adds one label to `field`.
    pub fn add_value(&mut self, field: &str, value: impl Into<String>) -> bool {
        let changed = self.filters.add_value(field, value);
        self.bump(changed)
    }

    /// Removes one label from `field`.
    pub fn remove_value(&mut self, field: &str, value: &str) -> bool {
        let changed = self.filters.remove_value(field, value);
        self.bump(changed)
    }

    /// Sets the bounds of a range field.
    pub fn set_range(&mut self, field: &str, min: Option<f64>, max: Option<f64>) -> bool {
        let changed = self.filters.set(field, FieldFilter::Range { min, max });
        self.bump(changed)
    }

    /// Drops the predicate on `field`.
    pub fn clear_field(&mut self, field: &str) -> bool {
        let changed = self.filters.clear_field(field);
        self.bump(changed)
    }

    /// Drops every predicate and the search text.
    pub fn clear(&mut self) -> bool {
        let changed = self.filters.clear() | self.search.take().is_some();
        self.bump(changed)
    }

    /// Sets the search text; blank text clears it.
    pub fn set_search(&mut self, search: impl Into<String>) -> bool {
        let search = search.into();
        let next = (!search.trim().is_empty()).then_some(search);
        if next == self.search {
            return false;
        }
        self.search = next;
        self.bump(true)
    }

    /// Sets the cross-field policy.
    pub fn set_policy(&mut self, policy: CombinePolicy) -> bool {
        let changed = policy != self.policy;
        self.policy = policy;
        self.bump(changed)
    }

    fn bump(&mut self, changed: bool) -> bool {
        if changed {
            self.generation += 1;
        }
        changed
    }
}

/// Latest applied facet lists, one per field.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FacetBoard {
    facets: BTreeMap<String, Vec<Facet>>,
    discarded: u64,
}

impl FacetBoard {
    /// Empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `facets` for the ticket's field if the ticket is current.
    ///
    /// Stale responses are dropped and counted; returns whether it applied.
    pub fn apply(&mut self, session: &FilterSession, ticket: FacetTicket, facets: Vec<Facet>) -> bool {
        if !session.is_current(&ticket) {
            self.discarded += 1;
            debug!(
                field = %ticket.field,
                issued = ticket.generation,
                current = session.generation(),
                "stale facet response discarded"
            );
            return false;
        }
        self.facets.insert(ticket.field, facets);
        true
    }

    /// Facets last applied for `field`.
    pub fn get(&self, field: &str) -> Option<&[Facet]> {
        self.facets.get(field).map(Vec::as_slice)
    }

    /// Number of stale responses dropped so far.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}
