//! Deterministic LEFT JOIN set for many-to-one lookups.

use std::fmt;

use crate::query::{
    catalog::{FieldSpec, SchemaCatalog, ENTITY_ALIAS},
    errors::CompileError,
};

/// One `LEFT JOIN` clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoinClause {
    /// Lookup table.
    pub table: &'static str,
    /// Alias shared by every clause that references the lookup.
    pub alias: &'static str,
    /// Foreign key column on the entity table.
    pub foreign_key: &'static str,
}

impl fmt::Display for JoinClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LEFT JOIN {table} {alias} ON {ENTITY_ALIAS}.{fk} = {alias}.id",
            table = self.table,
            alias = self.alias,
            fk = self.foreign_key,
        )
    }
}

impl From<&FieldSpec> for JoinClause {
    fn from(spec: &FieldSpec) -> Self {
        Self {
            table: spec.table,
            alias: spec.alias,
            foreign_key: spec.foreign_key,
        }
    }
}

/// Ordered, de-duplicated join list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JoinGraph {
    joins: Vec<JoinClause>,
}

impl JoinGraph {
    /// Builds the joins needed to resolve `keys`.
    ///
    /// Output follows catalog order so the same key set always renders the
    /// same SQL. Keys that are not many-to-one are skipped; unknown keys fail.
    pub fn build<'k, I>(catalog: &SchemaCatalog, keys: I) -> Result<Self, CompileError>
    where
        I: IntoIterator<Item = &'k str>,
    {
        let mut picked: Vec<(usize, JoinClause)> = Vec::new();
        for key in keys {
            let spec = catalog.field(key)?;
            if !spec.is_many_to_one() {
                continue;
            }
            if picked.iter().any(|(_, join)| join.alias == spec.alias) {
                continue;
            }
            let position = catalog.position(spec.key).unwrap_or(usize::MAX);
            picked.push((position, JoinClause::from(spec)));
        }
        picked.sort_by_key(|(position, _)| *position);
        Ok(Self {
            joins: picked.into_iter().map(|(_, join)| join).collect(),
        })
    }

    /// Joins in emission order.
    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    /// Returns `true` when no lookup is joined.
    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Renders every join, each prefixed by a space.
    pub fn to_sql(&self) -> String {
        self.joins.iter().map(|join| format!(" {join}")).collect()
    }
}
