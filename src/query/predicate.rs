//! Compiles filter criteria into a parameterized `WHERE` fragment.

use std::fmt::Write as _;

use crate::query::{
    catalog::{
        FieldSpec, RangeSpec, RelationShape, SchemaCatalog, SearchColumn, ENTITY_ALIAS, ENTITY_KEY,
    },
    errors::CompileError,
    filter::{CombinePolicy, Criteria, FieldFilter},
    profile::{profile_timer, record_profile_timer, QueryProfileKind},
    Value,
};

/// Escape character used in LIKE patterns built from search text.
const LIKE_ESCAPE: char = '\\';

/// Output of the predicate compiler.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WhereClause {
    /// Boolean SQL expression without the `WHERE` keyword; empty when
    /// unconstrained.
    pub sql: String,
    /// Positional parameters in placeholder order.
    pub params: Vec<Value>,
    /// Many-to-one field keys whose aliases the expression references.
    pub required_fields: Vec<&'static str>,
}

impl WhereClause {
    /// Returns `true` when the clause matches everything.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Renders ` WHERE <expr>` or nothing.
    pub fn to_sql(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.sql)
        }
    }

    /// ANDs fixed conditions (catalog-derived SQL, no parameters) in front of
    /// this clause.
    pub fn and_conditions(mut self, conditions: &[&str]) -> Self {
        let mut parts: Vec<String> = conditions.iter().map(|c| format!("({c})")).collect();
        if !self.sql.is_empty() {
            parts.push(format!("({})", self.sql));
        }
        self.sql = parts.join(" AND ");
        self
    }

    fn require(&mut self, key: &'static str) {
        if !self.required_fields.contains(&key) {
            self.required_fields.push(key);
        }
    }
}

/// Table-driven compiler over a [`SchemaCatalog`].
#[derive(Clone, Copy, Debug)]
pub struct PredicateCompiler<'a> {
    catalog: &'a SchemaCatalog,
}

impl<'a> PredicateCompiler<'a> {
    /// Creates a compiler bound to `catalog`.
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self { catalog }
    }

    /// Compiles every predicate in `criteria`.
    pub fn compile(&self, criteria: &Criteria) -> Result<WhereClause, CompileError> {
        self.compile_inner(criteria, None)
    }

    /// Compiles `criteria` while relaxing every predicate on the same
    /// dimension as `field`.
    pub fn compile_excluding(
        &self,
        criteria: &Criteria,
        field: &str,
    ) -> Result<WhereClause, CompileError> {
        self.compile_inner(criteria, Some(field))
    }

    fn compile_inner(
        &self,
        criteria: &Criteria,
        exclude: Option<&str>,
    ) -> Result<WhereClause, CompileError> {
        let start = profile_timer();
        let mut clause = WhereClause::default();
        let mut groups = Vec::new();
        for (key, filter) in criteria.filters.iter() {
            if exclude.is_some_and(|excluded| self.catalog.same_dimension(excluded, key)) {
                continue;
            }
            if filter.is_empty() {
                continue;
            }
            let group = if let Some(range) = self.catalog.range(key) {
                range_group(range, filter, &mut clause.params)?
            } else {
                let spec = self.catalog.field(key)?;
                let FieldFilter::Values(values) = filter else {
                    return Err(CompileError::shape_mismatch(key, "a list of values"));
                };
                let values = dedup(values);
                match spec.shape {
                    RelationShape::ManyToOne => {
                        clause.require(spec.key);
                        any_of_group(spec, &values, &mut clause.params)
                    }
                    RelationShape::OneToMany | RelationShape::ManyToMany => {
                        all_of_group(spec, &values, &mut clause.params)
                    }
                }
            };
            groups.push(group);
        }

        let mut parts = Vec::new();
        match (groups.len(), criteria.policy) {
            (0, _) => {}
            (1, _) | (_, CombinePolicy::And) => parts.extend(groups),
            (_, CombinePolicy::Or) => {
                parts.push(format!("({})", groups.join(CombinePolicy::Or.connective())));
            }
        }

        if let Some(term) = criteria.search_term() {
            parts.push(self.search_group(term, &mut clause)?);
        }

        clause.sql = parts.join(CombinePolicy::And.connective());
        record_profile_timer(QueryProfileKind::Compile, start);
        Ok(clause)
    }

    fn search_group(&self, term: &str, clause: &mut WhereClause) -> Result<String, CompileError> {
        let pattern = format!("%{}%", escape_like(term));
        let mut alternatives = Vec::with_capacity(self.catalog.search_columns().len());
        for column in self.catalog.search_columns() {
            let expr = match *column {
                SearchColumn::Lookup(key) => {
                    let spec = self.catalog.field(key)?;
                    clause.require(spec.key);
                    spec.label_expr()
                }
                SearchColumn::Entity(name) => format!("{ENTITY_ALIAS}.{name}"),
            };
            alternatives.push(format!("{expr} LIKE ? ESCAPE '{LIKE_ESCAPE}'"));
            clause.params.push(Value::Text(pattern.clone()));
        }
        Ok(format!("({})", alternatives.join(" OR ")))
    }
}

fn range_group(
    range: &RangeSpec,
    filter: &FieldFilter,
    params: &mut Vec<Value>,
) -> Result<String, CompileError> {
    let &FieldFilter::Range { min, max } = filter else {
        return Err(CompileError::shape_mismatch(range.key, "a numeric range"));
    };
    for bound in [min, max].into_iter().flatten() {
        if !bound.is_finite() {
            return Err(CompileError::NonFiniteBound {
                field: range.key.to_owned(),
            });
        }
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(CompileError::InvertedRange {
                field: range.key.to_owned(),
                min,
                max,
            });
        }
    }
    let mut bounds = Vec::with_capacity(2);
    if let Some(min) = min {
        bounds.push(format!("{ENTITY_ALIAS}.{} >= ?", range.lower_column));
        params.push(Value::Float(min));
    }
    if let Some(max) = max {
        bounds.push(format!("{ENTITY_ALIAS}.{} <= ?", range.upper_column));
        params.push(Value::Float(max));
    }
    Ok(if bounds.len() == 1 {
        bounds.remove(0)
    } else {
        format!("({})", bounds.join(" AND "))
    })
}

/// Mutually exclusive categorical choices: any selected label matches.
fn any_of_group(spec: &FieldSpec, values: &[&str], params: &mut Vec<Value>) -> String {
    let label = spec.label_expr();
    let alternatives: Vec<String> = values
        .iter()
        .map(|value| {
            params.push(Value::from(*value));
            format!("{label} = ?")
        })
        .collect();
    if alternatives.len() == 1 {
        alternatives.concat()
    } else {
        format!("({})", alternatives.join(" OR "))
    }
}

/// Intersection: the entity must carry every selected label.
fn all_of_group(spec: &FieldSpec, values: &[&str], params: &mut Vec<Value>) -> String {
    let alias = spec.alias;
    let label = spec.label_expr();
    let mut sql = format!("{ENTITY_ALIAS}.{ENTITY_KEY} IN (SELECT ");
    let owner = match spec.junction {
        Some(junction) => {
            let link = format!("{alias}_j");
            let _ = write!(
                sql,
                "{link}.{fk} FROM {jt} {link} JOIN {table} {alias} ON {alias}.id = {link}.{lookup}",
                fk = spec.foreign_key,
                jt = junction.table,
                table = spec.table,
                lookup = junction.lookup_column,
            );
            format!("{link}.{}", spec.foreign_key)
        }
        None => {
            let _ = write!(
                sql,
                "{alias}.{fk} FROM {table} {alias}",
                fk = spec.foreign_key,
                table = spec.table,
            );
            format!("{alias}.{}", spec.foreign_key)
        }
    };
    let _ = write!(
        sql,
        " WHERE {label} IN ({}) GROUP BY {owner} HAVING COUNT(DISTINCT {label}) = ?)",
        placeholders(values.len())
    );
    params.extend(values.iter().map(|v| Value::from(*v)));
    params.push(Value::from(values.len()));
    sql
}

/// `?, ?, ?` with `n` placeholders.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn dedup(values: &[String]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value.as_str()) {
            out.push(value);
        }
    }
    out
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(ch);
    }
    out
}
