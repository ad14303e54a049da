//! Complete SELECT statements built from the join graph and compiled
//! predicates.

use std::{fmt, hash::Hasher};

use serde::{Deserialize, Serialize};
use tracing::debug;
use xxhash_rust::xxh64::Xxh64;

use crate::query::{
    catalog::{
        DisplaySource, FieldSpec, RelationShape, SchemaCatalog, ENTITY_ALIAS, ENTITY_KEY,
        ENTITY_TABLE,
    },
    analysis::{AnalysisTemplate, Pivot},
    errors::CompileError,
    filter::Criteria,
    joins::JoinGraph,
    predicate::{placeholders, PredicateCompiler, WhereClause},
    Value,
};

/// Output column carrying the facet label.
pub const FACET_LABEL: &str = "label";
/// Output column carrying the facet count.
pub const FACET_COUNT: &str = "count";
/// Output column carrying the row count of a count query.
pub const COUNT_COLUMN: &str = "total";
/// Output column carrying the owning entity id of a batched attribute query.
pub const OWNER_COLUMN: &str = "entity_id";
/// Output column carrying the converted lower salary bound.
pub const CONVERTED_MIN: &str = "converted_min_salary";
/// Output column carrying the converted upper salary bound.
pub const CONVERTED_MAX: &str = "converted_max_salary";

/// SQL text plus positional parameters, ready for an executor.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlQuery {
    /// Statement text; only catalog identifiers are interpolated.
    pub sql: String,
    /// Bound parameters in placeholder order.
    pub params: Vec<Value>,
}

impl SqlQuery {
    /// Creates a query.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Stable 64-bit fingerprint over the statement and its parameters.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh64::new(0);
        hasher.write(self.sql.as_bytes());
        hasher.write_u64(self.params.len() as u64);
        for param in &self.params {
            match param {
                Value::Null => hasher.write_u8(0),
                Value::Int(v) => {
                    hasher.write_u8(1);
                    hasher.write_i64(*v);
                }
                Value::Float(v) => {
                    hasher.write_u8(2);
                    hasher.write_u64(v.to_bits());
                }
                Value::Text(s) => {
                    hasher.write_u8(3);
                    hasher.write(s.as_bytes());
                }
                Value::Bytes(b) => {
                    hasher.write_u8(4);
                    hasher.write(b);
                }
            }
        }
        hasher.finish()
    }
}

impl fmt::Display for SqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(|p| format!("{p:?}")).collect();
            write!(f, " -- params: [{}]", params.join(", "))?;
        }
        Ok(())
    }
}

/// Closed set of page orderings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Newest postings first.
    #[default]
    DateDesc,
    /// Oldest postings first.
    DateAsc,
    /// Highest minimum salary first.
    SalaryDesc,
    /// Lowest minimum salary first.
    SalaryAsc,
    /// Title A to Z.
    TitleAsc,
    /// Title Z to A.
    TitleDesc,
    /// Company A to Z.
    CompanyAsc,
    /// Company Z to A.
    CompanyDesc,
}

impl SortKey {
    /// Every sort key, default first.
    pub const ALL: [SortKey; 8] = [
        SortKey::DateDesc,
        SortKey::DateAsc,
        SortKey::SalaryDesc,
        SortKey::SalaryAsc,
        SortKey::TitleAsc,
        SortKey::TitleDesc,
        SortKey::CompanyAsc,
        SortKey::CompanyDesc,
    ];

    /// Parses a sort key; unrecognized input falls back to the default.
    pub fn parse(raw: &str) -> Self {
        let wanted = raw.trim();
        match Self::ALL.into_iter().find(|key| key.as_str() == wanted) {
            Some(key) => key,
            None => {
                debug!(sort = raw, "unknown sort key, using default");
                Self::default()
            }
        }
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::DateDesc => "date_desc",
            SortKey::DateAsc => "date_asc",
            SortKey::SalaryDesc => "salary_desc",
            SortKey::SalaryAsc => "salary_asc",
            SortKey::TitleAsc => "title_asc",
            SortKey::TitleDesc => "title_desc",
            SortKey::CompanyAsc => "company_asc",
            SortKey::CompanyDesc => "company_desc",
        }
    }

    /// Many-to-one field the ordering reads from, if any.
    fn field(self) -> Option<&'static str> {
        match self {
            SortKey::TitleAsc | SortKey::TitleDesc => Some("title"),
            SortKey::CompanyAsc | SortKey::CompanyDesc => Some("company"),
            _ => None,
        }
    }

    fn direction(self) -> &'static str {
        match self {
            SortKey::DateDesc | SortKey::SalaryDesc | SortKey::TitleDesc | SortKey::CompanyDesc => {
                "DESC"
            }
            _ => "ASC",
        }
    }

    /// ORDER BY body. NULLs sort last and the entity key breaks ties so that
    /// pages partition the unpaginated order exactly.
    fn order_by(self, catalog: &SchemaCatalog) -> Result<String, CompileError> {
        let expr = match self {
            SortKey::DateDesc | SortKey::DateAsc => format!("{ENTITY_ALIAS}.posting_date"),
            SortKey::SalaryDesc | SortKey::SalaryAsc => format!("{ENTITY_ALIAS}.min_salary"),
            _ => match self.field() {
                Some(key) => catalog.field(key)?.label_expr(),
                None => format!("{ENTITY_ALIAS}.{ENTITY_KEY}"),
            },
        };
        Ok(format!(
            "{expr} {} NULLS LAST, {ENTITY_ALIAS}.{ENTITY_KEY} ASC",
            self.direction()
        ))
    }
}

impl From<&str> for SortKey {
    fn from(raw: &str) -> Self {
        SortKey::parse(raw)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1-indexed page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    page: u64,
    page_size: u64,
}

impl Pagination {
    /// Validates `page >= 1` and `page_size >= 1`.
    pub fn new(page: u64, page_size: u64) -> Result<Self, CompileError> {
        if page == 0 {
            return Err(CompileError::InvalidPagination { what: "page" });
        }
        if page_size == 0 {
            return Err(CompileError::InvalidPagination { what: "page size" });
        }
        Ok(Self { page, page_size })
    }

    /// Page number.
    pub fn page(&self) -> u64 {
        self.page
    }

    /// Page size.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Rows skipped before this page.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Number of pages needed for `total` rows.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.page_size)
    }
}

/// Converted salary columns present on the entity table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionColumns {
    /// Column holding the converted lower bound.
    pub min_column: String,
    /// Column holding the converted upper bound.
    pub max_column: String,
    /// Currency label of the converted values.
    pub currency: String,
}

impl Default for ConversionColumns {
    fn default() -> Self {
        Self {
            min_column: "min_salary_mdl".into(),
            max_column: "max_salary_mdl".into(),
            currency: "MDL".into(),
        }
    }
}

impl ConversionColumns {
    /// Column names must be plain identifiers since they end up in SQL text.
    pub fn is_valid(&self) -> bool {
        [&self.min_column, &self.max_column].iter().all(|name| {
            !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !name.starts_with(|c: char| c.is_ascii_digit())
        })
    }
}

/// Builds every statement the board issues.
#[derive(Clone, Debug)]
pub struct QueryAssembler<'a> {
    catalog: &'a SchemaCatalog,
    conversion: Option<ConversionColumns>,
}

impl<'a> QueryAssembler<'a> {
    /// Assembler without converted salary columns.
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self {
            catalog,
            conversion: None,
        }
    }

    /// Adds converted salary columns to entity projections.
    ///
    /// Invalid identifiers are ignored.
    pub fn with_conversion(mut self, conversion: Option<ConversionColumns>) -> Self {
        self.conversion = conversion.filter(ConversionColumns::is_valid);
        self
    }

    /// Catalog backing this assembler.
    pub fn catalog(&self) -> &'a SchemaCatalog {
        self.catalog
    }

    /// Predicate compiler over the same catalog.
    pub fn compiler(&self) -> PredicateCompiler<'a> {
        PredicateCompiler::new(self.catalog)
    }

    /// Paginated entity rows.
    pub fn page(
        &self,
        criteria: &Criteria,
        sort: SortKey,
        pagination: Pagination,
    ) -> Result<SqlQuery, CompileError> {
        let mut query = self.all(criteria, sort)?;
        query.sql.push_str(" LIMIT ? OFFSET ?");
        for bound in [pagination.page_size(), pagination.offset()] {
            query
                .params
                .push(Value::Int(i64::try_from(bound).unwrap_or(i64::MAX)));
        }
        Ok(query)
    }

    /// Every matching entity row in page order, unpaginated.
    pub fn all(&self, criteria: &Criteria, sort: SortKey) -> Result<SqlQuery, CompileError> {
        let clause = self.compiler().compile(criteria)?;
        let joins = JoinGraph::build(
            self.catalog,
            self.display_fields()
                .chain(clause.required_fields.iter().copied())
                .chain(sort.field()),
        )?;
        let sql = format!(
            "SELECT {} FROM {ENTITY_TABLE} {ENTITY_ALIAS}{}{} ORDER BY {}",
            self.projection(),
            joins.to_sql(),
            clause.to_sql(),
            sort.order_by(self.catalog)?,
        );
        Ok(SqlQuery::new(sql, clause.params))
    }

    /// Number of matching entities, in column [`COUNT_COLUMN`].
    pub fn count(&self, criteria: &Criteria) -> Result<SqlQuery, CompileError> {
        let clause = self.compiler().compile(criteria)?;
        let joins = JoinGraph::build(self.catalog, clause.required_fields.iter().copied())?;
        let sql = format!(
            "SELECT COUNT(*) AS {COUNT_COLUMN} FROM {ENTITY_TABLE} {ENTITY_ALIAS}{}{}",
            joins.to_sql(),
            clause.to_sql(),
        );
        Ok(SqlQuery::new(sql, clause.params))
    }

    /// Distinct labels of `field` with entity counts under every other active
    /// predicate.
    pub fn facet(&self, field: &str, criteria: &Criteria) -> Result<SqlQuery, CompileError> {
        let spec = self.catalog.field(field)?;
        let clause = self.compiler().compile_excluding(criteria, field)?;
        let label = spec.label_expr();
        let (source, joined_by_source) = self.attribute_source(spec);
        let joins = JoinGraph::build(
            self.catalog,
            joined_by_source
                .into_iter()
                .chain(clause.required_fields.iter().copied()),
        )?;
        let mut sql = format!(
            "SELECT {label} AS {FACET_LABEL}, COUNT(DISTINCT {ENTITY_ALIAS}.{ENTITY_KEY}) AS {FACET_COUNT} \
             FROM {ENTITY_TABLE} {ENTITY_ALIAS}{source}{} WHERE {label} IS NOT NULL",
            joins.to_sql(),
        );
        if !clause.is_empty() {
            sql.push_str(&format!(" AND ({})", clause.sql));
        }
        sql.push_str(&format!(
            " GROUP BY {label} ORDER BY {FACET_COUNT} DESC, {FACET_LABEL} ASC"
        ));
        Ok(SqlQuery::new(sql, clause.params))
    }

    /// One entity by primary key.
    pub fn by_id(&self, id: i64) -> Result<SqlQuery, CompileError> {
        let joins = JoinGraph::build(self.catalog, self.display_fields())?;
        let sql = format!(
            "SELECT {} FROM {ENTITY_TABLE} {ENTITY_ALIAS}{} WHERE {ENTITY_ALIAS}.{ENTITY_KEY} = ?",
            self.projection(),
            joins.to_sql(),
        );
        Ok(SqlQuery::new(sql, vec![Value::Int(id)]))
    }

    /// Labels of one multi-valued attribute for one entity, in storage order.
    pub fn attribute(&self, field: &str, entity_id: i64) -> Result<SqlQuery, CompileError> {
        let spec = self.multi_valued(field)?;
        let (from, owner, order) = attribute_from(spec);
        let sql = format!(
            "SELECT {} AS {FACET_LABEL} FROM {from} WHERE {owner} = ? ORDER BY {order}",
            spec.label_expr(),
        );
        Ok(SqlQuery::new(sql, vec![Value::Int(entity_id)]))
    }

    /// Labels of one attribute for many entities as `(entity_id, label)` rows.
    pub fn attribute_batch(&self, field: &str, entity_ids: &[i64]) -> Result<SqlQuery, CompileError> {
        let spec = self.multi_valued(field)?;
        if entity_ids.is_empty() {
            return Err(CompileError::EmptyBatch {
                field: field.to_owned(),
            });
        }
        let (from, owner, order) = attribute_from(spec);
        let sql = format!(
            "SELECT {owner} AS {OWNER_COLUMN}, {} AS {FACET_LABEL} FROM {from} WHERE {owner} IN ({}) ORDER BY {order}",
            spec.label_expr(),
            placeholders(entity_ids.len()),
        );
        Ok(SqlQuery::new(
            sql,
            entity_ids.iter().map(|id| Value::Int(*id)).collect(),
        ))
    }

    /// Grouped aggregation of a predefined template under `criteria`.
    pub fn analysis(
        &self,
        template: &AnalysisTemplate,
        criteria: &Criteria,
    ) -> Result<SqlQuery, CompileError> {
        let (source, guard) = match template.pivot {
            Some(Pivot::Each(field)) => (self.attribute_source(self.multi_valued(field)?).0, None),
            Some(Pivot::Pairs(field)) => {
                let spec = self.multi_valued(field)?;
                let (a, b) = (format!("{}_a", spec.alias), format!("{}_b", spec.alias));
                (
                    format!("{}{}", multi_valued_join(spec, &a), multi_valued_join(spec, &b)),
                    Some(format!("{a}.id < {b}.id")),
                )
            }
            None => (String::new(), None),
        };
        let mut fixed: Vec<&str> = guard.iter().map(String::as_str).collect();
        fixed.extend_from_slice(template.conditions);
        let clause: WhereClause = self.compiler().compile(criteria)?.and_conditions(&fixed);
        let joins = JoinGraph::build(
            self.catalog,
            template
                .lookups
                .iter()
                .copied()
                .chain(clause.required_fields.iter().copied()),
        )?;
        let mut sql = format!(
            "SELECT {} FROM {ENTITY_TABLE} {ENTITY_ALIAS}{source}{}{} GROUP BY {}",
            template.select.join(", "),
            joins.to_sql(),
            clause.to_sql(),
            template.group_by,
        );
        let mut params = clause.params;
        let mut having = Vec::new();
        if let Some(min) = template.min_group_size {
            having.push(format!("COUNT(DISTINCT {ENTITY_ALIAS}.{ENTITY_KEY}) >= ?"));
            params.push(Value::Int(i64::from(min)));
        }
        having.extend(template.having.iter().map(|h| format!("({h})")));
        if !having.is_empty() {
            sql.push_str(&format!(" HAVING {}", having.join(" AND ")));
        }
        sql.push_str(&format!(" ORDER BY {}", template.order_by));
        if let Some(limit) = template.limit {
            sql.push_str(" LIMIT ?");
            params.push(Value::Int(i64::from(limit)));
        }
        Ok(SqlQuery::new(sql, params))
    }

    fn multi_valued(&self, field: &str) -> Result<&'a FieldSpec, CompileError> {
        let spec = self.catalog.field(field)?;
        if spec.is_many_to_one() {
            return Err(CompileError::shape_mismatch(
                field,
                "a one-to-many or many-to-many attribute",
            ));
        }
        Ok(spec)
    }

    /// Extra FROM items bringing `spec`'s label into scope, plus the join key
    /// when the label comes from a many-to-one lookup.
    fn attribute_source(&self, spec: &FieldSpec) -> (String, Option<&'static str>) {
        match spec.shape {
            RelationShape::ManyToOne => (String::new(), Some(spec.key)),
            _ => (multi_valued_join(spec, spec.alias), None),
        }
    }

    fn display_fields(&self) -> impl Iterator<Item = &'static str> + 'a {
        self.catalog
            .display_columns()
            .iter()
            .filter_map(|column| match column.source {
                DisplaySource::Lookup(field) => Some(field),
                DisplaySource::Entity(_) => None,
            })
    }

    fn projection(&self) -> String {
        let mut columns: Vec<String> = self
            .catalog
            .display_columns()
            .iter()
            .map(|column| match column.source {
                DisplaySource::Entity(col) => format!("{ENTITY_ALIAS}.{col} AS {}", column.name),
                DisplaySource::Lookup(field) => {
                    let expr = self
                        .catalog
                        .field(field)
                        .map(FieldSpec::label_expr)
                        .unwrap_or_else(|_| "NULL".to_owned());
                    format!("{expr} AS {}", column.name)
                }
            })
            .collect();
        if let Some(conversion) = &self.conversion {
            columns.push(format!(
                "{ENTITY_ALIAS}.{} AS {CONVERTED_MIN}",
                conversion.min_column
            ));
            columns.push(format!(
                "{ENTITY_ALIAS}.{} AS {CONVERTED_MAX}",
                conversion.max_column
            ));
        }
        columns.join(", ")
    }
}

/// Inner joins bringing one label of a multi-valued field into scope under
/// `alias`, one row per label.
fn multi_valued_join(spec: &FieldSpec, alias: &str) -> String {
    match spec.junction {
        Some(junction) => format!(
            " JOIN {jt} {alias}_j ON {alias}_j.{fk} = {ENTITY_ALIAS}.{ENTITY_KEY} \
             JOIN {table} {alias} ON {alias}.id = {alias}_j.{lookup}",
            jt = junction.table,
            fk = spec.foreign_key,
            table = spec.table,
            lookup = junction.lookup_column,
        ),
        None => format!(
            " JOIN {table} {alias} ON {alias}.{fk} = {ENTITY_ALIAS}.{ENTITY_KEY}",
            table = spec.table,
            fk = spec.foreign_key,
        ),
    }
}

/// FROM body, owner column and storage-order key for a multi-valued field.
fn attribute_from(spec: &FieldSpec) -> (String, String, String) {
    let alias = spec.alias;
    match spec.junction {
        Some(junction) => (
            format!(
                "{jt} {alias}_j JOIN {table} {alias} ON {alias}.id = {alias}_j.{lookup}",
                jt = junction.table,
                table = spec.table,
                lookup = junction.lookup_column,
            ),
            format!("{alias}_j.{}", spec.foreign_key),
            format!("{alias}_j.rowid"),
        ),
        None => (
            format!("{} {alias}", spec.table),
            format!("{alias}.{}", spec.foreign_key),
            format!("{alias}.rowid"),
        ),
    }
}
