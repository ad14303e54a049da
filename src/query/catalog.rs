//! Declarative mapping from filter field keys to their relational shape.
//!
//! Every SQL identifier the compiler interpolates comes from this table. User
//! input only ever reaches a query as a bound parameter.

use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use crate::query::errors::CompileError;

/// Root fact table holding one row per job posting.
pub const ENTITY_TABLE: &str = "job_details";
/// Alias of the entity table in every generated query.
pub const ENTITY_ALIAS: &str = "jd";
/// Primary key column of the entity table.
pub const ENTITY_KEY: &str = "id";

/// How an attribute slot is connected to the entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelationShape {
    /// Entity row holds a foreign key into a lookup table.
    ManyToOne,
    /// Child table rows reference the entity directly.
    OneToMany,
    /// Entity and lookup rows are paired through a junction table.
    ManyToMany,
}

impl RelationShape {
    /// Snake-case name used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            RelationShape::ManyToOne => "many_to_one",
            RelationShape::OneToMany => "one_to_many",
            RelationShape::ManyToMany => "many_to_many",
        }
    }
}

/// Junction table metadata for many-to-many fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Junction {
    /// Junction table name.
    pub table: &'static str,
    /// Junction column that references the lookup row.
    pub lookup_column: &'static str,
}

/// Role a field plays besides being filterable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRole {
    /// Canonical facet dimension.
    Dimension,
    /// Legacy key resolving to the same lookup as the named canonical field.
    Alias(&'static str),
    /// Lookup only used to label display columns.
    Display,
}

/// One row of the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    /// Public field key.
    pub key: &'static str,
    /// Relationship shape.
    pub shape: RelationShape,
    /// Lookup table (many-to-one, many-to-many) or child table (one-to-many).
    pub table: &'static str,
    /// Column holding the human readable label.
    pub label_column: &'static str,
    /// Many-to-one: column on the entity table. One-to-many: child column
    /// referencing the entity. Many-to-many: junction column referencing the
    /// entity.
    pub foreign_key: &'static str,
    /// Junction table for many-to-many fields.
    pub junction: Option<Junction>,
    /// Table alias used wherever this field's table appears.
    pub alias: &'static str,
    /// Dimension, alias or display-only lookup.
    pub role: FieldRole,
}

impl FieldSpec {
    /// Fully qualified label expression, e.g. `ci.name`.
    pub fn label_expr(&self) -> String {
        format!("{}.{}", self.alias, self.label_column)
    }

    /// Returns `true` for fields resolved with a LEFT JOIN.
    pub fn is_many_to_one(&self) -> bool {
        self.shape == RelationShape::ManyToOne
    }

    /// Returns `true` for fields the hydrator attaches as lists.
    pub fn is_multi_valued(&self) -> bool {
        !self.is_many_to_one()
    }
}

/// Numeric range filter over entity columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeSpec {
    /// Public field key.
    pub key: &'static str,
    /// Column compared with the lower bound (`column >= ?`).
    pub lower_column: &'static str,
    /// Column compared with the upper bound (`column <= ?`).
    pub upper_column: &'static str,
}

/// Column matched by free-text search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchColumn {
    /// Text column on the entity table.
    Entity(&'static str),
    /// Label of a many-to-one field.
    Lookup(&'static str),
}

/// Column of the flat page projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayColumn {
    /// Output name in result rows.
    pub name: &'static str,
    /// Source of the value.
    pub source: DisplaySource,
}

/// Where a display column reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplaySource {
    /// Column on the entity table.
    Entity(&'static str),
    /// Label of a many-to-one field.
    Lookup(&'static str),
}

const fn m2o(
    key: &'static str,
    table: &'static str,
    foreign_key: &'static str,
    alias: &'static str,
) -> FieldSpec {
    FieldSpec {
        key,
        shape: RelationShape::ManyToOne,
        table,
        label_column: "name",
        foreign_key,
        junction: None,
        alias,
        role: FieldRole::Dimension,
    }
}

const fn o2m(
    key: &'static str,
    table: &'static str,
    label_column: &'static str,
    alias: &'static str,
) -> FieldSpec {
    FieldSpec {
        key,
        shape: RelationShape::OneToMany,
        table,
        label_column,
        foreign_key: "job_detail_id",
        junction: None,
        alias,
        role: FieldRole::Dimension,
    }
}

const fn m2m(
    key: &'static str,
    table: &'static str,
    junction: &'static str,
    lookup_column: &'static str,
    label_column: &'static str,
    alias: &'static str,
) -> FieldSpec {
    FieldSpec {
        key,
        shape: RelationShape::ManyToMany,
        table,
        label_column,
        foreign_key: "job_details_id",
        junction: Some(Junction {
            table: junction,
            lookup_column,
        }),
        alias,
        role: FieldRole::Dimension,
    }
}

const fn with_role(spec: FieldSpec, role: FieldRole) -> FieldSpec {
    FieldSpec { role, ..spec }
}

const FIELDS: &[FieldSpec] = &[
    m2o("title", "titles", "title_id", "t"),
    m2o("job_function", "job_functions", "job_function_id", "jf"),
    m2o("specialization", "specializations", "specialization_id", "sp"),
    m2o("seniority_level", "seniority_levels", "seniority_level_id", "sl"),
    m2o("company", "companies", "company_name_id", "c"),
    m2o("company_size", "company_sizes", "company_size_id", "cs"),
    m2o("city", "cities", "city_id", "ci"),
    m2o("region", "regions", "region_id", "reg"),
    m2o("country", "countries", "country_id", "cou"),
    m2o("remote_work", "remote_work_options", "remote_work_id", "rw"),
    with_role(
        FieldSpec {
            label_column: "code",
            ..m2o("salary_currency", "currencies", "salary_currency_id", "curr")
        },
        FieldRole::Display,
    ),
    with_role(
        m2o("salary_period", "salary_periods", "salary_period_id", "sper"),
        FieldRole::Display,
    ),
    m2o("employment_type", "employment_types", "employment_type_id", "et"),
    m2o("contract_type", "contract_types", "contract_type_id", "ct"),
    m2o("work_schedule", "work_schedules", "work_schedule_id", "ws"),
    m2o("education_level", "education_levels", "required_education_id", "el"),
    m2o("industry", "industries", "industry_id", "ind"),
    m2o("department", "departments", "department_id", "d"),
    m2o("job_family", "job_families", "job_family_id", "jf2"),
    m2o("shift_details", "shift_details", "shift_details_id", "sd"),
    m2o("travel_required", "travel_requirements", "travel_required_id", "tr"),
    with_role(
        m2o("location", "cities", "city_id", "ci"),
        FieldRole::Alias("city"),
    ),
    with_role(
        m2o("company_name", "companies", "company_name_id", "c"),
        FieldRole::Alias("company"),
    ),
    o2m("languages", "job_languages", "language", "jl"),
    o2m("responsibilities", "responsibilities", "description", "resp"),
    m2m(
        "hard_skills",
        "hard_skills",
        "job_details_hard_skills",
        "hard_skills_id",
        "name",
        "hs",
    ),
    m2m(
        "soft_skills",
        "soft_skills",
        "job_details_soft_skills",
        "soft_skills_id",
        "name",
        "ss",
    ),
    m2m(
        "certifications",
        "certifications",
        "job_details_certifications",
        "certifications_id",
        "name",
        "cert",
    ),
    m2m(
        "licenses_required",
        "licenses",
        "job_details_licenses",
        "licenses_id",
        "name",
        "lic",
    ),
    m2m(
        "benefits",
        "benefits",
        "job_details_benefits",
        "benefits_id",
        "description",
        "ben",
    ),
    m2m(
        "work_environment",
        "work_environment",
        "job_details_work_environment",
        "work_environment_id",
        "description",
        "we",
    ),
    m2m(
        "professional_development",
        "professional_development",
        "job_details_professional_development",
        "professional_development_id",
        "description",
        "pd",
    ),
    m2m(
        "work_life_balance",
        "work_life_balance",
        "job_details_work_life_balance",
        "work_life_balance_id",
        "description",
        "wlb",
    ),
    m2m(
        "physical_requirements",
        "physical_requirements",
        "job_details_physical_requirements",
        "physical_requirements_id",
        "description",
        "preq",
    ),
    m2m(
        "work_conditions",
        "work_conditions",
        "job_details_work_conditions",
        "work_conditions_id",
        "description",
        "wc",
    ),
    m2m(
        "special_requirements",
        "special_requirements",
        "job_details_special_requirements",
        "special_requirements_id",
        "description",
        "sreq",
    ),
];

const RANGES: &[RangeSpec] = &[
    RangeSpec {
        key: "salary",
        lower_column: "min_salary",
        upper_column: "max_salary",
    },
    RangeSpec {
        key: "experience",
        lower_column: "experience_years",
        upper_column: "experience_years",
    },
];

const SEARCH: &[SearchColumn] = &[
    SearchColumn::Entity("job_title"),
    SearchColumn::Lookup("title"),
    SearchColumn::Lookup("company"),
    SearchColumn::Lookup("job_function"),
    SearchColumn::Lookup("specialization"),
];

const fn entity(name: &'static str, column: &'static str) -> DisplayColumn {
    DisplayColumn {
        name,
        source: DisplaySource::Entity(column),
    }
}

const fn lookup(name: &'static str, field: &'static str) -> DisplayColumn {
    DisplayColumn {
        name,
        source: DisplaySource::Lookup(field),
    }
}

const DISPLAY: &[DisplayColumn] = &[
    entity("id", "id"),
    lookup("title", "title"),
    lookup("job_function", "job_function"),
    lookup("specialization", "specialization"),
    lookup("seniority_level", "seniority_level"),
    lookup("company", "company"),
    lookup("company_size", "company_size"),
    lookup("city", "city"),
    lookup("region", "region"),
    lookup("country", "country"),
    lookup("remote_work", "remote_work"),
    entity("min_salary", "min_salary"),
    entity("max_salary", "max_salary"),
    lookup("salary_currency", "salary_currency"),
    lookup("salary_period", "salary_period"),
    lookup("employment_type", "employment_type"),
    lookup("contract_type", "contract_type"),
    lookup("work_schedule", "work_schedule"),
    lookup("education_level", "education_level"),
    entity("experience_years", "experience_years"),
    entity("posting_date", "posting_date"),
    entity("site", "site"),
    entity("job_url", "job_url"),
    entity("original_title", "job_title"),
    entity("original_company", "company_name"),
    entity("original_description", "job_description"),
    lookup("industry", "industry"),
    lookup("department", "department"),
    lookup("job_family", "job_family"),
    lookup("shift_details", "shift_details"),
    lookup("travel_requirements", "travel_required"),
];

/// Multi-valued attributes attached to every hydrated entity, in output order.
const HYDRATED: &[&str] = &[
    "languages",
    "hard_skills",
    "soft_skills",
    "certifications",
    "benefits",
    "responsibilities",
    "work_environment",
    "professional_development",
];

/// Read-only catalog of every filterable field.
#[derive(Debug)]
pub struct SchemaCatalog {
    fields: &'static [FieldSpec],
    index: FxHashMap<&'static str, usize>,
    ranges: &'static [RangeSpec],
    search: &'static [SearchColumn],
    display: &'static [DisplayColumn],
    hydrated: &'static [&'static str],
}

static STANDARD: OnceLock<SchemaCatalog> = OnceLock::new();

impl SchemaCatalog {
    /// Catalog describing the job-postings dataset.
    pub fn standard() -> &'static SchemaCatalog {
        STANDARD.get_or_init(|| {
            let index = FIELDS
                .iter()
                .enumerate()
                .map(|(pos, spec)| (spec.key, pos))
                .collect();
            SchemaCatalog {
                fields: FIELDS,
                index,
                ranges: RANGES,
                search: SEARCH,
                display: DISPLAY,
                hydrated: HYDRATED,
            }
        })
    }

    /// Resolves a categorical field, failing loudly on unknown keys.
    pub fn field(&self, key: &str) -> Result<&FieldSpec, CompileError> {
        self.index
            .get(key)
            .map(|&pos| &self.fields[pos])
            .ok_or_else(|| CompileError::unknown_field(key))
    }

    /// Position of a field in catalog order, used to order joins.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Resolves a numeric range field.
    pub fn range(&self, key: &str) -> Option<&RangeSpec> {
        self.ranges.iter().find(|r| r.key == key)
    }

    /// Returns `true` when `key` names either a categorical or a range field.
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key) || self.range(key).is_some()
    }

    /// All fields in catalog order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    /// Canonical facet dimensions (no legacy aliases, no display lookups).
    pub fn dimensions(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields
            .iter()
            .filter(|spec| spec.role == FieldRole::Dimension)
    }

    /// All numeric range fields.
    pub fn ranges(&self) -> &[RangeSpec] {
        self.ranges
    }

    /// Columns matched by free-text search.
    pub fn search_columns(&self) -> &[SearchColumn] {
        self.search
    }

    /// Flat page projection.
    pub fn display_columns(&self) -> &[DisplayColumn] {
        self.display
    }

    /// Attributes the hydrator attaches to each entity.
    pub fn hydrated_attributes(&self) -> &[&'static str] {
        self.hydrated
    }

    /// Returns `true` when two keys filter the same dimension.
    ///
    /// Range keys only match themselves; categorical keys match when they
    /// resolve to the same table under the same alias.
    pub fn same_dimension(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        match (self.field(a), self.field(b)) {
            (Ok(x), Ok(y)) => x.table == y.table && x.alias == y.alias,
            _ => false,
        }
    }
}
