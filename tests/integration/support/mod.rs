#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use jobscope::query::{catalog::ENTITY_TABLE, RelationShape, SchemaCatalog, Value};
use rusqlite::{params, Connection, OptionalExtension};
use tempfile::TempDir;

/// Scalar columns of the entity table beyond foreign keys.
const ENTITY_COLUMNS: &[(&str, &str)] = &[
    ("job_title", "TEXT"),
    ("company_name", "TEXT"),
    ("job_description", "TEXT"),
    ("min_salary", "REAL"),
    ("max_salary", "REAL"),
    ("experience_years", "REAL"),
    ("posting_date", "TEXT"),
    ("site", "TEXT"),
    ("job_url", "TEXT"),
];

/// Writes a dataset file whose schema is derived from the standard catalog.
pub struct DatasetBuilder {
    dir: TempDir,
    path: PathBuf,
    conn: Connection,
}

impl DatasetBuilder {
    pub fn new(with_conversion: bool) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jobs.db");
        let conn = Connection::open(&path).expect("open fixture");
        let catalog = SchemaCatalog::standard();

        let mut entity_columns = vec!["id INTEGER PRIMARY KEY".to_string()];
        entity_columns.extend(ENTITY_COLUMNS.iter().map(|(c, ty)| format!("{c} {ty}")));
        if with_conversion {
            entity_columns.push("min_salary_mdl REAL".into());
            entity_columns.push("max_salary_mdl REAL".into());
        }
        let mut seen_fk = BTreeSet::new();
        let mut ddl = Vec::new();
        for spec in catalog.fields() {
            match spec.shape {
                RelationShape::ManyToOne => {
                    if seen_fk.insert(spec.foreign_key) {
                        entity_columns.push(format!("{} INTEGER", spec.foreign_key));
                    }
                    ddl.push(format!(
                        "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY, {} TEXT)",
                        spec.table, spec.label_column
                    ));
                }
                RelationShape::OneToMany => ddl.push(format!(
                    "CREATE TABLE {} (id INTEGER PRIMARY KEY, {} INTEGER, {} TEXT)",
                    spec.table, spec.foreign_key, spec.label_column
                )),
                RelationShape::ManyToMany => {
                    let junction = spec.junction.expect("junction");
                    ddl.push(format!(
                        "CREATE TABLE {} (id INTEGER PRIMARY KEY, {} TEXT UNIQUE)",
                        spec.table, spec.label_column
                    ));
                    ddl.push(format!(
                        "CREATE TABLE {} ({} INTEGER, {} INTEGER)",
                        junction.table, spec.foreign_key, junction.lookup_column
                    ));
                }
            }
        }
        conn.execute_batch(&format!(
            "CREATE TABLE {ENTITY_TABLE} ({});",
            entity_columns.join(", ")
        ))
        .expect("entity table");
        for statement in ddl {
            conn.execute_batch(&statement).expect("lookup table");
        }
        Self { dir, path, conn }
    }

    pub fn job(&mut self, id: i64, columns: &[(&str, Value)]) -> &mut Self {
        self.conn
            .execute(
                &format!("INSERT INTO {ENTITY_TABLE} (id) VALUES (?)"),
                params![id],
            )
            .expect("insert job");
        for (column, value) in columns {
            self.conn
                .execute(
                    &format!("UPDATE {ENTITY_TABLE} SET {column} = ? WHERE id = ?"),
                    params![value, id],
                )
                .expect("set column");
        }
        self
    }

    /// Points a many-to-one field of `id` at `label`, creating the lookup row.
    pub fn label(&mut self, id: i64, field: &str, label: &str) -> &mut Self {
        let spec = SchemaCatalog::standard().field(field).expect("field");
        let row = self.lookup_id(spec.table, spec.label_column, label);
        self.conn
            .execute(
                &format!("UPDATE {ENTITY_TABLE} SET {} = ? WHERE id = ?", spec.foreign_key),
                params![row, id],
            )
            .expect("set foreign key");
        self
    }

    /// Appends labels of a one-to-many or many-to-many field, in order.
    pub fn labels(&mut self, id: i64, field: &str, labels: &[&str]) -> &mut Self {
        let spec = SchemaCatalog::standard().field(field).expect("field");
        for label in labels {
            match spec.junction {
                Some(junction) => {
                    let row = self.lookup_id(spec.table, spec.label_column, label);
                    self.conn
                        .execute(
                            &format!(
                                "INSERT INTO {} ({}, {}) VALUES (?, ?)",
                                junction.table, spec.foreign_key, junction.lookup_column
                            ),
                            params![id, row],
                        )
                        .expect("junction row");
                }
                None => {
                    self.conn
                        .execute(
                            &format!(
                                "INSERT INTO {} ({}, {}) VALUES (?, ?)",
                                spec.table, spec.foreign_key, spec.label_column
                            ),
                            params![id, label],
                        )
                        .expect("child row");
                }
            }
        }
        self
    }

    fn lookup_id(&self, table: &str, column: &str, label: &str) -> i64 {
        let existing: Option<i64> = self
            .conn
            .query_row(
                &format!("SELECT id FROM {table} WHERE {column} = ?"),
                params![label],
                |row| row.get(0),
            )
            .optional()
            .expect("lookup");
        match existing {
            Some(id) => id,
            None => {
                self.conn
                    .execute(
                        &format!("INSERT INTO {table} ({column}) VALUES (?)"),
                        params![label],
                    )
                    .expect("insert lookup");
                self.conn.last_insert_rowid()
            }
        }
    }

    pub fn finish(self) -> Fixture {
        drop(self.conn);
        Fixture {
            dir: self.dir,
            path: self.path,
        }
    }
}

/// Dataset file kept alive for the duration of a test.
pub struct Fixture {
    dir: TempDir,
    path: PathBuf,
}

impl Fixture {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn bytes(&self) -> Vec<u8> {
        std::fs::read(&self.path).expect("read fixture")
    }
}

fn text(value: &str) -> Value {
    Value::from(value)
}

/// Six postings exercising every relationship shape.
///
/// | id | city     | remote  | seniority | hard skills  | date       |
/// |----|----------|---------|-----------|--------------|------------|
/// | 1  | Chisinau | On-site | Senior    | Python       | 2024-05-01 |
/// | 2  | Chisinau | Remote  | Senior    | Python, SQL  | 2024-05-03 |
/// | 3  | Balti    | Hybrid  | Middle    | SQL, Python  | 2024-04-20 |
/// | 4  | Balti    | Remote  | Senior    | SQL          | 2024-05-02 |
/// | 5  | (null)   | (null)  | Junior    |              | (null)     |
/// | 6  | Cahul    | Remote  | Senior    | Rust         | 2024-05-03 |
pub fn scenario(with_conversion: bool) -> Fixture {
    let mut b = DatasetBuilder::new(with_conversion);
    let conv = |min: f64, max: f64| -> Vec<(&'static str, Value)> {
        if with_conversion {
            vec![("min_salary_mdl", Value::Float(min)), ("max_salary_mdl", Value::Float(max))]
        } else {
            Vec::new()
        }
    };

    let mut cols = vec![
        ("job_title", text("Python Developer")),
        ("company_name", text("Acme SRL")),
        ("min_salary", Value::Float(1000.0)),
        ("max_salary", Value::Float(2000.0)),
        ("experience_years", Value::Float(3.0)),
        ("posting_date", text("2024-05-01")),
        ("site", text("jobs.md")),
        ("job_url", text("https://jobs.md/1")),
    ];
    cols.extend(conv(19_500.0, 39_000.0));
    b.job(1, &cols)
        .label(1, "title", "Python Developer")
        .label(1, "company", "Acme")
        .label(1, "city", "Chisinau")
        .label(1, "remote_work", "On-site")
        .label(1, "seniority_level", "Senior")
        .label(1, "industry", "IT")
        .label(1, "employment_type", "Full-time")
        .label(1, "salary_currency", "EUR")
        .label(1, "salary_period", "Monthly")
        .labels(1, "hard_skills", &["Python"])
        .labels(1, "languages", &["Romanian", "English"])
        .labels(1, "benefits", &["Health insurance"]);

    b.job(
        2,
        &[
            ("job_title", text("Data Engineer")),
            ("min_salary", Value::Float(1500.0)),
            ("max_salary", Value::Float(2500.0)),
            ("experience_years", Value::Float(4.0)),
            ("posting_date", text("2024-05-03")),
        ],
    )
    .label(2, "title", "Data Engineer")
    .label(2, "company", "Beta")
    .label(2, "city", "Chisinau")
    .label(2, "remote_work", "Remote")
    .label(2, "seniority_level", "Senior")
    .label(2, "industry", "IT")
    .label(2, "salary_currency", "USD")
    .labels(2, "hard_skills", &["Python", "SQL"])
    .labels(2, "languages", &["English"])
    .labels(2, "responsibilities", &["Build pipelines", "Review code"]);

    let mut cols = vec![
        ("job_title", text("Analyst")),
        ("min_salary", Value::Float(800.0)),
        ("max_salary", Value::Float(800.0)),
        ("experience_years", Value::Float(1.0)),
        ("posting_date", text("2024-04-20")),
    ];
    cols.extend(conv(800.0, 800.0));
    b.job(3, &cols)
        .label(3, "title", "Analyst")
        .label(3, "company", "Acme")
        .label(3, "city", "Balti")
        .label(3, "remote_work", "Hybrid")
        .label(3, "seniority_level", "Middle")
        .label(3, "industry", "Finance")
        .label(3, "salary_currency", "MDL")
        .labels(3, "hard_skills", &["SQL", "Python"])
        .labels(3, "soft_skills", &["Teamwork"]);

    b.job(
        4,
        &[
            ("job_title", text("DBA")),
            ("experience_years", Value::Float(6.0)),
            ("posting_date", text("2024-05-02")),
        ],
    )
    .label(4, "title", "DBA")
    .label(4, "company", "Gamma")
    .label(4, "city", "Balti")
    .label(4, "remote_work", "Remote")
    .label(4, "seniority_level", "Senior")
    .labels(4, "hard_skills", &["SQL"]);

    b.job(
        5,
        &[
            ("job_title", text("Intern")),
            ("min_salary", Value::Float(300.0)),
            ("max_salary", Value::Float(500.0)),
            ("experience_years", Value::Float(0.0)),
        ],
    )
    .label(5, "title", "Intern")
    .label(5, "seniority_level", "Junior");

    b.job(
        6,
        &[
            ("job_title", text("Rust Engineer")),
            ("min_salary", Value::Float(3000.0)),
            ("max_salary", Value::Float(4000.0)),
            ("experience_years", Value::Float(5.0)),
            ("posting_date", text("2024-05-03")),
        ],
    )
    .label(6, "title", "Rust Engineer")
    .label(6, "company", "Beta")
    .label(6, "city", "Cahul")
    .label(6, "remote_work", "Remote")
    .label(6, "seniority_level", "Senior")
    .label(6, "salary_currency", "EUR")
    .labels(6, "hard_skills", &["Rust"]);

    b.finish()
}

/// Requirement tables laid out by hand the way the published dataset ships
/// them, with labels in `description`.
///
/// | id | work-life balance | physical        | conditions | special        |
/// |----|-------------------|-----------------|------------|----------------|
/// | 1  | Flexible hours    | Lifting 10kg    | Office     | Driving permit |
/// | 2  | Flexible hours    |                 | Outdoor    |                |
/// | 3  | Four-day week     | Standing        | Office     |                |
pub fn requirements_dataset() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("requirements.db");
    let conn = Connection::open(&path).expect("open fixture");
    conn.execute_batch(
        "CREATE TABLE job_details (id INTEGER PRIMARY KEY, job_title TEXT);
         INSERT INTO job_details (id, job_title) VALUES (1, 'Driver'), (2, 'Courier'), (3, 'Clerk');

         CREATE TABLE work_life_balance (id INTEGER PRIMARY KEY, description TEXT UNIQUE);
         CREATE TABLE job_details_work_life_balance (job_details_id INTEGER, work_life_balance_id INTEGER);
         INSERT INTO work_life_balance VALUES (1, 'Flexible hours'), (2, 'Four-day week');
         INSERT INTO job_details_work_life_balance VALUES (1, 1), (2, 1), (3, 2);

         CREATE TABLE physical_requirements (id INTEGER PRIMARY KEY, description TEXT UNIQUE);
         CREATE TABLE job_details_physical_requirements (job_details_id INTEGER, physical_requirements_id INTEGER);
         INSERT INTO physical_requirements VALUES (1, 'Lifting 10kg'), (2, 'Standing');
         INSERT INTO job_details_physical_requirements VALUES (1, 1), (3, 2);

         CREATE TABLE work_conditions (id INTEGER PRIMARY KEY, description TEXT UNIQUE);
         CREATE TABLE job_details_work_conditions (job_details_id INTEGER, work_conditions_id INTEGER);
         INSERT INTO work_conditions VALUES (1, 'Office'), (2, 'Outdoor');
         INSERT INTO job_details_work_conditions VALUES (1, 1), (2, 2), (3, 1);

         CREATE TABLE special_requirements (id INTEGER PRIMARY KEY, description TEXT UNIQUE);
         CREATE TABLE job_details_special_requirements (job_details_id INTEGER, special_requirements_id INTEGER);
         INSERT INTO special_requirements VALUES (1, 'Driving permit');
         INSERT INTO job_details_special_requirements VALUES (1, 1);",
    )
    .expect("requirement tables");
    drop(conn);
    Fixture { dir, path }
}
