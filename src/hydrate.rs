//! Nested entity views assembled from flat rows plus follow-up queries.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::Result;
use crate::query::{
    assembler::{QueryAssembler, CONVERTED_MAX, CONVERTED_MIN, FACET_LABEL, OWNER_COLUMN},
    executor::{QueryExecutor, Row, RowSet},
    profile::{profile_timer, record_profile_timer, QueryProfileKind},
    Value,
};

/// How multi-valued attributes are fetched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HydrationStrategy {
    /// One query per entity per attribute, yielding between entities. Fine
    /// for an in-process engine at moderate page sizes.
    #[default]
    PerEntity,
    /// One `IN (...)` query per attribute for the whole page, grouped here.
    Batched,
}

/// Location labels.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// City.
    pub city: Option<String>,
    /// Region.
    pub region: Option<String>,
    /// Country.
    pub country: Option<String>,
    /// Remote work option.
    pub remote_work: Option<String>,
}

/// Salary converted upstream into a common currency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvertedSalary {
    /// Converted lower bound.
    pub min: Option<f64>,
    /// Converted upper bound.
    pub max: Option<f64>,
    /// Currency of the converted bounds.
    pub currency: String,
}

/// Salary as published, plus the upstream conversion when one exists.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Salary {
    /// Published lower bound.
    pub min: Option<f64>,
    /// Published upper bound.
    pub max: Option<f64>,
    /// Published currency code; `None` when unknown.
    pub currency: Option<String>,
    /// Pay period label.
    pub period: Option<String>,
    /// Converted bounds, only when the dataset carries them.
    pub converted: Option<ConvertedSalary>,
}

impl Salary {
    /// Human readable range; see [`format_salary`].
    pub fn display(&self) -> String {
        format_salary(self)
    }
}

/// Employment terms.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Employment {
    /// Employment type.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Contract type.
    pub contract: Option<String>,
    /// Work schedule.
    pub schedule: Option<String>,
}

/// Candidate requirements.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    /// Education level.
    pub education: Option<String>,
    /// Required years of experience.
    pub experience_years: Option<f64>,
    /// Required languages.
    pub languages: Vec<String>,
    /// Hard skills.
    pub hard_skills: Vec<String>,
    /// Soft skills.
    pub soft_skills: Vec<String>,
    /// Certifications.
    pub certifications: Vec<String>,
}

/// Where the posting was scraped from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Site name.
    pub site: Option<String>,
    /// Posting URL.
    pub url: Option<String>,
}

/// Structured sections extracted from the description.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedView {
    /// Responsibilities.
    pub responsibilities: Vec<String>,
    /// Work environment notes.
    pub work_environment: Vec<String>,
    /// Professional development offers.
    pub professional_development: Vec<String>,
}

/// Unprocessed text as published.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawText {
    /// Original title.
    pub original_title: Option<String>,
    /// Original company name.
    pub original_company: Option<String>,
    /// Original description.
    pub original_description: Option<String>,
}

/// Fully hydrated job posting.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    /// Primary key.
    pub id: i64,
    /// Normalized title.
    pub title: Option<String>,
    /// Job function.
    pub job_function: Option<String>,
    /// Specialization.
    pub specialization: Option<String>,
    /// Seniority level.
    pub seniority_level: Option<String>,
    /// Company.
    pub company: Option<String>,
    /// Company size.
    pub company_size: Option<String>,
    /// Location.
    pub location: Location,
    /// Salary.
    pub salary: Salary,
    /// Employment terms.
    pub employment: Employment,
    /// Requirements.
    pub requirements: Requirements,
    /// Benefits.
    pub benefits: Vec<String>,
    /// Posting date as stored.
    pub posting_date: Option<String>,
    /// Source.
    pub source: Source,
    /// Parsed description sections.
    pub parsed_view: ParsedView,
    /// Raw text.
    pub raw: RawText,
    /// Industry.
    pub industry: Option<String>,
    /// Department.
    pub department: Option<String>,
    /// Job family.
    pub job_family: Option<String>,
    /// Shift details.
    pub shift_details: Option<String>,
    /// Travel requirements.
    pub travel_requirements: Option<String>,
}

impl EntityView {
    /// Builds the flat part of a view from a projected row.
    ///
    /// `converted_currency` labels the converted salary columns when the row
    /// carries them. Returns `None` when the row has no integer `id`.
    pub fn from_row(row: &Row, converted_currency: Option<&str>) -> Option<Self> {
        let id = row.get("id").and_then(Value::as_i64)?;
        let text = |name: &str| -> Option<String> {
            match row.get(name)? {
                Value::Null => None,
                Value::Text(s) => Some(s.clone()),
                other => Some(other.to_string()),
            }
        };
        let num = |name: &str| row.get(name).and_then(Value::as_f64);
        let converted = converted_currency.and_then(|currency| {
            let (min, max) = (num(CONVERTED_MIN), num(CONVERTED_MAX));
            (min.is_some() || max.is_some()).then(|| ConvertedSalary {
                min,
                max,
                currency: currency.to_owned(),
            })
        });
        Some(Self {
            id,
            title: text("title"),
            job_function: text("job_function"),
            specialization: text("specialization"),
            seniority_level: text("seniority_level"),
            company: text("company"),
            company_size: text("company_size"),
            location: Location {
                city: text("city"),
                region: text("region"),
                country: text("country"),
                remote_work: text("remote_work"),
            },
            salary: Salary {
                min: num("min_salary"),
                max: num("max_salary"),
                currency: text("salary_currency").filter(|c| !c.trim().is_empty()),
                period: text("salary_period"),
                converted,
            },
            employment: Employment {
                kind: text("employment_type"),
                contract: text("contract_type"),
                schedule: text("work_schedule"),
            },
            requirements: Requirements {
                education: text("education_level"),
                experience_years: num("experience_years"),
                ..Requirements::default()
            },
            benefits: Vec::new(),
            posting_date: text("posting_date"),
            source: Source {
                site: text("site"),
                url: text("job_url"),
            },
            parsed_view: ParsedView::default(),
            raw: RawText {
                original_title: text("original_title"),
                original_company: text("original_company"),
                original_description: text("original_description"),
            },
            industry: text("industry"),
            department: text("department"),
            job_family: text("job_family"),
            shift_details: text("shift_details"),
            travel_requirements: text("travel_requirements"),
        })
    }

    /// List slot holding the labels of a multi-valued attribute.
    pub fn attribute_mut(&mut self, field: &str) -> Option<&mut Vec<String>> {
        Some(match field {
            "languages" => &mut self.requirements.languages,
            "hard_skills" => &mut self.requirements.hard_skills,
            "soft_skills" => &mut self.requirements.soft_skills,
            "certifications" => &mut self.requirements.certifications,
            "benefits" => &mut self.benefits,
            "responsibilities" => &mut self.parsed_view.responsibilities,
            "work_environment" => &mut self.parsed_view.work_environment,
            "professional_development" => &mut self.parsed_view.professional_development,
            _ => return None,
        })
    }
}

/// Formats a salary without ever inventing a conversion.
///
/// Converted bounds print with their currency, followed by the published
/// range when the published currency differs. Without a conversion the
/// published numbers print with the published currency, or bare when the
/// currency is unknown.
pub fn format_salary(salary: &Salary) -> String {
    if let Some(converted) = &salary.converted {
        if let Some(min) = converted.min {
            let mut out = format!("{} {}", range(min, converted.max), converted.currency);
            if let (Some(currency), Some(orig_min)) = (&salary.currency, salary.min) {
                if !currency.eq_ignore_ascii_case(&converted.currency) {
                    out.push_str(&format!(
                        " ({} {})",
                        range(orig_min, salary.max),
                        currency.to_uppercase()
                    ));
                }
            }
            return out;
        }
    }
    let Some(min) = salary.min else {
        return "Not specified".to_owned();
    };
    match &salary.currency {
        Some(currency) => format!("{} {}", range(min, salary.max), currency.to_uppercase()),
        None => range(min, salary.max),
    }
}

fn range(min: f64, max: Option<f64>) -> String {
    match max {
        Some(max) if max != min => format!("{} - {}", group_thousands(min), group_thousands(max)),
        _ => group_thousands(min),
    }
}

fn group_thousands(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let negative = rounded < 0.0;
    let whole = rounded.abs().trunc() as u64;
    let cents = ((rounded.abs() - rounded.abs().trunc()) * 100.0).round() as u64;
    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 4);
    if negative {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if cents > 0 {
        out.push_str(&format!(".{cents:02}"));
    }
    out
}

/// Attaches nested attributes to flat rows.
pub struct Hydrator<'a, E: ?Sized> {
    executor: &'a E,
    assembler: &'a QueryAssembler<'a>,
    strategy: HydrationStrategy,
    converted_currency: Option<&'a str>,
}

impl<'a, E: QueryExecutor + ?Sized> Hydrator<'a, E> {
    /// Hydrator issuing follow-up queries through `executor`.
    pub fn new(
        executor: &'a E,
        assembler: &'a QueryAssembler<'a>,
        strategy: HydrationStrategy,
    ) -> Self {
        Self {
            executor,
            assembler,
            strategy,
            converted_currency: None,
        }
    }

    /// Labels converted salary columns with `currency`.
    pub fn with_converted_currency(mut self, currency: Option<&'a str>) -> Self {
        self.converted_currency = currency;
        self
    }

    /// Hydrates every row of a page result, preserving row order.
    pub async fn hydrate_page(&self, rows: RowSet) -> Result<Vec<EntityView>> {
        let start = profile_timer();
        let mut views: Vec<EntityView> = rows
            .into_records()
            .iter()
            .filter_map(|row| {
                let view = EntityView::from_row(row, self.converted_currency);
                if view.is_none() {
                    warn!("row without integer id skipped");
                }
                view
            })
            .collect();
        match self.strategy {
            HydrationStrategy::PerEntity => {
                for view in &mut views {
                    self.attach_each(view)?;
                    tokio::task::yield_now().await;
                }
            }
            HydrationStrategy::Batched => self.attach_batched(&mut views)?,
        }
        record_profile_timer(QueryProfileKind::Hydrate, start);
        Ok(views)
    }

    /// Hydrates one flat row.
    pub async fn hydrate(&self, row: &Row) -> Result<Option<EntityView>> {
        let Some(mut view) = EntityView::from_row(row, self.converted_currency) else {
            return Ok(None);
        };
        self.attach_each(&mut view)?;
        tokio::task::yield_now().await;
        Ok(Some(view))
    }

    fn attach_each(&self, view: &mut EntityView) -> Result<()> {
        for field in self.assembler.catalog().hydrated_attributes() {
            let query = self.assembler.attribute(field, view.id)?;
            let labels: Vec<String> = self
                .executor
                .execute(&query)?
                .into_records()
                .into_iter()
                .filter_map(|mut row| row.remove(FACET_LABEL).and_then(Value::into_string))
                .collect();
            if let Some(slot) = view.attribute_mut(field) {
                *slot = labels;
            }
        }
        trace!(id = view.id, "entity hydrated");
        Ok(())
    }

    fn attach_batched(&self, views: &mut [EntityView]) -> Result<()> {
        if views.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = views.iter().map(|v| v.id).collect();
        for field in self.assembler.catalog().hydrated_attributes() {
            let query = self.assembler.attribute_batch(field, &ids)?;
            let mut grouped: FxHashMap<i64, Vec<String>> = FxHashMap::default();
            for mut row in self.executor.execute(&query)?.into_records() {
                let owner = row.get(OWNER_COLUMN).and_then(Value::as_i64);
                let label = row.remove(FACET_LABEL).and_then(Value::into_string);
                if let (Some(owner), Some(label)) = (owner, label) {
                    grouped.entry(owner).or_default().push(label);
                }
            }
            for view in views.iter_mut() {
                let labels = grouped.remove(&view.id).unwrap_or_default();
                if let Some(slot) = view.attribute_mut(field) {
                    *slot = labels;
                }
            }
        }
        Ok(())
    }
}
