//! Predefined exploratory aggregations run under the current criteria.
//!
//! Baselines written as scalar subqueries (`percentage`, salary floors) are
//! taken over the whole dataset, not over the filtered rows.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::query::errors::CompileError;

/// Group an analysis is listed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Posting volume over days, weeks and months.
    Temporal,
    /// Hard and soft skill demand.
    Skills,
    /// Pay levels and their drivers.
    Salary,
    /// Employers, industries and departments.
    Companies,
    /// Remote work, schedules and contracts.
    Arrangements,
    /// Experience, education and certifications.
    Requirements,
    /// Benefits and perks.
    Benefits,
    /// Where to steer a career.
    Career,
}

impl Category {
    /// Every category in listing order.
    pub const ALL: [Category; 8] = [
        Category::Temporal,
        Category::Skills,
        Category::Salary,
        Category::Companies,
        Category::Arrangements,
        Category::Requirements,
        Category::Benefits,
        Category::Career,
    ];

    /// Snake-case name accepted by [`Category::from_str`].
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Temporal => "temporal",
            Category::Skills => "skills",
            Category::Salary => "salary",
            Category::Companies => "companies",
            Category::Arrangements => "arrangements",
            Category::Requirements => "requirements",
            Category::Benefits => "benefits",
            Category::Career => "career",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CompileError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let wanted = name.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| CompileError::UnknownCategory {
                name: name.to_owned(),
            })
    }
}

/// How a multi-valued attribute multiplies the grouped rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum Pivot {
    /// One row per label, aliased as the field's catalog alias.
    Each(&'static str),
    /// One row per unordered pair of distinct labels on the same entity,
    /// aliased `<alias>_a` and `<alias>_b`.
    Pairs(&'static str),
}

impl Pivot {
    /// Field key being pivoted.
    pub fn field(self) -> &'static str {
        match self {
            Pivot::Each(field) | Pivot::Pairs(field) => field,
        }
    }
}

/// Static shape of one grouped aggregation.
///
/// Every string is catalog-level SQL; criteria are compiled separately and
/// ANDed with `conditions`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AnalysisTemplate {
    /// Stable identifier used on the command line.
    pub name: &'static str,
    /// Listing group.
    pub category: Category,
    /// Display title.
    pub title: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Projection expressions, each with its output alias.
    pub select: &'static [&'static str],
    /// Many-to-one fields whose aliases the template references.
    pub lookups: &'static [&'static str],
    /// Multi-valued field inner-joined so its labels become groups.
    pub pivot: Option<Pivot>,
    /// Fixed conditions ANDed in front of the compiled criteria.
    pub conditions: &'static [&'static str],
    /// GROUP BY body.
    pub group_by: &'static str,
    /// Minimum distinct entities per group, bound as a parameter.
    pub min_group_size: Option<u32>,
    /// Extra HAVING conditions over output aliases.
    pub having: &'static [&'static str],
    /// ORDER BY body.
    pub order_by: &'static str,
    /// Row cap, bound as a parameter.
    pub limit: Option<u32>,
}

impl AnalysisTemplate {
    const fn new(
        name: &'static str,
        category: Category,
        title: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            category,
            title,
            description,
            select: &[],
            lookups: &[],
            pivot: None,
            conditions: &[],
            group_by: "",
            min_group_size: None,
            having: &[],
            order_by: "",
            limit: None,
        }
    }

    const fn select(self, select: &'static [&'static str]) -> Self {
        Self { select, ..self }
    }

    const fn lookups(self, lookups: &'static [&'static str]) -> Self {
        Self { lookups, ..self }
    }

    const fn each(self, field: &'static str) -> Self {
        Self {
            pivot: Some(Pivot::Each(field)),
            ..self
        }
    }

    const fn pairs(self, field: &'static str) -> Self {
        Self {
            pivot: Some(Pivot::Pairs(field)),
            ..self
        }
    }

    const fn when(self, conditions: &'static [&'static str]) -> Self {
        Self { conditions, ..self }
    }

    const fn group(self, group_by: &'static str, order_by: &'static str) -> Self {
        Self {
            group_by,
            order_by,
            ..self
        }
    }

    const fn at_least(self, min: u32) -> Self {
        Self {
            min_group_size: Some(min),
            ..self
        }
    }

    const fn having(self, having: &'static [&'static str]) -> Self {
        Self { having, ..self }
    }

    const fn top(self, limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..self
        }
    }
}

const JOB_COUNT: &str = "COUNT(DISTINCT jd.id) AS job_count";
const AVG_MIN: &str = "ROUND(AVG(jd.min_salary)) AS avg_min_salary";
const AVG_MAX: &str = "ROUND(AVG(jd.max_salary)) AS avg_max_salary";
const SHARE: &str =
    "ROUND(COUNT(DISTINCT jd.id) * 100.0 / (SELECT COUNT(*) FROM job_details), 2) AS percentage";
const HAS_MAX: &str = "jd.max_salary IS NOT NULL";
const LAST_90_DAYS: &str = "jd.posting_date >= date('now', '-90 days')";
const LAST_180_DAYS: &str = "jd.posting_date >= date('now', '-180 days')";
const HIGH_SALARY: &str = "jd.max_salary >= (SELECT CAST(AVG(max_salary) * 1.25 AS INTEGER) \
                           FROM job_details WHERE max_salary IS NOT NULL)";
const ABOVE_MARKET: &str = "avg_max_salary > (SELECT AVG(max_salary) * 1.2 \
                            FROM job_details WHERE max_salary IS NOT NULL)";
const RECENT_90: &str = "COUNT(DISTINCT CASE WHEN jd.posting_date >= date('now', '-90 days') \
                         THEN jd.id END) AS recent_count";
const PREVIOUS_90: &str = "COUNT(DISTINCT CASE WHEN jd.posting_date >= date('now', '-180 days') \
                           AND jd.posting_date < date('now', '-90 days') THEN jd.id END) AS previous_count";
const GROWING: &[&str] = &["recent_count > previous_count", "recent_count >= 10"];

use Category::*;

const TEMPLATES: &[AnalysisTemplate] = &[
    // Temporal
    AnalysisTemplate::new(
        "postings_over_time",
        Temporal,
        "Job Postings Over Time",
        "Daily openings over the last 90 days",
    )
    .select(&[
        "DATE(jd.posting_date) AS date",
        JOB_COUNT,
        "COUNT(DISTINCT jd.company_name_id) AS company_count",
    ])
    .when(&[LAST_90_DAYS])
    .group("DATE(jd.posting_date)", "date ASC"),
    AnalysisTemplate::new(
        "monthly_hiring",
        Temporal,
        "Hiring Trends by Month",
        "Monthly volume and pay over the last year",
    )
    .select(&["strftime('%Y-%m', jd.posting_date) AS month", JOB_COUNT, AVG_MAX])
    .when(&["jd.posting_date >= date('now', '-12 months')", HAS_MAX])
    .group("month", "month ASC"),
    AnalysisTemplate::new(
        "high_salary_timeline",
        Temporal,
        "High-Salary Job Postings Timeline",
        "When postings paying 25% above average appear",
    )
    .select(&[
        "DATE(jd.posting_date) AS date",
        "COUNT(DISTINCT jd.id) AS high_salary_jobs",
        AVG_MAX,
    ])
    .when(&[HIGH_SALARY, LAST_90_DAYS])
    .group("date", "date ASC"),
    AnalysisTemplate::new(
        "industry_velocity",
        Temporal,
        "Job Posting Velocity by Industry",
        "Industries posting the most in the last 30 days",
    )
    .select(&[
        "ind.name AS industry",
        "COUNT(DISTINCT jd.id) AS recent_jobs",
        "ROUND(COUNT(DISTINCT jd.id) * 100.0 / (SELECT COUNT(*) FROM job_details \
         WHERE posting_date >= date('now', '-30 days')), 2) AS percentage",
    ])
    .lookups(&["industry"])
    .when(&["ind.name IS NOT NULL", "jd.posting_date >= date('now', '-30 days')"])
    .group("ind.name", "recent_jobs DESC, industry ASC")
    .top(15),
    AnalysisTemplate::new(
        "seasonal_hiring",
        Temporal,
        "Seasonal Hiring Patterns",
        "Volume and pay by calendar month",
    )
    .select(&[
        "CASE CAST(strftime('%m', jd.posting_date) AS INTEGER) \
         WHEN 1 THEN 'January' WHEN 2 THEN 'February' WHEN 3 THEN 'March' \
         WHEN 4 THEN 'April' WHEN 5 THEN 'May' WHEN 6 THEN 'June' \
         WHEN 7 THEN 'July' WHEN 8 THEN 'August' WHEN 9 THEN 'September' \
         WHEN 10 THEN 'October' WHEN 11 THEN 'November' ELSE 'December' END AS month",
        JOB_COUNT,
        AVG_MAX,
    ])
    .when(&[HAS_MAX, "jd.posting_date IS NOT NULL"])
    .group(
        "strftime('%m', jd.posting_date)",
        "CAST(strftime('%m', jd.posting_date) AS INTEGER)",
    ),
    AnalysisTemplate::new(
        "weekday_postings",
        Temporal,
        "Weekly Posting Patterns",
        "Which weekdays new postings appear on",
    )
    .select(&[
        "CASE CAST(strftime('%w', jd.posting_date) AS INTEGER) \
         WHEN 0 THEN 'Sunday' WHEN 1 THEN 'Monday' WHEN 2 THEN 'Tuesday' \
         WHEN 3 THEN 'Wednesday' WHEN 4 THEN 'Thursday' WHEN 5 THEN 'Friday' \
         ELSE 'Saturday' END AS day_of_week",
        JOB_COUNT,
        AVG_MAX,
    ])
    .when(&[HAS_MAX, LAST_90_DAYS])
    .group(
        "strftime('%w', jd.posting_date)",
        "CAST(strftime('%w', jd.posting_date) AS INTEGER)",
    ),
    AnalysisTemplate::new(
        "market_growth",
        Temporal,
        "Job Market Growth Rate",
        "Month-over-month posting volume",
    )
    .select(&["strftime('%Y-%m', jd.posting_date) AS month", JOB_COUNT])
    .when(&["jd.posting_date >= date('now', '-12 months')"])
    .group("month", "month ASC"),
    // Skills
    AnalysisTemplate::new(
        "in_demand_skills",
        Skills,
        "Most In-Demand Skills",
        "Hard skills employers ask for most",
    )
    .select(&["hs.name AS skill", JOB_COUNT, AVG_MAX])
    .each("hard_skills")
    .when(&[HAS_MAX])
    .group("hs.name", "job_count DESC, skill ASC")
    .top(20),
    AnalysisTemplate::new(
        "top_skills",
        Skills,
        "Top Skills in Demand",
        "Share of postings asking for each hard skill",
    )
    .select(&["hs.name AS skill", JOB_COUNT, SHARE])
    .each("hard_skills")
    .group("hs.name", "job_count DESC, skill ASC")
    .top(20),
    AnalysisTemplate::new(
        "skills_by_salary",
        Skills,
        "Top Skills by Salary",
        "Skills that command the highest pay",
    )
    .select(&["hs.name AS skill", JOB_COUNT, AVG_MIN, AVG_MAX])
    .each("hard_skills")
    .when(&["jd.min_salary IS NOT NULL AND jd.max_salary IS NOT NULL"])
    .group("hs.name", "avg_max_salary DESC, skill ASC")
    .at_least(5)
    .top(15),
    AnalysisTemplate::new(
        "skill_pairs",
        Skills,
        "Skill Co-Occurrences",
        "Hard skills most often asked for together",
    )
    .select(&["hs_a.name || ' + ' || hs_b.name AS skill_combination", JOB_COUNT])
    .pairs("hard_skills")
    .group("hs_a.name, hs_b.name", "job_count DESC, skill_combination ASC")
    .top(20),
    AnalysisTemplate::new(
        "emerging_skills",
        Skills,
        "Emerging Skills",
        "Skills growing fastest, last 90 days against the 90 before",
    )
    .select(&["hs.name AS skill", RECENT_90, PREVIOUS_90])
    .each("hard_skills")
    .when(&[LAST_180_DAYS])
    .group("hs.name", "recent_count - previous_count DESC, skill ASC")
    .having(GROWING)
    .top(20),
    AnalysisTemplate::new(
        "high_value_skill_pairs",
        Skills,
        "High-Value Skill Combinations",
        "Skill pairs with the highest pay",
    )
    .select(&[
        "hs_a.name || ' + ' || hs_b.name AS skill_combination",
        JOB_COUNT,
        AVG_MAX,
    ])
    .pairs("hard_skills")
    .when(&[HAS_MAX])
    .group("hs_a.name, hs_b.name", "avg_max_salary DESC, skill_combination ASC")
    .at_least(5)
    .top(15),
    AnalysisTemplate::new(
        "skills_by_industry",
        Skills,
        "Skills by Industry",
        "Leading skills within the five largest industries",
    )
    .select(&["ind.name || ' - ' || hs.name AS industry_skill", JOB_COUNT])
    .lookups(&["industry"])
    .each("hard_skills")
    .when(&["ind.name IN (SELECT i2.name FROM job_details jd2 \
             JOIN industries i2 ON jd2.industry_id = i2.id \
             GROUP BY i2.name ORDER BY COUNT(*) DESC LIMIT 5)"])
    .group("ind.name, hs.name", "job_count DESC, industry_skill ASC")
    .top(20),
    AnalysisTemplate::new(
        "top_soft_skills",
        Skills,
        "Top Soft Skills",
        "Soft skills requested most often",
    )
    .select(&["ss.name AS skill", JOB_COUNT, SHARE])
    .each("soft_skills")
    .group("ss.name", "job_count DESC, skill ASC")
    .top(15),
    AnalysisTemplate::new(
        "soft_skills_by_salary",
        Skills,
        "Soft Skills by Salary Impact",
        "Soft skills found on better paid postings",
    )
    .select(&["ss.name AS soft_skill", JOB_COUNT, AVG_MAX])
    .each("soft_skills")
    .when(&[HAS_MAX])
    .group("ss.name", "avg_max_salary DESC, soft_skill ASC")
    .at_least(10)
    .top(15),
    AnalysisTemplate::new(
        "rare_high_value_skills",
        Skills,
        "Rare High-Value Skills",
        "Niche skills paying 20% above the market",
    )
    .select(&["hs.name AS skill", JOB_COUNT, AVG_MAX])
    .each("hard_skills")
    .when(&[HAS_MAX])
    .group("hs.name", "avg_max_salary DESC, skill ASC")
    .having(&["job_count BETWEEN 5 AND 50", ABOVE_MARKET])
    .top(15),
    AnalysisTemplate::new(
        "skills_gap",
        Skills,
        "Skills Gap Analysis",
        "Well paid skills in steady recent demand",
    )
    .select(&["hs.name AS skill", "COUNT(DISTINCT jd.id) AS job_demand", AVG_MAX])
    .each("hard_skills")
    .when(&[HAS_MAX, LAST_90_DAYS])
    .group("hs.name", "avg_max_salary DESC, skill ASC")
    .at_least(10)
    .top(20),
    // Salary
    AnalysisTemplate::new(
        "salary_by_experience",
        Salary,
        "Salary Insights by Experience",
        "How salary varies by experience level",
    )
    .select(&[
        "CASE WHEN jd.experience_years = 0 THEN 'Entry Level (0 years)' \
         WHEN jd.experience_years BETWEEN 1 AND 2 THEN 'Junior (1-2 years)' \
         WHEN jd.experience_years BETWEEN 3 AND 5 THEN 'Mid-Level (3-5 years)' \
         WHEN jd.experience_years BETWEEN 6 AND 10 THEN 'Senior (6-10 years)' \
         ELSE 'Expert (10+ years)' END AS experience_level",
        JOB_COUNT,
        AVG_MIN,
        AVG_MAX,
    ])
    .when(&["jd.experience_years IS NOT NULL AND jd.max_salary IS NOT NULL"])
    .group(
        "experience_level",
        "CASE experience_level WHEN 'Entry Level (0 years)' THEN 1 \
         WHEN 'Junior (1-2 years)' THEN 2 WHEN 'Mid-Level (3-5 years)' THEN 3 \
         WHEN 'Senior (6-10 years)' THEN 4 ELSE 5 END",
    ),
    AnalysisTemplate::new(
        "salary_ranges",
        Salary,
        "Salary Range Distribution",
        "Postings bucketed by upper salary bound",
    )
    .select(&[
        "CASE WHEN jd.max_salary < 15000 THEN 'Under 15k' \
         WHEN jd.max_salary < 25000 THEN '15k-25k' \
         WHEN jd.max_salary < 35000 THEN '25k-35k' \
         WHEN jd.max_salary < 50000 THEN '35k-50k' \
         ELSE '50k+' END AS salary_range",
        JOB_COUNT,
    ])
    .when(&[HAS_MAX])
    .group(
        "salary_range",
        "CASE salary_range WHEN 'Under 15k' THEN 1 WHEN '15k-25k' THEN 2 \
         WHEN '25k-35k' THEN 3 WHEN '35k-50k' THEN 4 ELSE 5 END",
    ),
    AnalysisTemplate::new(
        "salary_distribution",
        Salary,
        "Salary Distribution",
        "Postings bucketed by lower salary bound",
    )
    .select(&[
        "CASE WHEN jd.min_salary < 10000 THEN '< 10k' \
         WHEN jd.min_salary < 20000 THEN '10k-20k' \
         WHEN jd.min_salary < 30000 THEN '20k-30k' \
         WHEN jd.min_salary < 40000 THEN '30k-40k' \
         WHEN jd.min_salary < 50000 THEN '40k-50k' \
         ELSE '50k+' END AS salary_range",
        JOB_COUNT,
    ])
    .when(&["jd.min_salary IS NOT NULL"])
    .group(
        "salary_range",
        "CASE salary_range WHEN '< 10k' THEN 1 WHEN '10k-20k' THEN 2 \
         WHEN '20k-30k' THEN 3 WHEN '30k-40k' THEN 4 WHEN '40k-50k' THEN 5 ELSE 6 END",
    ),
    AnalysisTemplate::new(
        "salary_percentiles",
        Salary,
        "Salary Percentiles",
        "Upper salary bound of every posting; quartiles come from the statistics",
    )
    .select(&["jd.max_salary AS max_salary"])
    .when(&[HAS_MAX])
    .group("jd.id", "max_salary ASC, jd.id ASC"),
    AnalysisTemplate::new(
        "salary_by_seniority",
        Salary,
        "Salary by Seniority Level",
        "Pay progression across seniority levels",
    )
    .select(&["sl.name AS seniority_level", JOB_COUNT, AVG_MIN, AVG_MAX])
    .lookups(&["seniority_level"])
    .when(&["sl.name IS NOT NULL", "jd.min_salary IS NOT NULL"])
    .group("sl.name", "avg_max_salary DESC, seniority_level ASC"),
    AnalysisTemplate::new(
        "salary_vs_experience",
        Salary,
        "Salary vs Experience",
        "Pay by exact years of experience up to 15",
    )
    .select(&["jd.experience_years AS experience_years", JOB_COUNT, AVG_MIN, AVG_MAX])
    .when(&[
        "jd.experience_years IS NOT NULL",
        "jd.min_salary IS NOT NULL",
        "jd.experience_years <= 15",
    ])
    .group("jd.experience_years", "jd.experience_years ASC"),
    AnalysisTemplate::new(
        "salary_by_function",
        Salary,
        "Salary by Job Function",
        "Average pay per job function",
    )
    .select(&["jf.name AS job_function", JOB_COUNT, AVG_MIN, AVG_MAX])
    .lookups(&["job_function"])
    .when(&["jf.name IS NOT NULL", "jd.min_salary IS NOT NULL"])
    .group("jf.name", "avg_max_salary DESC, job_function ASC")
    .at_least(5)
    .top(15),
    AnalysisTemplate::new(
        "top_paying_industries",
        Salary,
        "Top Paying Industries",
        "Industries with the highest average pay",
    )
    .select(&["ind.name AS industry", JOB_COUNT, AVG_MIN, AVG_MAX])
    .lookups(&["industry"])
    .when(&["ind.name IS NOT NULL", HAS_MAX])
    .group("ind.name", "avg_max_salary DESC, industry ASC")
    .at_least(10)
    .top(15),
    AnalysisTemplate::new(
        "top_paying_companies",
        Salary,
        "Top Paying Companies",
        "Employers with the highest average pay",
    )
    .select(&["c.name AS company", JOB_COUNT, AVG_MAX])
    .lookups(&["company"])
    .when(&["c.name IS NOT NULL", HAS_MAX])
    .group("c.name", "avg_max_salary DESC, company ASC")
    .at_least(5)
    .top(20),
    AnalysisTemplate::new(
        "salary_by_city",
        Salary,
        "Salary by City",
        "Pay differences between cities",
    )
    .select(&["ci.name AS city", JOB_COUNT, AVG_MIN, AVG_MAX])
    .lookups(&["city"])
    .when(&["ci.name IS NOT NULL", HAS_MAX])
    .group("ci.name", "avg_max_salary DESC, city ASC")
    .at_least(10)
    .top(20),
    AnalysisTemplate::new(
        "salary_by_remote_option",
        Salary,
        "Salary by Remote Work Option",
        "Pay for remote, hybrid and on-site work",
    )
    .select(&["rw.name AS remote_option", JOB_COUNT, AVG_MIN, AVG_MAX])
    .lookups(&["remote_work"])
    .when(&["rw.name IS NOT NULL", HAS_MAX])
    .group("rw.name", "avg_max_salary DESC, remote_option ASC"),
    AnalysisTemplate::new(
        "salary_by_company_size",
        Salary,
        "Salary by Company Size",
        "Pay at small, medium and large employers",
    )
    .select(&["cs.name AS company_size", JOB_COUNT, AVG_MIN, AVG_MAX])
    .lookups(&["company_size"])
    .when(&["cs.name IS NOT NULL", HAS_MAX])
    .group("cs.name", "avg_max_salary DESC, company_size ASC"),
    AnalysisTemplate::new(
        "salary_by_education",
        Salary,
        "Salary by Education Level",
        "Pay per required education level",
    )
    .select(&["el.name AS education_level", JOB_COUNT, AVG_MIN, AVG_MAX])
    .lookups(&["education_level"])
    .when(&["el.name IS NOT NULL", HAS_MAX])
    .group("el.name", "avg_max_salary DESC, education_level ASC"),
    AnalysisTemplate::new(
        "regional_salary_growth",
        Salary,
        "Salary Growth by Region",
        "Average pay in the last 90 days against the 90 before",
    )
    .select(&[
        "reg.name AS region",
        "ROUND(AVG(CASE WHEN jd.posting_date >= date('now', '-90 days') \
         THEN jd.max_salary END)) AS recent_avg_salary",
        "ROUND(AVG(CASE WHEN jd.posting_date >= date('now', '-180 days') \
         AND jd.posting_date < date('now', '-90 days') THEN jd.max_salary END)) AS previous_avg_salary",
        JOB_COUNT,
    ])
    .lookups(&["region"])
    .when(&["reg.name IS NOT NULL", HAS_MAX, LAST_180_DAYS])
    .group("reg.name", "recent_avg_salary - previous_avg_salary DESC, region ASC")
    .at_least(20)
    .top(15),
    // Companies
    AnalysisTemplate::new(
        "top_companies",
        Companies,
        "Top Hiring Companies",
        "Companies that are actively recruiting",
    )
    .select(&["c.name AS company", JOB_COUNT, AVG_MAX])
    .lookups(&["company"])
    .when(&["c.name IS NOT NULL"])
    .group("c.name", "job_count DESC, company ASC")
    .at_least(5)
    .top(20),
    AnalysisTemplate::new(
        "most_active_companies",
        Companies,
        "Top Companies Hiring",
        "Employers with the most postings and distinct titles",
    )
    .select(&[
        "c.name AS company",
        JOB_COUNT,
        "COUNT(DISTINCT jd.title_id) AS unique_titles",
    ])
    .lookups(&["company"])
    .when(&["c.name IS NOT NULL"])
    .group("c.name", "job_count DESC, company ASC")
    .top(20),
    AnalysisTemplate::new(
        "high_salary_employers",
        Companies,
        "Companies Hiring for High-Salary Roles",
        "Employers posting the most roles paying 25% above average",
    )
    .select(&["c.name AS company", "COUNT(DISTINCT jd.id) AS high_salary_jobs"])
    .lookups(&["company"])
    .when(&["c.name IS NOT NULL", HIGH_SALARY])
    .group("c.name", "high_salary_jobs DESC, company ASC")
    .top(20),
    AnalysisTemplate::new(
        "company_sizes",
        Companies,
        "Company Size Preferences",
        "Opportunities at small, medium and large companies",
    )
    .select(&[
        "COALESCE(cs.name, 'Not Specified') AS company_size",
        JOB_COUNT,
        AVG_MAX,
    ])
    .lookups(&["company_size"])
    .when(&[HAS_MAX])
    .group("company_size", "job_count DESC, company_size ASC"),
    AnalysisTemplate::new(
        "company_size_share",
        Companies,
        "Company Size Distribution",
        "Share of postings per company size",
    )
    .select(&["cs.name AS company_size", JOB_COUNT, SHARE])
    .lookups(&["company_size"])
    .when(&["cs.name IS NOT NULL"])
    .group("cs.name", "job_count DESC, company_size ASC"),
    AnalysisTemplate::new(
        "industries_hiring",
        Companies,
        "Industries Hiring Most",
        "Industries that are actively hiring",
    )
    .select(&[
        "COALESCE(ind.name, 'Various Industries') AS industry",
        JOB_COUNT,
        AVG_MAX,
    ])
    .lookups(&["industry"])
    .group("industry", "job_count DESC, industry ASC")
    .at_least(10)
    .top(15),
    AnalysisTemplate::new(
        "most_active_industries",
        Companies,
        "Industries Hiring Most Actively",
        "Industries by postings and distinct employers",
    )
    .select(&[
        "ind.name AS industry",
        JOB_COUNT,
        "COUNT(DISTINCT jd.company_name_id) AS company_count",
    ])
    .lookups(&["industry"])
    .when(&["ind.name IS NOT NULL"])
    .group("ind.name", "job_count DESC, industry ASC")
    .top(15),
    AnalysisTemplate::new(
        "departments",
        Companies,
        "Department Distribution",
        "Openings per department",
    )
    .select(&["d.name AS department", JOB_COUNT])
    .lookups(&["department"])
    .when(&["d.name IS NOT NULL"])
    .group("d.name", "job_count DESC, department ASC")
    .top(15),
    AnalysisTemplate::new(
        "company_growth",
        Companies,
        "Company Growth Indicators",
        "Employers posting more in the last 30 days than the 30 before",
    )
    .select(&[
        "c.name AS company",
        "COUNT(DISTINCT CASE WHEN jd.posting_date >= date('now', '-30 days') \
         THEN jd.id END) AS recent_jobs",
        "COUNT(DISTINCT CASE WHEN jd.posting_date >= date('now', '-60 days') \
         AND jd.posting_date < date('now', '-30 days') THEN jd.id END) AS previous_jobs",
    ])
    .lookups(&["company"])
    .when(&["c.name IS NOT NULL", "jd.posting_date >= date('now', '-60 days')"])
    .group("c.name", "recent_jobs - previous_jobs DESC, company ASC")
    .having(&["recent_jobs > previous_jobs", "recent_jobs >= 5"])
    .top(20),
    // Arrangements
    AnalysisTemplate::new(
        "work_flexibility",
        Arrangements,
        "Work Flexibility Options",
        "Remote, hybrid and office opportunities compared",
    )
    .select(&[
        "COALESCE(rw.name, 'Not Specified') AS work_arrangement",
        JOB_COUNT,
        AVG_MAX,
    ])
    .lookups(&["remote_work"])
    .group("work_arrangement", "job_count DESC, work_arrangement ASC"),
    AnalysisTemplate::new(
        "remote_share",
        Arrangements,
        "Remote Work Options",
        "Share of postings per remote work option",
    )
    .select(&["rw.name AS remote_option", JOB_COUNT, SHARE])
    .lookups(&["remote_work"])
    .group("rw.name", "job_count DESC, remote_option ASC"),
    AnalysisTemplate::new(
        "employment_types",
        Arrangements,
        "Employment Type Comparison",
        "Full-time, part-time and contract positions",
    )
    .select(&[
        "COALESCE(et.name, 'Not Specified') AS employment_type",
        JOB_COUNT,
        AVG_MAX,
    ])
    .lookups(&["employment_type"])
    .when(&[HAS_MAX])
    .group("employment_type", "job_count DESC, employment_type ASC"),
    AnalysisTemplate::new(
        "work_schedules",
        Arrangements,
        "Work Schedule Options",
        "Share of postings per work schedule",
    )
    .select(&["ws.name AS work_schedule", JOB_COUNT, SHARE])
    .lookups(&["work_schedule"])
    .when(&["ws.name IS NOT NULL"])
    .group("ws.name", "job_count DESC, work_schedule ASC"),
    AnalysisTemplate::new(
        "contract_types",
        Arrangements,
        "Contract Type Analysis",
        "Permanent, temporary and contract roles with pay",
    )
    .select(&["ct.name AS contract_type", JOB_COUNT, AVG_MAX])
    .lookups(&["contract_type"])
    .when(&["ct.name IS NOT NULL", HAS_MAX])
    .group("ct.name", "job_count DESC, contract_type ASC"),
    AnalysisTemplate::new(
        "remote_by_industry",
        Arrangements,
        "Remote Work by Industry",
        "Industries with the largest share of remote or hybrid roles",
    )
    .select(&[
        "ind.name AS industry",
        "COUNT(DISTINCT jd.id) AS total_jobs",
        "COUNT(DISTINCT CASE WHEN rw.name LIKE '%Remote%' OR rw.name LIKE '%Hybrid%' \
         THEN jd.id END) AS remote_jobs",
        "ROUND(COUNT(DISTINCT CASE WHEN rw.name LIKE '%Remote%' OR rw.name LIKE '%Hybrid%' \
         THEN jd.id END) * 100.0 / COUNT(DISTINCT jd.id), 2) AS remote_percentage",
    ])
    .lookups(&["industry", "remote_work"])
    .when(&["ind.name IS NOT NULL"])
    .group("ind.name", "remote_percentage DESC, industry ASC")
    .at_least(10)
    .top(15),
    // Requirements
    AnalysisTemplate::new(
        "experience_requirements",
        Requirements,
        "Experience Requirements",
        "Postings per band of required experience",
    )
    .select(&[
        "CASE WHEN jd.experience_years = 0 THEN 'Entry Level' \
         WHEN jd.experience_years BETWEEN 1 AND 2 THEN '1-2 years' \
         WHEN jd.experience_years BETWEEN 3 AND 5 THEN '3-5 years' \
         WHEN jd.experience_years BETWEEN 6 AND 10 THEN '6-10 years' \
         ELSE '10+ years' END AS experience_range",
        JOB_COUNT,
    ])
    .when(&["jd.experience_years IS NOT NULL"])
    .group(
        "experience_range",
        "CASE experience_range WHEN 'Entry Level' THEN 1 WHEN '1-2 years' THEN 2 \
         WHEN '3-5 years' THEN 3 WHEN '6-10 years' THEN 4 ELSE 5 END",
    ),
    AnalysisTemplate::new(
        "education_requirements",
        Requirements,
        "Education Requirements",
        "Share of postings per required education level",
    )
    .select(&["el.name AS education_level", JOB_COUNT, SHARE])
    .lookups(&["education_level"])
    .when(&["el.name IS NOT NULL"])
    .group("el.name", "job_count DESC, education_level ASC"),
    AnalysisTemplate::new(
        "top_certifications",
        Requirements,
        "Top Certifications in Demand",
        "Certifications requested most often",
    )
    .select(&["cert.name AS certification", JOB_COUNT, AVG_MAX])
    .each("certifications")
    .when(&[HAS_MAX])
    .group("cert.name", "job_count DESC, certification ASC")
    .top(15),
    AnalysisTemplate::new(
        "high_value_certifications",
        Requirements,
        "High-Value Certifications",
        "Certifications found on the best paid postings",
    )
    .select(&["cert.name AS certification", JOB_COUNT, AVG_MAX])
    .each("certifications")
    .when(&[HAS_MAX])
    .group("cert.name", "avg_max_salary DESC, certification ASC")
    .at_least(5)
    .top(15),
    AnalysisTemplate::new(
        "entry_level_salaries",
        Requirements,
        "Entry-Level Opportunities",
        "Best paid titles asking for two years or less",
    )
    .select(&["t.name AS job_title", JOB_COUNT, AVG_MAX])
    .lookups(&["title"])
    .when(&["t.name IS NOT NULL", "jd.experience_years <= 2", HAS_MAX])
    .group("t.name", "avg_max_salary DESC, job_title ASC")
    .at_least(5)
    .top(20),
    // Benefits
    AnalysisTemplate::new(
        "top_benefits",
        Benefits,
        "Top Benefits Offered",
        "Benefits offered most often",
    )
    .select(&["ben.description AS benefit", JOB_COUNT, SHARE])
    .each("benefits")
    .group("ben.description", "job_count DESC, benefit ASC")
    .top(15),
    AnalysisTemplate::new(
        "benefits_by_salary",
        Benefits,
        "Benefits by Salary Range",
        "Benefits found on the best paid postings",
    )
    .select(&["ben.description AS benefit", AVG_MAX, JOB_COUNT])
    .each("benefits")
    .when(&[HAS_MAX])
    .group("ben.description", "avg_max_salary DESC, benefit ASC")
    .at_least(10)
    .top(15),
    AnalysisTemplate::new(
        "benefit_packages",
        Benefits,
        "Benefits Package Completeness",
        "Employers offering the widest range of benefits",
    )
    .select(&["c.name AS company", "COUNT(DISTINCT ben.id) AS benefits_count", JOB_COUNT])
    .lookups(&["company"])
    .each("benefits")
    .when(&["c.name IS NOT NULL"])
    .group("c.name", "benefits_count DESC, company ASC")
    .at_least(5)
    .top(20),
    // Career
    AnalysisTemplate::new(
        "career_entry_points",
        Career,
        "Career Entry Points",
        "Titles open to people starting their career",
    )
    .select(&["t.name AS job_title", JOB_COUNT, AVG_MAX])
    .lookups(&["title"])
    .when(&[
        "jd.experience_years <= 1 OR jd.experience_years IS NULL",
        "t.name IS NOT NULL",
    ])
    .group("t.name", "job_count DESC, job_title ASC")
    .at_least(3)
    .top(20),
    AnalysisTemplate::new(
        "jobs_by_location",
        Career,
        "Job Opportunities by Location",
        "Cities with the most opportunities",
    )
    .select(&["ci.name AS city", JOB_COUNT, AVG_MAX])
    .lookups(&["city"])
    .when(&["ci.name IS NOT NULL"])
    .group("ci.name", "job_count DESC, city ASC")
    .at_least(10)
    .top(15),
    AnalysisTemplate::new(
        "career_roi",
        Career,
        "Best ROI Career Paths",
        "Job functions paying the most per year of experience",
    )
    .select(&[
        "jf.name AS job_function",
        "ROUND(AVG(jd.max_salary) / AVG(jd.experience_years)) AS salary_per_year_experience",
        JOB_COUNT,
        AVG_MAX,
    ])
    .lookups(&["job_function"])
    .when(&["jf.name IS NOT NULL", HAS_MAX, "jd.experience_years > 0"])
    .group("jf.name", "salary_per_year_experience DESC, job_function ASC")
    .at_least(10)
    .top(15),
    AnalysisTemplate::new(
        "undervalued_skills",
        Career,
        "Undervalued Skills",
        "Skills in wide demand that pay below the market average",
    )
    .select(&["hs.name AS skill", JOB_COUNT, AVG_MAX])
    .each("hard_skills")
    .when(&[HAS_MAX])
    .group("hs.name", "job_count DESC, skill ASC")
    .at_least(20)
    .having(&["avg_max_salary < (SELECT AVG(max_salary) FROM job_details \
               WHERE max_salary IS NOT NULL)"])
    .top(20),
    AnalysisTemplate::new(
        "growing_titles",
        Career,
        "Fastest Growing Job Titles",
        "Titles posted more in the last 90 days than the 90 before",
    )
    .select(&["t.name AS job_title", RECENT_90, PREVIOUS_90])
    .lookups(&["title"])
    .when(&["t.name IS NOT NULL", LAST_180_DAYS])
    .group("t.name", "recent_count - previous_count DESC, job_title ASC")
    .having(GROWING)
    .top(20),
    AnalysisTemplate::new(
        "skill_heavy_roles",
        Career,
        "Jobs with Most Skill Requirements",
        "Titles asking for the widest range of hard skills",
    )
    .select(&[
        "t.name AS job_title",
        "COUNT(DISTINCT hs.id) AS skill_count",
        AVG_MAX,
        JOB_COUNT,
    ])
    .lookups(&["title"])
    .each("hard_skills")
    .when(&["t.name IS NOT NULL", HAS_MAX])
    .group("t.name", "skill_count DESC, job_title ASC")
    .at_least(5)
    .top(20),
    AnalysisTemplate::new(
        "low_competition_roles",
        Career,
        "Low Competition High Salary Roles",
        "Less common titles paying 20% above the market",
    )
    .select(&["t.name AS job_title", JOB_COUNT, AVG_MAX])
    .lookups(&["title"])
    .when(&["t.name IS NOT NULL", HAS_MAX])
    .group("t.name", "avg_max_salary DESC, job_title ASC")
    .having(&["job_count BETWEEN 5 AND 30", ABOVE_MARKET])
    .top(20),
    AnalysisTemplate::new(
        "city_salary_remote",
        Career,
        "Geographic Salary Arbitrage",
        "Best paying cities with their remote role counts",
    )
    .select(&[
        "ci.name AS city",
        JOB_COUNT,
        AVG_MAX,
        "COUNT(DISTINCT CASE WHEN rw.name LIKE '%Remote%' THEN jd.id END) AS remote_jobs",
    ])
    .lookups(&["city", "remote_work"])
    .when(&["ci.name IS NOT NULL", HAS_MAX])
    .group("ci.name", "avg_max_salary DESC, city ASC")
    .at_least(20)
    .top(20),
];

/// Every predefined analysis, grouped by category.
pub fn templates() -> &'static [AnalysisTemplate] {
    TEMPLATES
}

/// Analyses listed under `category`.
pub fn in_category(category: Category) -> impl Iterator<Item = &'static AnalysisTemplate> {
    TEMPLATES.iter().filter(move |t| t.category == category)
}

/// Resolves an analysis by name.
pub fn template(name: &str) -> Result<&'static AnalysisTemplate, CompileError> {
    TEMPLATES
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| CompileError::UnknownAnalysis {
            name: name.to_owned(),
        })
}
