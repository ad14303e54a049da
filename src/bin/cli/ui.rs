use std::io::IsTerminal;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use jobscope::query::AnalysisTemplate;
use jobscope::{EntityView, Facet, PageResult};
use nu_ansi_term::{Color, Style};

const BAR_WIDTH: usize = 24;

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ColorMode {
    /// Color when stdout is a terminal and `NO_COLOR` is unset.
    Auto,
    Always,
    Never,
}

/// Text renderer for every command's human-readable output.
pub struct Ui {
    color: bool,
    quiet: bool,
}

impl Ui {
    pub fn new(mode: ColorMode, quiet: bool) -> Self {
        let color = match mode {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
            }
        };
        Self { color, quiet }
    }

    /// Page summary and one line per job.
    pub fn results(&self, result: &PageResult) {
        self.heading(&format!(
            "{} matching jobs · page {} of {} · {} per page",
            group_digits(result.total_count),
            result.page,
            result.total_pages.max(1),
            result.page_size
        ));
        if result.entities.is_empty() {
            self.note("no jobs on this page");
            return;
        }
        for view in &result.entities {
            let mut parts: Vec<String> = [&view.title, &view.company, &view.location.city]
                .into_iter()
                .flatten()
                .cloned()
                .collect();
            let salary = view.salary.display();
            if !salary.is_empty() {
                parts.push(self.paint(Color::Green.normal(), salary));
            }
            println!(
                "  {} {}",
                self.paint(Style::new().dimmed(), format!("#{:<6}", view.id)),
                parts.join(" · ")
            );
        }
    }

    /// Full job card followed by its attribute lists.
    pub fn job(&self, view: &EntityView) {
        let experience = view
            .requirements
            .experience_years
            .map(|years| format!("{years} years"));
        let fields: [(&str, Option<String>); 19] = [
            ("title", view.title.clone()),
            ("company", view.company.clone()),
            ("company size", view.company_size.clone()),
            ("function", view.job_function.clone()),
            ("specialization", view.specialization.clone()),
            ("seniority", view.seniority_level.clone()),
            ("industry", view.industry.clone()),
            ("city", view.location.city.clone()),
            ("country", view.location.country.clone()),
            ("remote", view.location.remote_work.clone()),
            ("salary", Some(view.salary.display())),
            ("period", view.salary.period.clone()),
            ("employment", view.employment.kind.clone()),
            ("contract", view.employment.contract.clone()),
            ("schedule", view.employment.schedule.clone()),
            ("education", view.requirements.education.clone()),
            ("experience", experience),
            ("posted", view.posting_date.clone()),
            ("source", view.source.url.clone()),
        ];
        let fields: Vec<(&str, String)> = fields
            .into_iter()
            .filter_map(|(key, value)| value.filter(|v| !v.is_empty()).map(|v| (key, v)))
            .collect();
        let width = fields.iter().map(|(key, _)| key.len()).max().unwrap_or(0);

        self.heading(&format!("Job #{}", view.id));
        for (key, value) in &fields {
            println!("  {} {value}", self.paint(Style::new().bold(), format!("{key:>width$}:")));
        }
        for (label, values) in [
            ("Languages", &view.requirements.languages),
            ("Hard skills", &view.requirements.hard_skills),
            ("Soft skills", &view.requirements.soft_skills),
            ("Certifications", &view.requirements.certifications),
            ("Benefits", &view.benefits),
            ("Responsibilities", &view.parsed_view.responsibilities),
            ("Work environment", &view.parsed_view.work_environment),
            ("Professional development", &view.parsed_view.professional_development),
        ] {
            if values.is_empty() {
                continue;
            }
            self.gap();
            self.heading(label);
            for value in values {
                println!("  - {value}");
            }
        }
    }

    /// Labels of one field with counts and a bar scaled to the largest count.
    pub fn facets(&self, field: &str, facets: &[Facet], limit: usize) {
        self.heading(field);
        if facets.is_empty() {
            self.note("no labels");
            return;
        }
        let shown = &facets[..facets.len().min(limit)];
        let label_width = shown.iter().map(|f| f.label.chars().count()).max().unwrap_or(0);
        let count_width = shown.iter().map(|f| group_digits(f.count).len()).max().unwrap_or(0);
        let top = shown.iter().map(|f| f.count).max().unwrap_or(0).max(1);
        for facet in shown {
            let cells = usize::try_from(facet.count.saturating_mul(BAR_WIDTH as u64).div_ceil(top))
                .unwrap_or(BAR_WIDTH);
            println!(
                "  {:<label_width$}  {:>count_width$}  {}",
                facet.label,
                group_digits(facet.count),
                self.paint(Color::Blue.normal(), "█".repeat(cells))
            );
        }
        if facets.len() > shown.len() {
            self.note(&format!("{} more", facets.len() - shown.len()));
        }
    }

    /// Analyses grouped under their category headings.
    pub fn analyses(&self, templates: &[&AnalysisTemplate]) {
        let width = templates.iter().map(|t| t.name.len()).max().unwrap_or(0);
        let mut current = None;
        for template in templates {
            if current != Some(template.category) {
                if current.is_some() {
                    self.gap();
                }
                current = Some(template.category);
                self.heading(template.category.as_str());
            }
            println!(
                "  {}  {}. {}",
                self.paint(Style::new().bold(), format!("{:<width$}", template.name)),
                template.title,
                self.paint(Style::new().dimmed(), template.description)
            );
        }
    }

    /// Columns sized to their widest cell; numeric columns align right.
    pub fn table(&self, title: &str, columns: &[String], rows: &[Vec<String>]) {
        self.heading(title);
        let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
        for row in rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        let numeric: Vec<bool> = (0..columns.len())
            .map(|idx| {
                rows.iter().any(|row| row.get(idx).is_some_and(|c| !c.is_empty()))
                    && rows.iter().all(|row| {
                        row.get(idx)
                            .map_or(true, |c| c.is_empty() || c.parse::<f64>().is_ok())
                    })
            })
            .collect();
        let render = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(widths.iter().zip(&numeric))
                .map(|(cell, (&width, &right))| {
                    if right {
                        format!("{cell:>width$}")
                    } else {
                        format!("{cell:<width$}")
                    }
                })
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_owned()
        };
        println!("  {}", self.paint(Style::new().bold().underline(), render(columns)));
        for row in rows {
            println!("  {}", render(row));
        }
    }

    pub fn note(&self, message: &str) {
        println!("  {}", self.paint(Style::new().italic().dimmed(), message));
    }

    /// Blank line between blocks, skipped under `--quiet`.
    pub fn gap(&self) {
        if !self.quiet {
            println!();
        }
    }

    /// Spinner on stderr until [`Loading::done`] or drop.
    pub fn loading(&self, label: String) -> Loading {
        let bar = (!self.quiet && std::io::stderr().is_terminal()).then(|| {
            let style = ProgressStyle::with_template("{spinner} {msg} {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            let bar = ProgressBar::new_spinner().with_style(style).with_message(label);
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });
        Loading {
            bar,
            start: Instant::now(),
        }
    }

    fn heading(&self, title: &str) {
        println!("{}", self.paint(Color::Cyan.bold(), title));
    }

    fn paint(&self, style: Style, text: impl Into<String>) -> String {
        let text = text.into();
        if self.color {
            style.paint(text).to_string()
        } else {
            text
        }
    }
}

pub struct Loading {
    bar: Option<ProgressBar>,
    start: Instant,
}

impl Loading {
    pub fn done(mut self) -> Duration {
        self.clear();
        self.start.elapsed()
    }

    fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for Loading {
    fn drop(&mut self) {
        self.clear();
    }
}

/// `1234567` as `1,234,567`.
fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
