//! Command-line harness for querying a job postings dataset.
#![forbid(unsafe_code)]

#[path = "cli/config.rs"]
mod config;
#[path = "cli/ui.rs"]
mod ui;

use std::error::Error;
use std::io;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use jobscope::{
    query::{analysis, profile, AnalysisTemplate, Category, CompileError, Value},
    AnalysisReport, BoardConfig, CombinePolicy, Criteria, CriteriaBuilder, EntityView,
    FileProvider, HydrationStrategy, JobBoard, JobscopeError, PageRequest, SortKey,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use config::CliConfig;
use ui::{ColorMode, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "jobscope",
    version,
    about = "Faceted queries over a job postings dataset",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "JOBSCOPE_DATASET",
        value_name = "FILE",
        help = "SQLite dataset file (defaults to [dataset] default in cli.toml)"
    )]
    dataset: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "JOBSCOPE_CONFIG",
        value_name = "FILE",
        help = "CLI config file"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        help = "Board preset, replacing any [board] table in cli.toml"
    )]
    preset: Option<PresetArg>,

    #[arg(long, global = true, value_enum, help = "Attribute hydration strategy")]
    hydration: Option<HydrationArg>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format"
    )]
    format: OutputFormat,

    #[arg(long, global = true, value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,

    #[arg(long, global = true, help = "Suppress the spinner and blank separator lines")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Default)]
struct CriteriaArgs {
    #[arg(
        long = "filter",
        value_name = "FIELD=VALUE",
        action = ArgAction::Append,
        help = "Select a label for a field (repeatable)"
    )]
    filters: Vec<String>,

    #[arg(
        long = "range",
        value_name = "FIELD=MIN..MAX",
        action = ArgAction::Append,
        help = "Numeric bounds; either side may be empty (repeatable)"
    )]
    ranges: Vec<String>,

    #[arg(long, help = "Free-text search over titles and companies")]
    search: Option<String>,

    #[arg(long, help = "Combine different fields with OR instead of AND")]
    any: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Print one page of matching jobs")]
    Page {
        #[command(flatten)]
        criteria: CriteriaArgs,

        #[arg(long, default_value_t = 1, help = "1-based page number")]
        page: u64,

        #[arg(long, help = "Jobs per page")]
        page_size: Option<u64>,

        #[arg(long, default_value = "date_desc", help = "Sort key")]
        sort: String,
    },

    #[command(about = "Count candidate labels of one field")]
    Facets {
        #[arg(value_name = "FIELD")]
        field: String,

        #[command(flatten)]
        criteria: CriteriaArgs,
    },

    #[command(about = "Show one job")]
    Job {
        #[arg(value_name = "ID")]
        id: i64,
    },

    #[command(about = "Unfiltered facets of every field")]
    Overview {
        #[arg(long, default_value_t = 10, help = "Labels shown per field in text output")]
        top: usize,
    },

    #[command(about = "List predefined analyses")]
    Analyses {
        #[arg(long, help = "Only list analyses of this category")]
        category: Option<String>,
    },

    #[command(about = "Run a predefined analysis")]
    Analyze {
        #[arg(value_name = "NAME")]
        name: String,

        #[command(flatten)]
        criteria: CriteriaArgs,
    },

    #[command(about = "Run a read-only SQL statement")]
    Sql {
        #[arg(value_name = "SQL")]
        statement: String,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum PresetArg {
    /// Per-job attribute queries against a local file.
    Interactive,
    /// Batched attribute queries and a larger entity cache.
    Remote,
}

impl From<PresetArg> for BoardConfig {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Interactive => BoardConfig::interactive(),
            PresetArg::Remote => BoardConfig::remote(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum HydrationArg {
    PerEntity,
    Batched,
}

impl From<HydrationArg> for HydrationStrategy {
    fn from(arg: HydrationArg) -> Self {
        match arg {
            HydrationArg::PerEntity => HydrationStrategy::PerEntity,
            HydrationArg::Batched => HydrationStrategy::Batched,
        }
    }
}

struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new<I: IntoIterator<Item = &'static str>>(columns: I) -> Self {
        Self {
            columns: columns.into_iter().map(str::to_owned).collect(),
            rows: Vec::new(),
        }
    }
}

#[tokio::main]
async fn main() {
    install_tracing_subscriber();
    if let Err(err) = run().await {
        if let Some(err) = err.downcast_ref::<JobscopeError>() {
            eprintln!("error[{}]: {err}", err.code());
        } else if let Some(err) = err.downcast_ref::<CompileError>() {
            eprintln!("error[{}]: {err}", err.code());
        } else {
            eprintln!("error: {err}");
        }
        std::process::exit(1);
    }
}

fn install_tracing_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let ui = Ui::new(cli.color, cli.quiet || cli.format != OutputFormat::Text);

    if let Command::Analyses { category } = &cli.command {
        return print_analyses(cli.format, &ui, category.as_deref());
    }

    let cli_config = CliConfig::load(cli.config.clone())?;
    let mut board_config: BoardConfig = match cli.preset {
        Some(preset) => preset.into(),
        None => cli_config.board().cloned().unwrap_or_default(),
    };
    if let Some(hydration) = cli.hydration {
        board_config.hydration = hydration.into();
    }
    let dataset = cli
        .dataset
        .clone()
        .or_else(|| cli_config.default_dataset().cloned())
        .ok_or("no dataset given; pass --dataset or set [dataset] default in cli.toml")?;
    tracing::debug!(
        config = ?cli_config.path(),
        dataset = %dataset.display(),
        hydration = ?board_config.hydration,
        "starting"
    );

    let board = JobBoard::new(FileProvider::new(&dataset), board_config);
    let loading = ui.loading(format!("Loading {}", dataset.display()));
    let info = board.dataset_info().await?;
    let elapsed = loading.done();
    tracing::info!(
        size_bytes = info.size_bytes,
        elapsed_ms = elapsed.as_millis() as u64,
        "dataset loaded"
    );

    match cli.command {
        Command::Page {
            criteria,
            page,
            page_size,
            sort,
        } => {
            let mut request = PageRequest::new(build_criteria(&criteria)?)
                .page(page)
                .sort(SortKey::parse(&sort));
            request.page_size = page_size;
            let result = board.get_page(&request).await?;
            let mut table = Table::new([
                "id", "title", "company", "city", "seniority", "salary", "posted",
            ]);
            table.rows = result.entities.iter().map(job_row).collect();
            emit(cli.format, &result, Some(&table), || ui.results(&result))?;
        }
        Command::Facets { field, criteria } => {
            let facets = board.get_facets_with(&field, &build_criteria(&criteria)?).await?;
            let mut table = Table::new(["label", "count"]);
            table.rows = facets
                .iter()
                .map(|f| vec![f.label.clone(), f.count.to_string()])
                .collect();
            emit(cli.format, &facets, Some(&table), || {
                ui.facets(&field, &facets, usize::MAX)
            })?;
        }
        Command::Job { id } => {
            let view = board
                .get_entity_by_id(id)
                .await?
                .ok_or_else(|| format!("job {id} not found"))?;
            emit(cli.format, &view, None, || ui.job(&view))?;
        }
        Command::Overview { top } => {
            let overview = board.facet_overview().await?;
            let mut table = Table::new(["field", "label", "count"]);
            for (field, facets) in &overview.facets {
                for facet in facets {
                    table
                        .rows
                        .push(vec![field.clone(), facet.label.clone(), facet.count.to_string()]);
                }
            }
            emit(cli.format, &overview, Some(&table), || {
                ui.note(&format!("{} jobs in the dataset", overview.total_entities));
                for (field, facets) in &overview.facets {
                    ui.gap();
                    ui.facets(field, facets, top);
                }
            })?;
        }
        Command::Analyze { name, criteria } => {
            let report = board.run_analysis(&name, &build_criteria(&criteria)?).await?;
            print_report(cli.format, &ui, &report)?;
        }
        Command::Sql { statement } => {
            let report = board.run_sql(&statement).await?;
            print_report(cli.format, &ui, &report)?;
        }
        Command::Analyses { .. } => {}
    }

    if let Some(profile) = profile::profile_snapshot(false) {
        tracing::info!(
            compile_ms = profile.compile_ns / 1_000_000,
            execute_ms = profile.execute_ns / 1_000_000,
            hydrate_ms = profile.hydrate_ns / 1_000_000,
            statements = profile.execute_count,
            "query profile"
        );
    }

    Ok(())
}

fn build_criteria(args: &CriteriaArgs) -> Result<Criteria, Box<dyn Error>> {
    let mut builder = CriteriaBuilder::default();
    for raw in &args.filters {
        let (field, value) = raw
            .split_once('=')
            .ok_or_else(|| format!("invalid filter '{raw}', expected FIELD=VALUE"))?;
        builder = builder.value(field.trim(), value.trim());
    }
    for raw in &args.ranges {
        let (field, min, max) = parse_range(raw)?;
        builder = builder.range(&field, min, max);
    }
    if let Some(search) = &args.search {
        builder = builder.search(search.clone());
    }
    if args.any {
        builder = builder.policy(CombinePolicy::Or);
    }
    Ok(builder.build()?)
}

fn parse_range(raw: &str) -> Result<(String, Option<f64>, Option<f64>), String> {
    let (field, bounds) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid range '{raw}', expected FIELD=MIN..MAX"))?;
    let (min, max) = bounds
        .split_once("..")
        .ok_or_else(|| format!("invalid range '{raw}', expected FIELD=MIN..MAX"))?;
    let bound = |text: &str| -> Result<Option<f64>, String> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        text.parse::<f64>()
            .map(Some)
            .map_err(|_| format!("invalid bound '{text}' in range '{raw}'"))
    };
    Ok((field.trim().to_string(), bound(min)?, bound(max)?))
}

fn emit<T, F>(
    format: OutputFormat,
    value: &T,
    table: Option<&Table>,
    printer: F,
) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Csv => {
            let table = table.ok_or("csv output is only available for row-shaped results")?;
            write_csv(table)?;
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn write_csv(table: &Table) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::WriterBuilder::new().from_writer(io::stdout());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn job_row(view: &EntityView) -> Vec<String> {
    vec![
        view.id.to_string(),
        opt(&view.title),
        opt(&view.company),
        opt(&view.location.city),
        opt(&view.seniority_level),
        view.salary.display(),
        opt(&view.posting_date),
    ]
}

fn print_analyses(
    format: OutputFormat,
    ui: &Ui,
    category: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let templates: Vec<&AnalysisTemplate> = match category {
        Some(name) => analysis::in_category(name.parse::<Category>()?).collect(),
        None => analysis::templates().iter().collect(),
    };
    let mut table = Table::new(["category", "name", "title", "description"]);
    table.rows = templates
        .iter()
        .map(|t| {
            vec![
                t.category.to_string(),
                t.name.to_string(),
                t.title.to_string(),
                t.description.to_string(),
            ]
        })
        .collect();
    emit(format, &templates, Some(&table), || ui.analyses(&templates))
}

fn print_report(format: OutputFormat, ui: &Ui, report: &AnalysisReport) -> Result<(), Box<dyn Error>> {
    let table = Table {
        columns: report.rows.columns.clone(),
        rows: report
            .rows
            .rows
            .iter()
            .map(|row| row.iter().map(cell).collect())
            .collect(),
    };
    let json = serde_json::json!({
        "title": report.title,
        "category": report.category,
        "columns": report.rows.columns,
        "rows": report
            .rows
            .records()
            .iter()
            .map(|row| row.iter().map(|(k, v)| (k.clone(), v.to_json())).collect::<serde_json::Map<_, _>>())
            .collect::<Vec<_>>(),
        "statistics": report.statistics,
    });
    emit(format, &json, Some(&table), || {
        let title = report.title.as_deref().unwrap_or("Query");
        ui.table(&format!("{title} ({} rows)", table.rows.len()), &table.columns, &table.rows);
        if report.statistics.is_empty() {
            return;
        }
        ui.gap();
        let mut stats = Table::new([
            "column", "count", "min", "max", "mean", "median", "mode", "std_dev", "p25", "p75",
            "p90", "p95", "p99",
        ]);
        stats.rows = report
            .statistics
            .iter()
            .map(|s| {
                let mut row = vec![s.column.clone(), s.count.to_string()];
                row.extend(
                    [
                        s.min, s.max, s.mean, s.median, s.mode, s.std_dev, s.p25, s.p75, s.p90,
                        s.p95, s.p99,
                    ]
                    .iter()
                    .map(|v| format!("{v:.2}")),
                );
                row
            })
            .collect();
        ui.table("Statistics", &stats.columns, &stats.rows);
    })
}
