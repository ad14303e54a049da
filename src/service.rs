//! The board: paging, faceting, lookups and analyses over one dataset.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::BoardConfig;
use crate::dataset::{Dataset, DatasetInfo, DatasetLoader, DatasetProvider};
use crate::error::{JobscopeError, Result};
use crate::hydrate::{EntityView, Hydrator};
use crate::query::{
    analysis,
    assembler::{COUNT_COLUMN, FACET_COUNT, FACET_LABEL},
    Category, Criteria, FilterState, Pagination, QueryAssembler, QueryExecutor, RowSet, SchemaCatalog,
    SortKey, SqlQuery, Value,
};
use crate::stats::{self, ColumnStats};

/// One page request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u64,
    /// Requested page size; the configured default when unset.
    pub page_size: Option<u64>,
    /// Filters, search and policy.
    #[serde(default)]
    pub criteria: Criteria,
    /// Ordering.
    #[serde(default)]
    pub sort: SortKey,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: None,
            criteria: Criteria::default(),
            sort: SortKey::default(),
        }
    }
}

impl PageRequest {
    /// First page of `criteria` in default order.
    pub fn new(criteria: Criteria) -> Self {
        Self {
            criteria,
            ..Self::default()
        }
    }

    /// Selects a page.
    pub fn page(mut self, page: u64) -> Self {
        self.page = page;
        self
    }

    /// Selects a page size.
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Selects an ordering.
    pub fn sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }
}

/// One page of hydrated entities.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PageResult {
    /// Entities in sort order.
    pub entities: Vec<EntityView>,
    /// Entities matching the criteria across all pages.
    pub total_count: u64,
    /// `ceil(total_count / page_size)`.
    pub total_pages: u64,
    /// Page served.
    pub page: u64,
    /// Page size applied after clamping.
    pub page_size: u64,
}

/// Candidate value of a field with its match count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    /// Label.
    pub label: String,
    /// Entities that would match if the label were selected.
    pub count: u64,
}

/// Unfiltered facet lists for every canonical field.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Overview {
    /// Entities in the dataset.
    pub total_entities: u64,
    /// Facets keyed by field.
    pub facets: BTreeMap<String, Vec<Facet>>,
}

/// Rows of an analytical query plus statistics over its numeric columns.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Template title, or `None` for ad hoc SQL.
    pub title: Option<String>,
    /// Template category, or `None` for ad hoc SQL.
    pub category: Option<Category>,
    /// Result rows.
    pub rows: RowSet,
    /// One entry per column holding numeric cells.
    pub statistics: Vec<ColumnStats>,
}

/// Query service over a lazily loaded, read-only dataset.
pub struct JobBoard<P> {
    loader: DatasetLoader<P>,
    config: BoardConfig,
    cache: Option<Mutex<LruCache<i64, EntityView>>>,
}

impl<P: DatasetProvider> JobBoard<P> {
    /// Board over `provider`. Nothing is fetched until the first call.
    pub fn new(provider: P, config: BoardConfig) -> Self {
        let cache = NonZeroUsize::new(config.entity_cache_capacity)
            .map(|capacity| Mutex::new(LruCache::new(capacity)));
        Self {
            loader: DatasetLoader::new(provider, config.salary_conversion.clone()),
            config,
            cache,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Underlying single-flight loader.
    pub fn loader(&self) -> &DatasetLoader<P> {
        &self.loader
    }

    /// Loads the dataset if needed and reports what was opened.
    pub async fn dataset_info(&self) -> Result<DatasetInfo> {
        Ok(self.loader.get().await?.info().clone())
    }

    /// One page of entities with totals.
    ///
    /// Pages past the end are empty but still report the totals.
    pub async fn get_page(&self, request: &PageRequest) -> Result<PageResult> {
        let pagination = Pagination::new(request.page, self.config.page_size(request.page_size))?;
        let dataset = self.loader.get().await?;
        let assembler = assembler_for(&dataset);
        let executor = dataset.executor();

        let total_count = count_of(executor, &assembler.count(&request.criteria)?)?;
        let total_pages = pagination.total_pages(total_count);
        let entities = if pagination.offset() >= total_count {
            Vec::new()
        } else {
            let rows = executor.execute(&assembler.page(&request.criteria, request.sort, pagination)?)?;
            let views = self.hydrator(&dataset, &assembler).hydrate_page(rows).await?;
            self.remember(&views);
            views
        };
        debug!(
            page = pagination.page(),
            page_size = pagination.page_size(),
            total_count,
            returned = entities.len(),
            "page served"
        );
        Ok(PageResult {
            entities,
            total_count,
            total_pages,
            page: pagination.page(),
            page_size: pagination.page_size(),
        })
    }

    /// Facets of `field` under browsing criteria built from `filters`.
    pub async fn get_facets(&self, field: &str, filters: &FilterState) -> Result<Vec<Facet>> {
        self.get_facets_with(field, &Criteria::browse(filters.clone()))
            .await
    }

    /// Facets of `field` with its own dimension relaxed and every other
    /// predicate, search and policy kept.
    pub async fn get_facets_with(&self, field: &str, criteria: &Criteria) -> Result<Vec<Facet>> {
        let dataset = self.loader.get().await?;
        let assembler = assembler_for(&dataset);
        facets_of(dataset.executor(), &assembler.facet(field, criteria)?)
    }

    /// Fully hydrated entity, or `None` when no entity has `id`.
    pub async fn get_entity_by_id(&self, id: i64) -> Result<Option<EntityView>> {
        if let Some(cache) = &self.cache {
            if let Some(view) = cache.lock().get(&id) {
                return Ok(Some(view.clone()));
            }
        }
        let dataset = self.loader.get().await?;
        let assembler = assembler_for(&dataset);
        let Some(row) = dataset
            .executor()
            .execute(&assembler.by_id(id)?)?
            .into_records()
            .into_iter()
            .next()
        else {
            return Ok(None);
        };
        let view = self.hydrator(&dataset, &assembler).hydrate(&row).await?;
        if let Some(view) = &view {
            self.remember(std::slice::from_ref(view));
        }
        Ok(view)
    }

    /// Entity total and unfiltered facets of every canonical field.
    pub async fn facet_overview(&self) -> Result<Overview> {
        let dataset = self.loader.get().await?;
        let assembler = assembler_for(&dataset);
        let executor = dataset.executor();
        let criteria = Criteria::default();
        let total_entities = count_of(executor, &assembler.count(&criteria)?)?;
        let mut facets = BTreeMap::new();
        for spec in assembler.catalog().dimensions() {
            facets.insert(
                spec.key.to_owned(),
                facets_of(executor, &assembler.facet(spec.key, &criteria)?)?,
            );
        }
        info!(total_entities, fields = facets.len(), "facet overview built");
        Ok(Overview {
            total_entities,
            facets,
        })
    }

    /// Runs the predefined analysis `name` under `criteria`.
    pub async fn run_analysis(&self, name: &str, criteria: &Criteria) -> Result<AnalysisReport> {
        let template = analysis::template(name)?;
        let dataset = self.loader.get().await?;
        let query = assembler_for(&dataset).analysis(template, criteria)?;
        let rows = dataset.executor().execute(&query)?;
        Ok(AnalysisReport {
            title: Some(template.title.to_owned()),
            category: Some(template.category),
            statistics: stats::describe_numeric(&rows),
            rows,
        })
    }

    /// Runs one ad hoc statement against the read-only dataset.
    pub async fn run_sql(&self, sql: &str) -> Result<AnalysisReport> {
        let sql = sql.trim().trim_end_matches(';');
        if sql.trim().is_empty() {
            return Err(JobscopeError::InvalidArgument("empty SQL statement".into()));
        }
        let dataset = self.loader.get().await?;
        let rows = dataset.executor().execute(&SqlQuery::new(sql, Vec::new()))?;
        Ok(AnalysisReport {
            title: None,
            category: None,
            statistics: stats::describe_numeric(&rows),
            rows,
        })
    }

    fn hydrator<'a>(
        &self,
        dataset: &'a Dataset,
        assembler: &'a QueryAssembler<'a>,
    ) -> Hydrator<'a, crate::sqlite_adapter::SqliteExecutor> {
        Hydrator::new(dataset.executor(), assembler, self.config.hydration)
            .with_converted_currency(dataset.conversion().map(|c| c.currency.as_str()))
    }

    fn remember(&self, views: &[EntityView]) {
        if let Some(cache) = &self.cache {
            let mut cache = cache.lock();
            for view in views {
                cache.put(view.id, view.clone());
            }
        }
    }
}

fn assembler_for(dataset: &Arc<Dataset>) -> QueryAssembler<'static> {
    QueryAssembler::new(SchemaCatalog::standard()).with_conversion(dataset.conversion().cloned())
}

fn count_of(executor: &impl QueryExecutor, query: &SqlQuery) -> Result<u64> {
    let rows = executor.execute(query)?;
    let cell = rows.get(0, COUNT_COLUMN);
    cell.and_then(Value::as_i64)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| JobscopeError::UnexpectedResult {
            sql: query.sql.clone(),
            detail: match cell {
                Some(value) => format!("{COUNT_COLUMN} is {value:?}, not a count"),
                None => format!("no {COUNT_COLUMN} cell"),
            },
        })
}

fn facets_of(executor: &impl QueryExecutor, query: &SqlQuery) -> Result<Vec<Facet>> {
    Ok(executor
        .execute(query)?
        .into_records()
        .into_iter()
        .filter_map(|mut row| {
            let label = match row.remove(FACET_LABEL)? {
                Value::Null => return None,
                Value::Text(s) => s,
                other => other.to_string(),
            };
            let count = row
                .get(FACET_COUNT)
                .and_then(Value::as_i64)
                .and_then(|n| u64::try_from(n).ok())?;
            Some(Facet { label, count })
        })
        .collect())
}
