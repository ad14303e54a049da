mod support;

use std::sync::atomic::{AtomicUsize, Ordering};

use jobscope::{
    hydrate::Hydrator,
    query::{
        assembler::ConversionColumns, QueryAssembler, QueryExecutor, RowSet, SchemaCatalog,
        SqlQuery,
    },
    sqlite_adapter::SqliteExecutor,
    BoardConfig, Criteria, EntityView, HydrationStrategy, JobBoard, PageRequest, Result, SortKey,
    StaticProvider,
};
use support::scenario;

struct Counting<'a> {
    inner: &'a SqliteExecutor,
    statements: AtomicUsize,
}

impl QueryExecutor for Counting<'_> {
    fn execute(&self, query: &SqlQuery) -> Result<RowSet> {
        self.statements.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(query)
    }
}

async fn hydrate_all(strategy: HydrationStrategy) -> (Vec<EntityView>, usize) {
    let fixture = scenario(true);
    let sqlite = SqliteExecutor::open_read_only(fixture.path()).expect("open");
    let counting = Counting {
        inner: &sqlite,
        statements: AtomicUsize::new(0),
    };
    let assembler = QueryAssembler::new(SchemaCatalog::standard())
        .with_conversion(Some(ConversionColumns::default()));
    let rows = sqlite
        .execute(&assembler.all(&Criteria::default(), SortKey::default()).unwrap())
        .unwrap();
    let views = Hydrator::new(&counting, &assembler, strategy)
        .with_converted_currency(Some("MDL"))
        .hydrate_page(rows)
        .await
        .unwrap();
    (views, counting.statements.load(Ordering::SeqCst))
}

#[tokio::test]
async fn strategies_produce_identical_views() {
    let (per_entity, per_entity_queries) = hydrate_all(HydrationStrategy::PerEntity).await;
    let (batched, batched_queries) = hydrate_all(HydrationStrategy::Batched).await;
    assert_eq!(per_entity, batched);

    let attributes = SchemaCatalog::standard().hydrated_attributes().len();
    assert_eq!(per_entity_queries, attributes * per_entity.len());
    assert_eq!(batched_queries, attributes);
}

#[tokio::test]
async fn labels_follow_storage_order() {
    let (views, _) = hydrate_all(HydrationStrategy::Batched).await;
    let by_id = |id: i64| views.iter().find(|v| v.id == id).expect("entity");
    assert_eq!(by_id(3).requirements.hard_skills, vec!["SQL", "Python"]);
    assert_eq!(by_id(2).requirements.hard_skills, vec!["Python", "SQL"]);
    assert_eq!(by_id(1).requirements.languages, vec!["Romanian", "English"]);
    assert_eq!(by_id(1).benefits, vec!["Health insurance"]);
    assert_eq!(by_id(3).requirements.soft_skills, vec!["Teamwork"]);
    assert!(by_id(5).requirements.hard_skills.is_empty());
}

#[tokio::test]
async fn salaries_are_never_mislabeled() {
    let fixture = scenario(true);
    let board = JobBoard::new(StaticProvider::new(fixture.bytes()), BoardConfig::remote());
    let page = board
        .get_page(&PageRequest::default().page_size(10))
        .await
        .unwrap();
    let salary = |id: i64| {
        page.entities
            .iter()
            .find(|v| v.id == id)
            .expect("entity")
            .salary
            .display()
    };
    assert_eq!(salary(1), "19,500 - 39,000 MDL (1,000 - 2,000 EUR)");
    assert_eq!(salary(2), "1,500 - 2,500 USD");
    assert_eq!(salary(3), "800 MDL");
    assert_eq!(salary(4), "Not specified");
    assert_eq!(salary(5), "300 - 500");
    assert_eq!(salary(6), "3,000 - 4,000 EUR");
}

#[tokio::test]
async fn datasets_without_conversion_show_published_amounts() {
    let fixture = scenario(false);
    let board = JobBoard::new(StaticProvider::new(fixture.bytes()), BoardConfig::default());
    let view = board.get_entity_by_id(1).await.unwrap().expect("job 1");
    assert!(view.salary.converted.is_none());
    assert_eq!(view.salary.display(), "1,000 - 2,000 EUR");
    assert_eq!(view.salary.period.as_deref(), Some("Monthly"));
    assert_eq!(view.employment.kind.as_deref(), Some("Full-time"));
    assert_eq!(view.source.url.as_deref(), Some("https://jobs.md/1"));
    assert_eq!(view.raw.original_company.as_deref(), Some("Acme SRL"));
}

#[tokio::test]
async fn entity_cache_serves_repeat_lookups() {
    let fixture = scenario(false);
    for capacity in [0, 4] {
        let config = BoardConfig {
            entity_cache_capacity: capacity,
            ..BoardConfig::default()
        };
        let board = JobBoard::new(StaticProvider::new(fixture.bytes()), config);
        let first = board.get_entity_by_id(2).await.unwrap();
        let second = board.get_entity_by_id(2).await.unwrap();
        assert_eq!(first, second);
        assert!(first.is_some());
    }
}

#[tokio::test]
async fn views_serialize_with_nested_sections() {
    let fixture = scenario(false);
    let board = JobBoard::new(StaticProvider::new(fixture.bytes()), BoardConfig::default());
    let view = board.get_entity_by_id(2).await.unwrap().expect("job 2");
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["location"]["city"], "Chisinau");
    assert_eq!(json["requirements"]["hard_skills"][1], "SQL");
    assert_eq!(json["employment"]["type"], serde_json::Value::Null);
    assert_eq!(json["salary"]["currency"], "USD");
}
