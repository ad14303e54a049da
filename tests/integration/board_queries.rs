mod support;

use jobscope::{
    query::{Category, CompileError},
    BoardConfig, CombinePolicy, Criteria, CriteriaBuilder, Facet, FilterState, JobBoard,
    JobscopeError, PageRequest, SortKey, StaticProvider,
};
use support::{requirements_dataset, scenario, Fixture};

fn board(fixture: &Fixture) -> JobBoard<StaticProvider> {
    JobBoard::new(StaticProvider::new(fixture.bytes()), BoardConfig::default())
}

fn ids(result: &jobscope::PageResult) -> Vec<i64> {
    result.entities.iter().map(|e| e.id).collect()
}

async fn all_ids(board: &JobBoard<StaticProvider>, criteria: Criteria) -> Vec<i64> {
    let result = board
        .get_page(&PageRequest::new(criteria).page_size(100))
        .await
        .expect("page");
    let mut ids = ids(&result);
    ids.sort_unstable();
    ids
}

fn facet(label: &str, count: u64) -> Facet {
    Facet {
        label: label.into(),
        count,
    }
}

#[tokio::test]
async fn many_to_many_values_intersect() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let criteria = CriteriaBuilder::default()
        .values("hard_skills", ["Python", "SQL"])
        .build()
        .unwrap();
    assert_eq!(all_ids(&board, criteria).await, vec![2, 3]);

    let languages = CriteriaBuilder::default()
        .values("languages", ["English", "Romanian"])
        .build()
        .unwrap();
    assert_eq!(all_ids(&board, languages).await, vec![1]);
}

#[tokio::test]
async fn many_to_one_values_are_alternatives() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let criteria = CriteriaBuilder::default()
        .values("city", ["Balti", "Cahul"])
        .build()
        .unwrap();
    assert_eq!(all_ids(&board, criteria).await, vec![3, 4, 6]);
}

#[tokio::test]
async fn cross_field_policy() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let and = CriteriaBuilder::default()
        .value("city", "Chisinau")
        .value("remote_work", "Remote")
        .build()
        .unwrap();
    assert_eq!(all_ids(&board, and).await, vec![2]);

    let or = CriteriaBuilder::default()
        .value("city", "Chisinau")
        .value("remote_work", "Remote")
        .any()
        .build()
        .unwrap();
    assert_eq!(all_ids(&board, or).await, vec![1, 2, 4, 6]);

    let or_with_skills = CriteriaBuilder::default()
        .values("hard_skills", ["Python", "SQL"])
        .value("city", "Cahul")
        .any()
        .build()
        .unwrap();
    assert_eq!(all_ids(&board, or_with_skills).await, vec![2, 3, 6]);
}

#[tokio::test]
async fn facets_relax_only_their_own_field() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let mut filters = FilterState::new();
    filters.add_value("city", "Chisinau");
    filters.add_value("seniority_level", "Senior");

    let facets = board.get_facets("city", &filters).await.unwrap();
    assert_eq!(
        facets,
        vec![facet("Chisinau", 2), facet("Balti", 1), facet("Cahul", 1)]
    );

    let seniority = board.get_facets("seniority_level", &filters).await.unwrap();
    assert_eq!(seniority, vec![facet("Senior", 2)]);
}

#[tokio::test]
async fn facet_on_legacy_alias_relaxes_the_canonical_filter() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let mut filters = FilterState::new();
    filters.add_value("city", "Chisinau");
    let facets = board.get_facets("location", &filters).await.unwrap();
    assert_eq!(
        facets,
        vec![facet("Balti", 2), facet("Chisinau", 2), facet("Cahul", 1)]
    );
}

#[tokio::test]
async fn multi_valued_facets_count_entities() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let facets = board
        .get_facets("hard_skills", &FilterState::new())
        .await
        .unwrap();
    assert_eq!(
        facets,
        vec![facet("Python", 3), facet("SQL", 3), facet("Rust", 1)]
    );

    let mut filters = FilterState::new();
    filters.add_value("remote_work", "Remote");
    let facets = board.get_facets("hard_skills", &filters).await.unwrap();
    assert_eq!(
        facets,
        vec![facet("SQL", 2), facet("Python", 1), facet("Rust", 1)]
    );
}

#[tokio::test]
async fn pages_partition_the_unpaginated_order() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let everything = board
        .get_page(&PageRequest::default().page_size(100))
        .await
        .unwrap();
    assert_eq!(ids(&everything), vec![2, 6, 4, 1, 3, 5]);
    let total = everything.total_count;
    assert_eq!(total, 6);

    for size in [1, total, total + 1] {
        let mut collected = Vec::new();
        let mut page = 1;
        loop {
            let result = board
                .get_page(&PageRequest::default().page(page).page_size(size))
                .await
                .unwrap();
            assert_eq!(result.total_count, total);
            assert_eq!(result.total_pages, total.div_ceil(size));
            if result.entities.is_empty() {
                break;
            }
            collected.extend(ids(&result));
            page += 1;
        }
        assert_eq!(collected, ids(&everything), "page size {size}");
    }
}

#[tokio::test]
async fn page_past_the_end_is_empty_with_totals() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let result = board
        .get_page(&PageRequest::default().page(9).page_size(2))
        .await
        .unwrap();
    assert!(result.entities.is_empty());
    assert_eq!(result.total_count, 6);
    assert_eq!(result.total_pages, 3);
    assert_eq!(result.page, 9);
}

#[tokio::test]
async fn invalid_pagination_is_rejected() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let err = board
        .get_page(&PageRequest::default().page(0))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "InvalidPagination");
}

#[tokio::test]
async fn null_foreign_keys_do_not_hide_entities() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let all = all_ids(&board, Criteria::default()).await;
    assert!(all.contains(&5));

    let filtered = CriteriaBuilder::default()
        .value("city", "Chisinau")
        .build()
        .unwrap();
    assert!(!all_ids(&board, filtered).await.contains(&5));

    let intern = board.get_entity_by_id(5).await.unwrap().expect("intern");
    assert_eq!(intern.location.city, None);
    assert_eq!(intern.company, None);
    assert_eq!(intern.title.as_deref(), Some("Intern"));
}

#[tokio::test]
async fn unknown_sort_matches_default_order() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let default = board.get_page(&PageRequest::default()).await.unwrap();
    let bogus = board
        .get_page(&PageRequest::default().sort(SortKey::parse("most_exciting")))
        .await
        .unwrap();
    assert_eq!(ids(&default), ids(&bogus));
}

#[tokio::test]
async fn sort_keys_order_with_nulls_last() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let salary_desc = board
        .get_page(&PageRequest::default().sort(SortKey::SalaryDesc))
        .await
        .unwrap();
    assert_eq!(ids(&salary_desc), vec![6, 2, 1, 3, 5, 4]);

    let company_asc = board
        .get_page(&PageRequest::default().sort(SortKey::CompanyAsc))
        .await
        .unwrap();
    assert_eq!(ids(&company_asc), vec![1, 3, 2, 6, 4, 5]);
}

#[tokio::test]
async fn search_is_always_a_refinement() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let no_match = CriteriaBuilder::default()
        .value("city", "Chisinau")
        .any()
        .search("zzz-nothing")
        .build()
        .unwrap();
    assert!(all_ids(&board, no_match).await.is_empty());

    let acme = Criteria::default().with_search("  acme ");
    assert_eq!(all_ids(&board, acme).await, vec![1, 3]);

    let or_narrowed = CriteriaBuilder::default()
        .value("city", "Chisinau")
        .value("city", "Cahul")
        .any()
        .search("engineer")
        .build()
        .unwrap();
    assert_eq!(all_ids(&board, or_narrowed).await, vec![2, 6]);

    let literal = Criteria::default().with_search("100%");
    assert!(all_ids(&board, literal).await.is_empty());
}

#[tokio::test]
async fn ranges_bound_entity_columns() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let salary = CriteriaBuilder::default()
        .range("salary", Some(1500.0), None)
        .build()
        .unwrap();
    assert_eq!(all_ids(&board, salary).await, vec![2, 6]);

    let experience = CriteriaBuilder::default()
        .range("experience", None, Some(3.0))
        .build()
        .unwrap();
    assert_eq!(all_ids(&board, experience).await, vec![1, 3, 5]);
}

#[tokio::test]
async fn unknown_fields_fail_loudly() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let mut filters = FilterState::new();
    filters.add_value("favourite_colour", "blue");
    let err = board
        .get_page(&PageRequest::new(Criteria::browse(filters)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        JobscopeError::Compile(CompileError::UnknownField { ref field }) if field == "favourite_colour"
    ));

    let err = board
        .get_facets("favourite_colour", &FilterState::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UnknownField");
}

#[tokio::test]
async fn empty_selection_matches_everything() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let mut filters = FilterState::new();
    filters.set_values("hard_skills", Vec::<String>::new());
    let criteria = Criteria::browse(filters).with_policy(CombinePolicy::Or);
    assert_eq!(all_ids(&board, criteria).await, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn lookup_by_id() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let view = board.get_entity_by_id(2).await.unwrap().expect("job 2");
    assert_eq!(view.title.as_deref(), Some("Data Engineer"));
    assert_eq!(view.requirements.hard_skills, vec!["Python", "SQL"]);
    assert_eq!(
        view.parsed_view.responsibilities,
        vec!["Build pipelines", "Review code"]
    );
    assert!(board.get_entity_by_id(999).await.unwrap().is_none());
}

#[tokio::test]
async fn overview_lists_canonical_fields() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let overview = board.facet_overview().await.unwrap();
    assert_eq!(overview.total_entities, 6);
    assert_eq!(
        overview.facets["remote_work"],
        vec![facet("Remote", 3), facet("Hybrid", 1), facet("On-site", 1)]
    );
    assert!(overview.facets.contains_key("hard_skills"));
    assert!(!overview.facets.contains_key("location"));
    assert!(!overview.facets.contains_key("salary_currency"));
}

#[tokio::test]
async fn requirement_fields_read_description_labels() {
    let fixture = requirements_dataset();
    let board = board(&fixture);
    let none = FilterState::new();
    assert_eq!(
        board.get_facets("work_life_balance", &none).await.unwrap(),
        vec![facet("Flexible hours", 2), facet("Four-day week", 1)]
    );
    assert_eq!(
        board.get_facets("physical_requirements", &none).await.unwrap(),
        vec![facet("Lifting 10kg", 1), facet("Standing", 1)]
    );
    assert_eq!(
        board.get_facets("special_requirements", &none).await.unwrap(),
        vec![facet("Driving permit", 1)]
    );

    let mut filters = FilterState::new();
    filters.add_value("work_life_balance", "Flexible hours");
    filters.add_value("work_conditions", "Office");
    assert_eq!(
        board.get_facets("work_conditions", &filters).await.unwrap(),
        vec![facet("Office", 1), facet("Outdoor", 1)]
    );
    assert_eq!(
        board.get_facets("work_life_balance", &filters).await.unwrap(),
        vec![facet("Flexible hours", 1), facet("Four-day week", 1)]
    );
}

#[tokio::test]
async fn analyses_run_under_criteria() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let report = board
        .run_analysis("in_demand_skills", &Criteria::default())
        .await
        .unwrap();
    let skills: Vec<(String, i64)> = report
        .rows
        .records()
        .into_iter()
        .map(|row| {
            (
                row["skill"].as_str().unwrap().to_owned(),
                row["job_count"].as_i64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        skills,
        vec![("Python".into(), 3), ("SQL".into(), 2), ("Rust".into(), 1)]
    );
    let job_count = report
        .statistics
        .iter()
        .find(|s| s.column == "job_count")
        .expect("job_count stats");
    assert_eq!(job_count.count, 3);
    assert_eq!(job_count.median, 2.0);
    assert!(report.statistics.iter().all(|s| s.column != "skill"));

    let narrowed = CriteriaBuilder::default()
        .value("city", "Cahul")
        .any()
        .build()
        .unwrap();
    let report = board.run_analysis("in_demand_skills", &narrowed).await.unwrap();
    assert_eq!(report.rows.len(), 1);

    let err = board
        .run_analysis("horoscope", &Criteria::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UnknownAnalysis");
}

#[tokio::test]
async fn skill_pairs_count_each_unordered_pair_once() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let report = board
        .run_analysis("skill_pairs", &Criteria::default())
        .await
        .unwrap();
    assert_eq!(report.category, Some(Category::Skills));
    let pairs: Vec<(String, i64)> = report
        .rows
        .records()
        .into_iter()
        .map(|row| {
            (
                row["skill_combination"].as_str().unwrap().to_owned(),
                row["job_count"].as_i64().unwrap(),
            )
        })
        .collect();
    assert_eq!(pairs, vec![("Python + SQL".into(), 2)]);

    let narrowed = CriteriaBuilder::default()
        .value("city", "Balti")
        .build()
        .unwrap();
    let report = board.run_analysis("skill_pairs", &narrowed).await.unwrap();
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows.get(0, "job_count").and_then(|v| v.as_i64()), Some(1));
}

#[tokio::test]
async fn salary_percentiles_come_from_the_statistics() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let report = board
        .run_analysis("salary_percentiles", &Criteria::default())
        .await
        .unwrap();
    assert_eq!(report.rows.len(), 5);
    let max_salary = report
        .statistics
        .iter()
        .find(|s| s.column == "max_salary")
        .expect("max_salary stats");
    assert_eq!(max_salary.min, 500.0);
    assert_eq!(max_salary.median, 2000.0);
    assert_eq!(max_salary.max, 4000.0);
}

#[tokio::test]
async fn ad_hoc_sql_is_read_only() {
    let fixture = scenario(false);
    let board = board(&fixture);
    let report = board
        .run_sql("SELECT id, max_salary FROM job_details ORDER BY id;")
        .await
        .unwrap();
    assert_eq!(report.rows.len(), 6);
    let max_salary = &report.statistics[1];
    assert_eq!(max_salary.column, "max_salary");
    assert_eq!(max_salary.count, 5);

    let err = board
        .run_sql("DELETE FROM job_details")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "QueryFailed");
    let err = board.run_sql("   ").await.unwrap_err();
    assert_eq!(err.code(), "InvalidArgument");
}
