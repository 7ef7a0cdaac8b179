//! Integration test: mock render engine → batch scheduler → CSV checkpoint files.
//!
//! Every scenario runs the real scheduler, extractor, classifier and checkpoint
//! store against an in-memory site, with durable state in a temp directory.

use std::path::Path;
use std::sync::Arc;

use leadscout::checkpoint::{ALL_PROFILES_FILE, ENRICHED_FILE, QUALIFIED_FILE};
use leadscout::extract::ListingQuery;
use leadscout::render::EngineFactory;
use leadscout::testing::{detail_page, listing_page, CardFixture, MockEngine, MockEngineFactory, ScriptedOperator};
use leadscout::{BatchScheduler, BatchState, Operator, RunContext, RunStats};
use leadscout_common::{
    ClassifierConfig, Cookie, CrawlConfig, FileConfig, LeadScoutError, OutputConfig, SearchConfig,
    SessionConfig,
};

const LOGIN: &str = "https://example.com/login";

fn config(dir: &Path, end_page: u32) -> FileConfig {
    FileConfig {
        search: SearchConfig {
            listing_url: "https://example.com/search/results/people/".to_string(),
            query: None,
            geo_urn: None,
            profile_path_marker: "/in/".to_string(),
        },
        session: SessionConfig {
            auth_check_url: "https://example.com/feed/".to_string(),
            login_url: Some(LOGIN.to_string()),
            login_markers: vec!["login".to_string(), "checkpoint".to_string()],
            session_file: dir.join("session.json"),
        },
        classifier: ClassifierConfig {
            keywords: vec!["Small Business Owner".to_string()],
            ..ClassifierConfig::default()
        },
        crawl: CrawlConfig {
            start_page: 1,
            end_page,
            batch_size: 5,
            cooldown_min_secs: 0,
            cooldown_max_secs: 0,
            element_wait_secs: 0,
            scroll_rounds: 1,
            scroll_pause_ms: 0,
            ..CrawlConfig::default()
        },
        output: OutputConfig {
            dir: dir.join("out"),
        },
    }
}

fn page_url(cfg: &FileConfig, page: u32) -> String {
    ListingQuery::from_config(&cfg.search, &cfg.classifier.keywords)
        .unwrap()
        .page_url(page)
}

fn first_page() -> Vec<CardFixture> {
    vec![
        CardFixture::new("jane-doe", "Jane Doe", "Small Business Owner at Acme", "Austin, TX"),
        CardFixture::new("ned-york", "Ned York", "Small Business Owner", "New York, NY"),
        CardFixture::new("tom-north", "Tom North", "Small Business Owner", "Toronto, Ontario, Canada"),
        CardFixture::new("sam-dev", "Sam Dev", "Software Engineer", "Denver, Colorado"),
    ]
}

async fn run(
    cfg: &FileConfig,
    factory: Arc<dyn EngineFactory>,
    operator: Arc<dyn Operator>,
) -> Result<RunStats, LeadScoutError> {
    let mut ctx = RunContext::open(cfg)?;
    let mut scheduler = BatchScheduler::from_config(cfg, factory, operator)?;
    scheduler.run(&mut ctx).await?;
    assert_eq!(scheduler.state(), BatchState::Done);
    Ok(ctx.stats)
}

fn no_login() -> Arc<dyn Operator> {
    Arc::new(ScriptedOperator::absent())
}

/// Rows of a CSV output, header excluded.
fn rows(dir: &Path, file: &str) -> Vec<Vec<String>> {
    let path = dir.join("out").join(file);
    if !path.exists() {
        return Vec::new();
    }
    csv::Reader::from_path(path)
        .unwrap()
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

// ---------------------------------------------------------------------------
// Classification end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn qualified_and_unqualified_records_land_in_the_right_files() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    let factory = Arc::new(MockEngineFactory::new(
        MockEngine::new().on_page(&page_url(&cfg, 1), &listing_page(&first_page())),
    ));
    let log = factory.log();

    let stats = run(&cfg, factory, no_login()).await.unwrap();

    assert_eq!(stats.pages_scanned, 1);
    assert_eq!(stats.cards_found, 4);
    {
        // One load and one scroll script per listing page.
        let log = log.lock().unwrap();
        let loads = log.navigations.iter().filter(|u| **u == page_url(&cfg, 1)).count();
        assert_eq!(loads, 1);
        assert_eq!(log.scripts, 1);
    }
    assert_eq!(stats.records_processed, 4);
    assert_eq!(stats.records_qualified, 1);
    assert_eq!(stats.total_qualified, 1);

    let qualified = rows(dir.path(), QUALIFIED_FILE);
    assert_eq!(
        qualified,
        vec![vec![
            "Jane Doe".to_string(),
            "Small Business Owner at Acme".to_string(),
            "https://example.com/in/jane-doe/".to_string(),
            "Small Business Owner at Acme".to_string(),
        ]]
    );

    let all = rows(dir.path(), ALL_PROFILES_FILE);
    let urls: Vec<&str> = all.iter().map(|r| r[2].as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://example.com/in/jane-doe/",
            "https://example.com/in/ned-york/",
            "https://example.com/in/tom-north/",
            "https://example.com/in/sam-dev/",
        ]
    );
    assert_eq!(rows(dir.path(), ENRICHED_FILE).len(), 4);
}

#[tokio::test]
async fn open_to_work_badge_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    let cards = vec![
        CardFixture::new("jane-doe", "Jane Doe", "Small Business Owner", "Austin, TX").open_to_work(),
        CardFixture::new("sam-dev", "Sam Dev", "Small Business Owner", "Denver, Colorado"),
    ];
    let factory = Arc::new(MockEngineFactory::new(
        MockEngine::new().on_page(&page_url(&cfg, 1), &listing_page(&cards)),
    ));

    run(&cfg, factory, no_login()).await.unwrap();

    let enriched = rows(dir.path(), ENRICHED_FILE);
    assert_eq!(enriched[0][4], "Yes");
    assert_eq!(enriched[1][4], "No");
}

// ---------------------------------------------------------------------------
// Resume
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_run_skips_everything_and_leaves_outputs_identical() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    let template = || MockEngine::new().on_page(&page_url(&cfg, 1), &listing_page(&first_page()));

    run(&cfg, Arc::new(MockEngineFactory::new(template())), no_login())
        .await
        .unwrap();
    let qualified_before = std::fs::read(dir.path().join("out").join(QUALIFIED_FILE)).unwrap();
    let all_before = std::fs::read(dir.path().join("out").join(ALL_PROFILES_FILE)).unwrap();

    let stats = run(&cfg, Arc::new(MockEngineFactory::new(template())), no_login())
        .await
        .unwrap();

    assert_eq!(stats.records_processed, 0);
    assert_eq!(stats.records_skipped, 4);
    assert_eq!(
        std::fs::read(dir.path().join("out").join(QUALIFIED_FILE)).unwrap(),
        qualified_before
    );
    assert_eq!(
        std::fs::read(dir.path().join("out").join(ALL_PROFILES_FILE)).unwrap(),
        all_before
    );
}

#[tokio::test]
async fn same_profile_on_two_pages_is_written_once() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 2);
    let jane = CardFixture::new("jane-doe", "Jane Doe", "Small Business Owner", "Austin, TX");
    let factory = Arc::new(MockEngineFactory::new(
        MockEngine::new()
            .on_page(&page_url(&cfg, 1), &listing_page(&[jane.clone()]))
            .on_page(&page_url(&cfg, 2), &listing_page(&[jane])),
    ));

    let stats = run(&cfg, factory, no_login()).await.unwrap();

    assert_eq!(stats.records_processed, 1);
    assert_eq!(stats.records_skipped, 1);
    assert_eq!(rows(dir.path(), ALL_PROFILES_FILE).len(), 1);
    assert_eq!(rows(dir.path(), QUALIFIED_FILE).len(), 1);
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enrichment_cap_limits_detail_fetches() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), 1);
    cfg.crawl.max_enrichments = 2;
    let cards = vec![
        CardFixture::new("a", "Ann", "Small Business Owner", ""),
        CardFixture::new("b", "Ben", "Small Business Owner", ""),
        CardFixture::new("c", "Cat", "Small Business Owner", ""),
    ];
    let mut engine = MockEngine::new().on_page(&page_url(&cfg, 1), &listing_page(&cards));
    for slug in ["a", "b", "c"] {
        engine = engine.on_page(
            &format!("https://example.com/in/{slug}/"),
            &detail_page("", "", "Austin, TX"),
        );
    }
    let factory = Arc::new(MockEngineFactory::new(engine));
    let log = factory.log();

    let stats = run(&cfg, factory, no_login()).await.unwrap();

    assert_eq!(stats.enrichments_attempted, 2);
    assert_eq!(log.lock().unwrap().contexts_opened.len(), 2);

    let all = rows(dir.path(), ALL_PROFILES_FILE);
    assert_eq!(all[0][4], "Austin, TX");
    assert_eq!(all[1][4], "Austin, TX");
    assert_eq!(all[2][4], "");
    // Enrichment never blanks card values.
    assert_eq!(all[0][0], "Ann");
    assert_eq!(all[0][1], "Small Business Owner");
    assert_eq!(rows(dir.path(), QUALIFIED_FILE).len(), 2);
}

#[tokio::test]
async fn failed_enrichment_keeps_card_values() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    let cards = vec![CardFixture::new("a", "Ann", "", "Austin, TX")];
    let factory = Arc::new(MockEngineFactory::new(
        MockEngine::new()
            .on_page(&page_url(&cfg, 1), &listing_page(&cards))
            .failing("https://example.com/in/a/"),
    ));

    let stats = run(&cfg, factory, no_login()).await.unwrap();

    assert_eq!(stats.enrichments_attempted, 1);
    assert_eq!(stats.enrichments_failed, 1);
    let all = rows(dir.path(), ALL_PROFILES_FILE);
    assert_eq!(all[0][0], "Ann");
    assert_eq!(all[0][4], "Austin, TX");
}

// ---------------------------------------------------------------------------
// Failure absorption
// ---------------------------------------------------------------------------

#[tokio::test]
async fn timed_out_page_is_skipped_and_the_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 3);
    let factory = Arc::new(MockEngineFactory::new(
        MockEngine::new()
            .on_page(
                &page_url(&cfg, 1),
                &listing_page(&[CardFixture::new("a", "Ann", "Small Business Owner", "Austin, TX")]),
            )
            .failing(&page_url(&cfg, 2))
            .on_page(
                &page_url(&cfg, 3),
                &listing_page(&[CardFixture::new("c", "Cat", "Small Business Owner", "Remote, USA")]),
            ),
    ));

    let stats = run(&cfg, factory, no_login()).await.unwrap();

    assert_eq!(stats.pages_failed, 1);
    assert_eq!(stats.pages_scanned, 2);
    assert_eq!(rows(dir.path(), QUALIFIED_FILE).len(), 2);
}

#[tokio::test]
async fn empty_listing_page_yields_no_records() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    let factory = Arc::new(MockEngineFactory::new(MockEngine::new()));

    let stats = run(&cfg, factory, no_login()).await.unwrap();

    assert_eq!(stats.pages_scanned, 1);
    assert_eq!(stats.cards_found, 0);
    assert!(rows(dir.path(), ALL_PROFILES_FILE).is_empty());
}

#[tokio::test]
async fn each_batch_gets_its_own_engine() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), 3);
    cfg.crawl.batch_size = 2;
    let factory = Arc::new(MockEngineFactory::new(MockEngine::new()));
    let log = factory.log();

    let stats = run(&cfg, factory, no_login()).await.unwrap();

    assert_eq!(stats.batches, 2);
    let log = log.lock().unwrap();
    assert_eq!(log.launches, 2);
    assert_eq!(log.shutdowns, 2);
}

#[tokio::test]
async fn failed_launch_skips_only_that_batch() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), 2);
    cfg.crawl.batch_size = 1;
    let factory = Arc::new(
        MockEngineFactory::new(MockEngine::new().on_page(
            &page_url(&cfg, 2),
            &listing_page(&[CardFixture::new("b", "Ben", "Small Business Owner", "Austin, TX")]),
        ))
        .failing_launches(1),
    );

    let stats = run(&cfg, factory, no_login()).await.unwrap();

    assert_eq!(stats.pages_failed, 1);
    assert_eq!(stats.records_processed, 1);
}

// ---------------------------------------------------------------------------
// Session and manual login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_wall_triggers_operator_then_session_is_saved() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    let gated = || {
        MockEngine::new()
            .login_gate("li_at", LOGIN)
            .on_page(&page_url(&cfg, 1), &listing_page(&first_page()))
    };

    let operator = Arc::new(ScriptedOperator::logging_in(Cookie::new("li_at", "token")));
    let stats = run(&cfg, Arc::new(MockEngineFactory::new(gated())), operator.clone())
        .await
        .unwrap();

    assert_eq!(operator.calls(), 1);
    assert_eq!(stats.manual_logins, 1);
    assert_eq!(stats.records_processed, 4);
    let saved = std::fs::read_to_string(dir.path().join("session.json")).unwrap();
    assert!(saved.contains("li_at"));

    // The saved session gets the next run straight past the wall.
    std::fs::remove_dir_all(dir.path().join("out")).unwrap();
    let operator = Arc::new(ScriptedOperator::logging_in(Cookie::new("li_at", "token")));
    let stats = run(&cfg, Arc::new(MockEngineFactory::new(gated())), operator.clone())
        .await
        .unwrap();
    assert_eq!(operator.calls(), 0);
    assert_eq!(stats.records_processed, 4);
}

#[tokio::test]
async fn unresolved_login_wall_aborts_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    let factory = Arc::new(MockEngineFactory::new(
        MockEngine::new()
            .login_gate("li_at", LOGIN)
            .on_page(&page_url(&cfg, 1), &listing_page(&first_page())),
    ));
    let log = factory.log();

    let err = run(&cfg, factory, no_login()).await.unwrap_err();

    assert!(matches!(err, LeadScoutError::AuthenticationRequired(_)));
    assert!(rows(dir.path(), ALL_PROFILES_FILE).is_empty());
    assert_eq!(log.lock().unwrap().shutdowns, 1);
}

// ---------------------------------------------------------------------------
// Recent-activity gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_activity_disqualifies_an_otherwise_qualified_record() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), 1);
    cfg.crawl.recent_activity_days = Some(21);
    let cards = vec![
        CardFixture::new("fresh", "Fay", "Small Business Owner", "Austin, TX"),
        CardFixture::new("stale", "Stu", "Small Business Owner", "Austin, TX"),
        CardFixture::new("remote", "Rae", "Software Engineer", "Austin, TX"),
    ];
    let activity = |age: &str| {
        format!(r#"<main><span class="update-components-actor__sub-description">{age} •</span></main>"#)
    };
    let factory = Arc::new(MockEngineFactory::new(
        MockEngine::new()
            .on_page(&page_url(&cfg, 1), &listing_page(&cards))
            .on_page("https://example.com/in/fresh/recent-activity/", &activity("3d"))
            .on_page("https://example.com/in/stale/recent-activity/", &activity("2mo")),
    ));
    let log = factory.log();

    let stats = run(&cfg, factory, no_login()).await.unwrap();

    // Only records that pass location and keyword checks are probed.
    assert_eq!(stats.activity_probes, 2);
    assert_eq!(log.lock().unwrap().contexts_opened.len(), 2);
    let qualified = rows(dir.path(), QUALIFIED_FILE);
    assert_eq!(qualified.len(), 1);
    assert_eq!(qualified[0][2], "https://example.com/in/fresh/");
    assert_eq!(rows(dir.path(), ALL_PROFILES_FILE).len(), 3);
}

#[tokio::test]
async fn activity_gate_holds_after_enrichment_cap_is_spent() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), 1);
    cfg.crawl.max_enrichments = 1;
    cfg.crawl.recent_activity_days = Some(21);
    let cards = vec![
        CardFixture::new("s1", "Stu", "Small Business Owner", "Austin, TX"),
        CardFixture::new("s2", "Sue", "Small Business Owner", "Austin, TX"),
    ];
    let stale = r#"<main><span class="update-components-actor__sub-description">2mo •</span></main>"#;
    let factory = Arc::new(MockEngineFactory::new(
        MockEngine::new()
            .on_page(&page_url(&cfg, 1), &listing_page(&cards))
            .on_page("https://example.com/in/s1/recent-activity/", stale)
            .on_page("https://example.com/in/s2/recent-activity/", stale),
    ));

    let stats = run(&cfg, factory, no_login()).await.unwrap();

    assert_eq!(stats.activity_probes, 2);
    // Probes leave the backfill slot untouched.
    assert_eq!(stats.enrichments_attempted, 0);
    assert!(rows(dir.path(), QUALIFIED_FILE).is_empty());
    assert_eq!(rows(dir.path(), ALL_PROFILES_FILE).len(), 2);
}

// ---------------------------------------------------------------------------
// Persistence failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn persistence_failure_mid_run_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let first = config(dir.path(), 1);
    let template = |cfg: &FileConfig| {
        MockEngine::new()
            .on_page(
                &page_url(cfg, 1),
                &listing_page(&[CardFixture::new("jane-doe", "Jane Doe", "Small Business Owner", "Austin, TX")]),
            )
            .on_page(
                &page_url(cfg, 2),
                &listing_page(&[CardFixture::new("tom-north", "Tom North", "Small Business Owner", "Toronto, Ontario, Canada")]),
            )
            .on_page(
                &page_url(cfg, 3),
                &listing_page(&[CardFixture::new("ann", "Ann", "Small Business Owner", "Miami, FL")]),
            )
    };
    run(&first, Arc::new(MockEngineFactory::new(template(&first))), no_login())
        .await
        .unwrap();
    let all_before = std::fs::read(out.join(ALL_PROFILES_FILE)).unwrap();
    let qualified_before = std::fs::read(out.join(QUALIFIED_FILE)).unwrap();

    let cfg = config(dir.path(), 3);
    let mut ctx = RunContext::open(&cfg).unwrap();
    // A directory in place of the enriched file makes its next rewrite fail.
    std::fs::remove_file(out.join(ENRICHED_FILE)).unwrap();
    std::fs::create_dir(out.join(ENRICHED_FILE)).unwrap();

    let factory = Arc::new(MockEngineFactory::new(template(&cfg)));
    let log = factory.log();
    let mut scheduler = BatchScheduler::from_config(&cfg, factory, no_login()).unwrap();
    let err = scheduler.run(&mut ctx).await.unwrap_err();

    assert!(matches!(err, LeadScoutError::Persistence(_)));
    assert_eq!(scheduler.state(), BatchState::Done);
    let log = log.lock().unwrap();
    assert!(log.navigations.contains(&page_url(&cfg, 2)));
    assert!(!log.navigations.contains(&page_url(&cfg, 3)));
    assert_eq!(log.shutdowns, 1);
    assert_eq!(std::fs::read(out.join(ALL_PROFILES_FILE)).unwrap(), all_before);
    assert_eq!(std::fs::read(out.join(QUALIFIED_FILE)).unwrap(), qualified_before);
}
