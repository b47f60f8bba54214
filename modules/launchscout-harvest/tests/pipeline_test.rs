//! End-to-end stage tests against a scripted browser.
//!
//! Each test builds a `Harvester` over a `MockBrowser` and a scratch output
//! directory, runs one or more stages, and asserts on the snapshots written.

use std::path::Path;
use std::sync::Arc;

use launchscout_common::{EnrichedRecord, HarvestConfig, HarvestError, ListingRecord, OutputConfig};
use launchscout_harvest::crawler::page_url;
use launchscout_harvest::testing::{
    category_page, detail_page, index_page, not_found_page, rate_limited_page, MockBrowser,
    Scripted,
};
use launchscout_harvest::Harvester;

const INDEX: &str = "https://sasi.heymantle.com/categories";
const REVIEWS: &str = "https://sasi.heymantle.com/category/reviews";
const PHOTOS: &str = "https://sasi.heymantle.com/category/photos";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn harvester(browser: &Arc<MockBrowser>, out: &Path) -> Harvester {
    let config = HarvestConfig {
        output: OutputConfig {
            dir: out.to_path_buf(),
            ..OutputConfig::default()
        },
        ..HarvestConfig::default()
    };
    Harvester::new(config, browser.clone())
}

fn read<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
    let raw = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
    serde_json::from_str(&raw).unwrap_or_else(|e| panic!("Failed to parse {}: {e}", path.display()))
}

// ---------------------------------------------------------------------------
// Crawl
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_page_category_yields_its_rows() {
    let dir = tempfile::tempdir().unwrap();
    let browser = Arc::new(
        MockBrowser::new()
            .on_html(INDEX, &index_page(&[("Reviews", "/category/reviews")]))
            .on_html(
                REVIEWS,
                &category_page(
                    &[
                        ("Judge.me", "https://apps.shopify.com/judgeme", 4.9, 36512),
                        ("Loox", "https://apps.shopify.com/loox", 4.8, 15),
                        ("Okendo", "https://apps.shopify.com/okendo", 4.7, 900),
                    ],
                    None,
                ),
            ),
    );
    let harvester = harvester(&browser, dir.path());

    let stats = harvester.crawl().await.unwrap();

    let all: Vec<ListingRecord> = read(&harvester.store().all_listings_path());
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|l| l.category == "Reviews"));
    assert_eq!(stats.pages_visited, 1);
    assert_eq!(stats.stopped_no_next_page, 1);
    assert_eq!(browser.visits(&page_url(REVIEWS, 2)), 0);

    let top: Vec<ListingRecord> = read(&harvester.store().top_listings_path());
    let names: Vec<&str> = top.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, ["Judge.me", "Okendo"]);
}

#[tokio::test]
async fn listing_in_two_categories_keeps_first_category() {
    let dir = tempfile::tempdir().unwrap();
    let browser = Arc::new(
        MockBrowser::new()
            .on_html(
                INDEX,
                &index_page(&[("Reviews", "/category/reviews"), ("Photos", "/category/photos")]),
            )
            .on_html(
                REVIEWS,
                &category_page(
                    &[("Loox", "https://apps.shopify.com/loox?surface_type=category", 4.8, 300)],
                    None,
                ),
            )
            .on_html(
                PHOTOS,
                &category_page(
                    &[("Loox", "https://apps.shopify.com/loox?surface_detail=photos", 4.8, 300)],
                    None,
                ),
            ),
    );
    let harvester = harvester(&browser, dir.path());

    harvester.crawl().await.unwrap();

    let all: Vec<ListingRecord> = read(&harvester.store().all_listings_path());
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].url, "https://apps.shopify.com/loox");
    assert_eq!(all[0].category, "Reviews");
}

#[tokio::test]
async fn endless_pagination_stops_at_page_cap() {
    let dir = tempfile::tempdir().unwrap();
    let mut browser = MockBrowser::new().on_html(INDEX, &index_page(&[("Reviews", "/category/reviews")]));
    for page in 1..=60u32 {
        let app = format!("https://apps.shopify.com/app-{page}");
        browser = browser.on_html(
            &page_url(REVIEWS, page),
            &category_page(&[("App", app.as_str(), 4.0, 50)], Some(page + 1)),
        );
    }
    let browser = Arc::new(browser);
    let harvester = harvester(&browser, dir.path());

    let stats = harvester.crawl().await.unwrap();

    assert_eq!(stats.pages_visited, 50);
    assert_eq!(stats.stopped_page_cap, 1);
    assert_eq!(browser.visits(&page_url(REVIEWS, 51)), 0);
    let all: Vec<ListingRecord> = read(&harvester.store().all_listings_path());
    assert_eq!(all.len(), 50);
}

#[tokio::test]
async fn failing_category_does_not_stop_the_crawl() {
    let dir = tempfile::tempdir().unwrap();
    let browser = Arc::new(
        MockBrowser::new()
            .on_html(
                INDEX,
                &index_page(&[("Photos", "/category/photos"), ("Reviews", "/category/reviews")]),
            )
            .on_error(PHOTOS, Scripted::NavigationTimeout)
            .on_html(
                REVIEWS,
                &category_page(&[("Judge.me", "https://apps.shopify.com/judgeme", 4.9, 100)], None),
            ),
    );
    let harvester = harvester(&browser, dir.path());

    let stats = harvester.crawl().await.unwrap();

    assert_eq!(stats.stopped_load_failed, 1);
    assert_eq!(stats.listings, 1);
}

// ---------------------------------------------------------------------------
// Enrich and recover
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn full_run_leaves_every_record_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let browser = Arc::new(
        MockBrowser::new()
            .on_html(INDEX, &index_page(&[("Reviews", "/category/reviews")]))
            .on_html(
                REVIEWS,
                &category_page(
                    &[
                        ("Judge.me", "https://apps.shopify.com/judgeme", 4.9, 36512),
                        ("Loox", "https://apps.shopify.com/loox", 4.8, 400),
                        ("Gone", "https://apps.shopify.com/gone", 3.1, 80),
                        ("Busy", "https://apps.shopify.com/busy", 4.0, 60),
                    ],
                    None,
                ),
            )
            .on_html("https://apps.shopify.com/judgeme", &detail_page("March 3, 2025"))
            .on_sequence(
                "https://apps.shopify.com/loox",
                vec![
                    Scripted::status(429, &rate_limited_page()),
                    Scripted::html(&detail_page("June 12, 2019")),
                ],
            )
            .on_html("https://apps.shopify.com/gone", &not_found_page())
            .on_status("https://apps.shopify.com/busy", 429, &rate_limited_page()),
    );
    let harvester = harvester(&browser, dir.path());

    let (_, stats) = harvester.run().await.unwrap();

    assert_eq!(stats.records, 4);
    assert_eq!((stats.enriched, stats.not_found, stats.exhausted), (2, 1, 1));
    assert_eq!(harvester.session().open_tabs(), 0);

    let records: Vec<EnrichedRecord> = read(&harvester.store().enriched_path());
    assert!(records.iter().all(EnrichedRecord::is_terminal));
    let outcome = |url: &str| {
        let r = records.iter().find(|r| r.listing.url == url).unwrap();
        (r.launch_date.clone(), r.error.clone())
    };
    assert_eq!(outcome("https://apps.shopify.com/judgeme"), (Some("March 3, 2025".into()), None));
    assert_eq!(outcome("https://apps.shopify.com/loox"), (Some("June 12, 2019".into()), None));
    assert_eq!(outcome("https://apps.shopify.com/gone"), (None, Some("404".into())));
    assert_eq!(outcome("https://apps.shopify.com/busy"), (None, Some("Max Retries Exceeded".into())));
}

#[tokio::test]
async fn enrich_without_popular_snapshot_fails_before_work() {
    let dir = tempfile::tempdir().unwrap();
    let browser = Arc::new(MockBrowser::new());
    let harvester = harvester(&browser, dir.path());

    let err = harvester.enrich().await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<HarvestError>(),
        Some(HarvestError::MissingSnapshot(_))
    ));
    assert!(browser.navigations().is_empty());
    assert!(!harvester.store().enriched_path().exists());
}

#[tokio::test(start_paused = true)]
async fn recovery_fills_gaps_then_converges() {
    let dir = tempfile::tempdir().unwrap();
    let browser = Arc::new(
        MockBrowser::new()
            .on_html("https://apps.shopify.com/busy", &detail_page("May 1, 2024")),
    );
    let harvester = harvester(&browser, dir.path());
    let listing = |name: &str, url: &str| ListingRecord {
        name: name.to_string(),
        url: url.to_string(),
        rating: 4.2,
        reviews: 70,
        category: "Reviews".to_string(),
    };
    harvester
        .store()
        .write_enriched(&[
            EnrichedRecord::enriched(listing("a", "https://apps.shopify.com/a"), "January 1, 2020".into()),
            EnrichedRecord::failed(listing("busy", "https://apps.shopify.com/busy"), "Max Retries Exceeded"),
        ])
        .unwrap();

    let first = harvester.recover(false).await.unwrap();
    assert_eq!((first.pending, first.recovered, first.checkpoints), (1, 1, 1));

    let path = harvester.store().enriched_path();
    let before = std::fs::read(&path).unwrap();
    let navigations = browser.navigations().len();

    let second = harvester.recover(false).await.unwrap();

    assert_eq!(second.pending, 0);
    assert_eq!(second.checkpoints, 0);
    assert_eq!(browser.navigations().len(), navigations);
    assert_eq!(std::fs::read(&path).unwrap(), before);
}
