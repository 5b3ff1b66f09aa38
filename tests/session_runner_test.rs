mod common;

use bean_crawler::app::strategies;
use bean_crawler::config::site::SiteConfig;
use bean_crawler::{CrawlSessionRunner, LocalStorage, QualityValidator};
use common::{detail_page, fail, html, listing_page, originless_page, single_site_catalog, FakeWeb};
use std::sync::Arc;
use tempfile::TempDir;

const BASE: &str = "https://fake.example";

fn site(dir: &TempDir) -> SiteConfig {
    let catalog = single_site_catalog(
        dir.path().to_str().unwrap(),
        "fake-roastery",
        "paginated",
        BASE,
        "/collections/coffee",
        r"/products/[^/?#]+$",
        "",
    );
    catalog.active_sites().remove(0)
}

fn listing() -> String {
    listing_page(&[
        "/products/kenya-kiambu",
        "/products/ethiopia-guji",
        "/products/broken-1",
        "/products/house-blend",
        "/products/broken-2",
        "/collections/tea",
    ])
}

fn url(path: &str) -> String {
    format!("{}{}", BASE, path)
}

fn runner(dir: &TempDir, web: &FakeWeb) -> CrawlSessionRunner<LocalStorage> {
    CrawlSessionRunner::new(
        Arc::new(web.clone()),
        QualityValidator::default(),
        LocalStorage::new(dir.path()),
        "bean-crawler/test",
    )
}

#[tokio::test]
async fn test_item_failures_are_isolated() {
    let dir = TempDir::new().unwrap();
    let site = site(&dir);
    let web = FakeWeb::new(vec![
        (url("/collections/coffee"), html(listing())),
        (
            url("/products/kenya-kiambu"),
            html(detail_page("Kenya Kiambu AA", "Kenya", "/img/kenya-label.png")),
        ),
        (
            url("/products/ethiopia-guji"),
            html(detail_page("[NEW] Ethiopia Guji (200g)", "에티오피아", "/img/guji-label.png")),
        ),
        (url("/products/broken-1"), fail("timeout")),
        (url("/products/house-blend"), html(originless_page("House Blend No.3"))),
        (url("/products/broken-2"), fail("connection reset")),
    ]);

    let strategy = strategies::for_site(&site).unwrap().unwrap();
    let result = runner(&dir, &web).crawl(&site, strategy.as_ref()).await;

    // 5 candidates, 2 raise, 1 rejected by the validator
    assert_eq!(result.total_products, 5);
    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.rejected_products, 1);
    assert_eq!(result.successful_products, 5 - 2 - 1);
    assert_eq!(result.failed_products, 2);
    assert_eq!(
        result.total_products,
        result.successful_products + result.rejected_products + result.failed_products
    );
    assert!(result.success);

    assert_eq!(result.errors[0].url, url("/products/broken-1"));
    assert_eq!(result.errors[0].retry_count, 1);
    assert_eq!(result.errors[1].url, url("/products/broken-2"));

    let names: Vec<&str> = result.products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Kenya Kiambu AA", "Ethiopia Guji"]);
    assert_eq!(result.products[1].origin.as_deref(), Some("Ethiopia"));
    assert_eq!(
        result.products[0].label_image.as_deref(),
        Some("https://fake.example/img/kenya-label.png")
    );
    assert_eq!(result.products[0].quality_score, 90);

    // each broken item is attempted 1 + max_retries times
    let visits = web.visits();
    assert_eq!(visits.iter().filter(|v| v.ends_with("broken-1")).count(), 2);
    assert_eq!(web.closed_sessions(), 1);
}

#[tokio::test]
async fn test_snapshot_holds_accepted_records() {
    let dir = TempDir::new().unwrap();
    let site = site(&dir);
    let web = FakeWeb::new(vec![
        (url("/collections/coffee"), html(listing())),
        (
            url("/products/kenya-kiambu"),
            html(detail_page("Kenya Kiambu AA", "Kenya", "/img/kenya-label.png")),
        ),
    ]);

    let strategy = strategies::for_site(&site).unwrap().unwrap();
    let result = runner(&dir, &web).crawl(&site, strategy.as_ref()).await;

    let snapshot = result.snapshot_path.clone().unwrap();
    assert!(snapshot.starts_with("snapshots/fake-roastery_"));
    let saved: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.path().join(&snapshot)).unwrap()).unwrap();
    assert_eq!(saved.as_array().unwrap().len(), 1);
    assert_eq!(saved[0]["sourceUrl"], url("/products/kenya-kiambu"));
    assert_eq!(saved[0]["source"], "crawled");
}

#[tokio::test]
async fn test_permission_fetch_failure_does_not_block() {
    let dir = TempDir::new().unwrap();
    let site = site(&dir);
    let web = FakeWeb::new(vec![
        (url("/robots.txt"), fail("network unreachable")),
        (url("/collections/coffee"), html(listing())),
        (
            url("/products/kenya-kiambu"),
            html(detail_page("Kenya Kiambu AA", "Kenya", "/img/kenya-label.png")),
        ),
    ]);

    let strategy = strategies::for_site(&site).unwrap().unwrap();
    let result = runner(&dir, &web).crawl(&site, strategy.as_ref()).await;

    let visits = web.visits();
    assert_eq!(visits[0], url("/robots.txt"));
    assert!(visits.contains(&url("/collections/coffee")));
    assert_eq!(result.successful_products, 1);
}

#[tokio::test]
async fn test_disallow_is_logged_not_enforced() {
    let dir = TempDir::new().unwrap();
    let site = site(&dir);
    let web = FakeWeb::new(vec![
        (url("/robots.txt"), html("User-agent: *\nDisallow: /\n")),
        (url("/collections/coffee"), html(listing())),
        (
            url("/products/kenya-kiambu"),
            html(detail_page("Kenya Kiambu AA", "Kenya", "/img/kenya-label.png")),
        ),
    ]);

    let strategy = strategies::for_site(&site).unwrap().unwrap();
    let result = runner(&dir, &web).crawl(&site, strategy.as_ref()).await;

    assert_eq!(result.successful_products, 1);
}

#[tokio::test]
async fn test_page_without_product_is_a_recorded_failure() {
    let dir = TempDir::new().unwrap();
    let site = site(&dir);
    let web = FakeWeb::new(vec![
        (
            url("/collections/coffee"),
            html(listing_page(&["/products/kenya-kiambu", "/products/gone"])),
        ),
        (
            url("/products/kenya-kiambu"),
            html(detail_page("Kenya Kiambu AA", "Kenya", "/img/kenya-label.png")),
        ),
        (url("/products/gone"), html("<html><body></body></html>")),
    ]);

    let strategy = strategies::for_site(&site).unwrap().unwrap();
    let result = runner(&dir, &web).crawl(&site, strategy.as_ref()).await;

    assert_eq!(result.total_products, 2);
    assert_eq!(result.successful_products, 1);
    assert_eq!(result.rejected_products, 0);
    assert_eq!(result.failed_products, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].url, url("/products/gone"));
    assert_eq!(result.errors[0].message, "no product found on page");
    assert_eq!(result.errors[0].retry_count, 0);
}
