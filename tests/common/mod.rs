#![allow(dead_code)]

use async_trait::async_trait;
use bean_crawler::config::site::SiteConfig;
use bean_crawler::domain::page::Page;
use bean_crawler::domain::ports::{PageSession, SessionFactory};
use bean_crawler::utils::error::{CrawlerError, Result};
use bean_crawler::SiteCatalog;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Canned response for one URL.
#[derive(Debug, Clone)]
pub enum Canned {
    Html(String),
    Fail(String),
}

/// In-memory web: navigation is a map lookup; unknown URLs are 404s.
#[derive(Debug, Clone, Default)]
pub struct FakeWeb {
    pages: Arc<HashMap<String, Canned>>,
    visits: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<usize>>,
}

impl FakeWeb {
    pub fn new(pages: Vec<(String, Canned)>) -> Self {
        Self {
            pages: Arc::new(pages.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub fn closed_sessions(&self) -> usize {
        *self.closed.lock().unwrap()
    }
}

pub struct FakeSession {
    web: FakeWeb,
}

#[async_trait]
impl PageSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<Page> {
        self.web.visits.lock().unwrap().push(url.to_string());
        match self.web.pages.get(url) {
            Some(Canned::Html(body)) => Ok(Page::new(url, 200, body.clone())),
            Some(Canned::Fail(message)) => Err(CrawlerError::extraction(url, message.clone())),
            None => Err(CrawlerError::HttpStatusError {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    async fn close(&mut self) -> Result<()> {
        *self.web.closed.lock().unwrap() += 1;
        Ok(())
    }
}

#[async_trait]
impl SessionFactory for FakeWeb {
    async fn open(&self, _site: &SiteConfig) -> Result<Box<dyn PageSession>> {
        Ok(Box::new(FakeSession { web: self.clone() }))
    }
}

pub fn html(body: impl Into<String>) -> Canned {
    Canned::Html(body.into())
}

pub fn fail(message: &str) -> Canned {
    Canned::Fail(message.to_string())
}

/// Anchors for each href, wrapped in a listing page.
pub fn listing_page(hrefs: &[&str]) -> String {
    let links: String = hrefs
        .iter()
        .map(|href| format!(r#"<li><a href="{}">item</a></li>"#, href))
        .collect();
    format!("<html><body><ul class=\"grid\">{}</ul></body></html>", links)
}

/// A detail page complete enough to pass the quality gate.
pub fn detail_page(name: &str, origin: &str, label: &str) -> String {
    format!(
        r#"<html><head><title>{name} | Fake Roastery</title></head>
        <body>
          <h1>{name}</h1>
          <p>Origin: {origin}</p>
          <p>Process: Washed</p>
          <p>Cup notes: Peach, Jasmine</p>
          <img src="{label}">
        </body></html>"#
    )
}

/// Has a name and notes but no origin anywhere on the page.
pub fn originless_page(name: &str) -> String {
    format!(
        r#"<html><body><h1>{name}</h1><p>Cup notes: Chocolate</p>
        <img src="/img/blend-label.png"></body></html>"#
    )
}

/// One-region catalog with a single site, all delays zeroed.
pub fn single_site_catalog(
    output_dir: &str,
    id: &str,
    site_type: &str,
    base_url: &str,
    listing_path: &str,
    item_url_pattern: &str,
    extra: &str,
) -> SiteCatalog {
    let toml = format!(
        r#"
[crawler]
output_dir = "{output_dir}"
inter_site_delay_ms = 0

[[regions]]
name = "test"

[[regions.sites]]
id = "{id}"
name = "Fake Roastery"
country = "KR"
site_type = "{site_type}"
base_url = "{base_url}"
listing_path = "{listing_path}"
item_url_pattern = '{item_url_pattern}'
delay_ms = 0
max_retries = 1
currency = "KRW"
{extra}
"#
    );
    SiteCatalog::from_toml_str(&toml).expect("test catalog parses")
}
