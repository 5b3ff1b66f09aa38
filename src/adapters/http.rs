//! reqwest-backed page sessions.
//!
//! A session is one `reqwest::Client` (its own connection pool) owned by the
//! runner for the duration of one site; closing it drops the client.

use crate::config::site::SiteConfig;
use crate::domain::page::Page;
use crate::domain::ports::{PageSession, SessionFactory};
use crate::utils::error::{CrawlerError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    user_agent: String,
    timeout: Duration,
}

impl HttpSessionFactory {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn open(&self, site: &SiteConfig) -> Result<Box<dyn PageSession>> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,*/*;q=0.8"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ko-KR,ko;q=0.9,en;q=0.8"),
        );

        let client = Client::builder()
            .user_agent(self.user_agent.as_str())
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .map_err(|e| CrawlerError::SessionError {
                site: site.id.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!(site = %site.id, "Opened HTTP session");
        Ok(Box::new(HttpSession {
            site_id: site.id.clone(),
            client: Some(client),
        }))
    }
}

pub struct HttpSession {
    site_id: String,
    client: Option<Client>,
}

#[async_trait]
impl PageSession for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<Page> {
        let client = self.client.as_ref().ok_or_else(|| CrawlerError::SessionError {
            site: self.site_id.clone(),
            message: "session already closed".to_string(),
        })?;

        tracing::debug!("GET {}", url);
        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlerError::HttpStatusError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await?;
        Ok(Page::new(final_url, status.as_u16(), body))
    }

    async fn close(&mut self) -> Result<()> {
        if self.client.take().is_some() {
            tracing::debug!(site = %self.site_id, "Closed HTTP session");
        }
        Ok(())
    }
}
