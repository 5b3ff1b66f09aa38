//! A fetched page and the read-only queries extraction is allowed to run on it.
//!
//! Strategies never see the HTTP client; they ask a [`PageSession`] to
//! navigate and get a `Page` back. Parsed documents (`scraper::Html`) are not
//! `Send`, so they are built on demand inside synchronous code and never held
//! across an `.await`.
//!
//! [`PageSession`]: crate::domain::ports::PageSession

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

#[derive(Debug, Clone)]
pub struct Page {
    url: String,
    status: u16,
    body: String,
}

impl Page {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    /// Final URL after redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }

    /// Attribute values of every element matching `selector`, in document order.
    pub fn query_attr(&self, selector: &Selector, attr: &str) -> Vec<String> {
        let document = self.document();
        document
            .select(selector)
            .filter_map(|el| el.value().attr(attr))
            .map(str::to_string)
            .collect()
    }

    /// Text content of every element matching `selector`.
    pub fn query_text(&self, selector: &Selector) -> Vec<String> {
        let document = self.document();
        document.select(selector).map(element_text).collect()
    }

    /// Runs `pattern` over the raw source; yields group 1 when present.
    pub fn evaluate(&self, pattern: &Regex) -> Vec<String> {
        pattern
            .captures_iter(&self.body)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|m| m.as_str().to_string())
            .collect()
    }

    pub fn read_text(&self) -> String {
        visible_text(&self.document())
    }
}

/// Concatenated text of an element, whitespace untouched.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

/// Text nodes of the body outside `<script>`/`<style>`, one per line.
pub fn visible_text(document: &Html) -> String {
    let body = Selector::parse("body").ok();
    let root = body
        .as_ref()
        .and_then(|sel| document.select(sel).next())
        .unwrap_or_else(|| document.root_element());

    let mut lines = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|el| el.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript" | "template"));
        if hidden {
            continue;
        }
        let line = text.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    lines.join("\n")
}
