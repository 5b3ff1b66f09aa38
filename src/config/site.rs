use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_regex, validate_selector,
    validate_url,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Site families with a strategy implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteFamily {
    /// Server-rendered storefront with "next page" links.
    Paginated,
    /// Hosted e-commerce platform with infinite scroll.
    Platform,
    /// Marketplace whose listings are rendered by JavaScript.
    Marketplace,
}

impl SiteFamily {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "paginated" | "storefront" => Some(Self::Paginated),
            "platform" | "scroll" | "infinite_scroll" => Some(Self::Platform),
            "marketplace" | "spa" => Some(Self::Marketplace),
            _ => None,
        }
    }
}

/// One extraction rule. A field is extracted by trying its rules in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldRule {
    /// Text of the matched elements, or `attr` when given.
    Css {
        css: String,
        #[serde(default)]
        attr: Option<String>,
    },
    /// `<meta property|name=...>` content.
    Meta { meta: String },
    /// Dotted path into the page's JSON-LD `Product` object.
    JsonLd { json_ld: String },
    /// Pattern over the page's visible text; group 1 when present.
    Regex { regex: String },
    /// The document `<title>`.
    Title { title: bool },
}

impl FieldRule {
    pub fn css(selector: &str) -> Self {
        Self::Css {
            css: selector.to_string(),
            attr: None,
        }
    }

    pub fn css_attr(selector: &str, attr: &str) -> Self {
        Self::Css {
            css: selector.to_string(),
            attr: Some(attr.to_string()),
        }
    }

    pub fn meta(name: &str) -> Self {
        Self::Meta {
            meta: name.to_string(),
        }
    }

    pub fn json_ld(path: &str) -> Self {
        Self::JsonLd {
            json_ld: path.to_string(),
        }
    }

    pub fn regex(pattern: &str) -> Self {
        Self::Regex {
            regex: pattern.to_string(),
        }
    }

    pub fn title() -> Self {
        Self::Title { title: true }
    }

    fn validate(&self, field: &str) -> Result<()> {
        match self {
            Self::Css { css, .. } => validate_selector(css),
            Self::Meta { meta } => validate_non_empty_string(field, meta),
            Self::JsonLd { json_ld } => validate_non_empty_string(field, json_ld),
            Self::Regex { regex } => validate_regex(field, regex),
            Self::Title { .. } => Ok(()),
        }
    }
}

/// Configured rule chains per field. Strategies append their own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldRules {
    pub name: Vec<FieldRule>,
    pub origin: Vec<FieldRule>,
    pub region: Vec<FieldRule>,
    pub variety: Vec<FieldRule>,
    pub processing: Vec<FieldRule>,
    pub roast_level: Vec<FieldRule>,
    pub tasting_notes: Vec<FieldRule>,
    pub price: Vec<FieldRule>,
    pub currency: Vec<FieldRule>,
    pub images: Vec<FieldRule>,
    pub label_image: Vec<FieldRule>,
}

impl FieldRules {
    pub fn fields(&self) -> [(&'static str, &[FieldRule]); 11] {
        [
            ("name", self.name.as_slice()),
            ("origin", self.origin.as_slice()),
            ("region", self.region.as_slice()),
            ("variety", self.variety.as_slice()),
            ("processing", self.processing.as_slice()),
            ("roast_level", self.roast_level.as_slice()),
            ("tasting_notes", self.tasting_notes.as_slice()),
            ("price", self.price.as_slice()),
            ("currency", self.currency.as_slice()),
            ("images", self.images.as_slice()),
            ("label_image", self.label_image.as_slice()),
        ]
    }
}

/// How a tasting-notes string is broken into individual notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotesSplit {
    #[default]
    Auto,
    Comma,
    Slash,
    Newline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub id: String,
    pub name: String,
    pub country: String,
    pub site_type: String,
    pub base_url: String,
    #[serde(default = "default_listing_path")]
    pub listing_path: String,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    pub item_url_pattern: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_max_scroll_attempts")]
    pub max_scroll_attempts: usize,
    #[serde(default = "default_page_param")]
    pub page_param: String,
    #[serde(default)]
    pub next_page_selectors: Vec<String>,
    #[serde(default)]
    pub selectors: FieldRules,
    #[serde(default)]
    pub price_pattern: Option<String>,
    #[serde(default)]
    pub notes_split: NotesSplit,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Filled from the catalog group when absent.
    #[serde(default)]
    pub region: Option<String>,
}

fn default_listing_path() -> String {
    "/".to_string()
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    2
}

fn default_max_pages() -> usize {
    10
}

fn default_max_scroll_attempts() -> usize {
    10
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_true() -> bool {
    true
}

impl SiteConfig {
    pub fn family(&self) -> Option<SiteFamily> {
        SiteFamily::parse(&self.site_type)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn listing_url(&self) -> String {
        crate::core::normalize::resolve_url(&self.base_url, &self.listing_path)
            .unwrap_or_else(|| format!("{}{}", self.base_url.trim_end_matches('/'), self.listing_path))
    }

    pub fn validate_site(&self) -> Result<()> {
        validate_non_empty_string("sites.id", &self.id)?;
        validate_non_empty_string(&format!("sites.{}.name", self.id), &self.name)?;
        validate_url(&format!("sites.{}.base_url", self.id), &self.base_url)?;
        validate_regex(
            &format!("sites.{}.item_url_pattern", self.id),
            &self.item_url_pattern,
        )?;
        validate_positive_number(&format!("sites.{}.max_pages", self.id), self.max_pages, 1)?;
        if let Some(pattern) = &self.price_pattern {
            validate_regex(&format!("sites.{}.price_pattern", self.id), pattern)?;
        }
        for selector in &self.next_page_selectors {
            validate_selector(selector)?;
        }
        for (field, rules) in self.selectors.fields() {
            let field = format!("sites.{}.selectors.{}", self.id, field);
            for rule in rules {
                rule.validate(&field)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_site(base_url: &str, site_type: &str) -> SiteConfig {
    SiteConfig {
        id: "test-roastery".to_string(),
        name: "Test Roastery".to_string(),
        country: "KR".to_string(),
        site_type: site_type.to_string(),
        base_url: base_url.to_string(),
        listing_path: "/collections/coffee".to_string(),
        delay_ms: 0,
        max_retries: 0,
        item_url_pattern: r"/products/[^/?#]+$".to_string(),
        max_pages: default_max_pages(),
        max_scroll_attempts: default_max_scroll_attempts(),
        page_param: default_page_param(),
        next_page_selectors: Vec::new(),
        selectors: FieldRules::default(),
        price_pattern: None,
        notes_split: NotesSplit::Auto,
        currency: Some("KRW".to_string()),
        is_active: true,
        region: None,
    }
}
