//! Ordered fallback chains and the product parser built on them.
//!
//! Every field is extracted by a chain of rules: the site's configured rules
//! first, then the strategy's structured-data rules, then generic defaults.
//! The first rule producing a plausible value wins, so no single selector is
//! load-bearing when a site changes its markup.

use crate::config::site::{FieldRule, FieldRules, NotesSplit, SiteConfig};
use crate::core::lexicon;
use crate::core::normalize::{
    canonical_name, clean_text, dedupe, parse_price, resolve_url, split_notes,
};
use crate::domain::model::ProductRecord;
use crate::domain::page::{element_text, visible_text, Page};
use crate::utils::error::{CrawlerError, Result};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

const MAX_NOTES: usize = 12;

/// A parsed page plus the derived views rules run against.
pub struct PageContext {
    document: Html,
    text: String,
    json_ld: Vec<Value>,
}

impl PageContext {
    pub fn new(page: &Page) -> Self {
        let document = page.document();
        let text = visible_text(&document);
        let json_ld = json_ld_products(&document);
        Self {
            document,
            text,
            json_ld,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug)]
enum CompiledRule {
    Css {
        selector: Selector,
        attr: Option<String>,
    },
    Meta {
        selector: Selector,
    },
    JsonLd {
        path: Vec<String>,
    },
    Regex {
        pattern: Regex,
    },
    Title,
}

fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| CrawlerError::SelectorError {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

impl CompiledRule {
    fn compile(rule: &FieldRule) -> Result<Option<Self>> {
        let compiled = match rule {
            FieldRule::Css { css, attr } => Self::Css {
                selector: compile_selector(css)?,
                attr: attr.clone(),
            },
            FieldRule::Meta { meta } => Self::Meta {
                selector: compile_selector(&format!(
                    r#"meta[property="{0}"], meta[name="{0}"], meta[itemprop="{0}"]"#,
                    meta
                ))?,
            },
            FieldRule::JsonLd { json_ld } => Self::JsonLd {
                path: json_ld.split('.').map(str::to_string).collect(),
            },
            FieldRule::Regex { regex } => Self::Regex {
                pattern: Regex::new(regex).map_err(|e| CrawlerError::InvalidConfigValueError {
                    field: "selectors.regex".to_string(),
                    value: regex.clone(),
                    reason: e.to_string(),
                })?,
            },
            FieldRule::Title { title: true } => Self::Title,
            FieldRule::Title { title: false } => return Ok(None),
        };
        Ok(Some(compiled))
    }

    fn values(&self, ctx: &PageContext) -> Vec<String> {
        let raw: Vec<String> = match self {
            Self::Css { selector, attr } => match attr {
                Some(attr) => ctx
                    .document
                    .select(selector)
                    .filter_map(|el| el.value().attr(attr))
                    .map(str::to_string)
                    .collect(),
                None => ctx.document.select(selector).map(element_text).collect(),
            },
            Self::Meta { selector } => ctx
                .document
                .select(selector)
                .filter_map(|el| el.value().attr("content"))
                .map(str::to_string)
                .collect(),
            Self::JsonLd { path } => ctx
                .json_ld
                .iter()
                .flat_map(|product| json_path_values(product, path))
                .collect(),
            Self::Regex { pattern } => pattern
                .captures_iter(&ctx.text)
                .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
                .map(|m| m.as_str().to_string())
                .collect(),
            Self::Title => {
                let Ok(selector) = Selector::parse("title") else {
                    return Vec::new();
                };
                ctx.document
                    .select(&selector)
                    .map(element_text)
                    .take(1)
                    .collect()
            }
        };

        raw.iter()
            .map(|value| clean_text(value))
            .filter(|value| !value.is_empty())
            .collect()
    }
}

/// An ordered list of rules for one field.
#[derive(Debug, Default)]
pub struct FieldChain {
    rules: Vec<CompiledRule>,
}

impl FieldChain {
    pub fn compile<'a, I>(rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a FieldRule>,
    {
        let mut compiled = Vec::new();
        for rule in rules {
            if let Some(rule) = CompiledRule::compile(rule)? {
                compiled.push(rule);
            }
        }
        Ok(Self { rules: compiled })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First value accepted by `plausible`, trying rules in order.
    pub fn first(&self, ctx: &PageContext, plausible: impl Fn(&str) -> bool) -> Option<String> {
        self.first_map(ctx, |value| plausible(value).then(|| value.to_string()))
    }

    /// First value `convert` accepts, trying rules in order.
    pub fn first_map<T>(&self, ctx: &PageContext, convert: impl Fn(&str) -> Option<T>) -> Option<T> {
        self.rules
            .iter()
            .flat_map(|rule| rule.values(ctx))
            .find_map(|value| convert(&value))
    }

    /// Converted values of the first rule whose values convert to anything.
    /// A rule whose text is all unusable falls through to the next one.
    pub fn values_where<T>(&self, ctx: &PageContext, convert: impl Fn(&str) -> Vec<T>) -> Vec<T> {
        self.rules
            .iter()
            .map(|rule| {
                rule.values(ctx)
                    .iter()
                    .flat_map(|value| convert(value.as_str()))
                    .collect::<Vec<T>>()
            })
            .find(|values| !values.is_empty())
            .unwrap_or_default()
    }
}

/// Generic rules appended to every chain.
pub fn generic_rules() -> FieldRules {
    FieldRules {
        name: vec![
            FieldRule::css("h1"),
            FieldRule::meta("og:title"),
            FieldRule::title(),
        ],
        origin: vec![FieldRule::regex(
            r"(?i)(?:origin|country|원산지|생산국|산지)\s*[:：]\s*([^\n|/]{2,40})",
        )],
        region: vec![FieldRule::regex(
            r"(?i)(?:region|지역)\s*[:：]\s*([^\n|]{2,60})",
        )],
        variety: vec![FieldRule::regex(
            r"(?i)(?:variet(?:y|ies|al)|품종)\s*[:：]\s*([^\n|]{2,60})",
        )],
        processing: vec![FieldRule::regex(
            r"(?i)(?:process(?:ing)?(?: method)?|가공(?:\s*방식)?|프로세스)\s*[:：]\s*([^\n|]{2,40})",
        )],
        roast_level: vec![FieldRule::regex(
            r"(?i)(?:roast(?:ing)?(?: level)?|로스팅(?:\s*포인트)?|배전도)\s*[:：]\s*([^\n|]{2,30})",
        )],
        tasting_notes: vec![
            FieldRule::css(".tasting-notes li"),
            FieldRule::regex(
                r"(?i)(?:tasting notes?|cup(?:ping)? notes?|flavou?r notes?|컵\s*노트|테이스팅\s*노트|향미)\s*[:：]\s*([^\n]{2,160})",
            ),
        ],
        price: vec![
            FieldRule::meta("product:price:amount"),
            FieldRule::css_attr("[itemprop=price]", "content"),
            FieldRule::css(".price"),
        ],
        currency: vec![
            FieldRule::meta("product:price:currency"),
            FieldRule::css_attr("[itemprop=priceCurrency]", "content"),
        ],
        images: vec![
            FieldRule::meta("og:image"),
            FieldRule::css_attr("img", "src"),
        ],
        label_image: vec![FieldRule::css_attr(r#"img[src*="label"]"#, "src")],
    }
}

/// Rules over a page's JSON-LD `Product` object.
pub fn json_ld_rules() -> FieldRules {
    FieldRules {
        name: vec![FieldRule::json_ld("name")],
        price: vec![FieldRule::json_ld("offers.price")],
        currency: vec![FieldRule::json_ld("offers.priceCurrency")],
        images: vec![FieldRule::json_ld("image")],
        ..FieldRules::default()
    }
}

/// Rules over OpenGraph and product meta tags.
pub fn meta_rules() -> FieldRules {
    FieldRules {
        name: vec![FieldRule::meta("og:title")],
        price: vec![FieldRule::meta("product:price:amount")],
        currency: vec![FieldRule::meta("product:price:currency")],
        images: vec![FieldRule::meta("og:image")],
        ..FieldRules::default()
    }
}

struct ChainSet {
    name: FieldChain,
    origin: FieldChain,
    region: FieldChain,
    variety: FieldChain,
    processing: FieldChain,
    roast_level: FieldChain,
    tasting_notes: FieldChain,
    price: FieldChain,
    currency: FieldChain,
    images: FieldChain,
    label_image: FieldChain,
}

impl ChainSet {
    fn compile(layers: &[&FieldRules]) -> Result<Self> {
        fn chain<'a>(
            layers: &[&'a FieldRules],
            field: impl Fn(&'a FieldRules) -> &'a Vec<FieldRule>,
        ) -> Result<FieldChain> {
            FieldChain::compile(layers.iter().flat_map(|layer| field(*layer).iter()))
        }

        Ok(Self {
            name: chain(layers, |r| &r.name)?,
            origin: chain(layers, |r| &r.origin)?,
            region: chain(layers, |r| &r.region)?,
            variety: chain(layers, |r| &r.variety)?,
            processing: chain(layers, |r| &r.processing)?,
            roast_level: chain(layers, |r| &r.roast_level)?,
            tasting_notes: chain(layers, |r| &r.tasting_notes)?,
            price: chain(layers, |r| &r.price)?,
            currency: chain(layers, |r| &r.currency)?,
            images: chain(layers, |r| &r.images)?,
            label_image: chain(layers, |r| &r.label_image)?,
        })
    }
}

/// Turns an item page into a [`ProductRecord`] for one site.
pub struct ProductParser {
    site_id: String,
    site_name: String,
    base_url: String,
    chains: ChainSet,
    price_pattern: Option<Regex>,
    notes_split: NotesSplit,
    default_currency: Option<String>,
}

impl ProductParser {
    /// `strategy_rules` sit between the site's own rules and the generic defaults.
    pub fn new(site: &SiteConfig, strategy_rules: &[FieldRules]) -> Result<Self> {
        let generic = generic_rules();
        let mut layers: Vec<&FieldRules> = vec![&site.selectors];
        layers.extend(strategy_rules.iter());
        layers.push(&generic);

        let price_pattern = site
            .price_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| CrawlerError::InvalidConfigValueError {
                field: format!("sites.{}.price_pattern", site.id),
                value: site.price_pattern.clone().unwrap_or_default(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            site_id: site.id.clone(),
            site_name: site.name.clone(),
            base_url: site.base_url.clone(),
            chains: ChainSet::compile(&layers)?,
            price_pattern,
            notes_split: site.notes_split,
            default_currency: site.currency.clone(),
        })
    }

    /// `None` when no plausible product name can be found.
    pub fn parse(&self, source_url: &str, page: &Page) -> Option<ProductRecord> {
        let ctx = PageContext::new(page);

        let raw_name = self.chains.name.first(&ctx, plausible_name)?;
        let raw_name = raw_name.split(" | ").next().unwrap_or(&raw_name).to_string();
        let name = canonical_name(&raw_name);

        let mut record = ProductRecord::new(source_url, &self.site_id, &self.site_name, name);

        record.origin = self
            .chains
            .origin
            .first(&ctx, plausible_field)
            .map(|value| canonicalize(&value, lexicon::detect_origin))
            .or_else(|| lexicon::detect_origin(&raw_name).map(str::to_string))
            .or_else(|| lexicon::detect_origin(ctx.text()).map(str::to_string));

        record.region = self.chains.region.first(&ctx, plausible_field);

        record.variety = self
            .chains
            .variety
            .first(&ctx, plausible_field)
            .or_else(|| lexicon::detect_variety(&raw_name).map(str::to_string));

        record.processing = self
            .chains
            .processing
            .first(&ctx, plausible_field)
            .map(|value| canonicalize(&value, lexicon::detect_process))
            .or_else(|| lexicon::detect_process(&raw_name).map(str::to_string));

        record.roast_level = self
            .chains
            .roast_level
            .first(&ctx, plausible_field)
            .map(|value| canonicalize(&value, lexicon::detect_roast_level))
            .or_else(|| lexicon::detect_roast_level(&raw_name).map(str::to_string));

        let notes = self
            .chains
            .tasting_notes
            .values_where(&ctx, |value| self.usable_notes(value));
        record.tasting_notes = dedupe(notes).into_iter().take(MAX_NOTES).collect();

        record.price = self
            .chains
            .price
            .first_map(&ctx, |value| parse_price(value, self.price_pattern.as_ref()));

        record.currency = self
            .chains
            .currency
            .first(&ctx, |value| {
                value.len() == 3 && value.chars().all(|c| c.is_ascii_alphabetic())
            })
            .map(|value| value.to_ascii_uppercase())
            .or_else(|| self.default_currency.clone());

        record.image_urls = dedupe(
            self.chains
                .images
                .values_where(&ctx, |href| resolve_url(&self.base_url, href).into_iter().collect()),
        );

        record.label_image = self
            .chains
            .label_image
            .first_map(&ctx, |href| resolve_url(&self.base_url, href))
            .or_else(|| record.image_urls.first().cloned());

        Some(record)
    }

    /// Notes in one extracted value, or nothing when any piece is prose.
    fn usable_notes(&self, value: &str) -> Vec<String> {
        let notes = split_notes(value, self.notes_split);
        if notes.iter().all(|note| plausible_field(note)) {
            notes
        } else {
            Vec::new()
        }
    }
}

/// Maps a free-text value onto the lexicon when it names a known term.
fn canonicalize(value: &str, detect: fn(&str) -> Option<&'static str>) -> String {
    detect(value)
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

fn plausible_name(value: &str) -> bool {
    let len = value.chars().count();
    (2..=200).contains(&len) && value.chars().any(char::is_alphanumeric)
}

fn plausible_field(value: &str) -> bool {
    let len = value.chars().count();
    (1..=80).contains(&len) && value.chars().any(char::is_alphanumeric)
}

/// Every `Product`-typed object in the page's JSON-LD blocks.
fn json_ld_products(document: &Html) -> Vec<Value> {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    let mut products = Vec::new();
    for script in document.select(&selector) {
        let source = script.text().collect::<String>();
        if let Ok(value) = serde_json::from_str::<Value>(&source) {
            collect_products(value, &mut products);
        }
    }
    products
}

fn collect_products(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|item| collect_products(item, out)),
        Value::Object(mut map) => {
            let graph = map.remove("@graph");
            let is_product = match map.get("@type") {
                Some(Value::String(kind)) => kind == "Product" || kind == "ProductGroup",
                Some(Value::Array(kinds)) => kinds.iter().any(|k| k == "Product"),
                _ => false,
            };
            if is_product {
                out.push(Value::Object(map));
            }
            if let Some(graph) = graph {
                collect_products(graph, out);
            }
        }
        _ => {}
    }
}

/// Leaf values at a dotted path, flattening arrays along the way.
fn json_path_values(value: &Value, path: &[String]) -> Vec<String> {
    let Some((head, rest)) = path.split_first() else {
        return json_leaf_values(value);
    };
    match value {
        Value::Array(items) => items
            .iter()
            .flat_map(|item| json_path_values(item, path))
            .collect(),
        Value::Object(map) => map
            .get(head)
            .map(|child| json_path_values(child, rest))
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn json_leaf_values(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Array(items) => items.iter().flat_map(json_leaf_values).collect(),
        Value::Object(map) => ["url", "contentUrl", "name"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(|s| vec![s.to_string()])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::site::test_site;

    const DETAIL: &str = r#"<html><head>
        <title>[NEW] Ethiopia Guji Hambela (200g) | Test Roastery</title>
        <meta property="og:image" content="//cdn.roastery.example/guji-og.jpg">
        <script type="application/ld+json">
        {"@context":"https://schema.org","@graph":[
          {"@type":"BreadcrumbList"},
          {"@type":"Product","name":"Guji Hambela Natural",
           "image":["/img/guji-1.jpg",{"url":"/img/guji-2.jpg"}],
           "offers":{"@type":"Offer","price":"21000","priceCurrency":"krw"}}]}
        </script></head>
        <body>
          <div class="info">
            <p>원산지: 에티오피아</p>
            <p>Variety: 74110, 74112</p>
            <p>Process: Natural</p>
            <p>Cup notes: Blueberry, Jasmine / Honey</p>
          </div>
          <span class="price">18,000원</span>
          <img src="/img/label-guji.png">
        </body></html>"#;

    fn parse_with(rules: &[FieldRules]) -> ProductRecord {
        let site = test_site("https://roastery.example", "paginated");
        let parser = ProductParser::new(&site, rules).unwrap();
        let page = Page::new("https://roastery.example/products/guji", 200, DETAIL);
        parser
            .parse("https://roastery.example/products/guji", &page)
            .unwrap()
    }

    #[test]
    fn test_generic_chain_falls_back_to_title() {
        let record = parse_with(&[]);

        assert_eq!(record.name, "Ethiopia Guji Hambela");
        assert_eq!(record.origin.as_deref(), Some("Ethiopia"));
        assert_eq!(record.variety.as_deref(), Some("74110, 74112"));
        assert_eq!(record.processing.as_deref(), Some("Natural"));
        assert_eq!(record.tasting_notes, vec!["Blueberry", "Jasmine", "Honey"]);
        assert_eq!(record.price, Some(18000.0));
        assert_eq!(record.currency.as_deref(), Some("KRW"));
        assert_eq!(record.image_urls, vec!["https://cdn.roastery.example/guji-og.jpg"]);
        assert_eq!(
            record.label_image.as_deref(),
            Some("https://roastery.example/img/label-guji.png")
        );
    }

    #[test]
    fn test_json_ld_layer_wins_over_generic_rules() {
        let record = parse_with(&[json_ld_rules()]);

        assert_eq!(record.name, "Guji Hambela Natural");
        assert_eq!(record.price, Some(21000.0));
        assert_eq!(record.currency.as_deref(), Some("KRW"));
        assert_eq!(
            record.image_urls,
            vec![
                "https://roastery.example/img/guji-1.jpg",
                "https://roastery.example/img/guji-2.jpg"
            ]
        );
    }

    #[test]
    fn test_site_rules_come_first() {
        let mut site = test_site("https://roastery.example", "paginated");
        site.selectors.name = vec![FieldRule::css(".missing"), FieldRule::css(".info p")];
        let parser = ProductParser::new(&site, &[json_ld_rules()]).unwrap();
        let page = Page::new("https://roastery.example/products/guji", 200, DETAIL);

        let record = parser.parse("https://roastery.example/products/guji", &page).unwrap();
        assert_eq!(record.name, "원산지: 에티오피아");
    }

    #[test]
    fn test_page_without_name_is_absent() {
        let site = test_site("https://roastery.example", "paginated");
        let parser = ProductParser::new(&site, &[]).unwrap();
        let page = Page::new("https://roastery.example/404", 200, "<html><body></body></html>");
        assert!(parser.parse("https://roastery.example/404", &page).is_none());
    }

    #[test]
    fn test_origin_detected_from_name_when_unlabelled() {
        let site = test_site("https://roastery.example", "paginated");
        let parser = ProductParser::new(&site, &[]).unwrap();
        let page = Page::new(
            "https://roastery.example/products/kenya",
            200,
            "<html><body><h1>Kenya Kiambu AA Washed</h1></body></html>",
        );

        let record = parser.parse("https://roastery.example/products/kenya", &page).unwrap();
        assert_eq!(record.origin.as_deref(), Some("Kenya"));
        assert_eq!(record.processing.as_deref(), Some("Washed"));
        assert!(record.label_image.is_none());
    }

    #[test]
    fn test_chain_values_uses_first_usable_rule() {
        let rules = [
            FieldRule::css(".nothing"),
            FieldRule::css(".price"),
            FieldRule::css(".info p"),
        ];
        let chain = FieldChain::compile(rules.iter()).unwrap();
        let ctx = PageContext::new(&Page::new("https://r.example/", 200, DETAIL));
        assert_eq!(chain.len(), 3);

        let labelled = chain.values_where(&ctx, |value| {
            value.contains(':').then(|| value.to_string()).into_iter().collect()
        });
        assert_eq!(labelled.len(), 4);
    }

    const SOLD_OUT: &str = r#"<html><head>
        <meta property="product:price:amount" content="18000">
        <meta property="og:image" content="/img/colombia-og.jpg">
        </head><body>
          <h1>Colombia Huila Pink Bourbon</h1>
          <span class="price"><strong>Sold out</strong></span>
          <p class="notes">A juicy and layered cup that opens with dark fruit and settles into a long savoury finish today</p>
          <p>Tasting notes: Blackcurrant, Tomato, Grapefruit</p>
          <img class="hero" src="javascript:void(0)">
          <a class="label" href="mailto:shop@roastery.example">label</a>
        </body></html>"#;

    fn parse_sold_out(site: &SiteConfig) -> ProductRecord {
        let parser = ProductParser::new(site, &[]).unwrap();
        let page = Page::new("https://roastery.example/products/huila", 200, SOLD_OUT);
        parser
            .parse("https://roastery.example/products/huila", &page)
            .unwrap()
    }

    #[test]
    fn test_unparseable_price_falls_through_to_meta() {
        let mut site = test_site("https://roastery.example", "paginated");
        site.selectors.price = vec![FieldRule::css(".price strong")];

        assert_eq!(parse_sold_out(&site).price, Some(18000.0));
    }

    #[test]
    fn test_prose_notes_fall_through_to_labelled_notes() {
        let mut site = test_site("https://roastery.example", "paginated");
        site.selectors.tasting_notes = vec![FieldRule::css(".notes")];

        assert_eq!(
            parse_sold_out(&site).tasting_notes,
            vec!["Blackcurrant", "Tomato", "Grapefruit"]
        );
    }

    #[test]
    fn test_unresolvable_images_fall_through() {
        let mut site = test_site("https://roastery.example", "paginated");
        site.selectors.images = vec![FieldRule::css_attr("img.hero", "src")];
        site.selectors.label_image = vec![FieldRule::css_attr("a.label", "href")];

        let record = parse_sold_out(&site);
        assert_eq!(
            record.image_urls,
            vec!["https://roastery.example/img/colombia-og.jpg"]
        );
        assert_eq!(
            record.label_image.as_deref(),
            Some("https://roastery.example/img/colombia-og.jpg")
        );
    }
}
