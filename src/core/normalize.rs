//! Text and field normalization shared by every strategy.

use crate::config::site::NotesSplit;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\u{00a0}\u{3000}]+").expect("valid whitespace pattern"));

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]]*\]|\([^)]*\)|【[^】]*】|（[^）]*）|<[^>]*>")
        .expect("valid bracket pattern")
});

static DEFAULT_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid price pattern"));

static AUTO_NOTE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,/|·•、;\n]+").expect("valid notes pattern"));

/// Collapses runs of whitespace (line breaks included) into single spaces.
pub fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Product name with bracketed or parenthetical marketing text removed.
///
/// `"[NEW] Ethiopia Guji (200g)"` becomes `"Ethiopia Guji"`. Falls back to the
/// cleaned input when stripping would leave nothing.
pub fn canonical_name(name: &str) -> String {
    let stripped = clean_text(&BRACKETED.replace_all(name, " "));
    let stripped = stripped.trim_matches(|c: char| c == '-' || c == '|' || c.is_whitespace());
    if stripped.is_empty() {
        clean_text(name)
    } else {
        stripped.to_string()
    }
}

/// Resolves relative and protocol-relative references against `base`.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let base = Url::parse(base).ok()?;
    let resolved = if let Some(rest) = href.strip_prefix("//") {
        Url::parse(&format!("{}://{}", base.scheme(), rest)).ok()?
    } else {
        base.join(href).ok()?
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Parses a display price with the site's pattern, dropping thousands separators.
///
/// The first capture group is used when the pattern has one.
pub fn parse_price(text: &str, pattern: Option<&Regex>) -> Option<f64> {
    let pattern = pattern.unwrap_or(&DEFAULT_PRICE);
    let caps = pattern.captures(text)?;
    let raw = caps.get(1).or_else(|| caps.get(0))?.as_str();
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value = digits.parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Splits a tasting-notes string into individual, de-duplicated notes.
pub fn split_notes(text: &str, mode: NotesSplit) -> Vec<String> {
    let parts: Vec<&str> = match mode {
        NotesSplit::Auto => AUTO_NOTE_SEPARATORS.split(text).collect(),
        NotesSplit::Comma => text.split(',').collect(),
        NotesSplit::Slash => text.split('/').collect(),
        NotesSplit::Newline => text.lines().collect(),
    };
    dedupe(parts.into_iter().map(clean_text).filter(|note| !note.is_empty()))
}

/// Keeps the first occurrence of each value (case-insensitive), in order.
pub fn dedupe<I: IntoIterator<Item = String>>(values: I) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.to_lowercase()))
        .collect()
}

/// Title-cases a lexicon hit for storage: `"washed"` -> `"Washed"`.
pub fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
