use crate::domain::model::ProductRecord;
use crate::utils::validation::validate_url;

/// Records scoring below this are dropped as not useful enough.
pub const DEFAULT_MIN_SCORE: u8 = 60;

const NAME_POINTS: u8 = 20;
const ORIGIN_POINTS: u8 = 20;
const NOTES_POINTS: u8 = 20;
const LABEL_POINTS: u8 = 20;
const VARIETY_POINTS: u8 = 10;
const PROCESSING_POINTS: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected { reason: String },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Completeness-based accept/reject gate for extracted records.
#[derive(Debug, Clone, Copy)]
pub struct QualityValidator {
    min_score: u8,
}

impl Default for QualityValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SCORE)
    }
}

impl QualityValidator {
    pub fn new(min_score: u8) -> Self {
        Self { min_score }
    }

    pub fn min_score(&self) -> u8 {
        self.min_score
    }

    /// Scores `record` in place, then applies hard requirements and the threshold.
    pub fn validate(&self, record: &mut ProductRecord) -> Verdict {
        record.quality_score = Self::score(record);

        if is_blank(Some(&record.name)) {
            return rejected("missing product name");
        }
        if is_blank(record.origin.as_ref()) {
            return rejected("missing origin");
        }
        if is_blank(Some(&record.site_name)) {
            return rejected("missing source site name");
        }
        if let Err(e) = validate_url("source_url", &record.source_url) {
            return rejected(format!("invalid item URL: {}", e));
        }

        if record.quality_score < self.min_score {
            return rejected(format!(
                "quality score {} below threshold {}",
                record.quality_score, self.min_score
            ));
        }

        Verdict::Accepted
    }

    pub fn score(record: &ProductRecord) -> u8 {
        let mut score = 0;
        if !is_blank(Some(&record.name)) {
            score += NAME_POINTS;
        }
        if !is_blank(record.origin.as_ref()) {
            score += ORIGIN_POINTS;
        }
        if record.tasting_notes.iter().any(|note| !note.trim().is_empty()) {
            score += NOTES_POINTS;
        }
        if !is_blank(record.label_image.as_ref()) {
            score += LABEL_POINTS;
        }
        if !is_blank(record.variety.as_ref()) {
            score += VARIETY_POINTS;
        }
        if !is_blank(record.processing.as_ref()) {
            score += PROCESSING_POINTS;
        }
        score
    }
}

fn is_blank(value: Option<&String>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn rejected(reason: impl Into<String>) -> Verdict {
    Verdict::Rejected {
        reason: reason.into(),
    }
}
