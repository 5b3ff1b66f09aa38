use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlerError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Session error for site {site}: {message}")]
    SessionError { site: String, message: String },

    #[error("Unexpected HTTP status {status} for {url}")]
    HttpStatusError { url: String, status: u16 },

    #[error("Extraction failed for {url}: {message}")]
    ExtractionError { url: String, message: String },

    #[error("Invalid selector '{selector}': {message}")]
    SelectorError { selector: String, message: String },

    #[error("Store unavailable: {message}")]
    StoreUnavailableError { message: String },

    #[error("Failed to persist {source_url}: {message}")]
    PersistenceError { source_url: String, message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Session,
    Item,
    Persistence,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CrawlerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn extraction(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExtractionError {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::SelectorError { .. } => ErrorCategory::Configuration,
            Self::SessionError { .. } => ErrorCategory::Session,
            Self::HttpError(_)
            | Self::HttpStatusError { .. }
            | Self::UrlError(_)
            | Self::ExtractionError { .. }
            | Self::ValidationError { .. } => ErrorCategory::Item,
            Self::DatabaseError(_)
            | Self::StoreUnavailableError { .. }
            | Self::PersistenceError { .. } => ErrorCategory::Persistence,
            Self::IoError(_) | Self::SerializationError(_) => ErrorCategory::Io,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::Critical,
            ErrorCategory::Io => ErrorSeverity::High,
            ErrorCategory::Session | ErrorCategory::Persistence => ErrorSeverity::Medium,
            ErrorCategory::Item => ErrorSeverity::Low,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => {
                "Check the site catalog file for typos and missing fields"
            }
            Self::SelectorError { .. } => "Fix the CSS selector in the site's field rules",
            Self::SessionError { .. } => "Check network connectivity and the HTTP client settings",
            Self::HttpError(_) | Self::HttpStatusError { .. } => {
                "The site may be blocking automated clients; increase delay_ms or retry later"
            }
            Self::ExtractionError { .. } | Self::ValidationError { .. } | Self::UrlError(_) => {
                "The page markup may have changed; review the site's field rules"
            }
            Self::DatabaseError(_)
            | Self::StoreUnavailableError { .. }
            | Self::PersistenceError { .. } => {
                "Check the store database_url; crawl output remains in the local snapshot"
            }
            Self::IoError(_) => "Check that the output directory exists and is writable",
            Self::SerializationError(_) => "The JSON artifact may be corrupt; remove it and re-run",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Site catalog problem: {}", self),
            ErrorCategory::Session => format!("Could not open a crawl session: {}", self),
            ErrorCategory::Item => format!("A page could not be processed: {}", self),
            ErrorCategory::Persistence => format!("Storage problem: {}", self),
            ErrorCategory::Io => format!("File system problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlerError>;
