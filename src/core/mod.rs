pub mod batch;
pub mod extract;
pub mod lexicon;
pub mod normalize;
pub mod orchestrator;
pub mod reconciler;
pub mod robots;
pub mod session_runner;
pub mod validator;

pub use crate::domain::ports::{ExtractionStrategy, PageSession, ProductStore, Storage};
pub use crate::utils::error::Result;
pub use batch::BatchRunner;
pub use orchestrator::Orchestrator;
pub use reconciler::StorageReconciler;
pub use session_runner::CrawlSessionRunner;
pub use validator::QualityValidator;
