//! Analysis services

pub mod analyzer;
pub mod llm;
pub mod web_search;

pub use analyzer::{AnalysisError, AnalysisReport, Analyzer};
pub use llm::{LlmBackend, LlmError, Prediction};
pub use web_search::{SearchError, SearchHit, SearchProvider};
