pub mod adapter;
pub mod client;
pub mod error;
pub mod extract;
pub mod model;
pub mod page;

pub use adapter::{AdapterRegistry, PlatformAdapter};
pub use client::ScoringClient;
pub use error::ScanError;
pub use extract::{ExtractOptions, Extraction, Extractor, IdentityMap};
pub use model::{AnalysisResult, Breakdown, CommentRecord, RiskLevel};
pub use page::{Badge, ElementId, Page, PointerEvent};
