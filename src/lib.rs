pub mod config;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod router;
pub mod utils;

pub use config::{Config, ConfigError, Provider};
pub use gateway::{LlmClient, ModelGateway, ProviderError};
pub use handlers::{AnalyzeError, AppState};
pub use models::*;
pub use normalizer::{
    coerce, coerce_value, extract, normalize, unwrap_code_fence, ExtractionFailure,
};
pub use router::build_router;
