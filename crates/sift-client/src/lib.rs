pub mod fetcher;
pub mod llm;

pub use fetcher::ReqwestFetcher;
pub use llm::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS, OpenAiOracle};
