use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Quota exceeded for partition {partition}: limit is {limit} entries")]
    QuotaExceeded { partition: String, limit: usize },

    #[error("Only GET requests can be cached, got {0}")]
    UnsupportedMethod(String),
}
