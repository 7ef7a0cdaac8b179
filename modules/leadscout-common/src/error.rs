use thiserror::Error;

/// Failures that escape a single record or field.
///
/// A missing card or field is not represented here: extraction misses are
/// absorbed as empty strings and never become errors.
#[derive(Error, Debug)]
pub enum LeadScoutError {
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("Enrichment failed for {url}: {reason}")]
    EnrichmentFailure { url: String, reason: String },

    #[error("Render timed out during {operation}")]
    RenderTimeout { operation: String },

    #[error("Render engine error: {0}")]
    Render(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl LeadScoutError {
    /// Persistence failures abort the run; everything else degrades per record or per batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LeadScoutError::Persistence(_) | LeadScoutError::Config(_))
    }
}
