use thiserror::Error;

#[derive(Error, Debug)]
pub enum SalesInsightError {
    #[error("Schema error: uploaded table must include {missing}")]
    Schema { missing: String },

    #[error("Unknown dimension '{0}': expected one of category, product, age_group, country, payment_mode, month")]
    InvalidDimension(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SalesInsightError>;
