pub mod azul;
pub mod stripe;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("missing or empty field: {0}")]
    MissingField(&'static str),

    #[error("malformed signature header: {0}")]
    MalformedSignature(String),

    #[error("billing provider error: {0}")]
    Provider(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
