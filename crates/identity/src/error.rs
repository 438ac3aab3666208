use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Failed to reach the token endpoint: {0}")]
    Http(#[from] reqwest::Error),

    #[error("The identity provider rejected the request (HTTP {status}): {body}")]
    Provider { status: u16, body: String },

    #[error("Failed to deserialize the token response: {0}")]
    Malformed(String),
}
