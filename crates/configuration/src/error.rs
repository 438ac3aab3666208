use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required environment variable `{0}` is not set")]
    MissingVar(&'static str),

    #[error("Environment variable `{0}` is not valid unicode")]
    InvalidVar(&'static str),
}
