use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("{0} is not supported")]
    NotSupported(&'static str),
    #[error("invalid configuration: {0}")]
    Config(String),
}
