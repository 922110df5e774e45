use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid base filter: {0}")]
    InvalidBaseFilter(String),
}
