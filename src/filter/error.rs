use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("no fields to update")]
    NoFieldsToUpdate,

    #[error("update document must be a JSON object")]
    InvalidDocument,

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}
