use thiserror::Error;

use crate::database::engine::EngineError;
use crate::database::manager::DatabaseError;
use crate::filter::FilterError;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0} is not in context")]
    MissingContext(&'static str),

    #[error("document with id {0} already exists")]
    DuplicateKey(String),

    #[error("group is empty")]
    EmptyGroup,

    #[error("unknown aggregation template {0}")]
    UnknownTemplate(String),

    #[error("aggregation template argument {0} is missing")]
    TemplateArgument(&'static str),

    #[error("no cached document registered for key {0}")]
    UnknownCachedDocument(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Store(DatabaseError),

    #[error("{} errors occurred: {}", .0.len(), join_errors(.0))]
    Aggregated(Vec<DbError>),
}

impl From<DatabaseError> for DbError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::DuplicateKey(id) => DbError::DuplicateKey(id),
            other => DbError::Store(other),
        }
    }
}

impl From<EngineError> for DbError {
    fn from(err: EngineError) -> Self {
        DbError::Store(DatabaseError::Engine(err))
    }
}

impl From<tokio::task::JoinError> for DbError {
    fn from(err: tokio::task::JoinError) -> Self {
        DbError::Task(err.to_string())
    }
}

fn join_errors(errors: &[DbError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl DbError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, DbError::DuplicateKey(_))
    }

    pub fn is_no_fields_to_update(&self) -> bool {
        matches!(self, DbError::Filter(FilterError::NoFieldsToUpdate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_keys_are_lifted_from_the_store() {
        let err: DbError = DatabaseError::DuplicateKey("g1".to_string()).into();
        assert!(err.is_duplicate_key());
    }

    #[test]
    fn aggregated_message_lists_every_error() {
        let err = DbError::Aggregated(vec![
            DbError::MissingContext("collection"),
            DbError::EmptyGroup,
        ]);
        assert_eq!(
            err.to_string(),
            "2 errors occurred: collection is not in context; group is empty"
        );
    }
}
