use mongodb::{
    bson,
    error::{ErrorKind, WriteFailure},
};

const DUPLICATE_KEY: i32 = 11000;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures of the entity store. Every variant maps to a stable upper-snake
/// code for clients.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{message}")]
    ReferentialIntegrity { code: &'static str, message: String },
    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{message}")]
    Validation { code: &'static str, message: String },
    #[error("{message}")]
    Duplicate { code: &'static str, message: String },
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] mongodb::error::Error),
    #[error("Cannot encode document: {0}")]
    Serialization(#[from] bson::ser::Error),
    #[error("Cannot decode document: {0}")]
    Deserialization(#[from] bson::de::Error),
    #[error("Cannot allocate an id in `{0}`")]
    IdAllocation(&'static str),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }

    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        StoreError::Validation {
            code,
            message: message.into(),
        }
    }

    /// For `map_err` on writes guarded by a unique index: a duplicate-key
    /// rejection becomes `Duplicate`, anything else stays a storage failure.
    pub fn on_duplicate_key(
        code: &'static str,
        message: impl Into<String>,
    ) -> impl FnOnce(mongodb::error::Error) -> StoreError {
        let message = message.into();
        move |error| {
            if is_duplicate_key(&error) {
                StoreError::Duplicate { code, message }
            } else {
                StoreError::StorageUnavailable(error)
            }
        }
    }

    pub fn code(&self) -> String {
        match self {
            StoreError::ReferentialIntegrity { code, .. }
            | StoreError::Validation { code, .. }
            | StoreError::Duplicate { code, .. } => code.to_string(),
            StoreError::NotFound { entity, .. } => {
                format!("{}_NOT_FOUND", entity.to_uppercase().replace(' ', "_"))
            }
            StoreError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE".to_string(),
            StoreError::Serialization(_) | StoreError::Deserialization(_) => {
                "INVALID_DOCUMENT".to_string()
            }
            StoreError::IdAllocation(_) => "INSERTING_FAILED".to_string(),
        }
    }
}

pub fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(failure)) => failure.code == DUPLICATE_KEY,
        ErrorKind::Command(failure) => failure.code == DUPLICATE_KEY,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_code_is_derived_from_entity() {
        assert_eq!(
            StoreError::not_found("hazard entry", 4).code(),
            "HAZARD_ENTRY_NOT_FOUND"
        );
        assert_eq!(StoreError::not_found("user", 1).code(), "USER_NOT_FOUND");
    }

    #[test]
    fn referential_integrity_keeps_its_message() {
        let error = StoreError::ReferentialIntegrity {
            code: "USER_IS_SUPERVISOR",
            message: "user 3 supervises department `Maintenance`".to_string(),
        };
        assert_eq!(error.code(), "USER_IS_SUPERVISOR");
        assert_eq!(
            error.to_string(),
            "user 3 supervises department `Maintenance`"
        );
    }
}
