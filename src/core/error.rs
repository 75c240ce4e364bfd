use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unknown quota specification {0:?}")]
    UnknownQuotaSpec(String),

    #[error("missing usage record for quota specification {0:?}")]
    MissingQuotaUsage(String),

    #[error("invalid {kind} {name:?}: {reason}")]
    InvalidRecord {
        kind: &'static str,
        name: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn invalid(kind: &'static str, name: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::InvalidRecord {
            kind,
            name: name.into(),
            reason: reason.into(),
        }
    }
}
