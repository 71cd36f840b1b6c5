use crate::{
    nip19::{DecodeError, IdentifierError},
    pool::{PoolError, PublishReport},
    review::ValidationError,
    signer::SignerError,
};
use std::time::Duration;
use thiserror::Error;

/// failures surfaced by the resolver, the repository and the session
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("relays didn't answer within {0:?}")]
    RelayTimeout(Duration),

    #[error("no relay could be reached")]
    RelayUnavailable,

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("event signature is invalid")]
    SignatureInvalid,

    #[error("publish failed, {0}")]
    PublishFailed(PublishReport),

    #[error("no signing capability available")]
    SigningUnavailable,

    #[error("signer error: {0}")]
    Signer(#[from] SignerError),
}

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Timeout(timeout) => Error::RelayTimeout(timeout),
            PoolError::Unavailable => Error::RelayUnavailable,
            PoolError::PublishFailed(report) => Error::PublishFailed(report),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_map_to_taxonomy() {
        assert!(matches!(
            Error::from(PoolError::Timeout(Duration::from_secs(1))),
            Error::RelayTimeout(_)
        ));
        assert!(matches!(
            Error::from(PoolError::Unavailable),
            Error::RelayUnavailable
        ));
        let err = Error::from(PoolError::PublishFailed(PublishReport::default()));
        assert_eq!(
            err.to_string(),
            "publish failed, accepted by 0/0 relays (0 rejected, 0 unreachable)"
        );
    }

    #[test]
    fn test_validation_message_is_readable() {
        let err = Error::from(ValidationError::RatingOutOfRange(6));
        assert_eq!(err.to_string(), "rating must be between 1 and 5 stars, got 6");
    }
}
