use crate::{Event, EventTemplate, PubKey, SecretKey};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("unauthorized by user")]
    Unauthorized,

    #[error("signer unavailable: {0}")]
    Unavailable(String),

    #[error("signing failed: {0}")]
    Failed(String),
}

/// anything that can produce signatures for one identity: a key held in memory,
/// a browser extension bridge, a remote bunker.
///
/// calls may wait on user interaction, callers impose their own timeouts.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn public_key(&self) -> Result<PubKey, SignerError>;

    async fn sign_event(&self, template: EventTemplate) -> Result<Event, SignerError>;
}

#[async_trait]
impl Signer for SecretKey {
    async fn public_key(&self) -> Result<PubKey, SignerError> {
        Ok(self.pubkey())
    }

    async fn sign_event(&self, template: EventTemplate) -> Result<Event, SignerError> {
        Ok(template.finalize(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Kind, Tags, Timestamp};

    #[tokio::test]
    async fn test_secret_key_signer() {
        let sk = SecretKey::generate();
        let signer: &dyn Signer = &sk;

        assert_eq!(signer.public_key().await.unwrap(), sk.pubkey());

        let event = signer
            .sign_event(EventTemplate {
                created_at: Timestamp(3),
                kind: Kind::TEXT_NOTE,
                tags: Tags::default(),
                content: "hi".into(),
            })
            .await
            .unwrap();
        assert_eq!(event.pubkey, sk.pubkey());
        assert!(event.check_id());
        assert!(event.verify_signature());
    }
}
