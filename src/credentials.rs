//! the cached login: which key is active and how we can sign for it

use crate::{
    error::Error,
    nip19,
    signer::{Signer, SignerError},
    EventTemplate, Kind, PubKey, SecretKey, Tags, Timestamp,
};
use dashmap::DashMap;
use std::{fmt, str::FromStr, sync::Arc};
use thiserror::Error;

pub const PUBKEY_KEY: &str = "thunderproof_pubkey";
pub const PRIVKEY_KEY: &str = "thunderproof_privkey";
pub const LOGIN_METHOD_KEY: &str = "thunderproof_login_method";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential store error: {0}")]
    Store(String),

    #[error("invalid secret key: {0}")]
    InvalidKey(String),

    #[error("signer reported {reported} but {expected} was expected")]
    KeyMismatch { expected: PubKey, reported: PubKey },

    #[error("signer error: {0}")]
    Signer(#[from] SignerError),
}

/// an opaque string key-value cache, whatever the medium
pub trait CredentialStore: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError>;
    fn remove(&self, key: &str) -> Result<(), CredentialError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore(DashMap<String, String>);

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.0.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.0.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CredentialError> {
        self.0.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    Extension,
    Nsec,
    Generated,
}

impl LoginMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginMethod::Extension => "extension",
            LoginMethod::Nsec => "nsec",
            LoginMethod::Generated => "generated",
        }
    }
}

impl FromStr for LoginMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extension" => Ok(LoginMethod::Extension),
            "nsec" => Ok(LoginMethod::Nsec),
            "generated" => Ok(LoginMethod::Generated),
            _ => Err(()),
        }
    }
}

impl fmt::Display for LoginMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// the identity currently logged in
#[derive(Clone)]
pub struct SessionIdentity {
    pub pubkey: PubKey,
    pub npub: String,
    pub method: LoginMethod,
    signer: Arc<dyn Signer>,
}

impl fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("npub", &self.npub)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// at most one active identity, mirrored into a [`CredentialStore`]
#[derive(Debug)]
pub struct Session {
    store: Arc<dyn CredentialStore>,
    identity: Option<SessionIdentity>,
}

impl Session {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            identity: None,
        }
    }

    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.identity.as_ref()
    }

    /// the signer of the active identity
    pub fn signer(&self) -> Result<Arc<dyn Signer>, Error> {
        self.identity
            .as_ref()
            .map(|identity| identity.signer.clone())
            .ok_or(Error::SigningUnavailable)
    }

    /// log in through an external signer, which must be able to sign a test note
    pub async fn login_with_extension(
        &mut self,
        extension: Arc<dyn Signer>,
    ) -> Result<&SessionIdentity, CredentialError> {
        let pubkey = check_extension(extension.as_ref()).await?;

        self.store.set(PUBKEY_KEY, &pubkey.to_hex())?;
        self.store.set(LOGIN_METHOD_KEY, LoginMethod::Extension.as_str())?;
        self.store.remove(PRIVKEY_KEY)?;

        Ok(self.activate(pubkey, LoginMethod::Extension, extension))
    }

    pub fn login_with_nsec(&mut self, nsec: &str) -> Result<&SessionIdentity, CredentialError> {
        let secret_key = nip19::decode_nsec(nsec.trim())
            .map_err(|err| CredentialError::InvalidKey(err.to_string()))?;
        self.login_local(secret_key, LoginMethod::Nsec)
    }

    /// keep a key that was made elsewhere, e.g. by an onboarding flow
    pub fn remember_generated(
        &mut self,
        secret_key: SecretKey,
    ) -> Result<&SessionIdentity, CredentialError> {
        self.login_local(secret_key, LoginMethod::Generated)
    }

    fn login_local(
        &mut self,
        secret_key: SecretKey,
        method: LoginMethod,
    ) -> Result<&SessionIdentity, CredentialError> {
        let pubkey = secret_key.pubkey();

        self.store.set(PUBKEY_KEY, &pubkey.to_hex())?;
        self.store.set(PRIVKEY_KEY, &nip19::encode_nsec(&secret_key))?;
        self.store.set(LOGIN_METHOD_KEY, method.as_str())?;

        Ok(self.activate(pubkey, method, Arc::new(secret_key)))
    }

    pub fn logout(&mut self) -> Result<(), CredentialError> {
        self.identity = None;
        self.store.remove(PUBKEY_KEY)?;
        self.store.remove(PRIVKEY_KEY)?;
        self.store.remove(LOGIN_METHOD_KEY)?;
        Ok(())
    }

    /// bring back whatever identity the store remembers.
    ///
    /// a cache that can't be turned back into a working identity is wiped and
    /// `None` is returned; only store failures are errors.
    pub async fn restore(
        &mut self,
        extension: Option<Arc<dyn Signer>>,
    ) -> Result<Option<&SessionIdentity>, CredentialError> {
        let Some(pubkey_hex) = self.store.get(PUBKEY_KEY)? else {
            return Ok(None);
        };
        let method = self.store.get(LOGIN_METHOD_KEY)?;

        match self.restore_identity(&pubkey_hex, method.as_deref(), extension).await {
            Ok((pubkey, method, signer)) => Ok(Some(self.activate(pubkey, method, signer))),
            Err(reason) => {
                log::warn!("discarding cached login: {}", reason);
                self.logout()?;
                Ok(None)
            }
        }
    }

    async fn restore_identity(
        &self,
        pubkey_hex: &str,
        method: Option<&str>,
        extension: Option<Arc<dyn Signer>>,
    ) -> Result<(PubKey, LoginMethod, Arc<dyn Signer>), String> {
        let pubkey = PubKey::from_hex(pubkey_hex).map_err(|err| err.to_string())?;
        let method = method
            .and_then(|m| m.parse::<LoginMethod>().ok())
            .ok_or("unknown login method")?;

        match method {
            LoginMethod::Extension => {
                let extension = extension.ok_or("extension is not available")?;
                let reported = extension.public_key().await.map_err(|err| err.to_string())?;
                if reported != pubkey {
                    return Err(CredentialError::KeyMismatch {
                        expected: pubkey,
                        reported,
                    }
                    .to_string());
                }
                Ok((pubkey, method, extension))
            }
            LoginMethod::Nsec | LoginMethod::Generated => {
                let stored = self
                    .store
                    .get(PRIVKEY_KEY)
                    .map_err(|err| err.to_string())?
                    .ok_or("secret key is missing")?;
                let secret_key = decode_secret(&stored)?;
                if secret_key.pubkey() != pubkey {
                    return Err("secret key doesn't match the stored public key".into());
                }
                let signer: Arc<dyn Signer> = Arc::new(secret_key);
                Ok((pubkey, method, signer))
            }
        }
    }

    fn activate(
        &mut self,
        pubkey: PubKey,
        method: LoginMethod,
        signer: Arc<dyn Signer>,
    ) -> &SessionIdentity {
        log::info!("logged in as {} via {}", pubkey, method);
        self.identity.insert(SessionIdentity {
            pubkey,
            npub: pubkey.to_npub(),
            method,
            signer,
        })
    }
}

/// older caches kept the key as hex
fn decode_secret(stored: &str) -> Result<SecretKey, String> {
    if stored.starts_with("nsec1") {
        nip19::decode_nsec(stored).map_err(|err| err.to_string())
    } else {
        SecretKey::from_hex(stored).map_err(|err| err.to_string())
    }
}

async fn check_extension(extension: &dyn Signer) -> Result<PubKey, CredentialError> {
    let pubkey = extension.public_key().await?;

    let probe = EventTemplate {
        created_at: Timestamp::now(),
        kind: Kind::TEXT_NOTE,
        tags: Tags::default(),
        content: "thunderproof login".into(),
    };
    let signed = extension.sign_event(probe).await?;
    if signed.pubkey != pubkey {
        return Err(CredentialError::KeyMismatch {
            expected: pubkey,
            reported: signed.pubkey,
        });
    }
    if !signed.verify_signature() {
        return Err(CredentialError::Signer(SignerError::Failed(
            "test signature doesn't verify".into(),
        )));
    }

    Ok(pubkey)
}
