use crate::{
    codec::EventCodec,
    config::Config,
    error::Result,
    nip19::{self, Identifier},
    pool::Pool,
    verifier::Verifier,
    Event, Kind, Metadata, PubKey, Timestamp,
};
use serde::Serialize;
use std::{cmp::Reverse, sync::Arc};
use url::Url;

pub const ANONYMOUS: &str = "Anonymous";
pub const NO_PROFILE_ABOUT: &str = "No profile information available";

/// a reviewable key and whatever it says about itself
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub pubkey: PubKey,
    pub npub: String,
    pub name: String,
    pub display_name: Option<String>,
    pub about: String,
    pub picture: Option<String>,
    pub banner: Option<String>,
    pub website: Option<String>,
    pub nip05: Option<String>,
    pub lud16: Option<String>,
    /// `None` when nothing was found and the profile was made up from the key
    pub created_at: Option<Timestamp>,
    pub raw: serde_json::Value,
}

impl Profile {
    /// the profile of a key nobody has published metadata for
    pub fn synthesized(identifier: &Identifier) -> Self {
        let short: String = identifier.npub.chars().take(16).collect();
        Self {
            pubkey: identifier.pubkey,
            npub: identifier.npub.clone(),
            name: format!("{}...", short),
            display_name: None,
            about: NO_PROFILE_ABOUT.to_string(),
            picture: None,
            banner: None,
            website: None,
            nip05: None,
            lud16: None,
            created_at: None,
            raw: serde_json::json!({}),
        }
    }

    pub fn from_metadata(identifier: &Identifier, metadata: Metadata, event: &Event) -> Self {
        let raw = serde_json::from_str::<serde_json::Value>(&event.content)
            .ok()
            .filter(|value| value.is_object())
            .unwrap_or_else(|| serde_json::json!({}));

        Self {
            pubkey: identifier.pubkey,
            npub: identifier.npub.clone(),
            name: metadata.best_name().unwrap_or(ANONYMOUS).to_string(),
            about: metadata.about.unwrap_or_default(),
            display_name: metadata.display_name,
            picture: metadata.picture,
            banner: metadata.banner,
            website: metadata.website,
            nip05: metadata.nip05,
            lud16: metadata.lud16,
            created_at: Some(event.created_at),
            raw,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        self.created_at.is_none()
    }

    /// check the NIP-05 claim against its domain, `false` when there is none
    pub async fn verify_nip05(&self) -> bool {
        match &self.nip05 {
            Some(nip05) if crate::nip05::is_valid_identifier(nip05) => {
                crate::nip05::verify(nip05, &self.pubkey).await
            }
            _ => false,
        }
    }
}

/// turns a user-typed key into a [`Profile`], never failing for a well-formed key
#[derive(Debug)]
pub struct ProfileResolver {
    pool: Pool,
    config: Arc<Config>,
    relays: Vec<Url>,
    codec: EventCodec,
    verifier: Arc<dyn Verifier>,
}

impl ProfileResolver {
    pub fn new(config: Arc<Config>, codec: EventCodec, verifier: Arc<dyn Verifier>) -> Self {
        Self {
            pool: Pool::new(config.pool_options()),
            relays: config.relay_urls(),
            config,
            codec,
            verifier,
        }
    }

    /// fails only with `InvalidIdentifier`, relay trouble degrades to a synthesized profile
    pub async fn resolve(&self, query: &str) -> Result<Profile> {
        let identifier = nip19::normalize(query)?;

        let events = match self
            .pool
            .query(
                &self.relays,
                self.codec.profile_filter(&identifier.pubkey),
                self.config.profile_policy,
                self.config.profile_timeout(),
            )
            .await
        {
            Ok(events) => events,
            Err(err) => {
                log::info!("profile lookup for {} failed: {}", identifier.npub, err);
                return Ok(Profile::synthesized(&identifier));
            }
        };

        let newest = events
            .iter()
            .filter(|event| event.kind == Kind::METADATA && event.pubkey == identifier.pubkey)
            .filter(|event| {
                let valid = self.verifier.verify(event);
                if !valid {
                    log::debug!("dropping unverifiable metadata event {}", event.id);
                }
                valid
            })
            .min_by_key(|event| (Reverse(event.created_at), event.id));

        Ok(match newest {
            Some(event) => {
                let metadata = self.codec.decode_profile(event);
                Profile::from_metadata(&identifier, metadata, event)
            }
            None => Profile::synthesized(&identifier),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockRelay, OnPublish};
    use crate::{error::Error, EventTemplate, SchnorrVerifier, SecretKey, Tags};

    fn kind0(sk: &SecretKey, created_at: u32, content: &str) -> Event {
        EventTemplate {
            created_at: Timestamp(created_at),
            kind: Kind::METADATA,
            tags: Tags::default(),
            content: content.to_string(),
        }
        .finalize(sk)
    }

    fn resolver(relays: &[&MockRelay], policy: crate::QueryPolicy) -> ProfileResolver {
        let config = Config {
            relays: relays.iter().map(|r| r.url.to_string()).collect(),
            profile_timeout_ms: 500,
            profile_policy: policy,
            ..Default::default()
        };
        ProfileResolver::new(
            Arc::new(config),
            EventCodec::default(),
            Arc::new(SchnorrVerifier),
        )
    }

    #[tokio::test]
    async fn test_newest_metadata_wins() {
        let sk = SecretKey::generate();
        let old = kind0(&sk, 100, r#"{"name":"old"}"#);
        let new = kind0(
            &sk,
            200,
            r#"{"display_name":"New Name","about":"hi","nip05":"n@example.com","lud16":"n@ln.tips"}"#,
        );

        let r1 = MockRelay::start(vec![old], OnPublish::Accept).await;
        let r2 = MockRelay::start(vec![new.clone()], OnPublish::Accept).await;
        let profile = resolver(&[&r1, &r2], crate::QueryPolicy::AllOrTimeout)
            .resolve(&sk.pubkey().to_npub())
            .await
            .unwrap();

        assert_eq!(profile.name, "New Name");
        assert_eq!(profile.about, "hi");
        assert_eq!(profile.nip05.as_deref(), Some("n@example.com"));
        assert_eq!(profile.lud16.as_deref(), Some("n@ln.tips"));
        assert_eq!(profile.created_at, Some(Timestamp(200)));
        assert_eq!(profile.raw["about"], "hi");
        assert!(!profile.is_synthesized());
    }

    #[tokio::test]
    async fn test_forged_metadata_is_ignored() {
        let sk = SecretKey::generate();
        let genuine = kind0(&sk, 100, r#"{"name":"real"}"#);
        let mut forged = kind0(&sk, 300, r#"{"name":"real"}"#);
        forged.content = r#"{"name":"impostor"}"#.to_string();
        forged.id = forged.compute_id();

        let r1 = MockRelay::start(vec![genuine], OnPublish::Accept).await;
        let r2 = MockRelay::start(vec![forged], OnPublish::Accept).await;
        let profile = resolver(&[&r1, &r2], crate::QueryPolicy::AllOrTimeout)
            .resolve(&sk.pubkey().to_hex())
            .await
            .unwrap();
        assert_eq!(profile.name, "real");
    }

    #[tokio::test]
    async fn test_same_id_with_broken_sig_does_not_shadow() {
        let sk = SecretKey::generate();
        let genuine = kind0(&sk, 100, r#"{"name":"real"}"#);
        let mut broken = genuine.clone();
        broken.sig.0[0] ^= 1;

        let bad1 = MockRelay::start(vec![broken.clone()], OnPublish::Accept).await;
        let bad2 = MockRelay::start(vec![broken], OnPublish::Accept).await;
        let good = MockRelay::start(vec![genuine], OnPublish::Accept).await;
        let resolver = resolver(&[&bad1, &bad2, &good], crate::QueryPolicy::AllOrTimeout);

        for _ in 0..5 {
            let profile = resolver.resolve(&sk.pubkey().to_hex()).await.unwrap();
            assert_eq!(profile.name, "real");
            assert_eq!(profile.created_at, Some(Timestamp(100)));
        }
    }

    #[tokio::test]
    async fn test_nameless_and_malformed_metadata() {
        let sk = SecretKey::generate();
        let relay = MockRelay::start(vec![kind0(&sk, 100, "not json")], OnPublish::Accept).await;
        let profile = resolver(&[&relay], crate::QueryPolicy::AllOrTimeout)
            .resolve(&sk.pubkey().to_hex())
            .await
            .unwrap();

        assert_eq!(profile.name, ANONYMOUS);
        assert_eq!(profile.about, "");
        assert_eq!(profile.raw, serde_json::json!({}));
        assert_eq!(profile.created_at, Some(Timestamp(100)));
    }

    #[tokio::test]
    async fn test_unknown_key_is_synthesized() {
        let relay = MockRelay::start(vec![], OnPublish::Accept).await;
        let npub = format!("npub1{}", "a".repeat(58));
        let profile = resolver(&[&relay], crate::QueryPolicy::AllOrTimeout)
            .resolve(&npub)
            .await
            .unwrap();

        assert_eq!(profile.name, format!("{}...", &npub[..16]));
        assert_eq!(profile.created_at, None);
        assert_eq!(profile.about, NO_PROFILE_ABOUT);
        assert_eq!(profile.picture, None);
        assert_eq!(profile.nip05, None);
        assert!(profile.is_synthesized());
    }

    #[tokio::test]
    async fn test_relay_failure_is_synthesized() {
        let silent = MockRelay::silent().await;
        let sk = SecretKey::generate();
        let profile = resolver(&[&silent], crate::QueryPolicy::AllOrTimeout)
            .resolve(&sk.pubkey().to_npub())
            .await
            .unwrap();
        assert!(profile.is_synthesized());
        assert_eq!(profile.npub, sk.pubkey().to_npub());
    }

    #[tokio::test]
    async fn test_invalid_identifier() {
        let relay = MockRelay::start(vec![], OnPublish::Accept).await;
        let resolver = resolver(&[&relay], crate::QueryPolicy::AllOrTimeout);
        for bad in ["", "npub1short", "zz", "g".repeat(64).as_str()] {
            assert!(
                matches!(resolver.resolve(bad).await, Err(Error::InvalidIdentifier(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_synthesized_without_nip05_doesnt_verify() {
        let identifier = Identifier::from(SecretKey::generate().pubkey());
        assert!(!Profile::synthesized(&identifier).verify_nip05().await);
    }
}
