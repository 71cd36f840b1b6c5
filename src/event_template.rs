use secp256k1::{Message, SECP256K1};
use sha2::Digest;

/// an event before it gets an author and a signature
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EventTemplate {
    pub created_at: crate::Timestamp,
    pub kind: crate::Kind,
    pub tags: crate::Tags,
    pub content: String,
}

impl EventTemplate {
    /// returns a signed event with id, pubkey and sig
    pub fn finalize(self, secret_key: &crate::SecretKey) -> crate::Event {
        let pubkey = secret_key.pubkey();

        let hash = sha2::Sha256::digest(self.serialize(&pubkey));
        let signature = SECP256K1
            .sign_schnorr_no_aux_rand(&Message::from_digest(hash.into()), &secret_key.keypair());

        crate::Event {
            id: crate::ID::from_bytes(hash.into()),
            pubkey,
            sig: crate::Signature::from_bytes(signature.serialize()),
            kind: self.kind,
            tags: self.tags,
            created_at: self.created_at,
            content: self.content,
        }
    }

    /// serialize the event for ID computation
    pub fn serialize(&self, pubkey: &crate::PubKey) -> Vec<u8> {
        canonical(pubkey, self.created_at, self.kind, &self.tags, &self.content)
    }
}

/// the `[0, pubkey, created_at, kind, tags, content]` array whose sha256 is the event id
pub(crate) fn canonical(
    pubkey: &crate::PubKey,
    created_at: crate::Timestamp,
    kind: crate::Kind,
    tags: &crate::Tags,
    content: &str,
) -> Vec<u8> {
    serde_json::json!([0, pubkey.to_hex(), created_at.0, kind.0, tags.0, content])
        .to_string()
        .into_bytes()
}

impl std::fmt::Display for EventTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "kind {} at {} with {} tags: {:?}",
            self.kind,
            self.created_at,
            self.tags.0.len(),
            self.content
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Kind, PubKey, Tags, Timestamp};

    #[test]
    fn test_canonical_serialization() {
        let pk = PubKey::from_bytes([0xab; 32]);
        let template = EventTemplate {
            created_at: Timestamp(12),
            kind: Kind::DELETION,
            tags: Tags(vec![vec!["e".into(), "ff".into()]]),
            content: "bye".into(),
        };
        assert_eq!(
            String::from_utf8(template.serialize(&pk)).unwrap(),
            format!("[0,\"{}\",12,5,[[\"e\",\"ff\"]],\"bye\"]", "ab".repeat(32))
        );
    }

    #[test]
    fn test_finalize_is_deterministic() {
        let sk = crate::SecretKey::generate();
        let template = EventTemplate {
            created_at: Timestamp(1),
            kind: Kind::TEXT_NOTE,
            tags: Tags::default(),
            content: "x".into(),
        };
        let a = template.clone().finalize(&sk);
        let b = template.finalize(&sk);
        assert_eq!(a.id, b.id);
        assert_eq!(a.sig, b.sig);
        assert_eq!(a.pubkey, sk.pubkey());
    }
}
