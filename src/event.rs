use crate::{Kind, PubKey, Signature, Tags, Timestamp, ID};
use secp256k1::{schnorr, Message, SECP256K1};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// represents a signed nostr event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: ID,
    pub pubkey: PubKey,
    pub created_at: Timestamp,
    pub kind: Kind,
    pub tags: Tags,
    pub content: String,
    pub sig: Signature,
}

impl Event {
    /// check the schnorr signature of the id against the declared author.
    /// malformed keys or signatures just fail.
    pub fn verify_signature(&self) -> bool {
        let pubkey = match self.pubkey.to_xonly() {
            Some(pk) => pk,
            None => return false,
        };

        let signature = match schnorr::Signature::from_slice(self.sig.as_bytes()) {
            Ok(sig) => sig,
            Err(_) => return false,
        };

        let message = Message::from_digest(*self.id.as_bytes());
        SECP256K1
            .verify_schnorr(&signature, &message, &pubkey)
            .is_ok()
    }

    /// check if the event ID matches the computed ID
    pub fn check_id(&self) -> bool {
        self.compute_id() == self.id
    }

    pub fn compute_id(&self) -> ID {
        let hash = Sha256::digest(self.serialize());
        ID::from_bytes(hash.into())
    }

    /// serialize the event for ID computation
    pub fn serialize(&self) -> Vec<u8> {
        crate::event_template::canonical(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{}", json),
            Err(err) => write!(f, "Event({} >> {})", self.id, err),
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}

impl std::hash::Hash for Event {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
