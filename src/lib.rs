//! # thunderproof
//!
//! reviews of nostr identities, stored as signed NIP-32 label events on public relays.
//!
//! [`ProfileResolver`] turns whatever a user typed into a profile, [`ReviewRepository`]
//! reads and publishes reviews, both on top of a fan-out [`Pool`] of relay connections.

pub mod codec;
pub mod config;
pub mod credentials;
pub mod envelopes;
pub mod error;
pub mod event;
pub mod event_template;
pub mod filter;
pub mod helpers;
pub mod keys;
pub mod metadata;
pub mod nip05;
pub mod nip19;
pub mod profile;
pub mod repository;
pub mod review;
pub mod signer;
pub mod verifier;

mod normalize;
mod pool;
mod relay;
mod tags;
mod timestamp;
mod types;

#[cfg(test)]
mod testing;

// re-export commonly used types
pub use codec::EventCodec;
pub use config::Config;
pub use credentials::{CredentialStore, MemoryStore, Session};
pub use error::{Error, Result};
pub use event::Event;
pub use event_template::EventTemplate;
pub use filter::Filter;
pub use keys::{PubKey, SecretKey};
pub use metadata::Metadata;
pub use normalize::*;
pub use pool::{
    Pool, PoolError, PoolOptions, PublishReport, PublishResult, PublishStatus, QueryPolicy,
};
pub use profile::{Profile, ProfileResolver};
pub use relay::{CloseReason, Occurrence, Relay, SubscriptionOptions};
pub use repository::{Published, ReviewRepository};
pub use review::{Rating, Review, ReviewInput, ReviewStats};
pub use signer::Signer;
pub use tags::{Tag, Tags};
pub use timestamp::Timestamp;
pub use types::*;
pub use verifier::{SchnorrVerifier, Verifier};
