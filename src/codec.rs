use crate::{
    review::{Rating, Review, ReviewInput, MAX_CONTENT_CHARS},
    Event, EventTemplate, Filter, Kind, Metadata, PubKey, Tags, Timestamp, ID,
};

pub const REVIEW_LABEL: &str = "review";
pub const DELETION_CONTENT: &str = "Review deleted";

/// maps profiles, reviews and deletions to and from nostr events.
///
/// reviews are NIP-32 labels: `["L", ns]`, `["l", "review", ns]`, `["p", target]`,
/// `["rating", "1".."5"]` and `["verified", "true"|"false"]` on a kind 1985 event.
#[derive(Debug, Clone)]
pub struct EventCodec {
    namespace: String,
}

impl EventCodec {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn profile_filter(&self, pubkey: &PubKey) -> Filter {
        Filter {
            kinds: Some(vec![Kind::METADATA]),
            authors: Some(vec![*pubkey]),
            limit: Some(1),
            ..Default::default()
        }
    }

    /// reviews about `target`
    pub fn reviews_filter(&self, target: &PubKey, limit: usize) -> Filter {
        self.labels_filter(limit)
            .tag("p", vec![target.to_hex()])
    }

    /// reviews written by `author`
    pub fn reviews_by_filter(&self, author: &PubKey, limit: usize) -> Filter {
        Filter {
            authors: Some(vec![*author]),
            ..self.labels_filter(limit)
        }
    }

    fn labels_filter(&self, limit: usize) -> Filter {
        Filter {
            kinds: Some(vec![Kind::LABEL]),
            limit: Some(limit),
            ..Default::default()
        }
        .tag("L", vec![self.namespace.clone()])
        .tag("l", vec![REVIEW_LABEL.to_string()])
    }

    /// malformed content degrades to empty metadata
    pub fn decode_profile(&self, event: &Event) -> Metadata {
        match Metadata::from_event(event) {
            Ok(metadata) => metadata,
            Err(err) => {
                log::warn!("malformed metadata in {}: {}", event.id, err);
                Metadata::default()
            }
        }
    }

    pub fn encode_review(&self, input: &ReviewInput, rating: Rating) -> EventTemplate {
        let mut tags = Tags::default();
        tags.push(["L", self.namespace.as_str()]);
        tags.push(["l", REVIEW_LABEL, self.namespace.as_str()]);
        tags.push(["p".to_string(), input.target.to_hex()]);
        tags.push(["rating".to_string(), rating.to_string()]);
        tags.push(["verified".to_string(), input.verified.to_string()]);

        EventTemplate {
            created_at: Timestamp::now(),
            kind: Kind::LABEL,
            tags,
            content: input.content.trim().to_string(),
        }
    }

    /// `None` for anything that isn't a well-formed review.
    /// the target is the first `p` tag holding a valid key.
    pub fn decode_review(&self, event: &Event) -> Option<Review> {
        let target = event
            .tags
            .values_of("p")
            .into_iter()
            .find_map(|value| PubKey::from_hex(value).ok());
        self.decode_with_target(event, target)
    }

    /// like [`Self::decode_review`], but about `target` as long as any `p` tag names it
    pub fn decode_review_about(&self, event: &Event, target: &PubKey) -> Option<Review> {
        let named = event
            .tags
            .values_of("p")
            .into_iter()
            .any(|value| PubKey::from_hex(value).is_ok_and(|pubkey| pubkey == *target));
        self.decode_with_target(event, named.then_some(*target))
    }

    fn decode_with_target(&self, event: &Event, target: Option<PubKey>) -> Option<Review> {
        if event.kind != Kind::LABEL {
            return None;
        }

        let Some(target) = target else {
            log::debug!("review {} has no valid target", event.id);
            return None;
        };

        let rating = match event.tags.value_of("rating").map(str::parse::<Rating>) {
            Some(Ok(rating)) => rating,
            _ => {
                log::debug!("review {} has no valid rating", event.id);
                return None;
            }
        };

        if event.content.chars().count() > MAX_CONTENT_CHARS {
            log::debug!("review {} is too long", event.id);
            return None;
        }

        Some(Review {
            id: event.id,
            target,
            author: event.pubkey,
            author_npub: event.pubkey.to_npub(),
            rating,
            content: event.content.clone(),
            created_at: event.created_at,
            verified: event.tags.value_of("verified") == Some("true"),
            sig: event.sig,
        })
    }

    /// a kind 5 tombstone pointing at the review
    pub fn encode_deletion(&self, review_id: &ID) -> EventTemplate {
        let mut tags = Tags::default();
        tags.push(["e".to_string(), review_id.to_hex()]);

        EventTemplate {
            created_at: Timestamp::now(),
            kind: Kind::DELETION,
            tags,
            content: DELETION_CONTENT.to_string(),
        }
    }
}

impl Default for EventCodec {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_NAMESPACE)
    }
}
