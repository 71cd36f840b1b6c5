use crate::{
    codec::EventCodec,
    config::Config,
    error::{Error, Result},
    pool::{Pool, PoolError, PublishReport},
    review::{Review, ReviewInput},
    signer::{Signer, SignerError},
    verifier::Verifier,
    Event, EventTemplate, Filter, PubKey, ID,
};
use std::{cmp::Reverse, collections::HashSet, sync::Arc};
use url::Url;

/// something that made it to at least one relay
#[derive(Debug, Clone)]
pub struct Published<T> {
    pub item: T,
    pub report: PublishReport,
}

/// reads and writes reviews on the configured relays
#[derive(Debug)]
pub struct ReviewRepository {
    pool: Pool,
    config: Arc<Config>,
    relays: Vec<Url>,
    codec: EventCodec,
    verifier: Arc<dyn Verifier>,
}

impl ReviewRepository {
    pub fn new(config: Arc<Config>, codec: EventCodec, verifier: Arc<dyn Verifier>) -> Self {
        Self {
            pool: Pool::new(config.pool_options()),
            relays: config.relay_urls(),
            config,
            codec,
            verifier,
        }
    }

    /// reviews about `target`, newest first. relay failures give an empty list.
    ///
    /// `limit` defaults to the configured `review_limit`.
    pub async fn fetch_reviews_for(&self, target: &PubKey, limit: Option<usize>) -> Vec<Review> {
        let limit = limit.unwrap_or(self.config.review_limit);
        let filter = self.codec.reviews_filter(target, limit);

        let about_target = |event: &Event| self.codec.decode_review_about(event, target);
        match self.fetch(filter, limit, about_target).await {
            Ok(reviews) => reviews,
            Err(err) => {
                log::info!("fetching reviews for {} failed: {}", target, err);
                Vec::new()
            }
        }
    }

    /// reviews written by `author`, newest first
    pub async fn fetch_reviews_by(
        &self,
        author: &PubKey,
        limit: Option<usize>,
    ) -> Result<Vec<Review>> {
        let limit = limit.unwrap_or(self.config.review_limit);
        let filter = self.codec.reviews_by_filter(author, limit);

        let by_author = |event: &Event| {
            self.codec
                .decode_review(event)
                .filter(|review| review.author == *author)
        };
        Ok(self.fetch(filter, limit, by_author).await?)
    }

    async fn fetch(
        &self,
        filter: Filter,
        limit: usize,
        decode: impl Fn(&Event) -> Option<Review>,
    ) -> std::result::Result<Vec<Review>, PoolError> {
        let events = self
            .pool
            .query(
                &self.relays,
                filter,
                crate::QueryPolicy::BestEffort,
                self.config.review_timeout(),
            )
            .await?;

        Ok(self.decode_all(events, limit, decode))
    }

    /// verify, then dedup and decode untrusted events, dropping whatever doesn't hold up
    fn decode_all(
        &self,
        events: Vec<Event>,
        limit: usize,
        decode: impl Fn(&Event) -> Option<Review>,
    ) -> Vec<Review> {
        let mut seen = HashSet::with_capacity(events.len());
        let mut reviews: Vec<Review> = events
            .iter()
            .filter(|event| {
                let valid = self.verifier.verify(event);
                if !valid {
                    log::debug!("dropping review {} with a bad signature", event.id);
                }
                valid
            })
            .filter(|event| seen.insert(event.id))
            .filter_map(decode)
            .collect();

        glidesort::sort_by_key(&mut reviews, |review| (Reverse(review.created_at), review.id));
        reviews.truncate(limit);
        reviews
    }

    /// validate, sign and publish a review, succeeding when at least one relay took it
    pub async fn publish(&self, input: ReviewInput, signer: &dyn Signer) -> Result<Published<Review>> {
        let rating = input.validate()?;
        let template = self.codec.encode_review(&input, rating);
        let event = self.sign(template, signer).await?;

        let review = self
            .codec
            .decode_review(&event)
            .ok_or(Error::SignatureInvalid)?;

        let report = self.pool.publish(&self.relays, event).await?;
        log::info!("published review {} about {}: {}", review.id, review.target, report);

        Ok(Published {
            item: review,
            report,
        })
    }

    /// publish a tombstone for `review_id`, nothing is removed locally
    pub async fn delete(&self, review_id: &ID, signer: &dyn Signer) -> Result<PublishReport> {
        let template = self.codec.encode_deletion(review_id);
        let event = self.sign(template, signer).await?;

        let report = self.pool.publish(&self.relays, event).await?;
        log::info!("published deletion of {}: {}", review_id, report);
        Ok(report)
    }

    /// ask the signer and make sure what comes back is what we asked for
    async fn sign(&self, template: EventTemplate, signer: &dyn Signer) -> Result<Event> {
        let event = signer
            .sign_event(template.clone())
            .await
            .map_err(|err| match err {
                SignerError::Unavailable(_) => Error::SigningUnavailable,
                other => Error::Signer(other),
            })?;

        if event.kind != template.kind
            || event.tags != template.tags
            || event.content != template.content
            || !self.verifier.verify(&event)
        {
            return Err(Error::SignatureInvalid);
        }
        Ok(event)
    }
}
