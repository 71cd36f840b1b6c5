use crate::{PubKey, Signature, Timestamp, ID};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const MAX_CONTENT_CHARS: usize = 500;

/// longest run of one repeated character that isn't considered spam
const MAX_REPEATED_RUN: usize = 10;

lazy_static::lazy_static! {
    static ref LONG_URL_REGEX: Regex = Regex::new(r"https?://\S{20,}").unwrap();
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("rating must be between 1 and 5 stars, got {0}")]
    RatingOutOfRange(u8),

    #[error("review content is required")]
    EmptyContent,

    #[error("review content too long ({len} characters, max {max})")]
    ContentTooLong { len: usize, max: usize },

    #[error("review content appears to be spam: '{0}' repeated more than 10 times")]
    RepeatedCharacters(char),

    #[error("review content appears to be spam: contains a long link")]
    LongUrl,
}

/// a star rating, always in 1..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1..=5 => Ok(Self(value)),
            _ => Err(ValidationError::RatingOutOfRange(value)),
        }
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> u8 {
        rating.0
    }
}

impl std::str::FromStr for Rating {
    type Err = ();

    /// strict integer parsing, only surrounding whitespace is tolerated
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u8 = s.trim().parse().map_err(|_| ())?;
        Self::try_from(value).map_err(|_| ())
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// a verified, decoded review event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ID,
    pub target: PubKey,
    pub author: PubKey,
    pub author_npub: String,
    pub rating: Rating,
    pub content: String,
    pub created_at: Timestamp,
    pub verified: bool,
    pub sig: Signature,
}

/// what a user submits before it becomes an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewInput {
    pub target: PubKey,
    pub rating: u8,
    pub content: String,
    pub verified: bool,
}

impl ReviewInput {
    pub fn new(target: PubKey, rating: u8, content: impl Into<String>) -> Self {
        Self {
            target,
            rating,
            content: content.into(),
            verified: false,
        }
    }

    /// check every rule in order and report the first one broken
    pub fn validate(&self) -> Result<Rating, ValidationError> {
        let rating = Rating::try_from(self.rating)?;
        validate_content(&self.content)?;
        Ok(rating)
    }
}

pub fn validate_content(content: &str) -> Result<(), ValidationError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ValidationError::EmptyContent);
    }

    let len = content.chars().count();
    if len > MAX_CONTENT_CHARS {
        return Err(ValidationError::ContentTooLong {
            len,
            max: MAX_CONTENT_CHARS,
        });
    }

    if let Some(c) = repeated_run(content, MAX_REPEATED_RUN + 1) {
        return Err(ValidationError::RepeatedCharacters(c));
    }

    if LONG_URL_REGEX.is_match(content) {
        return Err(ValidationError::LongUrl);
    }

    Ok(())
}

/// the first character that appears `min_run` or more times in a row
fn repeated_run(s: &str, min_run: usize) -> Option<char> {
    let mut prev = None;
    let mut run = 0;
    for c in s.chars() {
        if Some(c) == prev {
            run += 1;
        } else {
            prev = Some(c);
            run = 1;
        }
        if run >= min_run {
            return Some(c);
        }
    }
    None
}

/// aggregate figures shown next to a review list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewStats {
    pub total: usize,
    /// rounded to one decimal, 0 when there are no reviews
    pub average: f64,
    /// index 0 counts 1-star reviews, index 4 counts 5-star reviews
    pub distribution: [usize; 5],
    pub verified: usize,
}

impl ReviewStats {
    pub fn from_reviews(reviews: &[Review]) -> Self {
        let mut distribution = [0usize; 5];
        let mut sum = 0u64;
        let mut verified = 0;
        for review in reviews {
            let stars = review.rating.get();
            distribution[(stars - 1) as usize] += 1;
            sum += stars as u64;
            if review.verified {
                verified += 1;
            }
        }

        let average = if reviews.is_empty() {
            0.0
        } else {
            (sum as f64 / reviews.len() as f64 * 10.0).round() / 10.0
        };

        Self {
            total: reviews.len(),
            average,
            distribution,
            verified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(rating: u8, content: &str) -> ReviewInput {
        ReviewInput::new(PubKey::from_bytes([7; 32]), rating, content)
    }

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::try_from(0).is_err());
        assert_eq!(Rating::try_from(5).unwrap().get(), 5);
        assert_eq!(
            Rating::try_from(6),
            Err(ValidationError::RatingOutOfRange(6))
        );

        assert_eq!("4".parse::<Rating>().unwrap().get(), 4);
        assert_eq!(" 3 ".parse::<Rating>().unwrap().get(), 3);
        assert!("4abc".parse::<Rating>().is_err());
        assert!("4.0".parse::<Rating>().is_err());
        assert!("-1".parse::<Rating>().is_err());
        assert!("9".parse::<Rating>().is_err());
    }

    #[test]
    fn test_validation_rules() {
        assert_eq!(input(4, "solid seller").validate().unwrap().get(), 4);

        assert_eq!(
            input(6, "x").validate(),
            Err(ValidationError::RatingOutOfRange(6))
        );
        assert_eq!(input(3, "   ").validate(), Err(ValidationError::EmptyContent));
        assert_eq!(
            input(3, &"a".repeat(501)).validate(),
            Err(ValidationError::ContentTooLong { len: 501, max: 500 })
        );
        assert_eq!(
            input(3, "aaaaaaaaaaaa").validate(),
            Err(ValidationError::RepeatedCharacters('a'))
        );
        assert_eq!(
            input(3, "see https://example.com/some/very/long/path").validate(),
            Err(ValidationError::LongUrl)
        );
    }

    #[test]
    fn test_validation_boundaries() {
        // ten in a row is still fine, eleven is not
        assert!(input(3, "aaaaaaaaaa").validate().is_ok());
        assert!(input(3, "aaaaaaaaaaa").validate().is_err());

        // counted in characters, not bytes
        assert!(input(3, &"éx".repeat(250)).validate().is_ok());

        assert!(input(3, "https://short.io/x is fine").validate().is_ok());
        assert!(input(3, "exactly 500 is fine ".repeat(25).as_str()).validate().is_ok());
    }

    #[test]
    fn test_stats() {
        let empty = ReviewStats::from_reviews(&[]);
        assert_eq!(empty.total, 0);
        assert_eq!(empty.average, 0.0);

        let review = |rating: u8, verified: bool| Review {
            id: ID::from_bytes([rating; 32]),
            target: PubKey::from_bytes([1; 32]),
            author: PubKey::from_bytes([2; 32]),
            author_npub: String::new(),
            rating: Rating::try_from(rating).unwrap(),
            content: "ok".into(),
            created_at: Timestamp(1),
            verified,
            sig: Signature::from_bytes([0; 64]),
        };
        let stats = ReviewStats::from_reviews(&[
            review(5, true),
            review(4, false),
            review(4, false),
        ]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.average, 4.3);
        assert_eq!(stats.distribution, [0, 0, 0, 2, 1]);
        assert_eq!(stats.verified, 1);
    }
}
