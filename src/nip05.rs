//! NIP-05: mapping nostr keys to DNS-based internet identifiers

use crate::PubKey;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Nip05Error {
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http status {0}")]
    Status(reqwest::StatusCode),

    #[error("no entry for name '{0}'")]
    UnknownName(String),

    #[error("got an invalid public key '{0}'")]
    InvalidPubKey(String),
}

/// well-known response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellKnownResponse {
    pub names: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relays: Option<HashMap<String, Vec<String>>>,
}

lazy_static::lazy_static! {
    static ref NIP05_REGEX: Regex = Regex::new(r"^(?:([\w.+-]+)@)?([\w_-]+(\.[\w_-]+)+)$").unwrap();
}

/// check if an identifier is valid according to NIP-05 format
pub fn is_valid_identifier(input: &str) -> bool {
    NIP05_REGEX.is_match(input)
}

/// parse a NIP-05 identifier into name and domain parts, a bare domain means the `_` name
pub fn parse_identifier(fullname: &str) -> Result<(String, String), Nip05Error> {
    let captures = NIP05_REGEX
        .captures(fullname)
        .ok_or_else(|| Nip05Error::InvalidIdentifier(fullname.to_string()))?;

    let name = captures
        .get(1)
        .map(|m| m.as_str())
        .unwrap_or("_")
        .to_lowercase();
    let domain = captures
        .get(2)
        .ok_or_else(|| Nip05Error::InvalidIdentifier(fullname.to_string()))?
        .as_str()
        .to_lowercase();

    Ok((name, domain))
}

/// convert a NIP-05 identifier to its well-known URL
pub fn identifier_to_url(fullname: &str) -> Result<String, Nip05Error> {
    let (name, domain) = parse_identifier(fullname)?;
    Ok(format!(
        "https://{}/.well-known/nostr.json?name={}",
        domain, name
    ))
}

/// fetch the well-known document and return the key it maps the name to
pub async fn fetch(fullname: &str) -> Result<PubKey, Nip05Error> {
    let (name, _) = parse_identifier(fullname)?;
    let url = identifier_to_url(fullname)?;

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(10))
        .build()?;

    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(Nip05Error::Status(response.status()));
    }

    let result: WellKnownResponse = response.json().await?;
    pubkey_for(&result, &name)
}

fn pubkey_for(response: &WellKnownResponse, name: &str) -> Result<PubKey, Nip05Error> {
    let pubkey_hex = response
        .names
        .get(name)
        .ok_or_else(|| Nip05Error::UnknownName(name.to_string()))?;

    PubKey::from_hex(pubkey_hex).map_err(|_| Nip05Error::InvalidPubKey(pubkey_hex.clone()))
}

/// whether `fullname` currently maps to `pubkey`, any failure counts as no
pub async fn verify(fullname: &str, pubkey: &PubKey) -> bool {
    match fetch(fullname).await {
        Ok(found) => found == *pubkey,
        Err(err) => {
            log::debug!("nip05 check for {} failed: {}", fullname, err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let test_cases = vec![
            ("saknd@yyq.com", "saknd", "yyq.com", false),
            ("Bob@Example.COM", "bob", "example.com", false),
            ("asdn.com", "_", "asdn.com", false),
            ("_@uxux.com.br", "_", "uxux.com.br", false),
            ("821yh498ig21", "", "", true),
            ("////", "", "", true),
            ("a@b", "", "", true),
        ];

        for (input, expected_name, expected_domain, expect_error) in test_cases {
            match parse_identifier(input) {
                Ok((name, domain)) => {
                    assert!(!expect_error, "expected error for input: {}", input);
                    assert_eq!(name, expected_name);
                    assert_eq!(domain, expected_domain);
                }
                Err(_) => {
                    assert!(expect_error, "did not expect error for input: {}", input);
                }
            }
        }
    }

    #[test]
    fn test_identifier_to_url() {
        assert_eq!(
            identifier_to_url("example.com").unwrap(),
            "https://example.com/.well-known/nostr.json?name=_"
        );
        assert_eq!(
            identifier_to_url("user@example.com").unwrap(),
            "https://example.com/.well-known/nostr.json?name=user"
        );
        assert!(identifier_to_url("nope").is_err());
    }

    #[test]
    fn test_pubkey_lookup() {
        let hex = "ee11a5dff40c19a555f41fe42b48f00e618c91225622ae37b6c2bb67b76c4e49";
        let response: WellKnownResponse = serde_json::from_str(&format!(
            r#"{{"names":{{"mike":"{}","bad":"xyz"}}}}"#,
            hex
        ))
        .unwrap();

        assert_eq!(pubkey_for(&response, "mike").unwrap().to_hex(), hex);
        assert!(matches!(
            pubkey_for(&response, "nobody"),
            Err(Nip05Error::UnknownName(_))
        ));
        assert!(matches!(
            pubkey_for(&response, "bad"),
            Err(Nip05Error::InvalidPubKey(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_invalid_identifier_is_false() {
        assert!(!verify("not an identifier", &PubKey::from_bytes([1; 32])).await);
    }
}
