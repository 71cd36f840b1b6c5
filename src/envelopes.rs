use crate::{Event, Filter, ID};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("empty message")]
    EmptyMessage,
    #[error("invalid label")]
    InvalidLabel,
    #[error("invalid {0} envelope")]
    InvalidEnvelope(&'static str),
    #[error("unknown envelope label: {0}")]
    UnknownLabel(String),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ID parsing error")]
    IdParsing(#[from] crate::types::IDError),
}

pub type Result<T> = std::result::Result<T, EnvelopeError>;

/// nostr message envelopes exchanged between clients and relays
#[derive(Debug, Clone)]
pub enum Envelope {
    /// relay -> client
    InEvent {
        subscription_id: String,
        event: Event,
    },
    /// client -> relay
    OutEvent { event: Event },
    Req {
        subscription_id: String,
        filters: Vec<Filter>,
    },
    Close { subscription_id: String },
    Eose { subscription_id: String },
    Closed {
        subscription_id: String,
        reason: String,
    },
    Ok {
        event_id: ID,
        ok: bool,
        reason: String,
    },
    Notice(String),
    AuthChallenge { challenge: String },
}

impl Envelope {
    /// get the label for this envelope type
    pub fn label(&self) -> &'static str {
        match self {
            Envelope::InEvent { .. } => "EVENT",
            Envelope::OutEvent { .. } => "EVENT",
            Envelope::Req { .. } => "REQ",
            Envelope::Close { .. } => "CLOSE",
            Envelope::Eose { .. } => "EOSE",
            Envelope::Closed { .. } => "CLOSED",
            Envelope::Ok { .. } => "OK",
            Envelope::Notice(_) => "NOTICE",
            Envelope::AuthChallenge { .. } => "AUTH",
        }
    }

    /// the json array that goes over the wire
    pub fn to_json(&self) -> String {
        let value = match self {
            Envelope::InEvent {
                subscription_id,
                event,
            } => serde_json::json!(["EVENT", subscription_id, event]),
            Envelope::OutEvent { event } => serde_json::json!(["EVENT", event]),
            Envelope::Req {
                subscription_id,
                filters,
            } => {
                let mut arr = Vec::with_capacity(2 + filters.len());
                arr.push(Value::from("REQ"));
                arr.push(Value::from(subscription_id.as_str()));
                for filter in filters {
                    arr.push(serde_json::to_value(filter).unwrap_or(Value::Null));
                }
                Value::Array(arr)
            }
            Envelope::Close { subscription_id } => serde_json::json!(["CLOSE", subscription_id]),
            Envelope::Eose { subscription_id } => serde_json::json!(["EOSE", subscription_id]),
            Envelope::Closed {
                subscription_id,
                reason,
            } => serde_json::json!(["CLOSED", subscription_id, reason]),
            Envelope::Ok {
                event_id,
                ok,
                reason,
            } => serde_json::json!(["OK", event_id, ok, reason]),
            Envelope::Notice(notice) => serde_json::json!(["NOTICE", notice]),
            Envelope::AuthChallenge { challenge } => serde_json::json!(["AUTH", challenge]),
        };
        value.to_string()
    }
}

fn string_at(arr: &[Value], idx: usize, label: &'static str) -> Result<String> {
    arr.get(idx)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or(EnvelopeError::InvalidEnvelope(label))
}

/// parse a message into an envelope
pub fn parse_message(message: &str) -> Result<Envelope> {
    let mut arr: Vec<Value> = serde_json::from_str(message)?;
    if arr.is_empty() {
        return Err(EnvelopeError::EmptyMessage);
    }

    let label = arr[0].as_str().ok_or(EnvelopeError::InvalidLabel)?.to_string();

    match label.as_str() {
        "EVENT" => match arr.len() {
            2 => Ok(Envelope::OutEvent {
                event: serde_json::from_value(arr[1].take())?,
            }),
            3 => Ok(Envelope::InEvent {
                subscription_id: string_at(&arr, 1, "EVENT")?,
                event: serde_json::from_value(arr[2].take())?,
            }),
            _ => Err(EnvelopeError::InvalidEnvelope("EVENT")),
        },
        "REQ" => {
            if arr.len() < 3 {
                return Err(EnvelopeError::InvalidEnvelope("REQ"));
            }
            let subscription_id = string_at(&arr, 1, "REQ")?;
            let mut filters = Vec::with_capacity(arr.len() - 2);
            for value in arr.drain(2..) {
                filters.push(serde_json::from_value(value)?);
            }
            Ok(Envelope::Req {
                subscription_id,
                filters,
            })
        }
        "CLOSE" => Ok(Envelope::Close {
            subscription_id: string_at(&arr, 1, "CLOSE")?,
        }),
        "EOSE" => Ok(Envelope::Eose {
            subscription_id: string_at(&arr, 1, "EOSE")?,
        }),
        "CLOSED" => Ok(Envelope::Closed {
            subscription_id: string_at(&arr, 1, "CLOSED")?,
            reason: string_at(&arr, 2, "CLOSED").unwrap_or_default(),
        }),
        "OK" => {
            if arr.len() < 3 {
                return Err(EnvelopeError::InvalidEnvelope("OK"));
            }
            Ok(Envelope::Ok {
                event_id: ID::from_hex(&string_at(&arr, 1, "OK")?)?,
                ok: arr[2].as_bool().ok_or(EnvelopeError::InvalidEnvelope("OK"))?,
                // some relays omit the message when accepting
                reason: string_at(&arr, 3, "OK").unwrap_or_default(),
            })
        }
        "NOTICE" => Ok(Envelope::Notice(string_at(&arr, 1, "NOTICE")?)),
        "AUTH" => Ok(Envelope::AuthChallenge {
            challenge: string_at(&arr, 1, "AUTH")?,
        }),
        _ => Err(EnvelopeError::UnknownLabel(label)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventTemplate, Kind, SecretKey, Tags, Timestamp};

    #[test]
    fn test_parse_relay_messages() {
        let id = "7ad1758b4a75dd6a5d0b6a96870afc63375c3e8f9b38885aabd049450b2588f9";

        match parse_message(&format!(r#"["OK","{}",false,"blocked: spam"]"#, id)).unwrap() {
            Envelope::Ok {
                event_id,
                ok,
                reason,
            } => {
                assert_eq!(event_id.to_hex(), id);
                assert!(!ok);
                assert_eq!(reason, "blocked: spam");
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            parse_message(&format!(r#"["OK","{}",true]"#, id)).unwrap(),
            Envelope::Ok { ok: true, .. }
        ));
        assert!(matches!(
            parse_message(r#"["EOSE","1:x"]"#).unwrap(),
            Envelope::Eose { subscription_id } if subscription_id == "1:x"
        ));
        assert!(matches!(
            parse_message(r#"["NOTICE","hi"]"#).unwrap(),
            Envelope::Notice(n) if n == "hi"
        ));
        assert!(matches!(
            parse_message(r#"["CLOSED","1:x","error: shutting down"]"#).unwrap(),
            Envelope::Closed { reason, .. } if reason == "error: shutting down"
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_message("[]"), Err(EnvelopeError::EmptyMessage)));
        assert!(matches!(parse_message("[1]"), Err(EnvelopeError::InvalidLabel)));
        assert!(matches!(
            parse_message(r#"["WHAT"]"#),
            Err(EnvelopeError::UnknownLabel(_))
        ));
        assert!(matches!(parse_message("{}"), Err(EnvelopeError::Json(_))));
        assert!(matches!(
            parse_message(r#"["EOSE"]"#),
            Err(EnvelopeError::InvalidEnvelope("EOSE"))
        ));
    }

    #[test]
    fn test_event_and_req_through_the_wire() {
        let event = EventTemplate {
            created_at: Timestamp(5),
            kind: Kind::LABEL,
            tags: Tags::default(),
            content: "x".into(),
        }
        .finalize(&SecretKey::generate());

        let out = Envelope::OutEvent {
            event: event.clone(),
        }
        .to_json();
        match parse_message(&out).unwrap() {
            Envelope::OutEvent { event: parsed } => assert_eq!(parsed.id, event.id),
            other => panic!("unexpected {:?}", other),
        }

        let incoming = Envelope::InEvent {
            subscription_id: "3:reviews".into(),
            event: event.clone(),
        }
        .to_json();
        assert!(matches!(
            parse_message(&incoming).unwrap(),
            Envelope::InEvent { subscription_id, .. } if subscription_id == "3:reviews"
        ));

        let req = Envelope::Req {
            subscription_id: "1:p".into(),
            filters: vec![Filter {
                kinds: Some(vec![Kind::METADATA]),
                limit: Some(1),
                ..Default::default()
            }],
        }
        .to_json();
        assert_eq!(req, r#"["REQ","1:p",{"kinds":[0],"limit":1}]"#);
    }
}
