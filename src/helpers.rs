use slotmap::{Key, KeyData};
use url::Url;

use crate::ID;

slotmap::new_key_type! {
    /// handle of a live subscription inside a relay connection
    pub struct SubscriptionKey;
}

/// subscription ids on the wire are `<serial>:<label>`
pub fn sub_id_from_key(key: &SubscriptionKey, label: &Option<String>) -> String {
    let serial = key.data().as_ffi();
    match label {
        Some(label) => format!("{}:{}", serial, label),
        None => format!("{}:_", serial),
    }
}

/// the inverse of [`sub_id_from_key`], unknown ids give the null key
pub fn key_from_sub_id(sub_id: &str) -> SubscriptionKey {
    sub_id_to_serial(sub_id)
        .map(|serial| KeyData::from_ffi(serial).into())
        .unwrap_or_default()
}

/// peek at the subscription of an `["EVENT","<sub_id>",...]` message without parsing it
pub fn extract_key_from_sub_id(json_str: &str) -> Option<SubscriptionKey> {
    let start = json_str.find("\"EVENT\"")?;
    let remaining = &json_str[start + 7..];

    let quote_start = remaining.find('"')?;
    let remaining = &remaining[quote_start + 1..];
    let quote_end = remaining.find('"')?;

    let serial = sub_id_to_serial(&remaining[..quote_end])?;
    Some(KeyData::from_ffi(serial).into())
}

/// extract event ID from JSON string
pub fn extract_event_id(json_str: &str) -> Option<ID> {
    let start = json_str.find("\"id\"")?;
    let remaining = &json_str[start + 4..];

    let quote_start = remaining.find('"')?;
    let id_str = remaining.get(quote_start + 1..quote_start + 1 + 64)?;

    ID::from_hex(id_str).ok()
}

/// convert subscription ID to serial number
pub fn sub_id_to_serial(sub_id: &str) -> Option<u64> {
    let colon_pos = sub_id.find(':')?;
    sub_id[..colon_pos].parse().ok()
}

/// check if a URL is a valid relay URL (ws:// or wss://)
pub fn is_valid_relay_url(url_str: &str) -> bool {
    match Url::parse(url_str) {
        Ok(url) => matches!(url.scheme(), "ws" | "wss") && url.host_str().is_some(),
        Err(_) => false,
    }
}
