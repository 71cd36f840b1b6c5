use crate::{Event, Kind, PubKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// a REQ filter, limited to the conditions profile and review lookups use
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireFilter", try_from = "WireFilter")]
pub struct Filter {
    pub kinds: Option<Vec<Kind>>,
    pub authors: Option<Vec<PubKey>>,
    /// `#<key>` conditions: the event must carry the tag with one of the values
    pub tags: BTreeMap<String, Vec<String>>,
    pub limit: Option<usize>,
}

impl Filter {
    /// add a `#key` condition, replacing an earlier one for the same key
    pub fn tag(mut self, key: &str, values: Vec<String>) -> Self {
        self.tags.insert(key.to_string(), values);
        self
    }

    /// what a relay is expected to check, `limit` aside
    pub fn matches(&self, event: &Event) -> bool {
        self.kinds
            .as_ref()
            .map_or(true, |kinds| kinds.contains(&event.kind))
            && self
                .authors
                .as_ref()
                .map_or(true, |authors| authors.contains(&event.pubkey))
            && self
                .tags
                .iter()
                .all(|(key, values)| event.tags.contains_any(key, values))
    }
}

#[derive(Serialize, Deserialize)]
struct WireFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kinds: Option<Vec<Kind>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    authors: Option<Vec<PubKey>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_json::Value>,
}

impl From<Filter> for WireFilter {
    fn from(filter: Filter) -> Self {
        Self {
            kinds: filter.kinds,
            authors: filter.authors,
            limit: filter.limit,
            rest: filter
                .tags
                .into_iter()
                .map(|(key, values)| (format!("#{}", key), values.into()))
                .collect(),
        }
    }
}

impl TryFrom<WireFilter> for Filter {
    type Error = serde_json::Error;

    fn try_from(wire: WireFilter) -> Result<Self, Self::Error> {
        let mut tags = BTreeMap::new();
        for (key, value) in wire.rest {
            // ids, since, until and friends are not something we ask for
            if let Some(tag) = key.strip_prefix('#').filter(|tag| !tag.is_empty()) {
                tags.insert(tag.to_string(), serde_json::from_value(value)?);
            }
        }

        Ok(Self {
            kinds: wire.kinds,
            authors: wire.authors,
            tags,
            limit: wire.limit,
        })
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => write!(f, "Filter"),
        }
    }
}
