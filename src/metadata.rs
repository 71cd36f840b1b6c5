use crate::{Event, EventTemplate, Kind, Tags, Timestamp};
use serde_json::{Map, Value};

/// what a kind 0 event says about its author
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub about: Option<String>,
    pub picture: Option<String>,
    pub banner: Option<String>,
    pub website: Option<String>,
    pub nip05: Option<String>,
    pub lud16: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("content is not json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("content is not a json object")]
    NotAnObject,
}

impl Metadata {
    /// parse a kind 0 content object. fields that aren't strings are skipped, not fatal
    pub fn from_content(content: &str) -> Result<Self, MetadataError> {
        let Value::Object(object) = serde_json::from_str::<Value>(content)? else {
            return Err(MetadataError::NotAnObject);
        };

        let field = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
        Ok(Self {
            name: field("name"),
            display_name: field("display_name").or_else(|| field("displayName")),
            about: field("about"),
            picture: field("picture"),
            banner: field("banner"),
            website: field("website"),
            nip05: field("nip05"),
            lud16: field("lud16"),
        })
    }

    pub fn from_event(event: &Event) -> Result<Self, MetadataError> {
        Self::from_content(&event.content)
    }

    /// the first non-blank of `name` and `display_name`
    pub fn best_name(&self) -> Option<&str> {
        [self.name.as_deref(), self.display_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
    }

    fn fields(&self) -> [(&'static str, &Option<String>); 8] {
        [
            ("name", &self.name),
            ("display_name", &self.display_name),
            ("about", &self.about),
            ("picture", &self.picture),
            ("banner", &self.banner),
            ("website", &self.website),
            ("nip05", &self.nip05),
            ("lud16", &self.lud16),
        ]
    }

    /// an unsigned kind 0 carrying the fields that are set
    pub fn to_event_template(&self) -> EventTemplate {
        let object: Map<String, Value> = self
            .fields()
            .into_iter()
            .filter_map(|(key, value)| Some((key.to_string(), Value::from(value.clone()?))))
            .collect();

        EventTemplate {
            created_at: Timestamp::now(),
            kind: Kind::METADATA,
            tags: Tags::default(),
            content: Value::Object(object).to_string(),
        }
    }
}

impl std::fmt::Display for Metadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.best_name().unwrap_or("<no name>"))?;
        if let Some(nip05) = &self.nip05 {
            write!(f, " ({})", nip05)?;
        }
        Ok(())
    }
}
