/// `[key, value, ...rest]`
pub type Tag = Vec<String>;

#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Tags(pub Vec<Tag>);

impl Tags {
    /// first tag named `key` that carries a value
    pub fn find(&self, key: &str) -> Option<&Tag> {
        self.0.iter().find(|tag| has_key(tag, key))
    }

    /// second element of every `key` tag
    pub fn values_of<'a>(&'a self, key: &str) -> Vec<&'a str> {
        self.0
            .iter()
            .filter(|tag| has_key(tag, key))
            .map(|tag| tag[1].as_str())
            .collect()
    }

    /// second element of the first `key` tag
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.find(key).map(|tag| tag[1].as_str())
    }

    pub fn contains_any(&self, key: &str, values: &[String]) -> bool {
        self.0
            .iter()
            .any(|tag| has_key(tag, key) && values.contains(&tag[1]))
    }

    pub fn push<I, S>(&mut self, tag: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.push(tag.into_iter().map(Into::into).collect());
    }
}

fn has_key(tag: &Tag, key: &str) -> bool {
    tag.len() > 1 && tag[0] == key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_tags() -> Tags {
        let mut tags = Tags::default();
        tags.push(["L", "thunderproof"]);
        tags.push(["l", "review", "thunderproof"]);
        tags.push(["p", "aa"]);
        tags.push(["p", "bb"]);
        tags.push(["rating"]);
        tags
    }

    #[test]
    fn test_lookups() {
        let tags = review_tags();
        assert_eq!(tags.value_of("L"), Some("thunderproof"));
        assert_eq!(tags.value_of("p"), Some("aa"));
        assert_eq!(tags.values_of("p"), vec!["aa", "bb"]);
        assert_eq!(tags.find("l").map(|tag| tag.len()), Some(3));
        // a bare key has no value to offer
        assert_eq!(tags.value_of("rating"), None);
        assert!(tags.contains_any("p", &["bb".to_string()]));
        assert!(!tags.contains_any("p", &["cc".to_string()]));
    }

    #[test]
    fn test_json_shape() {
        let tags = Tags(vec![vec!["p".to_string(), "aa".to_string()]]);
        assert_eq!(serde_json::to_string(&tags).unwrap(), r#"[["p","aa"]]"#);
    }
}
