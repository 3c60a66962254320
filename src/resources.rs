// ABOUTME: Image resource handling for the deckfit engine
// ABOUTME: Maps image references in lesson content to the local or remote sources the markup embeds

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A resolved image source that can be either local or remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResource {
    pub source: String,
    pub is_remote: bool,
}

impl ImageResource {
    /// Create a new ImageResource from a path string.
    /// The source can be either a local file path or a URL.
    pub fn new(source: &str) -> Self {
        let is_remote = source.starts_with("http://") || source.starts_with("https://");
        Self {
            source: source.to_string(),
            is_remote,
        }
    }
}

/// Image-reference-to-resource mapping carried by a deck.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMap {
    entries: BTreeMap<String, ImageResource>,
}

impl ResourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: &str, source: &str) {
        self.entries
            .insert(reference.to_string(), ImageResource::new(source));
    }

    pub fn get(&self, reference: &str) -> Option<&ImageResource> {
        self.entries.get(reference)
    }

    /// The source to embed for `reference`; unmapped references are used verbatim.
    pub fn resolve<'a>(&'a self, reference: &'a str) -> &'a str {
        self.entries
            .get(reference)
            .map(|r| r.source.as_str())
            .unwrap_or(reference)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ImageResource)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
