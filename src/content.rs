// ABOUTME: Content model for the deckfit engine
// ABOUTME: Defines content blocks, slide layouts and the lesson records fed to the preprocessor

use serde::{Deserialize, Serialize};
use std::fmt;

/// One item of a nested bullet list: either plain text or text with one level of sub-items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NestedItem {
    Text(String),
    #[serde(rename_all = "camelCase")]
    WithChildren { text: String, sub_items: Vec<String> },
}

impl NestedItem {
    pub fn text(&self) -> &str {
        match self {
            NestedItem::Text(text) => text,
            NestedItem::WithChildren { text, .. } => text,
        }
    }

    pub fn sub_items(&self) -> &[String] {
        match self {
            NestedItem::Text(_) => &[],
            NestedItem::WithChildren { sub_items, .. } => sub_items,
        }
    }
}

/// One typed unit of slide content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentBlock {
    Bullets {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        heading: Option<String>,
        items: Vec<String>,
    },
    NestedBullets {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        heading: Option<String>,
        items: Vec<NestedItem>,
    },
    Image {
        reference: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Callout {
        text: String,
    },
}

impl ContentBlock {
    /// Short name used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ContentBlock::Bullets { .. } => "bullets",
            ContentBlock::NestedBullets { .. } => "nestedBullets",
            ContentBlock::Image { .. } => "image",
            ContentBlock::Callout { .. } => "callout",
        }
    }
}

/// Slide layouts. Cover, section and closing slides are protected from auditing and patching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlideLayout {
    Cover,
    Section,
    #[default]
    TitleAndContent,
    ImageFocus,
    Closing,
}

impl SlideLayout {
    pub fn is_protected(self) -> bool {
        matches!(
            self,
            SlideLayout::Cover | SlideLayout::Section | SlideLayout::Closing
        )
    }

    /// Value written to the `data-slide-kind` attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            SlideLayout::Cover => "cover",
            SlideLayout::Section => "section",
            SlideLayout::TitleAndContent => "title-and-content",
            SlideLayout::ImageFocus => "image-focus",
            SlideLayout::Closing => "closing",
        }
    }

    /// Parses a `data-slide-kind` value. Unknown kinds yield `None`.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "cover" => Some(SlideLayout::Cover),
            "section" => Some(SlideLayout::Section),
            "title-and-content" | "content" => Some(SlideLayout::TitleAndContent),
            "image-focus" => Some(SlideLayout::ImageFocus),
            "closing" => Some(SlideLayout::Closing),
            _ => None,
        }
    }
}

impl fmt::Display for SlideLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A slide as described by lesson text, before packing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSlide {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub layout: SlideLayout,
    #[serde(default)]
    pub bullets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl LessonSlide {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Total word count across title, subtitle, caption, text and bullets.
    pub fn word_count(&self) -> usize {
        let optional = [&self.subtitle, &self.caption, &self.text]
            .into_iter()
            .flatten()
            .map(|s| count_words(s))
            .sum::<usize>();
        count_words(&self.title) + optional + self.bullets.iter().map(|b| count_words(b)).sum::<usize>()
    }
}

/// Counts whitespace-separated words.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
