// ABOUTME: Content preprocessing for the deckfit engine
// ABOUTME: Shortens long bullet lists and splits wordy slides before they reach the packer

use crate::content::{count_words, ContentBlock, LessonSlide};
use crate::estimate::HeightTable;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum length of the fallback summary bullet, in characters.
const FALLBACK_SUMMARY_CHARS: usize = 180;
const KEY_TERM_COUNT: usize = 4;

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "also", "and", "any", "are", "because",
    "been", "before", "being", "below", "between", "both", "but", "can", "could", "did", "does",
    "doing", "down", "during", "each", "few", "for", "from", "further", "had", "has", "have",
    "having", "her", "here", "hers", "him", "his", "how", "into", "its", "itself", "just", "more",
    "most", "not", "now", "off", "once", "only", "other", "our", "ours", "out", "over", "own",
    "same", "she", "should", "some", "such", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "through", "too", "under", "until", "very", "was",
    "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with",
    "would", "you", "your", "yours",
];

/// Keeps at most `max_count` bullets. When the list is longer, the first `max_count - 1`
/// items are kept verbatim and the rest collapse into one summary bullet.
pub fn shorten_bullets(items: &[String], max_count: usize) -> Vec<String> {
    if items.len() <= max_count {
        return items.to_vec();
    }
    if max_count == 0 {
        return Vec::new();
    }

    let keep = max_count - 1;
    let remainder = items[keep..].join(" ");
    let mut shortened = items[..keep].to_vec();
    shortened.push(summarize(&remainder));
    debug!(
        "Shortened {} bullets to {} (summary of {} items)",
        items.len(),
        shortened.len(),
        items.len() - keep
    );
    shortened
}

fn summarize(remainder: &str) -> String {
    let terms = key_terms(remainder, KEY_TERM_COUNT);
    if terms.is_empty() {
        truncate_at_word(remainder, FALLBACK_SUMMARY_CHARS)
    } else {
        format!("Also covers: {}.", terms.join(", "))
    }
}

/// Ranks tokens by frequency, then length, then lexical order.
fn key_terms(text: &str, limit: usize) -> Vec<String> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in normalized.split_whitespace() {
        if token.chars().count() <= 2 || STOPWORDS.contains(&token) {
            continue;
        }
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|(a, fa), (b, fb)| {
        fb.cmp(fa)
            .then_with(|| b.chars().count().cmp(&a.chars().count()))
            .then_with(|| a.cmp(b))
    });
    ranked
        .into_iter()
        .take(limit)
        .map(|(term, _)| term.to_string())
        .collect()
}

fn truncate_at_word(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out = String::new();
    for word in text.split_whitespace() {
        let needed = if out.is_empty() { 0 } else { 1 } + word.chars().count();
        if out.chars().count() + needed > max_chars {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    if out.is_empty() {
        // single word longer than the limit
        out = text.chars().take(max_chars).collect();
    }
    out.push('…');
    out
}

/// Splits text into sentences on `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_boundary {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Groups sentences into pieces of at most `max_words` words. A sentence longer than the
/// budget is cut into runs of `max_words` words.
fn pack_sentences(text: &str, max_words: usize) -> Vec<String> {
    let max_words = max_words.max(1);
    let mut pieces = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_words = 0;

    for sentence in split_sentences(text) {
        let words = count_words(&sentence);
        if words > max_words {
            if !current.is_empty() {
                pieces.push(current.join(" "));
                current.clear();
                current_words = 0;
            }
            let tokens: Vec<&str> = sentence.split_whitespace().collect();
            pieces.extend(tokens.chunks(max_words).map(|run| run.join(" ")));
            continue;
        }
        if current_words + words > max_words && !current.is_empty() {
            pieces.push(current.join(" "));
            current.clear();
            current_words = 0;
        }
        current_words += words;
        current.push(sentence);
    }
    if !current.is_empty() {
        pieces.push(current.join(" "));
    }
    pieces
}

/// Splits a slide whose word count exceeds `max_words` into several slides.
///
/// Bullets are grouped greedily; an oversized bullet is broken at sentence boundaries
/// into chunks of its own. Without bullets the caption and text together are split into
/// per-slide captions. Only the first result keeps the image.
pub fn split_slide_content(slide: &LessonSlide, max_words: usize) -> Vec<LessonSlide> {
    let mut parts = split_parts(slide, max_words);
    number_parts(&slide.title, &mut parts);
    parts
}

/// Suffixes titles with `" — Part i/N"` when there is more than one part.
fn number_parts(title: &str, parts: &mut [LessonSlide]) {
    let total = parts.len();
    if total < 2 {
        return;
    }
    for (i, part) in parts.iter_mut().enumerate() {
        part.title = format!("{} — Part {}/{}", title, i + 1, total);
    }
}

/// The split itself; every part keeps the original title.
fn split_parts(slide: &LessonSlide, max_words: usize) -> Vec<LessonSlide> {
    if slide.word_count() <= max_words {
        return vec![slide.clone()];
    }

    let chunks: Vec<SlideBody> = if !slide.bullets.is_empty() {
        chunk_bullets(&slide.bullets, max_words)
            .into_iter()
            .map(SlideBody::Bullets)
            .collect()
    } else {
        let body = paragraph_of(slide);
        if body.is_empty() {
            return vec![slide.clone()];
        }
        pack_sentences(&body, max_words)
            .into_iter()
            .map(SlideBody::Caption)
            .collect()
    };

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, body)| {
            let mut part = slide.clone();
            match body {
                SlideBody::Bullets(bullets) => part.bullets = bullets,
                SlideBody::Caption(caption) => {
                    part.caption = Some(caption);
                    part.text = None;
                }
            }
            if i > 0 {
                part.image = None;
            }
            part
        })
        .collect()
}

enum SlideBody {
    Bullets(Vec<String>),
    Caption(String),
}

fn chunk_bullets(bullets: &[String], max_words: usize) -> Vec<Vec<String>> {
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_words = 0;

    for bullet in bullets {
        let words = count_words(bullet);
        if words > max_words {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_words = 0;
            }
            chunks.extend(pack_sentences(bullet, max_words).into_iter().map(|p| vec![p]));
            continue;
        }
        if current_words + words > max_words && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_words = 0;
        }
        current_words += words;
        current.push(bullet.clone());
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Configured preprocessor: shortening, splitting and a height check against the shared table.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    table: Arc<HeightTable>,
    max_bullets: usize,
    max_words: usize,
}

impl Preprocessor {
    pub fn new(table: Arc<HeightTable>, max_bullets: usize, max_words: usize) -> Self {
        Self {
            table,
            max_bullets,
            max_words: max_words.max(1),
        }
    }

    pub fn table(&self) -> &Arc<HeightTable> {
        &self.table
    }

    /// Shortens, splits, and re-splits anything the estimator says is still too tall.
    pub fn prepare(&self, slide: &LessonSlide) -> Vec<LessonSlide> {
        let mut shortened = slide.clone();
        shortened.bullets = shorten_bullets(&slide.bullets, self.max_bullets);

        let mut prepared = Vec::new();
        for part in split_parts(&shortened, self.max_words) {
            self.fit_by_height(part, self.max_words, &mut prepared);
        }
        number_parts(&slide.title, &mut prepared);
        prepared
    }

    fn fit_by_height(&self, slide: LessonSlide, max_words: usize, out: &mut Vec<LessonSlide>) {
        if self.fits(&slide) {
            out.push(slide);
            return;
        }
        if max_words <= 1 {
            warn!(
                "Slide '{}' exceeds its height budget even at one word per chunk",
                slide.title
            );
            out.push(slide);
            return;
        }
        let smaller = max_words / 2;
        let parts = split_parts(&slide, smaller);
        if parts.len() == 1 && parts[0] == slide {
            // nothing left to split; continue with a smaller budget
            self.fit_by_height(slide, smaller, out);
            return;
        }
        debug!(
            "Re-splitting '{}' with a word budget of {}",
            slide.title, smaller
        );
        for part in parts {
            self.fit_by_height(part, smaller, out);
        }
    }

    /// Whether the blocks this slide will become fit its budget.
    pub fn fits(&self, slide: &LessonSlide) -> bool {
        let blocks = lesson_blocks(slide);
        self.table.estimate_blocks(&blocks) <= self.table.budget(slide.subtitle.is_some())
    }
}

/// The content blocks a lesson slide turns into, in packing order.
pub fn lesson_blocks(slide: &LessonSlide) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    if let Some(reference) = &slide.image {
        blocks.push(ContentBlock::Image {
            reference: reference.clone(),
            caption: None,
        });
    }
    if !slide.bullets.is_empty() {
        blocks.push(ContentBlock::Bullets {
            heading: None,
            items: slide.bullets.clone(),
        });
    }
    let body = paragraph_of(slide);
    if !body.is_empty() {
        blocks.push(ContentBlock::Callout { text: body });
    }
    blocks
}

/// Caption followed by text, as one paragraph.
fn paragraph_of(slide: &LessonSlide) -> String {
    [slide.caption.as_deref(), slide.text.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
