// ABOUTME: Patch engine for the deckfit engine
// ABOUTME: Applies sparse slide updates to rendered markup, rewriting only the slides that changed

use crate::content::ContentBlock;
use crate::errors::Result;
use crate::html;
use crate::markup::{self, SlideRegion};
use crate::resources::ResourceMap;
use log::{debug, info, warn};
use quick_xml::escape::escape;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::ops::Range;

const KNOWN_KINDS: [&str; 4] = ["bullets", "nestedBullets", "image", "callout"];

/// One block of an update record as received from an editing client.
///
/// Decoding never fails: unknown kinds and malformed blocks are kept as explicit
/// variants so the patcher can log and skip them one by one.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockRecord {
    Block(ContentBlock),
    Unsupported { kind: String },
    Malformed { kind: String, reason: String },
}

impl From<ContentBlock> for BlockRecord {
    fn from(block: ContentBlock) -> Self {
        BlockRecord::Block(block)
    }
}

impl<'de> Deserialize<'de> for BlockRecord {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        if !KNOWN_KINDS.contains(&kind.as_str()) {
            return Ok(BlockRecord::Unsupported { kind });
        }
        Ok(match serde_json::from_value::<ContentBlock>(value) {
            Ok(block) => BlockRecord::Block(block),
            Err(e) => BlockRecord::Malformed {
                kind,
                reason: e.to_string(),
            },
        })
    }
}

/// A sparse, Slide-like update for one slide.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideUpdate {
    pub index: usize,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub blocks: Vec<BlockRecord>,
}

impl SlideUpdate {
    pub fn new(index: usize, blocks: Vec<ContentBlock>) -> Self {
        Self {
            index,
            title: None,
            subtitle: None,
            blocks: blocks.into_iter().map(BlockRecord::from).collect(),
        }
    }
}

/// An update record that could not be decoded. `position` is its place in the input array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedUpdate {
    pub position: usize,
    pub index: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedUpdates {
    pub updates: Vec<SlideUpdate>,
    pub rejected: Vec<RejectedUpdate>,
}

/// Parses a JSON array of update records, one record at a time.
///
/// Only input that is not a JSON array is an error; a record that does not decode is
/// logged and returned in `rejected` while the rest are kept.
pub fn parse_updates(json: &str) -> Result<ParsedUpdates> {
    let records: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut parsed = ParsedUpdates::default();
    for (position, record) in records.into_iter().enumerate() {
        let index = record
            .get("index")
            .and_then(|i| i.as_u64())
            .and_then(|i| usize::try_from(i).ok());
        match serde_json::from_value::<SlideUpdate>(record) {
            Ok(update) => parsed.updates.push(update),
            Err(e) => {
                warn!("Skipping undecodable update record {}: {}", position, e);
                parsed.rejected.push(RejectedUpdate {
                    position,
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(parsed)
}

/// Parses `json` update records and applies the decodable ones to `markup`.
/// Records that did not decode are listed in the report's `rejected`.
pub fn apply_patch_json(markup: &str, json: &str) -> Result<PatchReport> {
    let parsed = parse_updates(json)?;
    let mut report = apply_patch(markup, &parsed.updates)?;
    report.rejected = parsed.rejected;
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum SkipReason {
    MissingSlide,
    Protected { kind: String },
    NoBlocks,
    DuplicateUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlideSkip {
    pub index: usize,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlideFailure {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSkip {
    pub index: usize,
    pub position: usize,
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchReport {
    #[serde(skip)]
    pub markup: String,
    pub patched: Vec<usize>,
    pub skipped: Vec<SlideSkip>,
    pub failed: Vec<SlideFailure>,
    pub skipped_blocks: Vec<BlockSkip>,
    pub rejected: Vec<RejectedUpdate>,
}

/// Applies `updates` to `markup`. Slides without an eligible update are copied byte for byte.
///
/// Errors only when the markup cannot be scanned at all; per-slide problems end up in the
/// report and leave that slide as it was.
pub fn apply_patch(markup: &str, updates: &[SlideUpdate]) -> Result<PatchReport> {
    if updates.is_empty() {
        return Ok(PatchReport {
            markup: markup.to_string(),
            ..PatchReport::default()
        });
    }

    let regions = markup::slide_regions(markup)?;
    info!(
        "Patching {} updates against {} slides",
        updates.len(),
        regions.len()
    );

    let mut report = PatchReport::default();
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();
    let mut seen = HashSet::new();

    for update in updates {
        if !seen.insert(update.index) {
            warn!("Ignoring duplicate update for slide {}", update.index);
            report.skipped.push(SlideSkip {
                index: update.index,
                reason: SkipReason::DuplicateUpdate,
            });
            continue;
        }
        let Some(region) = regions.iter().find(|r| r.index == update.index) else {
            warn!("Slide {} does not exist; skipping update", update.index);
            report.skipped.push(SlideSkip {
                index: update.index,
                reason: SkipReason::MissingSlide,
            });
            continue;
        };
        if region.is_protected() {
            warn!(
                "Slide {} is a protected {} slide; skipping update",
                update.index, region.kind
            );
            report.skipped.push(SlideSkip {
                index: update.index,
                reason: SkipReason::Protected {
                    kind: region.kind.clone(),
                },
            });
            continue;
        }
        if update.blocks.is_empty() {
            warn!("Update for slide {} carries no blocks; skipping", update.index);
            report.skipped.push(SlideSkip {
                index: update.index,
                reason: SkipReason::NoBlocks,
            });
            continue;
        }

        let mut block_skips = Vec::new();
        match patch_region(region, update, &mut block_skips) {
            Ok(slide_edits) => {
                debug!(
                    "Slide {} patched with {} edits",
                    update.index,
                    slide_edits.len()
                );
                edits.extend(slide_edits);
                report.patched.push(update.index);
            }
            Err(message) => {
                warn!("Failed to patch slide {}: {}", update.index, message);
                report.failed.push(SlideFailure {
                    index: update.index,
                    message,
                });
            }
        }
        report.skipped_blocks.extend(block_skips);
    }

    report.markup = markup::splice(markup, edits);
    Ok(report)
}

/// Computes the edits for one eligible slide. Any error leaves the slide untouched.
fn patch_region(
    region: &SlideRegion,
    update: &SlideUpdate,
    block_skips: &mut Vec<BlockSkip>,
) -> std::result::Result<Vec<(Range<usize>, String)>, String> {
    let content = region
        .content
        .as_ref()
        .ok_or_else(|| "slide has no content region".to_string())?;

    let mut blocks = Vec::new();
    for (position, record) in update.blocks.iter().enumerate() {
        let skip = |kind: &str, reason: String| BlockSkip {
            index: update.index,
            position,
            kind: kind.to_string(),
            reason,
        };
        match record {
            BlockRecord::Block(
                block @ (ContentBlock::Bullets { .. }
                | ContentBlock::NestedBullets { .. }
                | ContentBlock::Callout { .. }),
            ) => blocks.push(block.clone()),
            BlockRecord::Block(block @ ContentBlock::Image { .. }) => {
                warn!(
                    "Slide {}: image blocks cannot be patched; skipping block {}",
                    update.index, position
                );
                block_skips.push(skip(block.kind(), "image blocks are not patchable".to_string()));
            }
            BlockRecord::Unsupported { kind } => {
                warn!(
                    "Slide {}: unrecognised block kind '{}'; skipping block {}",
                    update.index, kind, position
                );
                block_skips.push(skip(kind, "unrecognised block kind".to_string()));
            }
            BlockRecord::Malformed { kind, reason } => {
                warn!(
                    "Slide {}: malformed {} block {}: {}",
                    update.index, kind, position, reason
                );
                block_skips.push(skip(kind, reason.clone()));
            }
        }
    }
    if blocks.is_empty() {
        return Err(format!(
            "none of the {} supplied blocks could be rendered",
            update.blocks.len()
        ));
    }

    let mut edits = Vec::new();

    if let Some(new_title) = &update.title {
        match &region.title {
            Some(title) if title.text != new_title.trim() => {
                edits.push((title.inner.clone(), escape(new_title.trim()).into_owned()));
            }
            Some(_) => {}
            None => warn!("Slide {} has no title element; title left as is", update.index),
        }
    }

    if let Some(new_subtitle) = &update.subtitle {
        let new_subtitle = new_subtitle.trim();
        match &region.subtitle {
            Some(subtitle) if new_subtitle.is_empty() => {
                edits.push((subtitle.outer.clone(), String::new()));
            }
            Some(subtitle) if subtitle.text != new_subtitle => {
                edits.push((subtitle.inner.clone(), escape(new_subtitle).into_owned()));
            }
            Some(_) => {}
            None if new_subtitle.is_empty() => {}
            None => {
                let at = region
                    .title
                    .as_ref()
                    .map_or(content.outer.start, |title| title.outer.end);
                let element = html::render_subtitle(new_subtitle);
                let insertion = if region.title.is_some() {
                    format!("\n{}", element.trim_end())
                } else {
                    element
                };
                edits.push((at..at, insertion));
            }
        }
    }

    let rendered = html::render_blocks(&blocks, &ResourceMap::new());
    edits.push((content.inner.clone(), format!("\n{}", rendered)));

    Ok(edits)
}
