// ABOUTME: Height estimation for the deckfit engine
// ABOUTME: Maps content blocks to estimated pixel heights using one canonical constant table

use crate::content::{ContentBlock, NestedItem};
use serde::{Deserialize, Serialize};

/// The canonical constant table shared by the preprocessor, packer and auditor.
///
/// Construct it once per process (usually through [`crate::Config`]) and hand out
/// `Arc<HeightTable>` clones. Two components estimating with different tables is a defect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightTable {
    pub version: String,
    pub canvas_height: u32,
    pub header_allowance: u32,
    pub subtitle_allowance: u32,
    pub bullet_unit_height: u32,
    pub chars_per_line: u32,
    pub sub_item_chars_per_line: u32,
    pub heading_height: u32,
    pub block_spacing: u32,
    pub image_height: u32,
    pub caption_height: u32,
    pub callout_base_height: u32,
    pub callout_line_chars: u32,
    pub callout_extra_line_height: u32,
}

impl Default for HeightTable {
    fn default() -> Self {
        Self::canonical()
    }
}

impl HeightTable {
    pub const CANONICAL_VERSION: &'static str = "2024.1";

    /// The canonical table for a 1280x720 slide canvas.
    pub fn canonical() -> Self {
        Self {
            version: Self::CANONICAL_VERSION.to_string(),
            canvas_height: 720,
            header_allowance: 180,
            subtitle_allowance: 60,
            bullet_unit_height: 34,
            chars_per_line: 64,
            sub_item_chars_per_line: 56,
            heading_height: 40,
            block_spacing: 16,
            image_height: 280,
            caption_height: 28,
            callout_base_height: 56,
            callout_line_chars: 80,
            callout_extra_line_height: 24,
        }
    }

    /// Content budget for a slide. Exactly two values exist: with and without a subtitle.
    pub fn budget(&self, has_subtitle: bool) -> u32 {
        let base = self.canvas_height.saturating_sub(self.header_allowance);
        if has_subtitle {
            base.saturating_sub(self.subtitle_allowance)
        } else {
            base
        }
    }

    /// Estimated height of `block` when placed at `position` (0-based) within a slide.
    /// Spacing is added for every block after the first.
    pub fn estimate_block(&self, block: &ContentBlock, position: usize) -> u32 {
        let spacing = if position > 0 { self.block_spacing } else { 0 };
        let body = match block {
            ContentBlock::Bullets { heading, items } => {
                let lines = saturating_sum(items.iter().map(|item| self.top_level_lines(item)));
                self.heading(heading.as_deref())
                    .saturating_add(lines.saturating_mul(self.bullet_unit_height))
            }
            ContentBlock::NestedBullets { heading, items } => {
                let lines = saturating_sum(items.iter().map(|item| self.nested_lines(item)));
                self.heading(heading.as_deref())
                    .saturating_add(lines.saturating_mul(self.bullet_unit_height))
            }
            ContentBlock::Image { caption, .. } => {
                let caption_height = if caption.as_deref().map_or(false, |c| !c.trim().is_empty())
                {
                    self.caption_height
                } else {
                    0
                };
                self.image_height.saturating_add(caption_height)
            }
            ContentBlock::Callout { text } => {
                let len = text_len(text);
                let extra_lines = if len > self.callout_line_chars {
                    div_ceil(len - self.callout_line_chars, self.callout_line_chars.max(1))
                } else {
                    0
                };
                self.callout_base_height
                    .saturating_add(extra_lines.saturating_mul(self.callout_extra_line_height))
            }
        };
        body.saturating_add(spacing)
    }

    /// Total estimated height of a sequence of blocks on one slide. Saturates at `u32::MAX`.
    pub fn estimate_blocks<'a, I>(&self, blocks: I) -> u32
    where
        I: IntoIterator<Item = &'a ContentBlock>,
    {
        saturating_sum(
            blocks
                .into_iter()
                .enumerate()
                .map(|(position, block)| self.estimate_block(block, position)),
        )
    }

    fn heading(&self, heading: Option<&str>) -> u32 {
        match heading {
            Some(h) if !h.trim().is_empty() => self.heading_height,
            _ => 0,
        }
    }

    /// Line units for a top-level item; never less than one.
    fn top_level_lines(&self, text: &str) -> u32 {
        div_ceil(text_len(text), self.chars_per_line.max(1)).max(1)
    }

    fn nested_lines(&self, item: &NestedItem) -> u32 {
        let children = saturating_sum(
            item.sub_items()
                .iter()
                .map(|sub| div_ceil(text_len(sub), self.sub_item_chars_per_line.max(1))),
        );
        self.top_level_lines(item.text()).saturating_add(children)
    }
}

fn text_len(text: &str) -> u32 {
    u32::try_from(text.trim().chars().count()).unwrap_or(u32::MAX)
}

fn saturating_sum(values: impl IntoIterator<Item = u32>) -> u32 {
    values.into_iter().fold(0, u32::saturating_add)
}

fn div_ceil(n: u32, d: u32) -> u32 {
    n / d + u32::from(n % d != 0)
}
