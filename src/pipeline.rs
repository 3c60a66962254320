// ABOUTME: Deck build pipeline for the deckfit engine
// ABOUTME: Runs lesson slides through the preprocessor and packer and collects per-slide failures

use crate::content::LessonSlide;
use crate::packer::{Deck, PackError, SlidePacker};
use crate::preprocess::{lesson_blocks, Preprocessor};
use crate::resources::ResourceMap;
use log::{info, warn};
use serde::Serialize;

/// A block that could not be placed, even on a slide of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackFailure {
    pub slide_title: String,
    pub block_kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub deck: Deck,
    pub failures: Vec<PackFailure>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Builds a deck from lesson slides.
///
/// Content slides are shortened and split first; protected slides (cover, section,
/// closing) are packed as written. A block that does not fit the remaining space moves
/// to a continuation slide; a block that fits nowhere is reported and the build goes on.
pub fn build_deck(
    lessons: &[LessonSlide],
    preprocessor: &Preprocessor,
    mut packer: SlidePacker,
    resources: &ResourceMap,
) -> BuildReport {
    info!("Building deck from {} lesson slides", lessons.len());
    let mut failures = Vec::new();

    for lesson in lessons {
        let prepared = if lesson.layout.is_protected() {
            vec![lesson.clone()]
        } else {
            preprocessor.prepare(lesson)
        };

        for slide in &prepared {
            if let Some(reference) = &slide.image {
                if let Some(resource) = resources.get(reference) {
                    packer.register_resource(reference, &resource.source);
                }
            }

            packer.start_slide(&slide.title, slide.subtitle.as_deref(), slide.layout);
            for block in lesson_blocks(slide) {
                let kind = block.kind();
                let outcome = match packer.add_block(block.clone()) {
                    Err(PackError::DoesNotFit { .. }) => {
                        let title = format!("{} (cont.)", slide.title);
                        packer.start_slide(&title, slide.subtitle.as_deref(), slide.layout);
                        packer.add_block(block)
                    }
                    other => other,
                };
                if let Err(e) = outcome {
                    warn!("Could not place {} block on '{}': {}", kind, slide.title, e);
                    failures.push(PackFailure {
                        slide_title: slide.title.clone(),
                        block_kind: kind.to_string(),
                        message: e.to_string(),
                    });
                }
            }
            packer.finish_slide();
        }
    }

    let deck = packer.into_deck();
    info!(
        "Built {} slides ({} packing failures)",
        deck.len(),
        failures.len()
    );
    BuildReport { deck, failures }
}
