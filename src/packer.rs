// ABOUTME: Slide packing for the deckfit engine
// ABOUTME: Incrementally assembles content blocks into slides without ever exceeding a height budget

use crate::content::{ContentBlock, NestedItem, SlideLayout};
use crate::estimate::HeightTable;
use crate::resources::ResourceMap;
use log::debug;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Why a block was refused. Refusals never mutate packer state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackError {
    #[error("no slide is open")]
    NoOpenSlide,

    #[error("block needs {needed}px but only {remaining}px remain")]
    DoesNotFit { needed: u32, remaining: u32 },

    #[error("block needs {needed}px which exceeds the empty-slide budget of {budget}px")]
    CapacityExhausted { needed: u32, budget: u32 },
}

/// A packed slide. Only the packer can build or mutate one, and only while it is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    title: String,
    subtitle: Option<String>,
    layout: SlideLayout,
    blocks: Vec<ContentBlock>,
    height_budget: u32,
    consumed_height: u32,
    finalized: bool,
}

impl Slide {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    pub fn layout(&self) -> SlideLayout {
        self.layout
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    pub fn height_budget(&self) -> u32 {
        self.height_budget
    }

    pub fn consumed_height(&self) -> u32 {
        self.consumed_height
    }

    pub fn remaining_height(&self) -> u32 {
        self.height_budget.saturating_sub(self.consumed_height)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

/// The finalized output of one build: ordered slides plus image resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Deck {
    slides: Vec<Slide>,
    resources: ResourceMap,
}

impl Deck {
    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn resources(&self) -> &ResourceMap {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }
}

/// Packer state. `Closed` slides live in the deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackerState {
    Idle,
    Open,
}

/// Incremental bin-packer. One instance per deck build; not meant to be shared.
#[derive(Debug)]
pub struct SlidePacker {
    table: Arc<HeightTable>,
    current: Option<Slide>,
    deck: Deck,
}

impl SlidePacker {
    pub fn new(table: Arc<HeightTable>) -> Self {
        Self {
            table,
            current: None,
            deck: Deck::default(),
        }
    }

    pub fn table(&self) -> &Arc<HeightTable> {
        &self.table
    }

    pub fn state(&self) -> PackerState {
        if self.current.is_some() {
            PackerState::Open
        } else {
            PackerState::Idle
        }
    }

    /// The open slide, if any.
    pub fn current(&self) -> Option<&Slide> {
        self.current.as_ref()
    }

    /// Slides finalized so far.
    pub fn finished(&self) -> &[Slide] {
        &self.deck.slides
    }

    /// Opens a new slide. A slide that is still open is finished first.
    pub fn start_slide(&mut self, title: &str, subtitle: Option<&str>, layout: SlideLayout) {
        self.finish_slide();
        let subtitle = subtitle
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let height_budget = self.table.budget(subtitle.is_some());
        debug!("Opening slide '{}' with budget {}px", title, height_budget);
        self.current = Some(Slide {
            title: title.to_string(),
            subtitle,
            layout,
            blocks: Vec::new(),
            height_budget,
            consumed_height: 0,
            finalized: false,
        });
    }

    /// Whether a block of `block_height` fits on the open slide.
    pub fn can_add(&self, block_height: u32) -> bool {
        match &self.current {
            Some(slide) => slide.consumed_height.saturating_add(block_height) <= slide.height_budget,
            None => false,
        }
    }

    /// Height `block` would occupy if appended to the open slide.
    pub fn block_height(&self, block: &ContentBlock) -> Option<u32> {
        self.current
            .as_ref()
            .map(|slide| self.table.estimate_block(block, slide.blocks.len()))
    }

    /// Appends `block` when it fits and returns the height it consumed.
    pub fn add_block(&mut self, block: ContentBlock) -> Result<u32, PackError> {
        let height = self.block_height(&block).ok_or(PackError::NoOpenSlide)?;
        if !self.can_add(height) {
            let slide = self.current.as_ref().ok_or(PackError::NoOpenSlide)?;
            let alone = self.table.estimate_block(&block, 0);
            return Err(if alone > slide.height_budget {
                PackError::CapacityExhausted {
                    needed: alone,
                    budget: slide.height_budget,
                }
            } else {
                PackError::DoesNotFit {
                    needed: height,
                    remaining: slide.remaining_height(),
                }
            });
        }
        let slide = self.current.as_mut().ok_or(PackError::NoOpenSlide)?;
        slide.blocks.push(block);
        slide.consumed_height += height;
        Ok(height)
    }

    pub fn add_bullets(&mut self, heading: Option<&str>, items: &[String]) -> Result<u32, PackError> {
        self.add_block(ContentBlock::Bullets {
            heading: heading.map(str::to_string),
            items: items.to_vec(),
        })
    }

    pub fn add_nested_bullets(
        &mut self,
        heading: Option<&str>,
        items: &[NestedItem],
    ) -> Result<u32, PackError> {
        self.add_block(ContentBlock::NestedBullets {
            heading: heading.map(str::to_string),
            items: items.to_vec(),
        })
    }

    pub fn add_image(&mut self, reference: &str, caption: Option<&str>) -> Result<u32, PackError> {
        self.add_block(ContentBlock::Image {
            reference: reference.to_string(),
            caption: caption.map(str::to_string),
        })
    }

    pub fn add_callout(&mut self, text: &str) -> Result<u32, PackError> {
        self.add_block(ContentBlock::Callout {
            text: text.to_string(),
        })
    }

    /// Finalizes the open slide and appends it to the deck. No-op when idle.
    pub fn finish_slide(&mut self) {
        if let Some(mut slide) = self.current.take() {
            slide.finalized = true;
            debug!(
                "Finished slide '{}' ({}/{}px)",
                slide.title, slide.consumed_height, slide.height_budget
            );
            self.deck.slides.push(slide);
        }
    }

    /// Records where an image reference resolves to.
    pub fn register_resource(&mut self, reference: &str, source: &str) {
        self.deck.resources.insert(reference, source);
    }

    /// Finishes any open slide and hands back the immutable deck.
    pub fn into_deck(mut self) -> Deck {
        self.finish_slide();
        self.deck
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn packer() -> SlidePacker {
        SlidePacker::new(Arc::new(HeightTable::canonical()))
    }

    fn three_short() -> Vec<String> {
        vec!["Roots".to_string(), "Stems".to_string(), "Leaves".to_string()]
    }

    #[test]
    fn test_add_without_open_slide_fails() {
        let mut p = packer();
        assert!(!p.can_add(0));
        assert_eq!(p.add_callout("hi"), Err(PackError::NoOpenSlide));
        assert_eq!(p.state(), PackerState::Idle);
        p.finish_slide();
        assert!(p.into_deck().is_empty());
    }

    #[test]
    fn test_subtitle_budget_accepts_three_bullets() {
        let mut p = packer();
        p.start_slide("Plants", Some("Structure"), SlideLayout::TitleAndContent);
        assert_eq!(p.current().unwrap().height_budget(), 480);
        assert_eq!(p.add_bullets(None, &three_short()), Ok(3 * 34));
        p.finish_slide();
        let deck = p.into_deck();
        let slide = &deck.slides()[0];
        assert!(slide.is_finalized());
        assert!(slide.consumed_height() <= slide.height_budget());
    }

    #[test]
    fn test_no_subtitle_budget_admits_more() {
        let items: Vec<String> = (0..15).map(|i| format!("Item {}", i)).collect();
        let mut with_sub = packer();
        with_sub.start_slide("A", Some("B"), SlideLayout::TitleAndContent);
        assert!(with_sub.add_bullets(None, &items).is_err());

        let mut without_sub = packer();
        without_sub.start_slide("A", None, SlideLayout::TitleAndContent);
        assert_eq!(without_sub.add_bullets(None, &items), Ok(15 * 34));
    }

    #[test]
    fn test_refusal_does_not_mutate() {
        let mut p = packer();
        p.start_slide("Full", None, SlideLayout::TitleAndContent);
        p.add_image("big.png", Some("caption")).unwrap();
        let before = p.current().unwrap().clone();
        let err = p.add_image("second.png", None).unwrap_err();
        assert_eq!(
            err,
            PackError::DoesNotFit {
                needed: 280 + 16,
                remaining: 540 - 308
            }
        );
        assert_eq!(p.current().unwrap(), &before);
    }

    #[test]
    fn test_capacity_exhausted_on_empty_slide() {
        let mut p = packer();
        p.start_slide("Huge", None, SlideLayout::TitleAndContent);
        let items: Vec<String> = (0..40).map(|i| i.to_string()).collect();
        assert_eq!(
            p.add_bullets(None, &items),
            Err(PackError::CapacityExhausted {
                needed: 40 * 34,
                budget: 540
            })
        );
        assert!(p.current().unwrap().blocks().is_empty());
    }

    #[test]
    fn test_start_slide_finishes_open_slide() {
        let mut p = packer();
        p.start_slide("One", None, SlideLayout::TitleAndContent);
        p.add_callout("first").unwrap();
        p.start_slide("Two", None, SlideLayout::TitleAndContent);
        assert_eq!(p.finished().len(), 1);
        assert_eq!(p.state(), PackerState::Open);
        let deck = p.into_deck();
        assert_eq!(deck.len(), 2);
        assert!(deck.slides().iter().all(Slide::is_finalized));
    }

    #[test]
    fn test_register_resource() {
        let mut p = packer();
        p.register_resource("leaf", "https://cdn.example.com/leaf.png?sig=abc");
        let deck = p.into_deck();
        assert_eq!(
            deck.resources().resolve("leaf"),
            "https://cdn.example.com/leaf.png?sig=abc"
        );
    }

    fn block_strategy() -> impl Strategy<Value = ContentBlock> {
        prop_oneof![
            (
                proptest::option::of("[a-z]{1,12}"),
                proptest::collection::vec("[a-z ]{0,150}", 0..12)
            )
                .prop_map(|(heading, items)| ContentBlock::Bullets { heading, items }),
            (
                "[a-z]{1,20}",
                proptest::option::of("[a-z ]{0,40}")
            )
                .prop_map(|(reference, caption)| ContentBlock::Image { reference, caption }),
            "[a-z ]{0,400}".prop_map(|text| ContentBlock::Callout { text }),
            proptest::collection::vec(
                ("[a-z ]{0,80}", proptest::collection::vec("[a-z ]{0,80}", 0..4)),
                0..6
            )
            .prop_map(|items| ContentBlock::NestedBullets {
                heading: None,
                items: items
                    .into_iter()
                    .map(|(text, sub_items)| NestedItem::WithChildren { text, sub_items })
                    .collect(),
            }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_finalized_slides_never_overflow(
            blocks in proptest::collection::vec(block_strategy(), 0..40),
            subtitles in proptest::collection::vec(any::<bool>(), 1..8),
        ) {
            let table = Arc::new(HeightTable::canonical());
            let mut p = SlidePacker::new(table.clone());
            let mut turn = 0usize;
            let open = |p: &mut SlidePacker, turn: &mut usize| {
                let sub = subtitles[*turn % subtitles.len()];
                *turn += 1;
                p.start_slide("Slide", if sub { Some("Sub") } else { None }, SlideLayout::TitleAndContent);
            };
            open(&mut p, &mut turn);
            for block in blocks {
                match p.add_block(block.clone()) {
                    Ok(_) => {}
                    Err(PackError::DoesNotFit { .. }) => {
                        open(&mut p, &mut turn);
                        let _ = p.add_block(block);
                    }
                    Err(PackError::CapacityExhausted { .. }) => {}
                    Err(PackError::NoOpenSlide) => prop_assert!(false, "slide should be open"),
                }
            }
            let deck = p.into_deck();
            for slide in deck.slides() {
                prop_assert!(slide.is_finalized());
                prop_assert!(slide.consumed_height() <= slide.height_budget());
                prop_assert_eq!(slide.consumed_height(), table.estimate_blocks(slide.blocks()));
                prop_assert_eq!(slide.height_budget(), table.budget(slide.subtitle().is_some()));
            }
        }
    }
}
