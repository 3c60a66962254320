// ABOUTME: Library module for the deckfit program.
// ABOUTME: Contains the height estimator, preprocessor, packer, overflow auditor and patch engine.

// Reexport modules
pub mod audit;
pub mod config;
pub mod content;
pub mod errors;
pub mod estimate;
pub mod html;
pub mod lesson;
pub mod markup;
pub mod packer;
pub mod patch;
pub mod pipeline;
pub mod preprocess;
pub mod resources;
pub mod store;
pub mod utils;

// Reexport common types and functions
pub use audit::{AuditReport, OverflowAuditor, SlideAudit, Tolerance};
pub use config::Config;
pub use content::{ContentBlock, LessonSlide, NestedItem, SlideLayout};
pub use errors::{DeckError, Result};
pub use estimate::HeightTable;
pub use html::{generate_html, write_html_to_file};
pub use lesson::{parse_lesson, LessonFormat};
pub use packer::{Deck, PackError, Slide, SlidePacker};
pub use patch::{
    apply_patch, apply_patch_json, parse_updates, ParsedUpdates, PatchReport, RejectedUpdate,
    SlideUpdate,
};
pub use pipeline::{build_deck, BuildReport};
pub use preprocess::{shorten_bullets, split_slide_content, Preprocessor};
pub use resources::{ImageResource, ResourceMap};
pub use store::{apply_edits, EditOutcome, FsMarkupStore, MarkupStore};

#[cfg(test)]
mod tests;
