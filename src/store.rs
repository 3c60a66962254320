// ABOUTME: Markup storage and the edit flow for the deckfit application
// ABOUTME: Patches stored markup when it exists and regenerates the deck when it does not

use crate::errors::{DeckError, Result};
use crate::patch::{apply_patch, PatchReport, SlideUpdate};
use crate::utils;
use log::{info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Where rendered decks live between edits.
pub trait MarkupStore {
    /// Prior markup for `deck_id`, or `None` if the deck was never stored.
    fn load(&self, deck_id: &str) -> Result<Option<String>>;

    fn save(&self, deck_id: &str, markup: &str) -> Result<()>;
}

/// Stores each deck as `<root>/<deck_id>.html`.
#[derive(Debug, Clone)]
pub struct FsMarkupStore {
    root: PathBuf,
}

impl FsMarkupStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, deck_id: &str) -> Result<PathBuf> {
        let valid = !deck_id.is_empty()
            && deck_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(DeckError::ValidationError(format!(
                "Invalid deck id: {:?}",
                deck_id
            )));
        }
        Ok(self.root.join(format!("{}.html", deck_id)))
    }
}

impl MarkupStore for FsMarkupStore {
    fn load(&self, deck_id: &str) -> Result<Option<String>> {
        let path = self.path_for(deck_id)?;
        match fs::read_to_string(&path) {
            Ok(markup) => Ok(Some(markup)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, deck_id: &str, markup: &str) -> Result<()> {
        let path = self.path_for(deck_id)?;
        utils::ensure_directory_exists(&self.root)?;
        fs::write(&path, markup)?;
        info!("Saved deck {} to {:?}", deck_id, path);
        Ok(())
    }
}

#[derive(Debug)]
pub enum EditOutcome {
    Patched(PatchReport),
    /// No stored markup existed; the deck was rebuilt from scratch.
    Regenerated { markup: String },
}

impl EditOutcome {
    pub fn markup(&self) -> &str {
        match self {
            EditOutcome::Patched(report) => &report.markup,
            EditOutcome::Regenerated { markup } => markup,
        }
    }
}

/// Applies editor updates to a stored deck.
///
/// Stored markup is patched in place; a missing deck is rebuilt with `regenerate`.
/// The resulting markup is saved in both cases.
pub fn apply_edits<S, F>(
    store: &S,
    deck_id: &str,
    updates: &[SlideUpdate],
    regenerate: F,
) -> Result<EditOutcome>
where
    S: MarkupStore + ?Sized,
    F: FnOnce() -> Result<String>,
{
    let outcome = match store.load(deck_id)? {
        Some(existing) => {
            let report = apply_patch(&existing, updates)?;
            info!(
                "Patched deck {}: {} slides updated, {} skipped, {} failed",
                deck_id,
                report.patched.len(),
                report.skipped.len(),
                report.failed.len()
            );
            EditOutcome::Patched(report)
        }
        None => {
            warn!("No stored markup for deck {}, regenerating", deck_id);
            EditOutcome::Regenerated {
                markup: regenerate()?,
            }
        }
    };
    store.save(deck_id, outcome.markup())?;
    Ok(outcome)
}
