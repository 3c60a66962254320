// ABOUTME: Configuration module for the deckfit application
// ABOUTME: Provides the shared height table and the limits handed to each component

use crate::audit::{OverflowAuditor, Tolerance};
use crate::errors::{DeckError, Result};
use crate::estimate::HeightTable;
use crate::packer::SlidePacker;
use crate::preprocess::Preprocessor;
use log::info;
use std::env;
use std::fs;
use std::sync::Arc;

pub const DEFAULT_MAX_BULLETS: usize = 6;
pub const DEFAULT_MAX_WORDS: usize = 80;

/// Process-wide configuration. Build it once and pass it around; every component it
/// hands out shares the same `HeightTable` instance.
#[derive(Debug, Clone)]
pub struct Config {
    pub max_bullets: usize,
    pub max_words: usize,
    pub audit_tolerance: Tolerance,
    height_table: Arc<HeightTable>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_bullets: DEFAULT_MAX_BULLETS,
            max_words: DEFAULT_MAX_WORDS,
            audit_tolerance: Tolerance::Exact,
            height_table: Arc::new(HeightTable::canonical()),
        }
    }
}

impl Config {
    /// Create a new configuration instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different height table for every component.
    pub fn with_height_table(mut self, table: HeightTable) -> Self {
        self.height_table = Arc::new(table);
        self
    }

    /// Load configuration from environment variables
    ///
    /// - `DECKFIT_MAX_BULLETS`, `DECKFIT_MAX_WORDS`: preprocessing limits
    /// - `DECKFIT_AUDIT_TOLERANCE`: overflow tolerance in percent (unset means exact)
    /// - `DECKFIT_HEIGHT_TABLE`: path to a JSON height table replacing the canonical one
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = read_var("DECKFIT_MAX_BULLETS") {
            config.max_bullets = parse_var("DECKFIT_MAX_BULLETS", &value)?;
        }
        if let Some(value) = read_var("DECKFIT_MAX_WORDS") {
            config.max_words = parse_var("DECKFIT_MAX_WORDS", &value)?;
        }
        if let Some(value) = read_var("DECKFIT_AUDIT_TOLERANCE") {
            let percent: f64 = parse_var("DECKFIT_AUDIT_TOLERANCE", &value)?;
            if !percent.is_finite() || percent < 0.0 {
                return Err(DeckError::ConfigError(format!(
                    "DECKFIT_AUDIT_TOLERANCE must be a non-negative percentage, got {}",
                    value
                )));
            }
            config.audit_tolerance = Tolerance::from_percent(percent);
        }
        if let Some(path) = read_var("DECKFIT_HEIGHT_TABLE") {
            let table: HeightTable = serde_json::from_str(&fs::read_to_string(&path)?)?;
            info!("Using height table {} from {}", table.version, path);
            config.height_table = Arc::new(table);
        }

        Ok(config)
    }

    pub fn height_table(&self) -> &Arc<HeightTable> {
        &self.height_table
    }

    pub fn preprocessor(&self) -> Preprocessor {
        Preprocessor::new(self.height_table.clone(), self.max_bullets, self.max_words)
    }

    /// A fresh packer for one deck build.
    pub fn packer(&self) -> SlidePacker {
        SlidePacker::new(self.height_table.clone())
    }

    /// An auditor using the configured tolerance.
    pub fn auditor(&self) -> OverflowAuditor {
        self.auditor_with(self.audit_tolerance)
    }

    pub fn auditor_with(&self, tolerance: Tolerance) -> OverflowAuditor {
        OverflowAuditor::new(self.height_table.clone(), tolerance)
    }
}

fn read_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| DeckError::ConfigError(format!("Invalid value for {}: {}", name, value)))
}
