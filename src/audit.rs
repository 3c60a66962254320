// ABOUTME: Overflow auditing for the deckfit engine
// ABOUTME: Re-estimates slide heights from rendered markup and annotates slides that exceed their budget

use crate::errors::Result;
use crate::estimate::HeightTable;
use crate::markup::{self, SlideRegion};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

const OVERFLOW_ATTRS: [&str; 4] = [
    "data-overflow",
    "data-estimated-height",
    "data-height-budget",
    "data-overflow-excess",
];

/// How far past its budget a slide may run before it counts as overflowing.
///
/// There is no implicit margin: callers that want one must ask for it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tolerance {
    #[default]
    Exact,
    Percent(f64),
}

impl Tolerance {
    /// Zero or negative percentages collapse to `Exact`.
    pub fn from_percent(percent: f64) -> Self {
        if percent > 0.0 {
            Tolerance::Percent(percent)
        } else {
            Tolerance::Exact
        }
    }

    /// Largest estimated height accepted for `budget`.
    pub fn ceiling(self, budget: u32) -> u32 {
        match self {
            Tolerance::Exact => budget,
            Tolerance::Percent(percent) => {
                let margin = (f64::from(budget) * percent / 100.0).floor();
                budget.saturating_add(margin as u32)
            }
        }
    }
}

/// The audit result for one slide.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideAudit {
    pub index: usize,
    pub kind: String,
    pub has_subtitle: bool,
    pub estimated_height: u32,
    pub budget: u32,
    pub excess: u32,
    pub overflow: bool,
    pub unrecognized: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    /// Input markup with overflow attributes added to (or cleared from) slide sections.
    #[serde(skip)]
    pub markup: String,
    pub tolerance: Tolerance,
    pub table_version: String,
    pub slides: Vec<SlideAudit>,
    pub skipped_protected: Vec<usize>,
}

impl AuditReport {
    pub fn overflowing(&self) -> impl Iterator<Item = &SlideAudit> {
        self.slides.iter().filter(|s| s.overflow)
    }

    pub fn has_overflow(&self) -> bool {
        self.overflowing().next().is_some()
    }
}

/// Audits rendered markup with the same table the packer used.
#[derive(Debug, Clone)]
pub struct OverflowAuditor {
    table: Arc<HeightTable>,
    tolerance: Tolerance,
}

impl OverflowAuditor {
    pub fn new(table: Arc<HeightTable>, tolerance: Tolerance) -> Self {
        Self { table, tolerance }
    }

    pub fn table(&self) -> &Arc<HeightTable> {
        &self.table
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Estimates every unprotected slide and annotates the ones that overflow.
    /// Content is never modified; only `section` start tags change.
    pub fn audit(&self, markup: &str) -> Result<AuditReport> {
        let regions = markup::slide_regions(markup)?;
        info!("Auditing {} slide regions", regions.len());

        let mut slides = Vec::new();
        let mut skipped_protected = Vec::new();
        let mut edits: Vec<(Range<usize>, String)> = Vec::new();

        for region in &regions {
            if region.is_protected() {
                debug!("Skipping protected slide {} ({})", region.index, region.kind);
                skipped_protected.push(region.index);
                continue;
            }
            let audit = self.audit_region(region);
            let raw_tag = &markup[region.start_tag.clone()];
            let tag = annotate_start_tag(raw_tag, &audit);
            if tag != raw_tag {
                edits.push((region.start_tag.clone(), tag));
            }
            if audit.overflow {
                warn!(
                    "Slide {} overflows: {}px estimated against {}px budget",
                    audit.index, audit.estimated_height, audit.budget
                );
            }
            slides.push(audit);
        }

        Ok(AuditReport {
            markup: markup::splice(markup, edits),
            tolerance: self.tolerance,
            table_version: self.table.version.clone(),
            slides,
            skipped_protected,
        })
    }

    /// Estimates one slide region.
    pub fn audit_region(&self, region: &SlideRegion) -> SlideAudit {
        let budget = self.table.budget(region.has_subtitle());
        let (estimated_height, unrecognized) = match &region.content {
            Some(content) => {
                let recovered = markup::recover_blocks(content);
                for name in &recovered.unrecognized {
                    warn!(
                        "Slide {}: skipping unrecognised content element <{}>",
                        region.index, name
                    );
                }
                (
                    self.table.estimate_blocks(&recovered.blocks),
                    recovered.unrecognized,
                )
            }
            None => {
                debug!("Slide {} has no content region", region.index);
                (0, Vec::new())
            }
        };
        let overflow = estimated_height > self.tolerance.ceiling(budget);
        SlideAudit {
            index: region.index,
            kind: region.kind.clone(),
            has_subtitle: region.has_subtitle(),
            estimated_height,
            budget,
            excess: estimated_height.saturating_sub(budget),
            overflow,
            unrecognized,
        }
    }
}

/// Rewrites a section start tag: previous overflow attributes are removed and fresh
/// ones appended when the slide overflows.
fn annotate_start_tag(raw: &str, audit: &SlideAudit) -> String {
    let mut tag = raw.to_string();
    for name in OVERFLOW_ATTRS {
        tag = remove_attr(&tag, name);
    }
    if !audit.overflow {
        return tag;
    }
    let annotation = format!(
        " data-overflow=\"true\" data-estimated-height=\"{}\" data-height-budget=\"{}\" data-overflow-excess=\"{}\"",
        audit.estimated_height, audit.budget, audit.excess
    );
    let close = if tag.ends_with("/>") {
        tag.len() - 2
    } else {
        tag.len().saturating_sub(1)
    };
    tag.insert_str(close, &annotation);
    tag
}

/// Removes ` name="..."` from a start tag if present.
fn remove_attr(tag: &str, name: &str) -> String {
    let needle = format!(" {}=\"", name);
    let Some(start) = tag.find(&needle) else {
        return tag.to_string();
    };
    let value_start = start + needle.len();
    match tag[value_start..].find('"') {
        Some(end) => format!("{}{}", &tag[..start], &tag[value_start + end + 1..]),
        None => tag.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(index: usize, kind: &str, subtitle: bool, items: usize) -> String {
        let mut out = format!(
            "<section class=\"slide\" data-slide-index=\"{}\" data-slide-kind=\"{}\">\n<h1 class=\"slide-title\">T{}</h1>\n",
            index, kind, index
        );
        if subtitle {
            out.push_str("<h2 class=\"slide-subtitle\">Sub</h2>\n");
        }
        out.push_str("<div class=\"slide-content\">\n<div class=\"block block-bullets\"><ul>");
        for i in 0..items {
            out.push_str(&format!("<li>item {}</li>", i));
        }
        out.push_str("</ul></div>\n</div>\n</section>\n");
        out
    }

    fn auditor(tolerance: Tolerance) -> OverflowAuditor {
        OverflowAuditor::new(Arc::new(HeightTable::canonical()), tolerance)
    }

    #[test]
    fn test_tolerance_ceiling() {
        assert_eq!(Tolerance::Exact.ceiling(540), 540);
        assert_eq!(Tolerance::Percent(10.0).ceiling(540), 594);
        assert_eq!(Tolerance::from_percent(0.0), Tolerance::Exact);
    }

    #[test]
    fn test_annotates_only_overflowing_slides() {
        // 15 items: 510px fits without a subtitle, overflows the 480px subtitle budget
        let markup = format!(
            "<body>{}{}</body>",
            section(0, "title-and-content", false, 15),
            section(1, "title-and-content", true, 15)
        );
        let report = auditor(Tolerance::Exact).audit(&markup).unwrap();
        assert_eq!(report.slides.len(), 2);
        assert!(!report.slides[0].overflow);
        assert!(report.slides[1].overflow);
        assert_eq!(report.slides[1].estimated_height, 510);
        assert_eq!(report.slides[1].budget, 480);
        assert_eq!(report.slides[1].excess, 30);
        assert!(report.markup.contains(
            "data-slide-index=\"1\" data-slide-kind=\"title-and-content\" data-overflow=\"true\" data-estimated-height=\"510\" data-height-budget=\"480\" data-overflow-excess=\"30\">"
        ));
        // content untouched: removing the annotation restores the input
        let restored = report.markup.replace(
            " data-overflow=\"true\" data-estimated-height=\"510\" data-height-budget=\"480\" data-overflow-excess=\"30\"",
            "",
        );
        assert_eq!(restored, markup);
    }

    #[test]
    fn test_tolerance_is_explicit() {
        let markup = section(0, "title-and-content", true, 15);
        assert!(auditor(Tolerance::Exact).audit(&markup).unwrap().has_overflow());
        assert!(!auditor(Tolerance::Percent(10.0))
            .audit(&markup)
            .unwrap()
            .has_overflow());
    }

    #[test]
    fn test_protected_slides_skipped() {
        let markup = format!(
            "{}{}{}",
            section(0, "cover", true, 40),
            section(1, "section", true, 40),
            section(2, "closing", true, 40)
        );
        let report = auditor(Tolerance::Exact).audit(&markup).unwrap();
        assert!(report.slides.is_empty());
        assert_eq!(report.skipped_protected, vec![0, 1, 2]);
        assert_eq!(report.markup, markup);
    }

    #[test]
    fn test_reaudit_replaces_annotation() {
        let markup = section(0, "title-and-content", true, 20);
        let auditor = auditor(Tolerance::Exact);
        let first = auditor.audit(&markup).unwrap();
        let second = auditor.audit(&first.markup).unwrap();
        assert_eq!(first.markup, second.markup);
        assert_eq!(second.markup.matches("data-overflow=").count(), 1);
    }

    #[test]
    fn test_annotation_cleared_when_fixed() {
        let stale = section(0, "title-and-content", false, 2).replacen(
            "data-slide-kind=\"title-and-content\"",
            "data-slide-kind=\"title-and-content\" data-overflow=\"true\" data-estimated-height=\"900\" data-height-budget=\"540\" data-overflow-excess=\"360\"",
            1,
        );
        let report = auditor(Tolerance::Exact).audit(&stale).unwrap();
        assert!(!report.has_overflow());
        assert_eq!(report.markup, section(0, "title-and-content", false, 2));
    }
}
