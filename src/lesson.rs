// ABOUTME: Lesson input parsing for the deckfit application
// ABOUTME: Turns Markdown or JSON lesson text into the slide records consumed by the preprocessor

use crate::content::{LessonSlide, SlideLayout};
use crate::errors::{DeckError, Result};
use comrak::nodes::{AstNode, NodeValue};
use comrak::{parse_document, Arena, ComrakOptions};
use log::{info, warn};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonFormat {
    Markdown,
    Json,
}

impl LessonFormat {
    /// `.json` files are JSON; everything else is treated as Markdown.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => LessonFormat::Json,
            _ => LessonFormat::Markdown,
        }
    }
}

pub fn parse_lesson(content: &str, format: LessonFormat) -> Result<Vec<LessonSlide>> {
    let slides = match format {
        LessonFormat::Json => parse_lesson_json(content)?,
        LessonFormat::Markdown => parse_lesson_markdown(content),
    };
    if slides.is_empty() {
        return Err(DeckError::LessonError("lesson contains no slides".to_string()));
    }
    info!("Parsed {} lesson slides", slides.len());
    Ok(slides)
}

/// Parses a JSON array of lesson slide records.
pub fn parse_lesson_json(content: &str) -> Result<Vec<LessonSlide>> {
    Ok(serde_json::from_str(content)?)
}

/// Parses Markdown lesson text.
///
/// `# ` headings start slides (`# Section: X` and `# Closing: X` pick those layouts), the
/// first `## ` heading becomes the subtitle, list items become bullets, an image sets the
/// slide image, and remaining paragraphs are joined into the slide text. Leading
/// `% Title` / `% Author` / `% Date` lines produce a cover slide.
pub fn parse_lesson_markdown(content: &str) -> Vec<LessonSlide> {
    let (cover, body) = parse_frontmatter(content);

    let arena = Arena::new();
    let options = ComrakOptions::default();
    let root = parse_document(&arena, &body, &options);

    let mut slides: Vec<LessonSlide> = cover.into_iter().collect();
    let mut current: Option<LessonSlide> = None;

    for node in root.children() {
        let value = node.data.borrow().value.clone();
        match value {
            NodeValue::Heading(heading) if heading.level == 1 => {
                slides.extend(current.take());
                current = Some(slide_from_heading(&inline_text(node)));
            }
            other => {
                let Some(slide) = current.as_mut() else {
                    warn!("Skipping content before the first slide heading");
                    continue;
                };
                match other {
                    NodeValue::Heading(heading) if heading.level == 2 && slide.subtitle.is_none() => {
                        slide.subtitle = Some(inline_text(node));
                    }
                    NodeValue::List(_) => collect_list_items(node, &mut slide.bullets),
                    NodeValue::Paragraph => absorb_paragraph(node, slide),
                    NodeValue::ThematicBreak | NodeValue::HtmlBlock(_) => {}
                    _ => append_text(slide, &inline_text(node)),
                }
            }
        }
    }
    slides.extend(current);
    slides
}

fn slide_from_heading(text: &str) -> LessonSlide {
    let prefixed = |prefix: &str| {
        text.get(..prefix.len())
            .filter(|head| head.eq_ignore_ascii_case(prefix))
            .map(|_| text[prefix.len()..].trim().to_string())
    };
    if let Some(title) = prefixed("Section:") {
        LessonSlide {
            layout: SlideLayout::Section,
            ..LessonSlide::new(title)
        }
    } else if let Some(title) = prefixed("Closing:") {
        LessonSlide {
            layout: SlideLayout::Closing,
            ..LessonSlide::new(title)
        }
    } else {
        LessonSlide::new(text)
    }
}

fn absorb_paragraph<'a>(node: &'a AstNode<'a>, slide: &mut LessonSlide) {
    let mut image_alt = None;
    for child in node.children() {
        if let NodeValue::Image(link) = &child.data.borrow().value {
            if slide.image.is_none() {
                slide.image = Some(link.url.clone());
                image_alt = Some(inline_text(child));
            }
        }
    }
    match image_alt {
        Some(alt) => {
            if slide.caption.is_none() && !alt.is_empty() {
                slide.caption = Some(alt);
            }
        }
        None => append_text(slide, &inline_text(node)),
    }
}

fn append_text(slide: &mut LessonSlide, text: &str) {
    if text.is_empty() {
        return;
    }
    slide.text = Some(match slide.text.take() {
        Some(existing) => format!("{} {}", existing, text),
        None => text.to_string(),
    });
}

/// Flattens a list into bullets; nested items follow their parent.
fn collect_list_items<'a>(list: &'a AstNode<'a>, out: &mut Vec<String>) {
    for item in list.children() {
        let mut nested = Vec::new();
        let mut text = String::new();
        for child in item.children() {
            if matches!(child.data.borrow().value, NodeValue::List(_)) {
                nested.push(child);
            } else {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&inline_text(child));
            }
        }
        if !text.trim().is_empty() {
            out.push(text.trim().to_string());
        }
        for sub in nested {
            collect_list_items(sub, out);
        }
    }
}

/// Plain text of a node and its descendants.
fn inline_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut out = String::new();
    for descendant in node.descendants() {
        match &descendant.data.borrow().value {
            NodeValue::Text(text) => out.push_str(text),
            NodeValue::Code(code) => out.push_str(&code.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => out.push(' '),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse frontmatter in the format: % Title\n% Author\n% Date
fn parse_frontmatter(content: &str) -> (Option<LessonSlide>, String) {
    let lines: Vec<&str> = content.lines().collect();
    let meta: Vec<String> = lines
        .iter()
        .take_while(|line| line.starts_with("% "))
        .map(|line| line.trim_start_matches("% ").trim().to_string())
        .collect();
    if meta.is_empty() {
        return (None, content.to_string());
    }

    let mut cover = LessonSlide::new(meta[0].clone());
    cover.layout = SlideLayout::Cover;
    let byline: Vec<&str> = meta[1..]
        .iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();
    if !byline.is_empty() {
        cover.subtitle = Some(byline.join(" · "));
    }
    (Some(cover), lines[meta.len()..].join("\n"))
}
