// ABOUTME: HTML rendering module for the deckfit engine
// ABOUTME: Renders packed decks and content blocks into the slide markup read by the auditor and patcher

use crate::content::ContentBlock;
use crate::errors::Result;
use crate::packer::{Deck, Slide};
use crate::resources::ResourceMap;
use crate::utils;
use log::info;
use quick_xml::escape::escape;
use std::fs;
use std::path::Path;

/// Render a packed deck into a full HTML document.
pub fn generate_html(deck: &Deck, title: &str) -> String {
    info!("Rendering {} slides to HTML", deck.len());

    let mut html_doc = String::from("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html_doc.push_str("<meta charset=\"UTF-8\">\n");
    html_doc.push_str(&format!("<title>{}</title>\n", escape(title)));
    html_doc.push_str("</head>\n<body>\n<div class=\"slides\">\n");

    for (index, slide) in deck.slides().iter().enumerate() {
        html_doc.push_str(&render_slide(index, slide, deck.resources()));
    }

    html_doc.push_str("</div>\n</body>\n</html>\n");
    html_doc
}

/// Render one slide as a `section` element addressable by its index.
pub fn render_slide(index: usize, slide: &Slide, resources: &ResourceMap) -> String {
    let mut out = format!(
        "<section class=\"slide\" data-slide-index=\"{}\" data-slide-kind=\"{}\">\n",
        index,
        slide.layout()
    );
    out.push_str(&render_title(slide.title()));
    if let Some(subtitle) = slide.subtitle() {
        out.push_str(&render_subtitle(subtitle));
    }
    out.push_str("<div class=\"slide-content\">\n");
    out.push_str(&render_blocks(slide.blocks(), resources));
    out.push_str("</div>\n</section>\n");
    out
}

pub fn render_title(title: &str) -> String {
    format!("<h1 class=\"slide-title\">{}</h1>\n", escape(title))
}

pub fn render_subtitle(subtitle: &str) -> String {
    format!("<h2 class=\"slide-subtitle\">{}</h2>\n", escape(subtitle))
}

/// Render a block sequence, one block per line.
pub fn render_blocks(blocks: &[ContentBlock], resources: &ResourceMap) -> String {
    blocks
        .iter()
        .map(|block| {
            let mut line = render_block(block, resources);
            line.push('\n');
            line
        })
        .collect()
}

pub fn render_block(block: &ContentBlock, resources: &ResourceMap) -> String {
    match block {
        ContentBlock::Bullets { heading, items } => {
            let mut out = String::from("<div class=\"block block-bullets\">");
            push_heading(&mut out, heading.as_deref());
            out.push_str("<ul>");
            for item in items {
                out.push_str(&format!("<li>{}</li>", escape(item)));
            }
            out.push_str("</ul></div>");
            out
        }
        ContentBlock::NestedBullets { heading, items } => {
            let mut out = String::from("<div class=\"block block-nested\">");
            push_heading(&mut out, heading.as_deref());
            out.push_str("<ul>");
            for item in items {
                out.push_str("<li>");
                out.push_str(&escape(item.text()));
                if !item.sub_items().is_empty() {
                    out.push_str("<ul>");
                    for sub in item.sub_items() {
                        out.push_str(&format!("<li>{}</li>", escape(sub)));
                    }
                    out.push_str("</ul>");
                }
                out.push_str("</li>");
            }
            out.push_str("</ul></div>");
            out
        }
        ContentBlock::Image { reference, caption } => {
            let mut out = format!(
                "<figure class=\"block block-image\"><img src=\"{}\" data-ref=\"{}\" alt=\"\"/>",
                escape(resources.resolve(reference)),
                escape(reference)
            );
            if let Some(caption) = caption {
                out.push_str(&format!("<figcaption>{}</figcaption>", escape(caption)));
            }
            out.push_str("</figure>");
            out
        }
        ContentBlock::Callout { text } => {
            format!(
                "<div class=\"block block-callout\"><p>{}</p></div>",
                escape(text)
            )
        }
    }
}

fn push_heading(out: &mut String, heading: Option<&str>) {
    if let Some(heading) = heading.filter(|h| !h.trim().is_empty()) {
        out.push_str(&format!("<h3 class=\"block-heading\">{}</h3>", escape(heading)));
    }
}

/// Utility function to write HTML content to a file
pub fn write_html_to_file(html_content: &str, output_path: &Path) -> Result<()> {
    info!("Writing HTML to file: {:?}", output_path);

    utils::ensure_parent_directory_exists(output_path)?;
    fs::write(output_path, html_content)?;

    Ok(())
}
