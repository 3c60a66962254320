// ABOUTME: Markup scanning for the deckfit engine
// ABOUTME: Builds a span-preserving element tree over rendered slide markup and recovers slide regions and blocks

use crate::content::{ContentBlock, NestedItem, SlideLayout};
use crate::errors::{DeckError, Result};
use log::warn;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::ops::Range;

/// HTML elements that never have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with the byte spans it occupies in the source markup.
///
/// `outer` covers the start tag through the end tag; `inner` covers only the children.
/// `start_tag` is the span of the opening tag itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub outer: Range<usize>,
    pub start_tag: Range<usize>,
    pub inner: Range<usize>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map_or(false, |classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// First descendant (depth-first, excluding self) matching `pred`.
    pub fn find<F>(&self, pred: F) -> Option<&Element>
    where
        F: Fn(&Element) -> bool + Copy,
    {
        for child in self.child_elements() {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find(pred) {
                return Some(found);
            }
        }
        None
    }

    /// All descendant text with whitespace collapsed.
    pub fn text(&self) -> String {
        let mut raw = String::new();
        collect_text(&self.children, &mut raw);
        collapse_whitespace(&raw)
    }

    /// Text of direct text children only.
    pub fn own_text(&self) -> String {
        let raw: String = self
            .children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect();
        collapse_whitespace(&raw)
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => collect_text(&el.children, out),
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn walk<'a>(nodes: &'a [Node], out: &mut Vec<&'a Element>) {
    for node in nodes {
        if let Node::Element(el) = node {
            out.push(el);
            walk(&el.children, out);
        }
    }
}

/// Parses markup into a tree of nodes. Unclosed elements end at the end of input;
/// stray end tags are ignored.
pub fn parse(markup: &str) -> Result<Vec<Node>> {
    let mut reader = Reader::from_str(markup);
    reader.check_end_names(false);

    let mut roots: Vec<Node> = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        let before = reader.buffer_position();
        let event = reader.read_event().map_err(|e| DeckError::MarkupError {
            position: reader.buffer_position(),
            message: e.to_string(),
        })?;
        let after = reader.buffer_position();

        match event {
            Event::Start(start) => {
                let tag = tag_start(markup, before, after)..after;
                let el = open_element(&start, tag);
                if VOID_ELEMENTS.contains(&el.name.as_str()) {
                    attach(&mut roots, &mut stack, Node::Element(el));
                } else {
                    stack.push(el);
                }
            }
            Event::Empty(start) => {
                let tag = tag_start(markup, before, after)..after;
                let el = open_element(&start, tag);
                attach(&mut roots, &mut stack, Node::Element(el));
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).to_ascii_lowercase();
                let close_start = tag_start(markup, before, after);
                let Some(pos) = stack.iter().rposition(|el| el.name == name) else {
                    continue;
                };
                while stack.len() > pos {
                    let Some(mut el) = stack.pop() else { break };
                    el.inner.end = close_start;
                    el.outer.end = if stack.len() == pos { after } else { close_start };
                    attach(&mut roots, &mut stack, Node::Element(el));
                }
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned());
                attach(&mut roots, &mut stack, Node::Text(value));
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(&data).into_owned();
                attach(&mut roots, &mut stack, Node::Text(value));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    while let Some(mut el) = stack.pop() {
        el.inner.end = markup.len();
        el.outer.end = markup.len();
        attach(&mut roots, &mut stack, Node::Element(el));
    }

    Ok(roots)
}

/// Locates the `<` that opens the tag ending at `after`. The reader may or may not
/// have consumed the `<` already when reporting `before`.
fn tag_start(markup: &str, before: usize, after: usize) -> usize {
    let bytes = markup.as_bytes();
    if bytes.get(before) == Some(&b'<') {
        before
    } else if before > 0 && bytes.get(before - 1) == Some(&b'<') {
        before - 1
    } else {
        markup[..after].rfind('<').unwrap_or(before)
    }
}

fn open_element(start: &BytesStart, tag: Range<usize>) -> Element {
    let name = String::from_utf8_lossy(start.name().as_ref()).to_ascii_lowercase();
    let attrs = start
        .html_attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
            let value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            (key, value)
        })
        .collect();
    Element {
        name,
        attrs,
        outer: tag.clone(),
        inner: tag.end..tag.end,
        start_tag: tag,
        children: Vec::new(),
    }
}

fn attach(roots: &mut Vec<Node>, stack: &mut [Element], node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

/// A text-bearing element such as a slide title.
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub text: String,
    pub outer: Range<usize>,
    pub inner: Range<usize>,
}

impl TextNode {
    fn from_element(el: &Element) -> Self {
        Self {
            text: el.text(),
            outer: el.outer.clone(),
            inner: el.inner.clone(),
        }
    }
}

/// One `section.slide` element located in rendered markup.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideRegion {
    pub index: usize,
    /// Raw `data-slide-kind` value.
    pub kind: String,
    pub outer: Range<usize>,
    pub start_tag: Range<usize>,
    pub title: Option<TextNode>,
    pub subtitle: Option<TextNode>,
    pub content: Option<Element>,
}

impl SlideRegion {
    pub fn layout(&self) -> Option<SlideLayout> {
        SlideLayout::from_kind(&self.kind)
    }

    pub fn is_protected(&self) -> bool {
        self.layout().map_or(false, SlideLayout::is_protected)
    }

    pub fn has_subtitle(&self) -> bool {
        self.subtitle.is_some()
    }
}

/// Locates every slide region, in document order. Duplicate indexes keep the first region.
pub fn slide_regions(markup: &str) -> Result<Vec<SlideRegion>> {
    let tree = parse(markup)?;
    let mut elements = Vec::new();
    walk(&tree, &mut elements);

    let mut regions: Vec<SlideRegion> = Vec::new();
    for el in elements {
        if el.name != "section" || !el.has_class("slide") {
            continue;
        }
        let Some(index) = el
            .attr("data-slide-index")
            .and_then(|v| v.trim().parse::<usize>().ok())
        else {
            warn!("Slide section at byte {} has no usable index", el.outer.start);
            continue;
        };
        if regions.iter().any(|r| r.index == index) {
            warn!("Duplicate slide index {}; keeping the first occurrence", index);
            continue;
        }
        regions.push(SlideRegion {
            index,
            kind: el.attr("data-slide-kind").unwrap_or_default().to_string(),
            outer: el.outer.clone(),
            start_tag: el.start_tag.clone(),
            title: el.find(|e| e.has_class("slide-title")).map(TextNode::from_element),
            subtitle: el
                .find(|e| e.has_class("slide-subtitle"))
                .map(TextNode::from_element),
            content: el.find(|e| e.has_class("slide-content")).cloned(),
        });
    }
    Ok(regions)
}

/// Content blocks recovered from a content region, plus the names of elements that were
/// not recognised as any block kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveredBlocks {
    pub blocks: Vec<ContentBlock>,
    pub unrecognized: Vec<String>,
}

/// Reconstructs content blocks from a `slide-content` element.
pub fn recover_blocks(content: &Element) -> RecoveredBlocks {
    let mut recovered = RecoveredBlocks::default();
    for child in content.child_elements() {
        match recover_block(child) {
            Some(block) => recovered.blocks.push(block),
            None => recovered.unrecognized.push(describe(child)),
        }
    }
    recovered
}

fn recover_block(el: &Element) -> Option<ContentBlock> {
    if el.has_class("block-bullets") {
        return Some(ContentBlock::Bullets {
            heading: heading_of(el),
            items: list_of(el)
                .map(|list| list.child_elements().filter(|li| li.name == "li").map(Element::text).collect())
                .unwrap_or_default(),
        });
    }
    if el.has_class("block-nested") {
        return Some(ContentBlock::NestedBullets {
            heading: heading_of(el),
            items: list_of(el).map(nested_items).unwrap_or_default(),
        });
    }
    if el.has_class("block-image") || el.name == "figure" || el.name == "img" {
        let img = if el.name == "img" {
            Some(el)
        } else {
            el.find(|e| e.name == "img")
        };
        let reference = img
            .and_then(|i| i.attr("data-ref").or_else(|| i.attr("src")))
            .unwrap_or_default()
            .to_string();
        let caption = el
            .find(|e| e.name == "figcaption")
            .map(Element::text)
            .filter(|c| !c.is_empty());
        return Some(ContentBlock::Image { reference, caption });
    }
    if el.has_class("block-callout") || el.name == "p" || el.name == "blockquote" {
        return Some(ContentBlock::Callout { text: el.text() });
    }
    if el.name == "ul" || el.name == "ol" {
        let nested = el
            .child_elements()
            .any(|li| li.child_elements().any(|c| c.name == "ul" || c.name == "ol"));
        return Some(if nested {
            ContentBlock::NestedBullets {
                heading: None,
                items: nested_items(el),
            }
        } else {
            ContentBlock::Bullets {
                heading: None,
                items: el.child_elements().filter(|li| li.name == "li").map(Element::text).collect(),
            }
        });
    }
    None
}

fn heading_of(el: &Element) -> Option<String> {
    el.find(|e| e.has_class("block-heading"))
        .map(Element::text)
        .filter(|h| !h.is_empty())
}

fn list_of(el: &Element) -> Option<&Element> {
    el.find(|e| e.name == "ul" || e.name == "ol")
}

fn nested_items(list: &Element) -> Vec<NestedItem> {
    list.child_elements()
        .filter(|li| li.name == "li")
        .map(|li| {
            let sub_items: Vec<String> = li
                .find(|e| e.name == "ul" || e.name == "ol")
                .map(|sub| sub.child_elements().filter(|s| s.name == "li").map(Element::text).collect())
                .unwrap_or_default();
            if sub_items.is_empty() {
                NestedItem::Text(li.text())
            } else {
                NestedItem::WithChildren {
                    text: li.own_text(),
                    sub_items,
                }
            }
        })
        .collect()
}

/// Replaces the given byte ranges and copies everything else verbatim.
/// Edits must not overlap; they are applied in start order.
pub fn splice(markup: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| range.start);
    let mut out = String::with_capacity(markup.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        if range.start < cursor || range.end > markup.len() {
            warn!("Dropping overlapping or out-of-bounds edit at {:?}", range);
            continue;
        }
        out.push_str(&markup[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&markup[cursor..]);
    out
}

fn describe(el: &Element) -> String {
    match el.attr("class") {
        Some(class) => format!("{}.{}", el.name, class.replace(' ', ".")),
        None => el.name.clone(),
    }
}
