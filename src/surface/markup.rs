//! The rendered view: a tree of styled spans over text nodes.

use std::fmt::Write as _;

use crossterm::style::{Attribute, Color, ContentStyle, StyledContent};

/// Zero-width character an editing host may leave behind in text nodes.
pub const ZERO_WIDTH_MARKER: char = '\u{200B}';

/// Number of spaces a tab expands to in fallback HTML.
pub const TAB_WIDTH: usize = 4;

/// Foreground color of a styled span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Visual style carried by a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpanStyle {
    pub fg: Option<Rgb>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl SpanStyle {
    /// Child style layered over `self`.
    const fn inherit(self, child: Self) -> Self {
        Self {
            fg: match child.fg {
                Some(fg) => Some(fg),
                None => self.fg,
            },
            bold: self.bold || child.bold,
            italic: self.italic || child.italic,
            underline: self.underline || child.underline,
        }
    }

    fn css(&self) -> String {
        let mut css = String::new();
        if let Some(Rgb { r, g, b }) = self.fg {
            let _ = write!(css, "color:#{r:02x}{g:02x}{b:02x};");
        }
        if self.bold {
            css.push_str("font-weight:bold;");
        }
        if self.italic {
            css.push_str("font-style:italic;");
        }
        if self.underline {
            css.push_str("text-decoration:underline;");
        }
        css
    }

    fn content_style(&self) -> ContentStyle {
        let mut style = ContentStyle::new();
        style.foreground_color = self.fg.map(|Rgb { r, g, b }| Color::Rgb { r, g, b });
        if self.bold {
            style.attributes.set(Attribute::Bold);
        }
        if self.italic {
            style.attributes.set(Attribute::Italic);
        }
        if self.underline {
            style.attributes.set(Attribute::Underlined);
        }
        style
    }
}

/// A node of the rendered tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Span { style: SpanStyle, children: Vec<Node> },
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub const fn span(style: SpanStyle, children: Vec<Self>) -> Self {
        Self::Span { style, children }
    }
}

/// Styled markup produced for one document.
///
/// Flattening the text nodes (see [`Markup::raw_text`]) yields the exact
/// text the markup was rendered from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Markup {
    nodes: Vec<Node>,
    fallback: bool,
}

impl Markup {
    /// Markup produced by a renderer.
    pub const fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            fallback: false,
        }
    }

    /// Unstyled, line-faithful markup for `text`.
    ///
    /// Each line, including its line break, becomes one text node.
    pub fn plain(text: &str) -> Self {
        Self {
            nodes: text.split_inclusive('\n').map(Node::text).collect(),
            fallback: true,
        }
    }

    /// Whether this markup came from the escape fallback.
    pub const fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Text nodes in document order.
    pub fn text_nodes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_text(&self.nodes, &mut out);
        out
    }

    /// Visible length of every text node in document order.
    pub fn run_lengths(&self) -> Vec<usize> {
        self.text_nodes().into_iter().map(visible_len).collect()
    }

    /// Concatenated text of all nodes, markers included.
    pub fn raw_text(&self) -> String {
        self.text_nodes().concat()
    }

    /// Concatenated text of all nodes with zero-width markers removed.
    pub fn plain_text(&self) -> String {
        self.text_nodes()
            .into_iter()
            .flat_map(str::chars)
            .filter(|&ch| ch != ZERO_WIDTH_MARKER)
            .collect()
    }

    pub(crate) fn text_node(&self, index: usize) -> Option<&str> {
        self.text_nodes().get(index).copied()
    }

    pub(crate) fn text_node_mut(&mut self, index: usize) -> Option<&mut String> {
        let mut remaining = index;
        nth_text_mut(&mut self.nodes, &mut remaining)
    }

    /// Append a bare text node, returning its run index.
    pub(crate) fn push_text(&mut self, text: String) -> usize {
        self.nodes.push(Node::Text(text));
        self.text_nodes().len() - 1
    }

    /// Serialize to HTML.
    ///
    /// `&`, `<` and `>` are always escaped. Fallback markup additionally
    /// expands tabs to [`TAB_WIDTH`] spaces. Line breaks are emitted as-is.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        write_html(&self.nodes, self.fallback, &mut html);
        html
    }

    /// Serialize to a string with ANSI color escapes.
    pub fn to_ansi(&self) -> String {
        let mut out = String::new();
        write_ansi(&self.nodes, SpanStyle::default(), &mut out);
        out
    }
}

fn collect_text<'a>(nodes: &'a [Node], out: &mut Vec<&'a str>) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push(text),
            Node::Span { children, .. } => collect_text(children, out),
        }
    }
}

fn nth_text_mut<'a>(nodes: &'a mut [Node], remaining: &mut usize) -> Option<&'a mut String> {
    for node in nodes {
        match node {
            Node::Text(text) => {
                if *remaining == 0 {
                    return Some(text);
                }
                *remaining -= 1;
            }
            Node::Span { children, .. } => {
                if let Some(text) = nth_text_mut(children, remaining) {
                    return Some(text);
                }
            }
        }
    }
    None
}

fn write_html(nodes: &[Node], fallback: bool, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => escape_into(text, fallback, out),
            Node::Span { style, children } => {
                let css = style.css();
                if css.is_empty() {
                    out.push_str("<span>");
                } else {
                    let _ = write!(out, "<span style=\"{css}\">");
                }
                write_html(children, fallback, out);
                out.push_str("</span>");
            }
        }
    }
}

fn escape_into(text: &str, expand_tabs: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\t' if expand_tabs => out.extend(std::iter::repeat_n(' ', TAB_WIDTH)),
            _ => out.push(ch),
        }
    }
}

fn write_ansi(nodes: &[Node], inherited: SpanStyle, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => {
                if inherited == SpanStyle::default() {
                    out.push_str(text);
                } else {
                    let styled = StyledContent::new(inherited.content_style(), text.as_str());
                    let _ = write!(out, "{styled}");
                }
            }
            Node::Span { style, children } => {
                write_ansi(children, inherited.inherit(*style), out);
            }
        }
    }
}

/// Length of `text` in characters, not counting zero-width markers.
pub fn visible_len(text: &str) -> usize {
    text.chars().filter(|&ch| ch != ZERO_WIDTH_MARKER).count()
}

/// Convert a character index inside `text` to a visible offset.
pub(crate) fn raw_to_visible(text: &str, raw: usize) -> usize {
    text.chars()
        .take(raw)
        .filter(|&ch| ch != ZERO_WIDTH_MARKER)
        .count()
}

/// Convert a visible offset inside `text` to a character index.
pub(crate) fn visible_to_raw(text: &str, visible: usize) -> usize {
    let mut seen = 0;
    for (raw, ch) in text.chars().enumerate() {
        if seen == visible {
            return raw;
        }
        if ch != ZERO_WIDTH_MARKER {
            seen += 1;
        }
    }
    text.chars().count()
}

/// Byte index of the character at `char_idx`, or the end of `text`.
pub(crate) fn char_to_byte(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map_or(text.len(), |(byte, _)| byte)
}
