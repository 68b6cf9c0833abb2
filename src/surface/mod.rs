//! The editable highlight surface.
//!
//! Keeps three things consistent across every edit: the document text, the
//! rendered [`Markup`] shown for it, and the caret inside that markup.
//!
//! The surface is a disposable projection. It never owns document content;
//! callers pass the new content to [`HighlightSurface::apply_edit`], which
//! re-renders and carries the caret across by linear offset.

pub mod caret;
mod markup;
mod splice;

use std::fmt;
use std::sync::Arc;

pub use markup::{Markup, Node, Rgb, SpanStyle, TAB_WIDTH, ZERO_WIDTH_MARKER, visible_len};
pub use splice::{InvalidRange, clamp_range, insert_at};

use crate::highlight::{self, Renderer};
use caret::RunPosition;
use markup::{char_to_byte, raw_to_visible, visible_to_raw};

/// A point inside the live surface, as an editing host reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfacePoint {
    /// Text node index in document order.
    pub run: usize,
    /// Character index inside that node, zero-width markers included.
    pub index: usize,
}

impl SurfacePoint {
    pub const fn new(run: usize, index: usize) -> Self {
        Self { run, index }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Selection {
    anchor: SurfacePoint,
    focus: SurfacePoint,
}

/// Rendered, caret-addressable view of the active document.
pub struct HighlightSurface {
    renderer: Arc<dyn Renderer>,
    view: Markup,
    selection: Option<Selection>,
    editable: bool,
}

impl HighlightSurface {
    /// An empty, editable surface.
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            view: Markup::default(),
            selection: None,
            editable: true,
        }
    }

    pub fn set_renderer(&mut self, renderer: Arc<dyn Renderer>) {
        self.renderer = renderer;
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    pub const fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
    }

    pub const fn is_editable(&self) -> bool {
        self.editable
    }

    /// The markup currently shown.
    pub const fn view(&self) -> &Markup {
        &self.view
    }

    /// Render `content` without touching the live view.
    pub fn render(&self, content: &str, language: &str) -> Markup {
        highlight::render(self.renderer.as_ref(), content, language)
    }

    /// Text currently present in the live view, markers stripped.
    pub fn plain_text(&self) -> String {
        self.view.plain_text()
    }

    /// Caret offset into the live view's text; 0 when no caret is placed.
    pub fn capture_caret_offset(&self) -> usize {
        self.selection
            .map_or(0, |selection| self.offset_of(selection.focus))
    }

    /// Ordered selection offsets; collapsed at 0 when no caret is placed.
    pub fn capture_selection(&self) -> (usize, usize) {
        self.selection.map_or((0, 0), |selection| {
            let anchor = self.offset_of(selection.anchor);
            let focus = self.offset_of(selection.focus);
            (anchor.min(focus), anchor.max(focus))
        })
    }

    /// Place a collapsed caret at `offset`, clamped to the end of the text.
    ///
    /// Does nothing when the view has no text-bearing nodes.
    pub fn restore_caret_offset(&mut self, offset: usize) {
        if let Some(point) = self.point_at(offset) {
            self.selection = Some(Selection {
                anchor: point,
                focus: point,
            });
        }
    }

    /// Select the text between two offsets, clamped like carets.
    pub fn restore_selection(&mut self, start: usize, end: usize) {
        if let (Some(anchor), Some(focus)) = (self.point_at(start), self.point_at(end)) {
            self.selection = Some(Selection { anchor, focus });
        }
    }

    /// Re-render from `content` and optionally carry the caret across.
    pub fn apply_edit(&mut self, content: &str, language: &str, preserve_caret: bool) {
        let caret = preserve_caret.then(|| self.capture_caret_offset());
        self.view = self.render(content, language);
        self.selection = None;
        if let Some(offset) = caret {
            self.restore_caret_offset(offset);
        }
        crate::perf::log_event(
            "surface.apply_edit",
            format!(
                "lang={language} chars={} caret={caret:?} fallback={}",
                content.chars().count(),
                self.view.is_fallback()
            ),
        );
    }

    /// Put the caret at a host-reported point.
    ///
    /// A point outside any text node leaves the surface without a caret.
    pub fn set_caret(&mut self, point: SurfacePoint) {
        self.set_selection(point, point);
    }

    /// Select from `anchor` to `focus` at host-reported points.
    pub fn set_selection(&mut self, anchor: SurfacePoint, focus: SurfacePoint) {
        self.selection = match (self.clamp_point(anchor), self.clamp_point(focus)) {
            (Some(anchor), Some(focus)) => Some(Selection { anchor, focus }),
            _ => None,
        };
    }

    /// Drop the caret, as when the surface loses focus.
    pub const fn clear_caret(&mut self) {
        self.selection = None;
    }

    pub const fn has_caret(&self) -> bool {
        self.selection.is_some()
    }

    /// Type `text` over the selection directly in the live view.
    ///
    /// Mirrors native editing: the view changes before any document does.
    /// Returns `false` when the surface is read-only or has no caret.
    pub fn type_text(&mut self, text: &str) -> bool {
        if !self.editable || self.selection.is_none() {
            return false;
        }
        let (start, end) = self.capture_selection();
        self.remove_range(start, end);
        self.insert_text(start, text);
        self.settle_caret(start + visible_len(text));
        true
    }

    /// Delete the selection, or the character before the caret.
    ///
    /// Returns `true` if anything was removed.
    pub fn delete_backward(&mut self) -> bool {
        if !self.editable || self.selection.is_none() {
            return false;
        }
        let (start, end) = self.capture_selection();
        let start = if start == end {
            if start == 0 {
                return false;
            }
            start - 1
        } else {
            start
        };
        self.remove_range(start, end);
        self.settle_caret(start);
        true
    }

    /// Collapse the caret at `offset` after a live edit.
    ///
    /// When the edit left no text behind the caret stays at the start of the
    /// first text node, the way an emptied editing host keeps focus.
    fn settle_caret(&mut self, offset: usize) {
        self.selection = None;
        self.restore_caret_offset(offset);
        if self.selection.is_none() {
            let run = if self.view.run_lengths().is_empty() {
                self.view.push_text(String::new())
            } else {
                0
            };
            self.set_caret(SurfacePoint::new(run, 0));
        }
    }

    fn offset_of(&self, point: SurfacePoint) -> usize {
        let lengths = self.view.run_lengths();
        let local = self
            .view
            .text_node(point.run)
            .map_or(0, |text| raw_to_visible(text, point.index));
        caret::offset_at(&lengths, RunPosition::new(point.run, local))
    }

    fn point_at(&self, offset: usize) -> Option<SurfacePoint> {
        let lengths = self.view.run_lengths();
        let pos = caret::position_at(&lengths, offset)?;
        let text = self.view.text_node(pos.run)?;
        Some(SurfacePoint::new(pos.run, visible_to_raw(text, pos.local)))
    }

    fn clamp_point(&self, point: SurfacePoint) -> Option<SurfacePoint> {
        let text = self.view.text_node(point.run)?;
        Some(SurfacePoint::new(
            point.run,
            point.index.min(text.chars().count()),
        ))
    }

    fn remove_range(&mut self, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let lengths = self.view.run_lengths();
        let mut run_start = 0;
        for (run, len) in lengths.into_iter().enumerate() {
            let run_end = run_start + len;
            let lo = start.max(run_start);
            let hi = end.min(run_end);
            if lo < hi
                && let Some(text) = self.view.text_node_mut(run)
            {
                let from = char_to_byte(text, visible_to_raw(text, lo - run_start));
                let to = char_to_byte(text, visible_to_raw(text, hi - run_start));
                text.replace_range(from..to, "");
            }
            run_start = run_end;
        }
    }

    fn insert_text(&mut self, offset: usize, text: &str) {
        let lengths = self.view.run_lengths();
        let (run, local) = match caret::position_at(&lengths, offset) {
            Some(pos) => (pos.run, pos.local),
            None if !lengths.is_empty() => (0, 0),
            None => {
                self.view.push_text(text.to_string());
                return;
            }
        };
        if let Some(node) = self.view.text_node_mut(run) {
            let at = char_to_byte(node, visible_to_raw(node, local));
            node.insert_str(at, text);
        }
    }
}

impl fmt::Debug for HighlightSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HighlightSurface")
            .field("runs", &self.view.run_lengths().len())
            .field("fallback", &self.view.is_fallback())
            .field("selection", &self.selection)
            .field("editable", &self.editable)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::{HighlightBackground, RenderError, SyntectRenderer};

    /// Splits text into one single-character span per character, nested
    /// inside an outer span with an empty text node up front.
    struct Shredder;

    impl Renderer for Shredder {
        fn highlight(&self, text: &str, _language: &str) -> Result<Markup, RenderError> {
            let mut children = vec![Node::text("")];
            children.extend(text.chars().map(|ch| {
                Node::span(
                    SpanStyle::default(),
                    vec![Node::span(SpanStyle::default(), vec![Node::text(ch)])],
                )
            }));
            Ok(Markup::new(vec![Node::span(SpanStyle::default(), children)]))
        }
    }

    fn syntect_surface() -> HighlightSurface {
        HighlightSurface::new(Arc::new(SyntectRenderer::new(HighlightBackground::Dark)))
    }

    fn shredded_surface(text: &str) -> HighlightSurface {
        let mut surface = HighlightSurface::new(Arc::new(Shredder));
        surface.apply_edit(text, "any", false);
        surface
    }

    #[test]
    fn test_capture_without_caret_is_zero() {
        let mut surface = syntect_surface();
        surface.apply_edit("let x = 1;\n", "javascript", false);
        assert!(!surface.has_caret());
        assert_eq!(surface.capture_caret_offset(), 0);
    }

    #[test]
    fn test_restore_then_capture_round_trips() {
        let text = "function f(a) {\n  return a < 2;\n}\n";
        let mut surface = syntect_surface();
        surface.apply_edit(text, "javascript", false);
        for offset in 0..=text.chars().count() {
            surface.restore_caret_offset(offset);
            assert_eq!(surface.capture_caret_offset(), offset, "offset {offset}");
        }
    }

    #[test]
    fn test_restore_past_end_clamps() {
        let mut surface = shredded_surface("abc\n");
        surface.restore_caret_offset(40);
        assert_eq!(surface.capture_caret_offset(), 4);
    }

    #[test]
    fn test_restore_on_empty_surface_is_noop() {
        let mut surface = syntect_surface();
        surface.apply_edit("", "css", true);
        surface.restore_caret_offset(3);
        assert!(!surface.has_caret());
        assert_eq!(surface.capture_caret_offset(), 0);
    }

    #[test]
    fn test_apply_edit_preserves_caret_across_rerender() {
        let mut surface = shredded_surface("hello world");
        surface.restore_caret_offset(5);
        surface.apply_edit("hello, world", "any", true);
        assert_eq!(surface.capture_caret_offset(), 5);
        assert_eq!(surface.plain_text(), "hello, world");
    }

    #[test]
    fn test_apply_edit_without_preserve_drops_caret() {
        let mut surface = shredded_surface("hello");
        surface.restore_caret_offset(3);
        surface.apply_edit("hello", "any", false);
        assert!(!surface.has_caret());
    }

    #[test]
    fn test_caret_in_nested_spans_counts_preceding_nodes() {
        let mut surface = shredded_surface("héllo");
        // Run 0 is the empty leading node; run 3 holds the first 'l'.
        surface.set_caret(SurfacePoint::new(3, 1));
        assert_eq!(surface.capture_caret_offset(), 3);
    }

    #[test]
    fn test_point_outside_any_text_node_clears_caret() {
        let mut surface = shredded_surface("ab");
        surface.set_caret(SurfacePoint::new(1, 0));
        surface.set_caret(SurfacePoint::new(99, 0));
        assert!(!surface.has_caret());
    }

    #[test]
    fn test_markers_do_not_shift_caret() {
        let mut surface = HighlightSurface::new(Arc::new(Shredder));
        surface.view = Markup::new(vec![
            Node::text("ab\u{200B}"),
            Node::text("\u{200B}cd"),
        ]);
        surface.set_caret(SurfacePoint::new(1, 2));
        assert_eq!(surface.capture_caret_offset(), 3);
        assert_eq!(surface.plain_text(), "abcd");

        let text = surface.plain_text();
        surface.apply_edit(&text, "any", true);
        assert_eq!(surface.capture_caret_offset(), 3);
    }

    #[test]
    fn test_type_text_edits_live_view_only() {
        let mut surface = syntect_surface();
        surface.apply_edit("a {}\n", "css", false);
        surface.restore_caret_offset(3);
        assert!(surface.type_text(" color: red; "));
        assert_eq!(surface.plain_text(), "a { color: red; }\n");
        assert_eq!(surface.capture_caret_offset(), 16);
    }

    #[test]
    fn test_type_text_replaces_selection_across_nodes() {
        let mut surface = shredded_surface("abcdef");
        surface.restore_selection(4, 1);
        assert_eq!(surface.capture_selection(), (1, 4));
        assert!(surface.type_text("XY"));
        assert_eq!(surface.plain_text(), "aXYef");
        assert_eq!(surface.capture_caret_offset(), 3);
    }

    #[test]
    fn test_type_text_into_empty_surface() {
        let mut surface = syntect_surface();
        surface.apply_edit("", "javascript", false);
        // An empty host still has a caret; model it with an empty node.
        surface.view = Markup::new(vec![Node::text("")]);
        surface.set_caret(SurfacePoint::new(0, 0));
        assert!(surface.type_text("x"));
        assert_eq!(surface.plain_text(), "x");
        assert_eq!(surface.capture_caret_offset(), 1);
    }

    #[test]
    fn test_type_text_requires_caret_and_editability() {
        let mut surface = shredded_surface("abc");
        assert!(!surface.type_text("x"));
        surface.restore_caret_offset(1);
        surface.set_editable(false);
        assert!(!surface.type_text("x"));
        assert_eq!(surface.plain_text(), "abc");
    }

    #[test]
    fn test_delete_backward_removes_previous_char() {
        let mut surface = shredded_surface("a\nb");
        surface.restore_caret_offset(2);
        assert!(surface.delete_backward());
        assert_eq!(surface.plain_text(), "ab");
        assert_eq!(surface.capture_caret_offset(), 1);
    }

    #[test]
    fn test_delete_backward_at_start_is_noop() {
        let mut surface = shredded_surface("ab");
        surface.restore_caret_offset(0);
        assert!(!surface.delete_backward());
        assert_eq!(surface.plain_text(), "ab");
    }

    #[test]
    fn test_delete_backward_of_last_char_keeps_caret() {
        let mut surface = shredded_surface("a");
        surface.restore_caret_offset(1);
        assert!(surface.delete_backward());
        assert_eq!(surface.plain_text(), "");
        assert!(surface.has_caret());
        assert_eq!(surface.capture_caret_offset(), 0);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn text_strategy() -> impl Strategy<Value = String> {
            proptest::collection::vec(
                prop_oneof![
                    Just('\n'),
                    Just('\t'),
                    Just('<'),
                    Just('&'),
                    Just('é'),
                    Just('🦀'),
                    proptest::char::range('a', 'z'),
                    Just(' '),
                ],
                0..60,
            )
            .prop_map(|chars| chars.into_iter().collect())
        }

        proptest! {
            #[test]
            fn render_round_trips_text(
                text in text_strategy(),
                language in prop_oneof![
                    Just("javascript"),
                    Just("css"),
                    Just("html"),
                    Just("python"),
                    Just("unknown-lang-xyz"),
                ],
            ) {
                let surface = syntect_surface();
                prop_assert_eq!(surface.render(&text, language).plain_text(), text);
            }

            #[test]
            fn caret_round_trips_every_offset(text in text_strategy(), seed in 0..1000usize) {
                let mut surface = syntect_surface();
                surface.apply_edit(&text, "javascript", false);
                let len = text.chars().count();
                let offset = seed % (len + 1);
                surface.restore_caret_offset(offset);
                prop_assert_eq!(surface.capture_caret_offset(), offset);
            }

            #[test]
            fn caret_clamps_past_end(text in text_strategy(), extra in 1..100usize) {
                let mut surface = shredded_surface(&text);
                let len = text.chars().count();
                surface.restore_caret_offset(len + extra);
                prop_assert_eq!(surface.capture_caret_offset(), len);
            }
        }
    }
}
