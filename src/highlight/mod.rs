//! Syntax highlighting into [`Markup`].
//!
//! Uses syntect for highlighting with Sublime Text syntax definitions.
//! [`render`] wraps any [`Renderer`] and falls back to escaped plain text
//! whenever the renderer cannot produce a faithful view.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock};

use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use thiserror::Error;

use crate::surface::{Markup, Node, Rgb, SpanStyle};

/// Reasons a renderer declines to highlight.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unknown language `{0}`")]
    UnknownLanguage(String),
    #[error("highlighting failed: {0}")]
    Highlight(#[from] syntect::Error),
}

/// Maps text and a language tag to styled markup.
pub trait Renderer: Send + Sync {
    /// Highlight `text` as `language`.
    ///
    /// # Errors
    /// Returns an error for unrecognized tags or internal failures.
    fn highlight(&self, text: &str, language: &str) -> Result<Markup, RenderError>;

    /// A renderer for the other background, if this renderer is themed.
    fn with_background(&self, _background: HighlightBackground) -> Option<Arc<dyn Renderer>> {
        None
    }
}

/// Render `text`, falling back to line-faithful plain markup.
///
/// Never fails and never panics on renderer failure: unknown languages,
/// renderer errors, renderer panics, and output whose text differs from
/// `text` all produce [`Markup::plain`].
pub fn render(renderer: &dyn Renderer, text: &str, language: &str) -> Markup {
    let _scope = crate::perf::scope("highlight.render");
    let outcome = catch_unwind(AssertUnwindSafe(|| renderer.highlight(text, language)));
    match outcome {
        Ok(Ok(markup)) if markup.raw_text() == text => markup,
        Ok(Ok(_)) => {
            tracing::debug!(language, "renderer output diverged from text, using fallback");
            crate::perf::log_event("highlight.fallback", format!("lang={language} reason=diverged"));
            Markup::plain(text)
        }
        Ok(Err(err)) => {
            tracing::debug!(language, %err, "renderer declined, using fallback");
            crate::perf::log_event("highlight.fallback", format!("lang={language} reason={err}"));
            Markup::plain(text)
        }
        Err(_) => {
            tracing::warn!(language, "renderer panicked, using fallback");
            crate::perf::log_event("highlight.fallback", format!("lang={language} reason=panic"));
            Markup::plain(text)
        }
    }
}

/// Renderer backed by syntect's default syntaxes and themes.
#[derive(Debug, Clone)]
pub struct SyntectRenderer {
    background: HighlightBackground,
}

impl SyntectRenderer {
    pub const fn new(background: HighlightBackground) -> Self {
        Self { background }
    }

    /// Renderer for the background detected from the environment.
    pub fn detect() -> Self {
        Self::new(background_from_colorfgbg(
            std::env::var("COLORFGBG").ok().as_deref(),
        ))
    }

    pub const fn background(&self) -> HighlightBackground {
        self.background
    }

    /// Whether syntect knows `language`.
    pub fn supports(language: &str) -> bool {
        find_syntax(language).is_some()
    }
}

impl Renderer for SyntectRenderer {
    fn highlight(&self, text: &str, language: &str) -> Result<Markup, RenderError> {
        let syntax_set = syntax_set();
        let syntax =
            find_syntax(language).ok_or_else(|| RenderError::UnknownLanguage(language.to_string()))?;

        let mut highlighter = HighlightLines::new(syntax, theme(self.background));
        let mut nodes = Vec::new();
        // LinesWithEndings keeps each line's terminator so the output text
        // covers the input exactly, trailing newline included.
        for line in LinesWithEndings::from(text) {
            for (style, piece) in highlighter.highlight_line(line, syntax_set)? {
                if piece.is_empty() {
                    continue;
                }
                let fg = Rgb {
                    r: style.foreground.r,
                    g: style.foreground.g,
                    b: style.foreground.b,
                };
                let span_style = SpanStyle {
                    fg: Some(adjust_fg_for_background(fg, self.background)),
                    bold: style.font_style.contains(FontStyle::BOLD),
                    italic: style.font_style.contains(FontStyle::ITALIC),
                    underline: style.font_style.contains(FontStyle::UNDERLINE),
                };
                nodes.push(Node::span(span_style, vec![Node::text(piece)]));
            }
        }
        Ok(Markup::new(nodes))
    }

    fn with_background(&self, background: HighlightBackground) -> Option<Arc<dyn Renderer>> {
        Some(Arc::new(Self::new(background)))
    }
}

fn find_syntax(language: &str) -> Option<&'static SyntaxReference> {
    let syntax_set = syntax_set();
    syntax_set
        .find_syntax_by_token(language)
        .or_else(|| syntax_set.find_syntax_by_name(language))
}

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAX_SET.get_or_init(|| {
        let _scope = crate::perf::scope("highlight.syntax_set.load_defaults");
        SyntaxSet::load_defaults_newlines()
    })
}

fn theme_set() -> &'static ThemeSet {
    static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();
    THEME_SET.get_or_init(|| {
        let _scope = crate::perf::scope("highlight.theme.load_defaults");
        ThemeSet::load_defaults()
    })
}

fn theme(background: HighlightBackground) -> &'static Theme {
    static DARK: OnceLock<Theme> = OnceLock::new();
    static LIGHT: OnceLock<Theme> = OnceLock::new();
    let (cell, preferred) = match background {
        HighlightBackground::Dark => (
            &DARK,
            [
                "Monokai Extended",
                "Monokai Extended Bright",
                "Dracula",
                "Solarized (dark)",
                "base16-ocean.dark",
            ]
            .as_slice(),
        ),
        HighlightBackground::Light => (
            &LIGHT,
            [
                "InspiredGitHub",
                "Solarized (light)",
                "base16-ocean.light",
            ]
            .as_slice(),
        ),
    };
    cell.get_or_init(|| {
        let themes = &theme_set().themes;
        preferred
            .iter()
            .find_map(|name| themes.get(*name))
            .or_else(|| themes.values().next())
            .cloned()
            .unwrap_or_default()
    })
}

/// Background the highlight theme is chosen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightBackground {
    Light,
    #[default]
    Dark,
}

impl HighlightBackground {
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Interpret a `COLORFGBG` value such as `15;0`.
pub fn background_from_colorfgbg(colorfgbg: Option<&str>) -> HighlightBackground {
    let Some(value) = colorfgbg else {
        return HighlightBackground::Dark;
    };
    let bg_str = value.rsplit(';').next().unwrap_or(value);
    let Ok(bg) = bg_str.parse::<u8>() else {
        return HighlightBackground::Dark;
    };

    if bg >= 7 {
        HighlightBackground::Light
    } else {
        HighlightBackground::Dark
    }
}

fn adjust_fg_for_background(color: Rgb, background: HighlightBackground) -> Rgb {
    match background {
        HighlightBackground::Dark => color,
        HighlightBackground::Light => {
            let luma = (0.2126 * f32::from(color.r))
                + (0.7152 * f32::from(color.g))
                + (0.0722 * f32::from(color.b));
            if luma < 155.0 {
                return color;
            }
            Rgb {
                r: darken(color.r),
                g: darken(color.g),
                b: darken(color.b),
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn darken(channel: u8) -> u8 {
    (f32::from(channel) * 0.42).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl Renderer for Failing {
        fn highlight(&self, _text: &str, language: &str) -> Result<Markup, RenderError> {
            Err(RenderError::UnknownLanguage(language.to_string()))
        }
    }

    struct Panicking;

    impl Renderer for Panicking {
        fn highlight(&self, _text: &str, _language: &str) -> Result<Markup, RenderError> {
            panic!("renderer bug")
        }
    }

    /// Mimics a highlighter that swallows the trailing newline.
    struct Trimming;

    impl Renderer for Trimming {
        fn highlight(&self, text: &str, _language: &str) -> Result<Markup, RenderError> {
            Ok(Markup::new(vec![Node::text(text.trim_end_matches('\n'))]))
        }
    }

    fn dark() -> SyntectRenderer {
        SyntectRenderer::new(HighlightBackground::Dark)
    }

    #[test]
    fn test_highlight_rust_produces_colored_spans() {
        let code = "fn main() {\n    let x = 1;\n}\n";
        let markup = dark().highlight(code, "rust").unwrap();
        assert!(!markup.is_fallback());
        assert!(markup.nodes().iter().any(|node| matches!(
            node,
            Node::Span { style, .. } if style.fg.is_some()
        )));
    }

    #[test]
    fn test_highlight_keeps_trailing_newlines() {
        let code = "\nbody {\n  color: red;\n}\n\n\n";
        let markup = dark().highlight(code, "css").unwrap();
        assert_eq!(markup.plain_text(), code);
    }

    #[test]
    fn test_highlight_unknown_language_is_an_error() {
        let err = dark().highlight("just text", "unknown-lang-xyz").unwrap_err();
        assert!(matches!(err, RenderError::UnknownLanguage(_)));
    }

    #[test]
    fn test_ide_languages_are_supported() {
        for language in ["html", "javascript", "css", "markdown", "json", "python"] {
            assert!(SyntectRenderer::supports(language), "{language}");
        }
    }

    #[test]
    fn test_render_unknown_language_falls_back_to_plain() {
        let text = "a\tb <c>\n\nd\n";
        let markup = render(&dark(), text, "unknown-lang-xyz");
        assert!(markup.is_fallback());
        assert_eq!(markup.plain_text(), text);
    }

    #[test]
    fn test_render_recovers_from_renderer_error() {
        let markup = render(&Failing, "x\ny", "rust");
        assert!(markup.is_fallback());
        assert_eq!(markup.plain_text(), "x\ny");
    }

    #[test]
    fn test_render_recovers_from_renderer_panic() {
        let markup = render(&Panicking, "x\n", "rust");
        assert!(markup.is_fallback());
        assert_eq!(markup.plain_text(), "x\n");
    }

    #[test]
    fn test_render_rejects_output_that_drops_a_line_break() {
        let markup = render(&Trimming, "let a = 1;\n", "javascript");
        assert!(markup.is_fallback());
        assert_eq!(markup.plain_text(), "let a = 1;\n");
    }

    #[test]
    fn test_highlight_does_not_set_background_color() {
        let html = dark().highlight("fn main() {}", "rust").unwrap().to_html();
        assert!(!html.contains("background"));
    }

    #[test]
    fn test_with_background_switches_theme() {
        let light = dark().with_background(HighlightBackground::Light);
        assert!(light.is_some());
        assert_eq!(HighlightBackground::Dark.toggled(), HighlightBackground::Light);
    }

    #[test]
    fn test_colorfgbg_dark_background() {
        assert_eq!(
            background_from_colorfgbg(Some("15;0")),
            HighlightBackground::Dark
        );
    }

    #[test]
    fn test_colorfgbg_light_background() {
        assert_eq!(
            background_from_colorfgbg(Some("0;15")),
            HighlightBackground::Light
        );
    }

    #[test]
    fn test_colorfgbg_garbage_defaults_dark() {
        assert_eq!(
            background_from_colorfgbg(Some("nonsense")),
            HighlightBackground::Dark
        );
        assert_eq!(background_from_colorfgbg(None), HighlightBackground::Dark);
    }

    #[test]
    fn test_light_mode_darkens_bright_fg() {
        let bright = Rgb {
            r: 240,
            g: 230,
            b: 120,
        };
        let adjusted = adjust_fg_for_background(bright, HighlightBackground::Light);
        assert!(adjusted.r < bright.r);
        assert!(adjusted.g < bright.g);
        assert!(adjusted.b < bright.b);
    }

    #[test]
    fn test_light_mode_caps_luma_for_readability() {
        let bright = Rgb {
            r: 240,
            g: 230,
            b: 120,
        };
        let adjusted = adjust_fg_for_background(bright, HighlightBackground::Light);
        let luma = (0.2126 * f32::from(adjusted.r))
            + (0.7152 * f32::from(adjusted.g))
            + (0.0722 * f32::from(adjusted.b));
        assert!(luma < 120.0, "Adjusted color still too bright: {luma}");
    }
}
