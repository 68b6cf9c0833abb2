//! Completion and theme-regeneration services.
//!
//! Requests carry the token they were issued under so responses that
//! arrive after the user moved on can be recognized and dropped.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Characters of each file included in a project summary.
pub const SUMMARY_CHARS_PER_FILE: usize = 300;

/// Separator between files in a project summary.
pub const SUMMARY_SEPARATOR: &str = "\n---\n";

/// Aesthetic used when the theme service cannot suggest one.
pub const DEFAULT_THEME_DESCRIPTION: &str = "modern dark with #ffd700 accent";

/// Identifies one activation of a document in the editor.
///
/// A fresh token is minted whenever a document becomes active, so a token
/// comparison tells whether a response still belongs to what is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentToken(u64);

impl DocumentToken {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("assist service unavailable: {0}")]
    Unavailable(String),
    #[error("assist request failed: {0}")]
    Failed(String),
}

/// Text around the caret to be completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub token: DocumentToken,
    pub document: String,
    pub language: String,
    pub before: String,
    pub after: String,
    /// Selection at request time, in scalar-value offsets.
    pub range: (usize, usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub token: DocumentToken,
    pub document: String,
    pub range: (usize, usize),
    pub result: Result<String, ServiceError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeRequest {
    /// Activation of the stylesheet the request was issued from.
    pub token: DocumentToken,
    /// Increases with every request issued; only the newest is applied.
    pub generation: u64,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeResponse {
    pub token: DocumentToken,
    pub generation: u64,
    pub result: Result<String, ServiceError>,
}

/// Suggests code to insert at the caret.
pub trait CompletionService: Send {
    /// Raw suggestion for `request`. An empty string means no insertion.
    ///
    /// # Errors
    /// Returns a [`ServiceError`] when the backend cannot answer.
    fn complete(&mut self, request: &CompletionRequest) -> Result<String, ServiceError>;
}

/// Produces a stylesheet that suits the project.
pub trait ThemeService: Send {
    /// A short aesthetic phrase for the project described by `summary`.
    ///
    /// # Errors
    /// Returns a [`ServiceError`] when the backend cannot answer.
    fn describe(&mut self, summary: &str) -> Result<String, ServiceError> {
        let _ = summary;
        Ok(DEFAULT_THEME_DESCRIPTION.to_string())
    }

    /// Stylesheet text for `description`.
    ///
    /// # Errors
    /// Returns a [`ServiceError`] when the backend cannot answer.
    fn regenerate(&mut self, request: &ThemeRequest, description: &str)
    -> Result<String, ServiceError>;
}

/// Run one completion request to a cleaned response.
pub fn run_completion(
    service: &mut dyn CompletionService,
    request: CompletionRequest,
) -> CompletionResponse {
    let _scope = crate::perf::scope("assist.complete");
    let result = service
        .complete(&request)
        .map(|raw| clean_code_response(&raw));
    if let Err(err) = &result {
        tracing::warn!(document = %request.document, "completion failed: {err}");
    }
    CompletionResponse {
        token: request.token,
        document: request.document,
        range: request.range,
        result,
    }
}

/// Run one theme request: pick an aesthetic, then generate CSS for it.
pub fn run_theme(service: &mut dyn ThemeService, request: &ThemeRequest) -> ThemeResponse {
    let _scope = crate::perf::scope("assist.theme");
    let description = match service.describe(&request.summary) {
        Ok(phrase) => {
            let phrase = clean_theme_phrase(&phrase);
            if phrase.is_empty() {
                DEFAULT_THEME_DESCRIPTION.to_string()
            } else {
                phrase
            }
        }
        Err(err) => {
            tracing::debug!("theme description failed, using default: {err}");
            DEFAULT_THEME_DESCRIPTION.to_string()
        }
    };
    crate::perf::log_event("assist.theme.description", &description);
    let result = service
        .regenerate(request, &description)
        .map(|raw| clean_code_response(&raw));
    if let Err(err) = &result {
        tracing::warn!("theme regeneration failed: {err}");
    }
    ThemeResponse {
        token: request.token,
        generation: request.generation,
        result,
    }
}

fn fence_block() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?m)^```[a-zA-Z]*\s*\n([\s\S]*?)\n?```$").ok())
        .as_ref()
}

/// Strip Markdown code fences from a service response.
///
/// Inner line breaks are kept exactly; only the fence lines go.
pub fn clean_code_response(raw: &str) -> String {
    let unfenced = match fence_block() {
        Some(re) => re.replace(raw, "$1").into_owned(),
        None => raw.to_string(),
    };
    let mut lines: Vec<&str> = unfenced.split('\n').collect();
    if lines.first().is_some_and(|l| l.trim().starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim().starts_with("```")) {
        lines.pop();
    }
    lines.join("\n")
}

/// Trim surrounding quotes, whitespace and trailing periods from a phrase.
pub fn clean_theme_phrase(raw: &str) -> String {
    raw.trim_start_matches(['"', '\'', ' ', '\t', '\n', '\r'])
        .trim_end_matches(['"', '\'', '.', ' ', '\t', '\n', '\r'])
        .to_string()
}

/// Summarize documents for a theme request.
///
/// Each entry is `name: ` followed by the first
/// [`SUMMARY_CHARS_PER_FILE`] characters with whitespace runs collapsed,
/// plus `...` when the content was longer.
pub fn project_summary<'a>(documents: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    documents
        .into_iter()
        .map(|(name, content)| {
            let head: String = content.chars().take(SUMMARY_CHARS_PER_FILE).collect();
            let collapsed = head.split_whitespace().collect::<Vec<_>>().join(" ");
            let ellipsis = if content.chars().count() > SUMMARY_CHARS_PER_FILE {
                "..."
            } else {
                ""
            };
            format!("{name}: {collapsed}{ellipsis}")
        })
        .collect::<Vec<_>>()
        .join(SUMMARY_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(Result<String, ServiceError>);

    impl CompletionService for Canned {
        fn complete(&mut self, _request: &CompletionRequest) -> Result<String, ServiceError> {
            self.0.clone()
        }
    }

    struct Stylist {
        phrase: Result<String, ServiceError>,
        seen: Vec<String>,
    }

    impl ThemeService for Stylist {
        fn describe(&mut self, _summary: &str) -> Result<String, ServiceError> {
            self.phrase.clone()
        }

        fn regenerate(
            &mut self,
            _request: &ThemeRequest,
            description: &str,
        ) -> Result<String, ServiceError> {
            self.seen.push(description.to_string());
            Ok("```css\nbody {\n  color: red;\n}\n```".to_string())
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            token: DocumentToken::new(7),
            document: "app.js".to_string(),
            language: "javascript".to_string(),
            before: "let a = ".to_string(),
            after: ";\n".to_string(),
            range: (8, 8),
        }
    }

    #[test]
    fn test_clean_strips_fenced_block() {
        assert_eq!(
            clean_code_response("```js\nconst a = 1;\n\nconst b = 2;\n```"),
            "const a = 1;\n\nconst b = 2;"
        );
    }

    #[test]
    fn test_clean_keeps_unfenced_text_exactly() {
        let raw = "a\n\n  b\n\n";
        assert_eq!(clean_code_response(raw), raw);
        assert_eq!(clean_code_response(""), "");
    }

    #[test]
    fn test_clean_drops_dangling_fence_lines() {
        assert_eq!(clean_code_response("```python\nx = 1\n"), "x = 1\n");
        assert_eq!(clean_code_response("x = 1\n  ```"), "x = 1");
    }

    #[test]
    fn test_clean_theme_phrase() {
        assert_eq!(clean_theme_phrase("  \"retro pixel.\"  "), "retro pixel");
        assert_eq!(clean_theme_phrase("'minimalist light'\n"), "minimalist light");
    }

    #[test]
    fn test_run_completion_carries_token_and_cleans() {
        let mut service = Canned(Ok("```\n42\n```".to_string()));
        let response = run_completion(&mut service, request());
        assert_eq!(response.token, DocumentToken::new(7));
        assert_eq!(response.document, "app.js");
        assert_eq!(response.range, (8, 8));
        assert_eq!(response.result, Ok("42".to_string()));
    }

    #[test]
    fn test_run_completion_passes_errors_through() {
        let mut service = Canned(Err(ServiceError::Unavailable("offline".to_string())));
        let response = run_completion(&mut service, request());
        assert_eq!(
            response.result,
            Err(ServiceError::Unavailable("offline".to_string()))
        );
    }

    #[test]
    fn test_run_theme_uses_cleaned_description() {
        let mut service = Stylist {
            phrase: Ok("\"neon dark.\"".to_string()),
            seen: Vec::new(),
        };
        let response = run_theme(
            &mut service,
            &ThemeRequest {
                token: DocumentToken::new(4),
                generation: 3,
                summary: String::new(),
            },
        );
        assert_eq!(response.generation, 3);
        assert_eq!(response.token, DocumentToken::new(4));
        assert_eq!(response.result, Ok("body {\n  color: red;\n}".to_string()));
        assert_eq!(service.seen, vec!["neon dark"]);
    }

    #[test]
    fn test_run_theme_falls_back_to_default_description() {
        let mut service = Stylist {
            phrase: Err(ServiceError::Failed("boom".to_string())),
            seen: Vec::new(),
        };
        run_theme(
            &mut service,
            &ThemeRequest {
                token: DocumentToken::new(4),
                generation: 1,
                summary: String::new(),
            },
        );
        service.phrase = Ok("  ".to_string());
        run_theme(
            &mut service,
            &ThemeRequest {
                token: DocumentToken::new(4),
                generation: 2,
                summary: String::new(),
            },
        );
        assert_eq!(
            service.seen,
            vec![DEFAULT_THEME_DESCRIPTION, DEFAULT_THEME_DESCRIPTION]
        );
    }

    #[test]
    fn test_project_summary_truncates_and_collapses() {
        let long = "x".repeat(SUMMARY_CHARS_PER_FILE + 5);
        let summary = project_summary([("a.css", "body {\n\n  margin: 0;\n}"), ("b.js", &long)]);
        let parts: Vec<&str> = summary.split(SUMMARY_SEPARATOR).collect();
        assert_eq!(parts[0], "a.css: body { margin: 0; }");
        assert_eq!(
            parts[1],
            format!("b.js: {}...", "x".repeat(SUMMARY_CHARS_PER_FILE))
        );
    }


    #[test]
    fn test_token_next_is_distinct() {
        let token = DocumentToken::new(1);
        assert_ne!(token, token.next());
        assert_eq!(token.next().get(), 2);
        assert_eq!(token.to_string(), "#1");
    }
}
