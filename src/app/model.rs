use std::fmt;
use std::sync::Arc;

use crate::assist::{self, CompletionRequest, DocumentToken, ThemeRequest};
use crate::debounce::Debouncer;
use crate::highlight::{HighlightBackground, Renderer};
use crate::store::{Document, FileStore, MemoryStore, Session, StoreError};
use crate::surface::{HighlightSurface, InvalidRange, clamp_range, insert_at, visible_len};

/// Quiet period before theme regeneration runs.
pub const THEME_DEBOUNCE_MS: u64 = 3000;

/// How long a toast stays visible.
const TOAST_MS: u64 = 4000;

/// The stylesheet theme regeneration writes to.
pub const THEME_FILE: &str = "style.css";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
struct Toast {
    level: ToastLevel,
    message: String,
    expires_at_ms: u64,
}

/// A request the update loop wants sent to a background service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Completion(CompletionRequest),
    Theme(ThemeRequest),
}

/// Persistence work produced by an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Put(String),
    Remove(String),
    SaveSession,
}

/// The document currently shown in the editor and its surface.
#[derive(Debug)]
pub struct Binding {
    name: String,
    language: &'static str,
    token: DocumentToken,
    pub surface: HighlightSurface,
}

impl Binding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn language(&self) -> &'static str {
        self.language
    }

    pub const fn token(&self) -> DocumentToken {
        self.token
    }
}

/// The complete application state.
///
/// Document content lives only in `files`; the active surface is
/// re-rendered from it after every write.
pub struct Model {
    pub files: MemoryStore,
    pub open_tabs: Vec<String>,
    pub theme: HighlightBackground,
    pub theme_assist: bool,
    pub now_ms: u64,
    active: Option<Binding>,
    renderer: Arc<dyn Renderer>,
    next_token: DocumentToken,
    pub(super) theme_debouncer: Debouncer<()>,
    pub(super) theme_generation: u64,
    outbox: Vec<Outgoing>,
    store_ops: Vec<StoreOp>,
    toast: Option<Toast>,
}

impl Model {
    pub fn new(files: MemoryStore, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            files,
            open_tabs: Vec::new(),
            theme: HighlightBackground::default(),
            theme_assist: false,
            now_ms: 0,
            active: None,
            renderer,
            next_token: DocumentToken::new(1),
            theme_debouncer: Debouncer::new(THEME_DEBOUNCE_MS),
            theme_generation: 0,
            outbox: Vec::new(),
            store_ops: Vec::new(),
            toast: None,
        }
    }

    /// Restore tabs, theme and the active document from a saved session.
    ///
    /// Tabs naming documents that no longer exist are dropped.
    pub fn from_session(
        files: MemoryStore,
        session: &Session,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let mut model = Self::new(files, renderer);
        model.theme = session.theme;
        if let Some(themed) = model.renderer.with_background(session.theme) {
            model.renderer = themed;
        }
        model.theme_assist = session.theme_assist;
        for tab in &session.open_tabs {
            if model.files.contains(tab) && !model.open_tabs.contains(tab) {
                model.open_tabs.push(tab.clone());
            }
        }
        let active = session
            .active_tab
            .clone()
            .filter(|name| model.open_tabs.contains(name))
            .or_else(|| model.open_tabs.first().cloned());
        if let Some(name) = active {
            model.activate(&name);
        }
        model
    }

    pub fn session(&self) -> Session {
        Session {
            open_tabs: self.open_tabs.clone(),
            active_tab: self.active_name().map(ToString::to_string),
            theme: self.theme,
            theme_assist: self.theme_assist,
        }
    }

    pub const fn active(&self) -> Option<&Binding> {
        self.active.as_ref()
    }

    pub const fn active_mut(&mut self) -> Option<&mut Binding> {
        self.active.as_mut()
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_ref().map(Binding::name)
    }

    pub fn active_token(&self) -> Option<DocumentToken> {
        self.active.as_ref().map(Binding::token)
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    /// Make `name` the active document, binding a fresh surface to it.
    ///
    /// The previous binding is dropped first, so nothing issued under its
    /// token can write to the new document. Returns `false` if `name` does
    /// not exist.
    pub fn activate(&mut self, name: &str) -> bool {
        let Some(document) = self.files.document(name) else {
            return false;
        };
        let language = document.language();
        let editable = document.kind().is_editable();
        let content = document.content.clone();

        if let Some(previous) = self.active.take() {
            tracing::debug!(name = previous.name(), token = %previous.token(), "unbound surface");
        }

        let token = self.next_token;
        self.next_token = token.next();
        let mut surface = HighlightSurface::new(Arc::clone(&self.renderer));
        surface.set_editable(editable);
        surface.apply_edit(&content, language, false);
        tracing::debug!(name, %token, language, "bound surface");
        self.active = Some(Binding {
            name: name.to_string(),
            language,
            token,
            surface,
        });
        if !self.open_tabs.iter().any(|tab| tab == name) {
            self.open_tabs.push(name.to_string());
        }
        true
    }

    pub fn deactivate(&mut self) {
        self.active = None;
    }

    /// Write the live surface's text back to the active document.
    ///
    /// This is the path for edits made directly in the surface: read the
    /// plain text, store it, then re-render with the caret preserved.
    pub fn commit_surface_edit(&mut self) {
        let Some(binding) = self.active.as_mut() else {
            return;
        };
        let text = binding.surface.plain_text();
        let name = binding.name.clone();
        self.files.set_content(&name, text.clone());
        binding.surface.apply_edit(&text, binding.language, true);
        self.store_ops.push(StoreOp::Put(name));
        self.trigger_theme();
    }

    /// Splice `insertion` into the active document over `start..end` and
    /// leave the caret just after it.
    ///
    /// The range is clamped to the current text first, so a range captured
    /// before later edits still lands inside the document.
    ///
    /// # Errors
    /// Returns [`InvalidRange`] only if clamping could not produce a valid
    /// range, which indicates a bug.
    pub fn insert_into_active(
        &mut self,
        insertion: &str,
        start: usize,
        end: usize,
    ) -> Result<bool, InvalidRange> {
        let Some(binding) = self.active.as_mut() else {
            return Ok(false);
        };
        if !binding.surface.is_editable() {
            return Ok(false);
        }
        let current = self
            .files
            .document(&binding.name)
            .map(|doc| doc.content.clone())
            .unwrap_or_default();
        let (start, end) = clamp_range(&current, start, end);
        let updated = insert_at(&current, insertion, start, end)?;
        let caret = visible_len(&current.chars().take(start).collect::<String>())
            + visible_len(insertion);

        let name = binding.name.clone();
        self.files.set_content(&name, updated.clone());
        binding.surface.apply_edit(&updated, binding.language, false);
        binding.surface.restore_caret_offset(caret);
        self.store_ops.push(StoreOp::Put(name));
        self.trigger_theme();
        Ok(true)
    }

    /// Re-render the active surface from its document, keeping the caret.
    pub fn refresh_active(&mut self) {
        let Some(binding) = self.active.as_mut() else {
            return;
        };
        let Some(document) = self.files.document(&binding.name) else {
            return;
        };
        binding.surface.set_renderer(Arc::clone(&self.renderer));
        binding
            .surface
            .apply_edit(&document.content, binding.language, true);
    }

    /// Flip light/dark and re-render with the matching theme.
    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        if let Some(themed) = self.renderer.with_background(self.theme) {
            self.renderer = themed;
        }
        self.refresh_active();
        self.store_ops.push(StoreOp::SaveSession);
    }

    /// Build a completion request around the active selection.
    pub fn completion_request(&self) -> Option<CompletionRequest> {
        let binding = self.active.as_ref()?;
        if !binding.surface.is_editable() {
            return None;
        }
        let content = &self.files.document(&binding.name)?.content;
        let (start, end) = binding.surface.capture_selection();
        let (start, end) = clamp_range(content, start, end);
        Some(CompletionRequest {
            token: binding.token,
            document: binding.name.clone(),
            language: binding.language.to_string(),
            before: content.chars().take(start).collect(),
            after: content.chars().skip(end).collect(),
            range: (start, end),
        })
    }

    /// Whether a theme regeneration would currently apply.
    pub fn theme_assist_active(&self) -> bool {
        self.theme_assist && self.active_name() == Some(THEME_FILE)
    }

    /// Restart the theme quiet window if theme assist applies.
    ///
    /// Any request already in flight is superseded, so its response cannot
    /// overwrite the edit that caused this trigger.
    pub fn trigger_theme(&mut self) {
        if self.theme_assist_active() {
            self.theme_generation += 1;
            self.theme_debouncer.queue((), self.now_ms);
            crate::perf::log_event("theme.trigger", format!("at={}", self.now_ms));
        }
    }

    /// Issue a theme request if the quiet window has elapsed.
    pub(super) fn poll_theme(&mut self) {
        if self.theme_debouncer.take_ready(self.now_ms).is_none() {
            return;
        }
        let token = match self.active_token() {
            Some(token) if self.theme_assist_active() => token,
            _ => {
                tracing::debug!("theme window elapsed but assist no longer applies");
                return;
            }
        };
        self.theme_generation += 1;
        let summary = assist::project_summary(
            self.files
                .documents()
                .map(|doc| (doc.name(), doc.content.as_str())),
        );
        self.outbox.push(Outgoing::Theme(ThemeRequest {
            token,
            generation: self.theme_generation,
            summary,
        }));
    }

    /// Write a regenerated stylesheet.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn write_theme(&mut self, css: String) -> Result<(), StoreError> {
        self.files.put(Document::new(THEME_FILE, css))?;
        self.store_ops.push(StoreOp::Put(THEME_FILE.to_string()));
        if self.active_name() == Some(THEME_FILE) {
            self.refresh_active();
        }
        Ok(())
    }

    pub fn push_outgoing(&mut self, request: Outgoing) {
        self.outbox.push(request);
    }

    pub fn push_store_op(&mut self, op: StoreOp) {
        self.store_ops.push(op);
    }

    pub fn take_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    pub fn take_store_ops(&mut self) -> Vec<StoreOp> {
        std::mem::take(&mut self.store_ops)
    }

    pub fn show_toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toast = Some(Toast {
            level,
            message: message.into(),
            expires_at_ms: self.now_ms.saturating_add(TOAST_MS),
        });
    }

    pub fn toast(&self) -> Option<(ToastLevel, &str)> {
        self.toast
            .as_ref()
            .map(|toast| (toast.level, toast.message.as_str()))
    }

    pub(super) fn expire_toast(&mut self) {
        if self
            .toast
            .as_ref()
            .is_some_and(|toast| self.now_ms >= toast.expires_at_ms)
        {
            self.toast = None;
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("files", &self.files.len())
            .field("open_tabs", &self.open_tabs)
            .field("active", &self.active)
            .field("theme", &self.theme)
            .field("theme_assist", &self.theme_assist)
            .field("now_ms", &self.now_ms)
            .finish_non_exhaustive()
    }
}
