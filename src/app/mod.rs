//! Workspace state and the service loop.
//!
//! This module implements The Elm Architecture (TEA):
//! - [`Model`]: The complete workspace state
//! - [`Message`]: All possible events and actions
//! - [`update`]: Pure function for state transitions
//! - [`App::dispatch`]: Runs `update`, then its side effects

mod effects;
mod model;
mod update;

pub use model::{Binding, Model, Outgoing, StoreOp, THEME_DEBOUNCE_MS, THEME_FILE, ToastLevel};
pub use update::{Message, update};

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::assist::{
    CompletionRequest, CompletionResponse, CompletionService, ThemeRequest, ThemeResponse,
    ThemeService, run_completion, run_theme,
};
use crate::highlight::Renderer;
use crate::store::{DirStore, FileStore, MemoryStore, StoreError, starter_documents};
use crate::worker::Worker;

/// Owns the services and persistence the update loop talks to.
pub struct App {
    store: Option<DirStore>,
    completion: Option<Worker<CompletionRequest, CompletionResponse>>,
    theme: Option<Worker<ThemeRequest, ThemeResponse>>,
    deferred: Vec<Message>,
    in_flight: usize,
    started: Instant,
}

impl App {
    /// An app with no persistence and no assist services.
    pub fn new() -> Self {
        Self {
            store: None,
            completion: None,
            theme: None,
            deferred: Vec::new(),
            in_flight: 0,
            started: Instant::now(),
        }
    }

    /// Persist documents and the session to `store`.
    pub fn with_store(mut self, store: DirStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Run completions on a background worker.
    ///
    /// # Errors
    /// Returns an error if the worker thread cannot be spawned.
    pub fn with_completion_service(
        mut self,
        mut service: impl CompletionService + 'static,
    ) -> Result<Self> {
        let worker = Worker::spawn("completion", move |request| {
            run_completion(&mut service, request)
        })
        .context("Failed to start completion worker")?;
        self.completion = Some(worker);
        Ok(self)
    }

    /// Run theme regeneration on a background worker.
    ///
    /// # Errors
    /// Returns an error if the worker thread cannot be spawned.
    pub fn with_theme_service(mut self, mut service: impl ThemeService + 'static) -> Result<Self> {
        let worker = Worker::spawn("theme", move |request: ThemeRequest| {
            run_theme(&mut service, &request)
        })
        .context("Failed to start theme worker")?;
        self.theme = Some(worker);
        Ok(self)
    }

    /// Load the workspace from the store, seeding it on first use.
    ///
    /// Without a store the workspace starts from the starter documents.
    ///
    /// # Errors
    /// Returns an error if stored documents or the session cannot be read.
    pub fn load_model(&mut self, renderer: Arc<dyn Renderer>) -> Result<Model> {
        let _scope = crate::perf::scope("app.load_model");
        let Some(store) = self.store.as_mut() else {
            let files = MemoryStore::from_documents(starter_documents());
            return Ok(open_default_tab(Model::new(files, renderer)));
        };

        let names = store.list().context("Failed to list documents")?;
        let mut documents = Vec::with_capacity(names.len());
        for name in &names {
            match store.get(name) {
                Ok(doc) => documents.push(doc),
                Err(StoreError::NotText(_)) => {
                    tracing::warn!(name, "skipping file that is not UTF-8 text");
                }
                Err(err) => return Err(err).with_context(|| format!("Failed to read {name}")),
            }
        }
        if documents.is_empty() {
            documents = starter_documents();
            for doc in &documents {
                store
                    .put(doc.clone())
                    .with_context(|| format!("Failed to seed {}", doc.name()))?;
            }
            tracing::info!(root = %store.root().display(), "seeded new workspace");
        }
        let files = MemoryStore::from_documents(documents);

        let session = store.load_session().context("Failed to load session")?;
        Ok(match session {
            Some(session) => open_default_tab(Model::from_session(files, &session, renderer)),
            None => open_default_tab(Model::new(files, renderer)),
        })
    }

    /// Milliseconds since the app was created.
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Requests submitted to workers that have not answered yet.
    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Apply `msg` and carry out the side effects it queued.
    pub fn dispatch(&mut self, model: Model, msg: Message) -> Model {
        let mut model = update(model, msg);
        self.handle_message_side_effects(&mut model);
        model
    }

    /// Advance the clock and apply every response that has arrived.
    pub fn pump(&mut self, model: Model, now_ms: u64) -> Model {
        let mut model = self.dispatch(model, Message::Tick(now_ms));
        loop {
            let mut ready = std::mem::take(&mut self.deferred);
            ready.extend(self.take_responses());
            if ready.is_empty() {
                return model;
            }
            for msg in ready {
                model = self.dispatch(model, msg);
            }
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Activate `index.html`, or else the first document, when nothing is open.
fn open_default_tab(mut model: Model) -> Model {
    if model.active().is_some() {
        return model;
    }
    let first = if model.files.contains("index.html") {
        Some("index.html".to_string())
    } else {
        model.files.documents().next().map(|doc| doc.name().to_string())
    };
    if let Some(name) = first {
        model.activate(&name);
    }
    model
}
