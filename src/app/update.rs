use crate::app::Model;
use crate::app::model::{Outgoing, StoreOp, THEME_FILE, ToastLevel};
use crate::assist::{CompletionResponse, ThemeResponse};
use crate::store::{Document, FileStore};
use crate::surface::SurfacePoint;

/// All possible events and actions in the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // Workspace
    /// Open (or switch to) a document's tab
    OpenTab(String),
    /// Close a tab, activating the first remaining one if it was active
    CloseTab(String),
    /// Create a document and open it
    NewFile { name: String, content: String },
    /// Move a document to a new name
    RenameFile { from: String, to: String },
    /// Delete a document and close its tab
    DeleteFile(String),

    // Surface editing
    /// Caret placed by the host
    PlaceCaret(SurfacePoint),
    /// Selection made by the host
    Select {
        anchor: SurfacePoint,
        focus: SurfacePoint,
    },
    /// Surface lost focus
    Blur,
    /// Text typed over the selection
    Input(String),
    /// Backspace
    DeleteBackward,

    // Assist
    /// Ask for a completion at the caret
    RequestCompletion,
    /// A completion came back
    CompletionReady(CompletionResponse),
    /// Insert generated code at the caret
    InsertSnippet(String),
    /// Replace the selection, or the whole document when nothing is selected
    ReplaceSelection(String),

    // Theme
    /// Switch between light and dark highlighting
    ToggleTheme,
    /// Turn automatic stylesheet regeneration on or off
    ToggleThemeAssist,
    /// A regenerated stylesheet came back
    ThemeReady(ThemeResponse),

    /// Clock advanced
    Tick(u64),
}

/// Update the model in response to a message.
///
/// Requests for background services and persistence work are queued on the
/// model; `App` carries them out.
pub fn update(mut model: Model, msg: Message) -> Model {
    match msg {
        Message::OpenTab(name) => {
            if model.active_name() != Some(name.as_str()) {
                if model.activate(&name) {
                    model.push_store_op(StoreOp::SaveSession);
                    if name == THEME_FILE {
                        model.trigger_theme();
                    }
                } else {
                    model.show_toast(ToastLevel::Error, format!("No such file: {name}"));
                }
            }
        }
        Message::CloseTab(name) => close_tab(&mut model, &name),
        Message::NewFile { name, content } => {
            if model.files.contains(&name) {
                model.show_toast(ToastLevel::Error, format!("{name} already exists"));
            } else if let Err(err) = model.files.put(Document::new(name.clone(), content)) {
                model.show_toast(ToastLevel::Error, format!("Cannot create file: {err}"));
            } else {
                model.push_store_op(StoreOp::Put(name.clone()));
                model.activate(&name);
                model.push_store_op(StoreOp::SaveSession);
            }
        }
        Message::RenameFile { from, to } => rename_file(&mut model, &from, &to),
        Message::DeleteFile(name) => {
            if model.files.remove(&name).is_ok() {
                close_tab(&mut model, &name);
                model.push_store_op(StoreOp::Remove(name));
                model.push_store_op(StoreOp::SaveSession);
            } else {
                model.show_toast(ToastLevel::Error, format!("No such file: {name}"));
            }
        }

        Message::PlaceCaret(point) => {
            if let Some(binding) = model.active_mut() {
                binding.surface.set_caret(point);
            }
        }
        Message::Select { anchor, focus } => {
            if let Some(binding) = model.active_mut() {
                binding.surface.set_selection(anchor, focus);
            }
        }
        Message::Blur => {
            if let Some(binding) = model.active_mut() {
                binding.surface.clear_caret();
            }
            model.push_store_op(StoreOp::SaveSession);
        }
        Message::Input(text) => {
            let typed = model
                .active_mut()
                .is_some_and(|binding| binding.surface.type_text(&text));
            if typed {
                model.commit_surface_edit();
            }
        }
        Message::DeleteBackward => {
            let deleted = model
                .active_mut()
                .is_some_and(|binding| binding.surface.delete_backward());
            if deleted {
                model.commit_surface_edit();
            }
        }

        Message::RequestCompletion => {
            if let Some(request) = model.completion_request() {
                model.push_outgoing(Outgoing::Completion(request));
            }
        }
        Message::CompletionReady(response) => apply_completion(&mut model, response),
        Message::InsertSnippet(code) => {
            let caret = model
                .active()
                .map_or(0, |binding| binding.surface.capture_caret_offset());
            insert_or_report(&mut model, &code, caret, caret);
        }
        Message::ReplaceSelection(code) => {
            let range = model.active().map(|binding| {
                let (start, end) = binding.surface.capture_selection();
                if start == end {
                    (0, usize::MAX)
                } else {
                    (start, end)
                }
            });
            if let Some((start, end)) = range {
                insert_or_report(&mut model, &code, start, end);
            }
        }

        Message::ToggleTheme => model.toggle_theme(),
        Message::ToggleThemeAssist => {
            model.theme_assist = !model.theme_assist;
            if model.theme_assist {
                model.trigger_theme();
            } else {
                model.theme_debouncer.cancel();
            }
            model.push_store_op(StoreOp::SaveSession);
        }
        Message::ThemeReady(response) => apply_theme(&mut model, response),

        Message::Tick(now_ms) => {
            model.now_ms = now_ms;
            model.poll_theme();
            model.expire_toast();
        }
    }
    model
}

fn close_tab(model: &mut Model, name: &str) {
    let Some(index) = model.open_tabs.iter().position(|tab| tab == name) else {
        return;
    };
    model.open_tabs.remove(index);
    if model.active_name() == Some(name) {
        model.deactivate();
        if let Some(next) = model.open_tabs.first().cloned() {
            model.activate(&next);
        }
    }
    model.push_store_op(StoreOp::SaveSession);
}

fn rename_file(model: &mut Model, from: &str, to: &str) {
    if from == to {
        return;
    }
    if let Err(err) = model.files.rename(from, to) {
        model.show_toast(ToastLevel::Error, format!("Rename failed: {err}"));
        return;
    }
    for tab in &mut model.open_tabs {
        if tab == from {
            *tab = to.to_string();
        }
    }
    if model.active_name() == Some(from) {
        model.activate(to);
    }
    model.push_store_op(StoreOp::Put(to.to_string()));
    model.push_store_op(StoreOp::Remove(from.to_string()));
    model.push_store_op(StoreOp::SaveSession);
}

fn apply_completion(model: &mut Model, response: CompletionResponse) {
    if model.active_token() != Some(response.token) {
        tracing::debug!(
            document = %response.document,
            token = %response.token,
            "discarding stale completion"
        );
        crate::perf::log_event(
            "assist.completion.stale",
            format!("document={} token={}", response.document, response.token),
        );
        return;
    }
    match response.result {
        Ok(code) if code.is_empty() => {}
        Ok(code) => insert_or_report(model, &code, response.range.0, response.range.1),
        Err(err) => model.show_toast(ToastLevel::Warning, format!("Completion failed: {err}")),
    }
}

fn insert_or_report(model: &mut Model, code: &str, start: usize, end: usize) {
    if model.active().is_none() {
        return;
    }
    match model.insert_into_active(code, start, end) {
        Ok(true) => {}
        Ok(false) => model.show_toast(ToastLevel::Info, "This file is read-only"),
        Err(err) => {
            tracing::warn!("insertion rejected: {err}");
            model.show_toast(ToastLevel::Error, err.to_string());
        }
    }
}

fn apply_theme(model: &mut Model, response: ThemeResponse) {
    let current = response.generation == model.theme_generation
        && model.theme_assist
        && model.active_token() == Some(response.token);
    if !current {
        tracing::debug!(
            generation = response.generation,
            token = %response.token,
            "discarding stale theme"
        );
        crate::perf::log_event(
            "assist.theme.stale",
            format!("generation={} token={}", response.generation, response.token),
        );
        return;
    }
    match response.result {
        Ok(css) if css.trim().is_empty() => {
            model.show_toast(ToastLevel::Warning, "Theme service returned no CSS");
        }
        Ok(css) => {
            if let Err(err) = model.write_theme(css) {
                model.show_toast(ToastLevel::Error, format!("Theme not saved: {err}"));
            } else {
                model.show_toast(ToastLevel::Info, "Stylesheet regenerated");
            }
        }
        Err(err) => model.show_toast(ToastLevel::Warning, format!("Theme failed: {err}")),
    }
}
