use crate::app::{App, Message, Model, Outgoing, StoreOp, ToastLevel};
use crate::assist::{CompletionResponse, ServiceError, ThemeResponse};
use crate::store::{FileStore, StoreError};

impl App {
    /// Send queued service requests and write queued changes to the store.
    pub(super) fn handle_message_side_effects(&mut self, model: &mut Model) {
        for request in model.take_outbox() {
            self.send_request(model, request);
        }
        self.persist(model);
    }

    /// Responses that have arrived from the workers since the last call.
    pub(super) fn take_responses(&mut self) -> Vec<Message> {
        let mut ready = Vec::new();
        if let Some(worker) = &self.completion {
            ready.extend(worker.drain().into_iter().map(Message::CompletionReady));
        }
        if let Some(worker) = &self.theme {
            ready.extend(worker.drain().into_iter().map(Message::ThemeReady));
        }
        self.in_flight = self.in_flight.saturating_sub(ready.len());
        ready
    }

    fn send_request(&mut self, model: &mut Model, request: Outgoing) {
        match request {
            Outgoing::Completion(request) => {
                crate::perf::log_event(
                    "assist.completion.request",
                    format!(
                        "document={} token={} range={:?}",
                        request.document, request.token, request.range
                    ),
                );
                let Some(worker) = &self.completion else {
                    self.deferred.push(Message::CompletionReady(CompletionResponse {
                        token: request.token,
                        document: request.document,
                        range: request.range,
                        result: Err(ServiceError::Unavailable(
                            "no completion service configured".to_string(),
                        )),
                    }));
                    return;
                };
                if worker.submit(request) {
                    self.in_flight += 1;
                } else {
                    model.show_toast(ToastLevel::Warning, "Completion service stopped");
                }
            }
            Outgoing::Theme(request) => {
                crate::perf::log_event(
                    "assist.theme.request",
                    format!("generation={}", request.generation),
                );
                let Some(worker) = &self.theme else {
                    self.deferred.push(Message::ThemeReady(ThemeResponse {
                        token: request.token,
                        generation: request.generation,
                        result: Err(ServiceError::Unavailable(
                            "no theme service configured".to_string(),
                        )),
                    }));
                    return;
                };
                if worker.submit(request) {
                    self.in_flight += 1;
                } else {
                    model.show_toast(ToastLevel::Warning, "Theme service stopped");
                }
            }
        }
    }

    fn persist(&mut self, model: &mut Model) {
        let ops = model.take_store_ops();
        let Some(store) = self.store.as_mut() else {
            return;
        };
        let mut save_session = false;
        for op in ops {
            let result = match op {
                StoreOp::Put(name) => match model.files.document(&name) {
                    Some(document) => store.put(document.clone()),
                    None => Ok(()),
                },
                StoreOp::Remove(name) => match store.remove(&name) {
                    Err(StoreError::NotFound(_)) => Ok(()),
                    other => other,
                },
                StoreOp::SaveSession => {
                    save_session = true;
                    Ok(())
                }
            };
            if let Err(err) = result {
                tracing::warn!("failed to persist change: {err}");
                model.show_toast(ToastLevel::Error, format!("Save failed: {err}"));
            }
        }
        if save_session && let Err(err) = store.save_session(&model.session()) {
            tracing::warn!("failed to save session: {err}");
            model.show_toast(ToastLevel::Error, format!("Session not saved: {err}"));
        }
    }
}
