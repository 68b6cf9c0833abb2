use std::sync::Arc;
use std::time::Duration;

use codepane::app::{App, Message, Model, THEME_FILE};
use codepane::assist::{CompletionRequest, CompletionService, ServiceError};
use codepane::highlight::{HighlightBackground, SyntectRenderer};
use codepane::store::{DirStore, Document, FileStore, MemoryStore};
use codepane::surface::{HighlightSurface, SurfacePoint, insert_at};

fn renderer() -> Arc<SyntectRenderer> {
    Arc::new(SyntectRenderer::new(HighlightBackground::Dark))
}

#[test]
fn test_surface_edit_cycle_keeps_text_and_caret() {
    let mut surface = HighlightSurface::new(renderer());
    let source = "function add(a, b) {\n  return a + b;\n}\n";
    surface.apply_edit(source, "javascript", false);
    assert!(!surface.view().is_fallback());
    assert_eq!(surface.plain_text(), source);

    surface.restore_caret_offset(30);
    let caret = surface.capture_caret_offset();
    assert_eq!(caret, 30);

    let edited = insert_at(source, " * 2", caret, caret).unwrap();
    surface.apply_edit(&edited, "javascript", true);
    assert_eq!(surface.plain_text(), edited);
    assert_eq!(surface.capture_caret_offset(), 30);
}

#[test]
fn test_unknown_language_round_trips_through_fallback() {
    let mut surface = HighlightSurface::new(renderer());
    let source = "a < b && c > d\n\tindented\n\n";
    surface.apply_edit(source, "unknown-lang-xyz", false);
    assert!(surface.view().is_fallback());
    assert_eq!(surface.plain_text(), source);
    assert_eq!(
        surface.view().to_html(),
        "a &lt; b &amp;&amp; c &gt; d\n    indented\n\n"
    );
}

#[test]
fn test_host_caret_survives_rehighlight() {
    let mut surface = HighlightSurface::new(renderer());
    surface.apply_edit("x = 1\ny = 2\n", "python", false);
    surface.set_caret(SurfacePoint::new(0, 0));
    surface.restore_caret_offset(5);
    let before = surface.capture_caret_offset();
    assert!(surface.type_text("  # one"));
    let text = surface.plain_text();
    assert_eq!(text, "x = 1  # one\ny = 2\n");
    surface.apply_edit(&text, "python", true);
    assert_eq!(surface.capture_caret_offset(), before + 7);
}

struct Upper;

impl CompletionService for Upper {
    fn complete(&mut self, request: &CompletionRequest) -> Result<String, ServiceError> {
        std::thread::sleep(Duration::from_millis(20));
        Ok(request.before.to_uppercase())
    }
}

fn settle(app: &mut App, mut model: Model) -> Model {
    for _ in 0..400 {
        model = app.pump(model, 0);
        if app.in_flight() == 0 {
            return model;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("completion never arrived");
}

#[test]
fn test_late_completion_does_not_touch_other_document() {
    let files = MemoryStore::from_documents([
        Document::new("a.js", "let a"),
        Document::new("b.js", "let b"),
    ]);
    let mut app = App::new().with_completion_service(Upper).unwrap();
    let model = Model::new(files, renderer());
    let mut model = app.dispatch(model, Message::OpenTab("a.js".to_string()));
    model.active_mut().unwrap().surface.restore_caret_offset(5);
    let model = app.dispatch(model, Message::RequestCompletion);
    let model = app.dispatch(model, Message::OpenTab("b.js".to_string()));
    let model = settle(&mut app, model);

    assert_eq!(model.files.document("a.js").unwrap().content, "let a");
    assert_eq!(model.files.document("b.js").unwrap().content, "let b");
    assert_eq!(model.active_name(), Some("b.js"));
}

#[test]
fn test_workspace_round_trip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = App::new().with_store(DirStore::open(dir.path()).unwrap());
    let model = app.load_model(renderer()).unwrap();
    let mut model = app.dispatch(model, Message::OpenTab(THEME_FILE.to_string()));
    model.active_mut().unwrap().surface.restore_caret_offset(0);
    let _model = app.dispatch(model, Message::Input("/* top */\n".to_string()));

    let store = DirStore::open(dir.path()).unwrap();
    let css = store.get(THEME_FILE).unwrap().content;
    assert!(css.starts_with("/* top */\nbody {"));
    let session = store.load_session().unwrap().unwrap();
    assert_eq!(session.active_tab.as_deref(), Some(THEME_FILE));
}
