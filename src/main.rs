//! Codepane - render source files through the highlight surface.
//!
//! # Usage
//!
//! ```bash
//! codepane src/main.py
//! codepane --format html index.html
//! codepane --insert "// todo" --at 0 script.js
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use codepane::config::{
    ConfigFlags, OutputFormat, ThemeMode, clear_config_flags, global_config_path,
    load_config_flags, local_override_path, parse_flag_tokens, save_config_flags,
};
use codepane::highlight::{HighlightBackground, SyntectRenderer};
use codepane::perf;
use codepane::store::FileKind;
use codepane::surface::{HighlightSurface, insert_at, visible_len};

/// Render a source file with caret-preserving syntax highlighting
#[derive(Parser, Debug)]
#[command(name = "codepane", version, about, long_about = None)]
struct Cli {
    /// Source file to render
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Language tag to highlight as (defaults to the file extension's)
    #[arg(short, long, value_name = "TAG")]
    language: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Text to splice in before rendering
    #[arg(long, value_name = "TEXT", requires = "at")]
    insert: Option<String>,

    /// Start offset of the splice, in characters
    #[arg(long, value_name = "OFFSET", requires = "insert")]
    at: Option<usize>,

    /// End offset of the splice (defaults to --at)
    #[arg(long, value_name = "OFFSET", requires = "at")]
    to: Option<usize>,

    /// Force syntax highlight theme background (light or dark)
    #[arg(long, value_enum, default_value = "auto")]
    theme: ThemeMode,

    /// Enable performance logging
    #[arg(long)]
    perf: bool,

    /// Write detailed render debug events to a file
    #[arg(long, value_name = "PATH")]
    render_debug_log: Option<PathBuf>,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    perf::set_enabled(effective.perf);
    let render_debug_log_path = effective
        .render_debug_log
        .clone()
        .or_else(|| std::env::var_os("CODEPANE_RENDER_DEBUG_LOG").map(PathBuf::from));
    if let Err(err) = perf::set_debug_log_path(render_debug_log_path.as_deref()) {
        tracing::warn!(
            "Failed to initialize render debug log {}: {err}",
            render_debug_log_path
                .as_ref()
                .map_or_else(|| "<unset>".to_string(), |p| p.display().to_string()),
        );
    }

    let renderer = match effective.theme.unwrap_or(ThemeMode::Auto) {
        ThemeMode::Auto => SyntectRenderer::detect(),
        ThemeMode::Light => SyntectRenderer::new(HighlightBackground::Light),
        ThemeMode::Dark => SyntectRenderer::new(HighlightBackground::Dark),
    };
    tracing::debug!(background = ?renderer.background(), "highlight theme");

    let content = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;
    let language = cli.language.clone().unwrap_or_else(|| {
        let name = cli
            .file
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        FileKind::from_name(name).language().to_string()
    });

    let mut surface = HighlightSurface::new(Arc::new(renderer));
    if let (Some(text), Some(start)) = (&cli.insert, cli.at) {
        let end = cli.to.unwrap_or(start);
        let updated = insert_at(&content, text, start, end)
            .with_context(|| format!("Cannot insert into {}", cli.file.display()))?;
        surface.apply_edit(&updated, &language, false);
        surface.restore_caret_offset(start + visible_len(text));
        tracing::info!(caret = surface.capture_caret_offset(), "spliced text");
    } else {
        surface.apply_edit(&content, &language, false);
    }
    if surface.view().is_fallback() {
        tracing::info!(language, "no highlighter matched, rendered as plain text");
    }

    let rendered = match effective.format.unwrap_or_default() {
        OutputFormat::Html => surface.view().to_html(),
        OutputFormat::Ansi => surface.view().to_ansi(),
    };
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(rendered.as_bytes())
        .and_then(|()| stdout.flush())
        .context("Failed to write output")
}
