use std::path::{Path, PathBuf};

use clap::Parser;
use engine::{run_app, AppError, Engine, EngineConfig, EngineError, LoopConfig, SceneSpace};
use level_editor::level::{read_level, write_level, LevelFile, LevelFileError, MAX_COLOR_PALETTE};
use level_editor::{EditorScene, InMemorySettings, LevelEditor, EDITOR_SCENE};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "level-editor", version, about = "Grid level editor")]
pub(crate) struct Args {
    /// Level file to open. Every committed edit is written back to it.
    #[arg(long)]
    pub(crate) level: Option<PathBuf>,
    /// Directory containing tile images.
    #[arg(long)]
    pub(crate) assets: Option<PathBuf>,
    /// Hold rendering until every requested image has loaded.
    #[arg(long)]
    pub(crate) wait_for_images: bool,
    /// Color palette to use instead of the one stored in the level.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_COLOR_PALETTE)))]
    pub(crate) palette: Option<u8>,
}

#[derive(Debug, Error)]
pub(crate) enum StartupError {
    #[error(transparent)]
    Level(#[from] LevelFileError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    App(#[from] AppError),
}

pub(crate) fn run() -> Result<(), StartupError> {
    init_tracing();
    let args = Args::parse();
    info!("=== Level Editor Startup ===");

    let level = load_level(&args)?;
    let (engine, config) = build_engine(&args, &level)?;
    run_app(config, engine)?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// Reads `--level` when it exists; a missing file starts an empty level saved to that path.
fn load_level(args: &Args) -> Result<LevelFile, LevelFileError> {
    let mut level = match args.level.as_deref() {
        Some(path) if path.exists() => read_level(path)?,
        Some(path) => {
            info!(path = %path.display(), "level_file_missing_starting_empty");
            LevelFile::default()
        }
        None => LevelFile::default(),
    };
    if let Some(palette) = args.palette {
        level.color_palette = palette;
    }
    Ok(level)
}

fn build_engine(args: &Args, level: &LevelFile) -> Result<(Engine, LoopConfig), EngineError> {
    let config = EngineConfig {
        wait_for_images: args.wait_for_images,
        asset_root: args.assets.clone(),
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config);
    let graph = engine.add_scene(EDITOR_SCENE, SceneSpace::World)?;
    let mut editor = LevelEditor::new(
        graph,
        level,
        Box::new(InMemorySettings::default()),
        args.assets.is_some(),
    )?;
    if let Some(path) = args.level.clone() {
        editor.set_listener(move |document| save_level(&path, &document.to_file()));
    }
    let scene = EditorScene::new(graph, editor)?;
    engine.set_scene_behavior(EDITOR_SCENE, scene)?;

    let window_title = match args.level.as_deref().and_then(Path::file_name) {
        Some(name) => format!("Level Editor - {}", name.to_string_lossy()),
        None => LoopConfig::default().window_title,
    };
    Ok((
        engine,
        LoopConfig {
            window_title,
            ..LoopConfig::default()
        },
    ))
}

fn save_level(path: &Path, level: &LevelFile) {
    match write_level(path, level) {
        Ok(()) => info!(path = %path.display(), entities = level.entity_count(), "level_saved"),
        Err(err) => warn!(error = %err, path = %path.display(), "level_save_failed"),
    }
}
