use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use scene_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub(crate) const ROOT_ENV_VAR: &str = "SCENE_PLAYER_ROOT";
pub(crate) const CONFIG_ENV_VAR: &str = "SCENE_PLAYER_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "player.json";

pub(crate) type BootstrapResult<T> = Result<T, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PlayerConfig {
    /// Project document (`.xml`) or archive, relative to the assets dir.
    pub(crate) project_file: String,
    pub(crate) start_scene: i32,
    pub(crate) start_entrance: i32,
    pub(crate) tick_ms: u32,
    pub(crate) frames: u32,
    /// Snapshot save file, relative to the saves dir. Restored at startup
    /// when present and written on exit.
    pub(crate) snapshot_save: Option<String>,
    pub(crate) engine: EngineConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            project_file: "game.xml".to_string(),
            start_scene: 1,
            start_entrance: 0,
            tick_ms: 16,
            frames: 600,
            snapshot_save: None,
            engine: EngineConfig::default(),
        }
    }
}

/// Directory layout under the player root: `assets/` holds the project,
/// `saves/` holds snapshot saves.
#[derive(Debug, Clone)]
pub(crate) struct ProjectPaths {
    pub(crate) root: PathBuf,
    pub(crate) assets_dir: PathBuf,
    pub(crate) saves_dir: PathBuf,
}

impl ProjectPaths {
    pub(crate) fn at(root: PathBuf) -> Self {
        Self {
            assets_dir: root.join("assets"),
            saves_dir: root.join("saves"),
            root,
        }
    }
}

/// `SCENE_PLAYER_ROOT` when set, the working directory otherwise.
fn resolve_project_paths() -> BootstrapResult<ProjectPaths> {
    let root = match env::var_os(ROOT_ENV_VAR) {
        Some(value) => PathBuf::from(value),
        None => env::current_dir().map_err(|error| format!("resolve working directory: {error}"))?,
    };
    if !root.is_dir() {
        return Err(format!(
            "player root '{}' is not a directory; set {ROOT_ENV_VAR}",
            root.display()
        ));
    }
    Ok(ProjectPaths::at(root))
}

pub(crate) struct AppWiring {
    pub(crate) paths: ProjectPaths,
    pub(crate) config: PlayerConfig,
}

impl AppWiring {
    pub(crate) fn project_path(&self) -> PathBuf {
        self.paths.assets_dir.join(&self.config.project_file)
    }

    pub(crate) fn snapshot_save_path(&self) -> Option<PathBuf> {
        self.config
            .snapshot_save
            .as_ref()
            .map(|name| self.paths.saves_dir.join(name))
    }
}

pub(crate) fn build_app() -> BootstrapResult<AppWiring> {
    init_tracing();
    info!("=== Scene Player Startup ===");

    let paths = resolve_project_paths()?;
    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| paths.root.join(DEFAULT_CONFIG_FILE));
    let config = load_player_config(&config_path)?;
    info!(
        root = %paths.root.display(),
        project_file = %config.project_file,
        start_scene = config.start_scene,
        frames = config.frames,
        "player_configured"
    );

    Ok(AppWiring { paths, config })
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

/// A missing file yields the defaults.
pub(crate) fn load_player_config(path: &Path) -> BootstrapResult<PlayerConfig> {
    if !path.is_file() {
        info!(path = %path.display(), "player_config_defaulted");
        return Ok(PlayerConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("read player config '{}': {error}", path.display()))?;
    parse_player_config(&raw)
}

pub(crate) fn parse_player_config(raw: &str) -> BootstrapResult<PlayerConfig> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, PlayerConfig>(&mut deserializer) {
        Ok(config) => Ok(config),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(format!("parse player config: {source}"))
            } else {
                Err(format!("parse player config at {path}: {source}"))
            }
        }
    }
}
