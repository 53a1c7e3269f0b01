use std::path::Path;
use std::process::ExitCode;

use scene_engine::{
    CommandQueue, DirectoryResources, GameVarStore, Host, SceneId, SceneManager,
};
use tracing::{error, info, warn};

use super::bootstrap::{AppWiring, BootstrapResult, PlayerConfig};
use super::hooks::LoggingHooks;

#[derive(Debug, Default)]
pub(crate) struct SessionSummary {
    pub(crate) frames: u32,
    pub(crate) entered: bool,
    pub(crate) commands_posted: usize,
    pub(crate) final_scene: Option<SceneId>,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let project_path = app.project_path();
    let save_path = app.snapshot_save_path();
    match run_session(&project_path, &app.config, save_path.as_deref()) {
        Ok(summary) => {
            info!(
                frames = summary.frames,
                entered = summary.entered,
                commands_posted = summary.commands_posted,
                final_scene = ?summary.final_scene.map(|scene_id| scene_id.0),
                "session_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "session_failed");
            ExitCode::FAILURE
        }
    }
}

/// Boots the project next to its assets, enters the start scene and ticks
/// it for the configured number of frames.
pub(crate) fn run_session(
    project_path: &Path,
    config: &PlayerConfig,
    save_path: Option<&Path>,
) -> BootstrapResult<SessionSummary> {
    let mut manager = boot(project_path, config)?;

    if let Some(path) = save_path.filter(|path| path.is_file()) {
        manager
            .restore_snapshots(path)
            .map_err(|error| format!("restore snapshots '{}': {error}", path.display()))?;
        info!(path = %path.display(), "snapshots_restored");
    }

    let start = SceneId(config.start_scene);
    let loaded = manager
        .access_scene(start)
        .map_err(|error| format!("load start scene {}: {error}", start.0))?
        .is_some();
    if !loaded {
        return Err(format!("start scene {} is not declared by the project", start.0));
    }

    let mut commands = CommandQueue::new();
    let mut vars = GameVarStore::new();
    let mut hooks = LoggingHooks::default();
    let mut host = Host::new(&mut commands, &mut vars, &mut hooks);

    let entered = manager.goto_scene(&mut host, start, config.start_entrance);
    if !entered {
        warn!(
            scene_id = start.0,
            entrance_id = config.start_entrance,
            "start_entrance_rejected"
        );
    }

    for _ in 0..config.frames {
        manager
            .update_systems(&mut host, config.tick_ms)
            .map_err(|error| format!("update systems: {error}"))?;
    }

    if let Some(path) = save_path {
        manager
            .save_snapshots(path)
            .map_err(|error| format!("save snapshots '{}': {error}", path.display()))?;
        info!(path = %path.display(), "snapshots_saved");
    }

    Ok(SessionSummary {
        frames: config.frames,
        entered,
        commands_posted: commands.posted.len(),
        final_scene: manager.current_scene(),
    })
}

fn boot(project_path: &Path, config: &PlayerConfig) -> BootstrapResult<SceneManager> {
    let assets_dir = project_path
        .parent()
        .ok_or_else(|| format!("project path '{}' has no parent", project_path.display()))?;
    let project_name = project_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("project path '{}' has no file name", project_path.display()))?;
    let resources = Box::new(DirectoryResources::new(assets_dir));
    let is_document = project_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));

    let booted = if is_document {
        SceneManager::boot_from_document(resources, config.engine.clone(), project_name)
    } else {
        SceneManager::boot_from_archive(resources, config.engine.clone(), project_name)
    };
    booted.map_err(|error| format!("boot project '{}': {error}", project_path.display()))
}
