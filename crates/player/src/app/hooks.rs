use scene_engine::{EntranceDescriptor, PreloadProgress, PreloadRequest, TransitionHooks};
use tracing::info;

/// Accepts every transition and reports its progress.
#[derive(Debug, Default)]
pub(crate) struct LoggingHooks {
    pub(crate) switches: u32,
}

impl TransitionHooks for LoggingHooks {
    fn preload_progress(&mut self, request: &PreloadRequest, progress: PreloadProgress) -> bool {
        info!(
            from = request.trigger_scene.0,
            to = request.destination.0,
            percent = progress.percent(),
            "preload_progress"
        );
        true
    }

    fn scene_switch(&mut self, entrance: &EntranceDescriptor) -> bool {
        self.switches += 1;
        info!(
            scene_id = entrance.scene_id.0,
            hint_id = entrance.hint_id,
            title = %entrance.title,
            "scene_switch"
        );
        true
    }
}
