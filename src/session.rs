use std::sync::Arc;

use tokio::runtime::Handle;

use crate::audio::codec::WavCodec;
use crate::audio::playback::PlaybackHandoff;
use crate::audio::processor::{HostInfo, Processor};
use crate::audio::recorder::SegmentStore;
use crate::config::Settings;
use crate::kernel::orchestrator::{Components, Orchestrator, OrchestratorConfig};
use crate::library::Library;
use crate::services::suno::GenerationClient;

/// Wires one plugin instance: the orchestrator for the UI side and the
/// processor for the audio side, sharing segments, playback and host info.
pub fn assemble<C: GenerationClient>(
    client: C,
    settings: &Settings,
    library: Arc<dyn Library>,
    runtime: Handle,
) -> (Orchestrator<C>, Processor) {
    let host = Arc::new(HostInfo::default());
    let segments = Arc::new(SegmentStore::new());
    let playback = Arc::new(PlaybackHandoff::new(host.clone(), settings.playback_capacity_frames));

    let processor = Processor::new(host.clone(), segments.clone(), playback.clone());
    let parts = Components {
        host,
        segments,
        playback,
        codec: Arc::new(WavCodec::default()),
        library,
    };
    let orchestrator = Orchestrator::new(client, parts, OrchestratorConfig::from(settings), runtime);
    (orchestrator, processor)
}
