//! Job lifecycle: start, worker run, deferred completion.
//!
//! ```text
//! Idle | Succeeded | Failed --start--> Submitting --submit ok--> Running
//! Running --poll SUCCESS + fetch--> (pending payload) --complete_pending--> Succeeded
//! any busy state --error--> Failed
//! ```
//!
//! At most one job is in flight. The worker runs as a tokio task owned by the
//! orchestrator and is cancelled on shutdown. The worker never touches the
//! playback buffers; it parks the fetched bytes in the pending slot and the
//! UI-side driver calls [`Orchestrator::complete_pending`] to decode and publish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::JobError;
use super::job::{Job, JobKind, JobParams};
use super::state::{JobState, JobStateCell};
use super::status::StatusBoard;
use crate::audio::codec::AudioCodec;
use crate::audio::playback::{PlaybackHandoff, PublishReport};
use crate::audio::processor::HostInfo;
use crate::audio::recorder::{is_usable, SegmentStore};
use crate::audio::segment::{SegmentInfo, CHANNELS};
use crate::config::{PersistedState, Settings};
use crate::library::{Library, LibraryRecord};
use crate::services::suno::{GenerationClient, TaskPhase};

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub poll_interval: Duration,
    pub max_poll_duration: Duration,
    pub max_poll_errors: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for OrchestratorConfig {
    fn from(s: &Settings) -> Self {
        Self {
            poll_interval: s.poll_interval(),
            max_poll_duration: s.max_poll_duration(),
            max_poll_errors: s.max_poll_errors.max(1),
        }
    }
}

/// Fetched result waiting for the completion step.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAudioPayload {
    pub bytes: Vec<u8>,
    pub prompt: String,
    pub is_test: bool,
}

#[derive(Debug, Default)]
struct PendingSlot {
    ready: AtomicBool,
    payload: Mutex<Option<PendingAudioPayload>>,
}

impl PendingSlot {
    fn put(&self, payload: PendingAudioPayload) {
        let mut slot = self.payload.lock().unwrap_or_else(|p| p.into_inner());
        *slot = Some(payload);
        self.ready.store(true, Ordering::Release);
    }

    fn take(&self) -> Option<PendingAudioPayload> {
        if !self.ready.swap(false, Ordering::AcqRel) {
            return None;
        }
        self.payload.lock().unwrap_or_else(|p| p.into_inner()).take()
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

/// Everything the orchestrator shares with the processor and its collaborators.
pub struct Components {
    pub host: Arc<HostInfo>,
    pub segments: Arc<SegmentStore>,
    pub playback: Arc<PlaybackHandoff>,
    pub codec: Arc<dyn AudioCodec>,
    pub library: Arc<dyn Library>,
}

/// One read of everything the editor shows.
#[derive(Debug, Clone, PartialEq)]
pub struct UiSnapshot {
    pub state: JobState,
    pub status_text: String,
    pub last_error: Option<String>,
    pub connected: bool,
    pub host_bpm: Option<f64>,
    pub can_generate: bool,
    pub can_transform: bool,
    pub segments: Vec<SegmentInfo>,
    pub selected_segment: Option<usize>,
}

struct Shared<C> {
    client: C,
    state: JobStateCell,
    status: StatusBoard,
    pending: PendingSlot,
    completion: Notify,
    parts: Components,
    config: OrchestratorConfig,
}

impl<C: GenerationClient> Shared<C> {
    /// Status first: whoever sees the terminal state must also see its message.
    fn fail(&self, err: &JobError) {
        self.status.fail(err);
        self.state.finish(JobState::Failed);
    }

    async fn drive(&self, job: &Job) -> Result<PendingAudioPayload, JobError> {
        if !self.client.has_credentials() {
            return Err(JobError::Configuration);
        }
        if let Err(e) = self.client.check_quota().await {
            self.status.set_connected(false);
            return Err(JobError::Quota(e.to_string()));
        }
        self.status.set_connected(true);

        let upload_url = match &job.source {
            Some(segment) => {
                let wav = self
                    .parts
                    .codec
                    .encode(segment.trimmed_samples(), segment.sample_rate, CHANNELS)
                    .map_err(|e| JobError::Encode(e.to_string()))?;
                self.state.mark_running();
                self.status.set_status("Uploading…");
                let url = self
                    .client
                    .upload(wav, job.kind.upload_name())
                    .await
                    .map_err(|e| JobError::Upload(e.to_string()))?;
                debug!("Segment {} uploaded to {}", segment.id, url);
                Some(url)
            }
            None => None,
        };

        let task_id = self
            .client
            .submit(&job.request(upload_url))
            .await
            .map_err(|e| JobError::Submission(e.to_string()))?;
        self.state.mark_running();
        self.status.set_status(if job.ephemeral {
            "Testing API (minimal generate)…"
        } else {
            job.kind.running_message()
        });
        info!("Job {} submitted as task {}", job.id, task_id);

        let audio_url = self.poll_until_done(&task_id).await?;
        let bytes = self
            .client
            .fetch(&audio_url)
            .await
            .map_err(|e| JobError::NoAudio(e.to_string()))?;
        if bytes.is_empty() {
            return Err(JobError::NoAudio("empty response".to_string()));
        }

        Ok(PendingAudioPayload {
            bytes,
            prompt: if job.ephemeral {
                "API test".to_string()
            } else {
                job.params.prompt.clone()
            },
            is_test: job.ephemeral,
        })
    }

    async fn poll_until_done(&self, task_id: &str) -> Result<String, JobError> {
        let started = Instant::now();
        let mut consecutive_errors = 0;

        loop {
            match self.client.poll_status(task_id).await {
                Ok(status) => {
                    consecutive_errors = 0;
                    match status.phase() {
                        TaskPhase::Succeeded => {
                            return status.audio_urls.into_iter().next().ok_or(JobError::MissingResult);
                        }
                        TaskPhase::Failed => return Err(JobError::Remote(status.failure_message())),
                        TaskPhase::Pending => debug!("Task {} status {:?}", task_id, status.status),
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!("Poll {} failed ({}/{}): {}", task_id, consecutive_errors, self.config.max_poll_errors, e);
                    if consecutive_errors >= self.config.max_poll_errors {
                        return Err(JobError::PollTransport(e.to_string()));
                    }
                }
            }

            if started.elapsed() >= self.config.max_poll_duration {
                return Err(JobError::Timeout(self.config.max_poll_duration));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    fn complete(&self, payload: PendingAudioPayload) -> Result<PublishReport, JobError> {
        let decoded = self
            .parts
            .codec
            .decode(&payload.bytes)
            .map_err(|e| JobError::Decode(e.to_string()))?;
        if decoded.channels == 0 || decoded.frames() == 0 {
            return Err(JobError::Decode("no frames or no channels".to_string()));
        }

        let report = self
            .parts
            .playback
            .publish(&decoded.to_stereo(), decoded.sample_rate)
            .map_err(|e| JobError::Decode(e.to_string()))?;

        self.status.set_status(if payload.is_test {
            "API test passed - audio received and playing."
        } else {
            "Generated - playing."
        });
        self.state.finish(JobState::Succeeded);
        info!(
            "Playing {} frames at {}Hz (source {}Hz, {} ch)",
            report.frames, report.host_rate, decoded.sample_rate, decoded.channels
        );

        if !payload.is_test {
            let record = LibraryRecord {
                prompt: &payload.prompt,
                bytes: &payload.bytes,
                sample_rate: decoded.sample_rate,
                channels: decoded.channels,
            };
            match self.parts.library.save(&record) {
                Ok(path) => info!("Saved generation to {}", path.display()),
                Err(e) => warn!("Could not save generation to library: {}", e),
            }
        }
        Ok(report)
    }
}

pub struct Orchestrator<C: GenerationClient> {
    shared: Arc<Shared<C>>,
    runtime: Handle,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl<C: GenerationClient> Orchestrator<C> {
    pub fn new(client: C, parts: Components, config: OrchestratorConfig, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                state: JobStateCell::new(),
                status: StatusBoard::new(),
                pending: PendingSlot::default(),
                completion: Notify::new(),
                parts,
                config,
            }),
            runtime,
            worker: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> JobState {
        self.shared.state.load()
    }

    pub fn status_text(&self) -> String {
        self.shared.status.text()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.status.last_error()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.status.is_connected()
    }

    pub fn host_bpm(&self) -> Option<f64> {
        self.shared.parts.host.bpm()
    }

    pub fn client(&self) -> &C {
        &self.shared.client
    }

    pub fn segments(&self) -> &Arc<SegmentStore> {
        &self.shared.parts.segments
    }

    pub fn snapshot(&self) -> UiSnapshot {
        let state = self.state();
        let segments = &self.shared.parts.segments;
        UiSnapshot {
            state,
            status_text: self.status_text(),
            last_error: self.last_error(),
            connected: self.is_connected(),
            host_bpm: self.host_bpm(),
            can_generate: !state.is_busy(),
            can_transform: !state.is_busy() && segments.has_usable_selection(),
            segments: segments.list(),
            selected_segment: segments.selected_index(),
        }
    }

    // --- credentials ---

    pub fn set_api_key(&self, key: &str) {
        self.shared.client.set_api_key(key);
        self.shared.status.set_connected(false);
    }

    pub fn api_key(&self) -> String {
        self.shared.client.api_key()
    }

    /// Quota check outside any job, to light up the connection indicator.
    pub async fn check_connection(&self) -> bool {
        let ok = self.shared.client.has_credentials() && self.shared.client.check_quota().await.is_ok();
        self.shared.status.set_connected(ok);
        ok
    }

    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            api_key: self.api_key(),
        }
    }

    pub fn restore_state(&self, state: &PersistedState) {
        self.set_api_key(&state.api_key);
    }

    // --- segments ---

    pub fn select_segment(&self, index: Option<usize>) -> bool {
        self.shared.parts.segments.select(index)
    }

    pub fn set_trim(&self, index: usize, start: i64, end: Option<i64>) -> bool {
        self.shared.parts.segments.set_trim(index, start, end)
    }

    pub fn rename_segment(&self, index: usize, name: &str) -> bool {
        self.shared.parts.segments.rename(index, name)
    }

    pub fn remove_segment(&self, index: usize) -> bool {
        self.shared.parts.segments.remove(index)
    }

    pub fn clear_segments(&self) {
        self.shared.parts.segments.clear();
    }

    // --- jobs ---

    pub fn start_generate(&self, params: JobParams) -> Result<Uuid, JobError> {
        self.start(JobKind::Generate, params, false)
    }

    pub fn start_cover(&self, params: JobParams) -> Result<Uuid, JobError> {
        self.start(JobKind::Cover, params, false)
    }

    pub fn start_add_vocals(&self, params: JobParams) -> Result<Uuid, JobError> {
        self.start(JobKind::AddVocals, params, false)
    }

    /// Minimal generate whose result is played but not kept.
    pub fn start_test_api(&self) -> Result<Uuid, JobError> {
        self.start(JobKind::Generate, JobParams::api_test(), true)
    }

    fn start(&self, kind: JobKind, params: JobParams, ephemeral: bool) -> Result<Uuid, JobError> {
        if let Err(current) = self.shared.state.try_begin() {
            debug!("Ignoring {:?} start while {:?}", kind, current);
            return Err(JobError::Busy);
        }

        let source = if kind.needs_segment() {
            match self.shared.parts.segments.selected().filter(is_usable) {
                Some(segment) => Some(segment),
                None => {
                    let err = JobError::Precondition(kind.missing_segment_message().to_string());
                    warn!("{:?} rejected: {}", kind, err);
                    self.shared.fail(&err);
                    return Err(err);
                }
            }
        } else {
            None
        };

        let job = Job::new(kind, params, source, ephemeral);
        let id = job.id;
        self.shared.status.begin("Submitting…");
        info!("Job {} ({:?}) started", id, kind);

        let shared = Arc::clone(&self.shared);
        let cancel = self.shutdown.child_token();
        let handle = self.runtime.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(JobError::Cancelled),
                result = shared.drive(&job) => result,
            };
            match outcome {
                Ok(payload) => {
                    info!("Job {} fetched {} bytes", job.id, payload.bytes.len());
                    shared.pending.put(payload);
                    shared.completion.notify_one();
                }
                Err(err) => {
                    warn!("Job {} failed: {}", job.id, err);
                    shared.fail(&err);
                }
            }
        });

        let mut worker = self.worker.lock().unwrap_or_else(|p| p.into_inner());
        *worker = Some(handle);
        Ok(id)
    }

    /// Waits for the current worker task, if any, to finish.
    pub async fn join(&self) {
        let handle = self.worker.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    warn!("Job worker panicked: {}", e);
                    self.shared.fail(&JobError::Cancelled);
                }
            }
        }
    }

    // --- deferred completion ---

    pub fn has_pending_completion(&self) -> bool {
        self.shared.pending.is_ready()
    }

    /// Resolves once a worker has parked a result.
    pub async fn completion_ready(&self) {
        self.shared.completion.notified().await;
    }

    /// Takes the parked result, decodes it and hands it to playback. Call from
    /// the UI side, never the audio thread. `None` when nothing was pending.
    pub fn complete_pending(&self) -> Option<Result<PublishReport, JobError>> {
        let payload = self.shared.pending.take()?;
        let result = self.shared.complete(payload);
        if let Err(err) = &result {
            warn!("Completion failed: {}", err);
            self.shared.fail(err);
        }
        Some(result)
    }

    /// Cancels the in-flight worker and waits for it to wind down.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.join().await;
    }
}

impl<C: GenerationClient> Drop for Orchestrator<C> {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.worker.get_mut().ok().and_then(Option::take) {
            handle.abort();
        }
    }
}
