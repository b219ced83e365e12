//! Capture session
//!
//! One recording session: permission handling, device stream ownership,
//! recorder lifecycle and elapsed-time tracking. The capture kind is
//! supplied as a [`CaptureStrategy`].
//!
//! Session state lives behind a short-lived lock that is never held across
//! an await. Stream acquisitions are tagged with a generation number; a
//! stop or reset bumps it, and an acquisition that resolves afterwards
//! releases its tracks instead of installing them.

use super::artifact::{ObjectUrlRegistry, RecordingArtifact};
use super::backend::{RecorderFactory, RecorderState, StreamRecorder};
use super::state::{RecordingState, SessionConfig, SessionSnapshot};
use super::strategy::{acquire_stream, AcquiredStream, Capabilities, CaptureStrategy};
use super::timer::ElapsedTimer;
use crate::capture::{MediaDevices, MediaStream, MediaTrack, PermissionName, PermissionState};
use crate::utils::error::{AppError, AppResult};
use crate::utils::time::{format_clock, format_countdown};
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Invoked with the artifact after a non-terminating stop
pub type AfterStopCallback = Arc<dyn Fn(&RecordingArtifact) + Send + Sync>;

/// Events emitted by a session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A permission request was refused
    PermissionDenied,
    /// A device stream was acquired and a recorder bound to it
    StreamReady,
    Started,
    Paused,
    Resumed,
    /// Elapsed seconds after a timer tick
    Tick(u64),
    /// The automatic stop is near
    StoppingSoon,
    /// Recording stopped; carries the artifact when one was produced
    Stopped(Option<RecordingArtifact>),
    Reset,
}

struct SessionInner {
    state: RecordingState,
    permission_denied: bool,
    elapsed: u64,
    will_stop_soon: bool,
    artifact: Option<RecordingArtifact>,
    acquired: Option<AcquiredStream>,
    recorder: Option<Arc<dyn StreamRecorder>>,
    timer: Option<ElapsedTimer>,
    end_watch: Option<JoinHandle<()>>,
    generation: u64,
    timer_epoch: u64,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            state: RecordingState::Idle,
            permission_denied: false,
            elapsed: 0,
            will_stop_soon: false,
            artifact: None,
            acquired: None,
            recorder: None,
            timer: None,
            end_watch: None,
            generation: 0,
            timer_epoch: 0,
        }
    }

    fn stop_timer(&mut self) {
        self.timer_epoch += 1;
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    /// Detach the held stream without stopping its tracks
    fn detach_stream(&mut self) -> Option<AcquiredStream> {
        if let Some(watch) = self.end_watch.take() {
            watch.abort();
        }
        self.acquired.take()
    }
}

struct Shared {
    strategy: Box<dyn CaptureStrategy>,
    devices: Arc<dyn MediaDevices>,
    recorders: Arc<dyn RecorderFactory>,
    urls: Arc<ObjectUrlRegistry>,
    config: SessionConfig,
    after_stop: Option<AfterStopCallback>,
    inner: Mutex<SessionInner>,
    events: broadcast::Sender<SessionEvent>,
    preview: watch::Sender<Option<MediaStream>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        inner.stop_timer();
        if let Some(acquired) = inner.detach_stream() {
            tracing::debug!("Releasing {} stream on drop", self.strategy.name());
            acquired.release();
        }
    }
}

/// Builder for [`CaptureSession`]
pub struct SessionBuilder {
    strategy: Box<dyn CaptureStrategy>,
    config: SessionConfig,
    after_stop: Option<AfterStopCallback>,
    urls: Option<Arc<ObjectUrlRegistry>>,
}

impl SessionBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn after_stop<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RecordingArtifact) + Send + Sync + 'static,
    {
        self.after_stop = Some(Arc::new(callback));
        self
    }

    /// Share a URL registry between sessions
    pub fn url_registry(mut self, urls: Arc<ObjectUrlRegistry>) -> Self {
        self.urls = Some(urls);
        self
    }

    pub fn build(self, devices: Arc<dyn MediaDevices>, recorders: Arc<dyn RecorderFactory>) -> CaptureSession {
        let (events, _) = broadcast::channel(100);
        let (preview, _) = watch::channel(None);
        CaptureSession {
            shared: Arc::new(Shared {
                strategy: self.strategy,
                devices,
                recorders,
                urls: self.urls.unwrap_or_default(),
                config: self.config,
                after_stop: self.after_stop,
                inner: Mutex::new(SessionInner::new()),
                events,
                preview,
            }),
        }
    }
}

/// A recording session for one capture kind
#[derive(Clone)]
pub struct CaptureSession {
    shared: Arc<Shared>,
}

impl CaptureSession {
    pub fn builder(strategy: impl CaptureStrategy + 'static) -> SessionBuilder {
        SessionBuilder {
            strategy: Box::new(strategy),
            config: SessionConfig::default(),
            after_stop: None,
            urls: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.shared.strategy.name()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.shared.strategy.capabilities()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Live preview stream, if one is attached
    pub fn preview(&self) -> watch::Receiver<Option<MediaStream>> {
        self.shared.preview.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.shared.events.send(event);
    }

    // ---------------------------------------------------------------------
    // Permissions
    // ---------------------------------------------------------------------

    /// Whether microphone access is currently granted
    pub async fn has_permission(&self) -> bool {
        match self.shared.devices.query_permission(PermissionName::Microphone).await {
            Ok(state) => state == PermissionState::Granted,
            Err(e) => {
                tracing::debug!("Permission query failed for {}: {}", self.name(), e);
                false
            }
        }
    }

    /// Prompt for the devices this session needs
    ///
    /// A refusal latches the permission-denied flag; a later grant does not
    /// clear it.
    pub async fn request_permission(&self) -> bool {
        let constraints = self.shared.strategy.permission_constraints();
        match self.shared.devices.get_user_media(&constraints).await {
            Ok(probe) => {
                probe.stop();
                true
            }
            Err(e) => {
                tracing::warn!("Permission request for {} failed: {}", self.name(), e);
                let newly_denied = {
                    let mut inner = self.shared.inner.lock();
                    !std::mem::replace(&mut inner.permission_denied, true)
                };
                if newly_denied {
                    self.emit(SessionEvent::PermissionDenied);
                }
                false
            }
        }
    }

    // ---------------------------------------------------------------------
    // Stream setup
    // ---------------------------------------------------------------------

    /// Acquire the device stream and bind a recorder to it
    pub async fn setup_stream(&self) -> bool {
        match self.try_setup_stream().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Stream setup for {} failed: {}", self.name(), e);
                false
            }
        }
    }

    pub async fn try_setup_stream(&self) -> AppResult<()> {
        let shared = &self.shared;

        let (generation, previous) = {
            let mut inner = shared.inner.lock();
            if inner.state.is_capturing() {
                return Err(AppError::InvalidState(
                    "cannot set up a stream while recording".to_string(),
                ));
            }
            let previous = inner.detach_stream();
            inner.recorder = None;
            inner.state = RecordingState::Idle;
            inner.generation += 1;
            (inner.generation, previous)
        };
        if let Some(previous) = previous {
            previous.release();
            shared.preview.send_replace(None);
        }

        let capabilities = shared.strategy.capabilities();
        tracing::debug!("Acquiring {} stream", self.name());
        let acquired = acquire_stream(shared.strategy.as_ref(), shared.devices.as_ref(), &shared.config).await?;

        let options = shared.strategy.recorder_options();
        let recorder: Arc<dyn StreamRecorder> = match shared.recorders.create(&acquired.stream, &options) {
            Ok(recorder) => Arc::from(recorder),
            Err(e) => {
                acquired.release();
                return Err(e.into());
            }
        };

        {
            let mut inner = shared.inner.lock();
            if inner.generation != generation || inner.state.is_capturing() {
                drop(inner);
                tracing::warn!("Discarding late {} stream", self.name());
                acquired.release();
                return Err(AppError::StaleAcquisition);
            }

            if let Some(track) = acquired.end_signal.clone() {
                inner.end_watch = Some(self.watch_external_end(track));
            }
            if let Some(preview) = &acquired.preview {
                shared.preview.send_replace(Some(preview.clone()));
            }
            inner.recorder = Some(recorder);
            inner.acquired = Some(acquired);
            inner.state = if capabilities.has_preview {
                RecordingState::Streaming
            } else {
                RecordingState::Idle
            };
        }

        tracing::info!("{} stream ready ({})", self.name(), options.mime_type);
        self.emit(SessionEvent::StreamReady);
        Ok(())
    }

    /// Stop the session when `track` is ended from outside
    fn watch_external_end(&self, track: MediaTrack) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            if !track.ended().await {
                return;
            }
            if let Some(shared) = weak.upgrade() {
                let session = CaptureSession { shared };
                tracing::info!("{} share ended by the platform, stopping", session.name());
                // Detached so the stop outlives this watcher being aborted.
                tokio::spawn(async move {
                    session.stop_recording(false).await;
                });
            }
        })
    }

    // ---------------------------------------------------------------------
    // Recording lifecycle
    // ---------------------------------------------------------------------

    /// Begin capturing; returns false when no recorder is bound
    pub async fn start_recording(&self) -> bool {
        match self.try_start_recording().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Could not start {} recording: {}", self.name(), e);
                false
            }
        }
    }

    pub async fn try_start_recording(&self) -> AppResult<()> {
        if self.capabilities().implicit_setup {
            self.try_setup_stream().await?;
        }

        let recorder = {
            let inner = self.shared.inner.lock();
            if inner.state.is_capturing() {
                return Err(AppError::InvalidState("already recording".to_string()));
            }
            inner.recorder.clone().ok_or(AppError::NoRecorder)?
        };

        recorder.start().await?;

        let (superseded, warn_now) = {
            let mut inner = self.shared.inner.lock();
            let still_bound = inner
                .recorder
                .as_ref()
                .is_some_and(|bound| Arc::ptr_eq(bound, &recorder));
            if !still_bound {
                return Err(AppError::StaleAcquisition);
            }

            inner.elapsed = 0;
            inner.will_stop_soon = self.shared.config.in_warning_window(0);
            inner.state = RecordingState::Recording;
            self.start_timer(&mut inner);
            (inner.artifact.take(), inner.will_stop_soon)
        };

        if let Some(old) = superseded {
            self.shared.urls.revoke(&old.url);
        }

        tracing::info!("{} recording started", self.name());
        self.emit(SessionEvent::Started);
        if warn_now {
            self.emit(SessionEvent::StoppingSoon);
        }
        Ok(())
    }

    /// Pause an active recording
    pub async fn pause_recording(&self) -> bool {
        match self.try_pause_recording().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Pause ignored for {}: {}", self.name(), e);
                false
            }
        }
    }

    pub async fn try_pause_recording(&self) -> AppResult<()> {
        if !self.capabilities().supports_pause {
            return Err(AppError::InvalidState(format!("{} recordings cannot pause", self.name())));
        }

        let recorder = {
            let inner = self.shared.inner.lock();
            let recorder = inner.recorder.clone().ok_or(AppError::NoRecorder)?;
            if inner.state != RecordingState::Recording {
                return Err(AppError::InvalidState("not recording".to_string()));
            }
            recorder
        };

        recorder.pause().await?;

        {
            let mut inner = self.shared.inner.lock();
            Self::ensure_still_bound(&inner, &recorder, RecordingState::Recording)?;
            inner.stop_timer();
            inner.state = RecordingState::Paused;
        }
        tracing::info!("{} recording paused", self.name());
        self.emit(SessionEvent::Paused);
        Ok(())
    }

    /// Resume a paused recording
    pub async fn resume_recording(&self) -> bool {
        match self.try_resume_recording().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Resume ignored for {}: {}", self.name(), e);
                false
            }
        }
    }

    pub async fn try_resume_recording(&self) -> AppResult<()> {
        if !self.capabilities().supports_pause {
            return Err(AppError::InvalidState(format!("{} recordings cannot pause", self.name())));
        }

        let recorder = {
            let inner = self.shared.inner.lock();
            let recorder = inner.recorder.clone().ok_or(AppError::NoRecorder)?;
            if inner.state != RecordingState::Paused {
                return Err(AppError::InvalidState("not paused".to_string()));
            }
            recorder
        };

        recorder.resume().await?;

        {
            let mut inner = self.shared.inner.lock();
            Self::ensure_still_bound(&inner, &recorder, RecordingState::Paused)?;
            inner.state = RecordingState::Recording;
            self.start_timer(&mut inner);
        }
        tracing::info!("{} recording resumed", self.name());
        self.emit(SessionEvent::Resumed);
        Ok(())
    }

    /// Check that `recorder` is still the session's recorder and the
    /// session is still in `expected` after an await
    fn ensure_still_bound(
        inner: &SessionInner,
        recorder: &Arc<dyn StreamRecorder>,
        expected: RecordingState,
    ) -> AppResult<()> {
        let still_bound = inner
            .recorder
            .as_ref()
            .is_some_and(|bound| Arc::ptr_eq(bound, recorder));
        if !still_bound || inner.state != expected {
            return Err(AppError::InvalidState(
                "session changed while the recorder was busy".to_string(),
            ));
        }
        Ok(())
    }

    /// Stop recording and release the devices
    ///
    /// When nothing is being captured the stream is released and the
    /// elapsed time reset without producing an artifact. Otherwise the
    /// recorder is finalized and the artifact returned; `terminate`
    /// suppresses the after-stop callback.
    pub async fn stop_recording(&self, terminate: bool) -> Option<RecordingArtifact> {
        let (recorder, acquired, generation) = {
            let mut inner = self.shared.inner.lock();
            inner.stop_timer();
            inner.generation += 1;
            let generation = inner.generation;

            let recorder = inner.recorder.take();
            let acquired = inner.detach_stream();
            let active = recorder.as_ref().is_some_and(|r| {
                matches!(r.state(), RecorderState::Recording | RecorderState::Paused)
            });

            if !active {
                inner.elapsed = 0;
                inner.will_stop_soon = false;
                inner.state = RecordingState::Idle;
                drop(inner);

                if let Some(acquired) = acquired {
                    acquired.release();
                }
                self.shared.preview.send_replace(None);
                tracing::debug!("{} stopped with nothing recorded", self.name());
                self.emit(SessionEvent::Stopped(None));
                return None;
            }
            (recorder?, acquired, generation)
        };

        let finalized = recorder.stop().await;

        if let Some(acquired) = acquired {
            acquired.release();
        }

        let artifact = match finalized {
            Ok(media) => Some(self.shared.urls.publish(media)),
            Err(e) => {
                tracing::error!("Failed to finalize {} recording: {}", self.name(), e);
                None
            }
        };

        {
            let mut inner = self.shared.inner.lock();
            if inner.generation != generation {
                drop(inner);
                // Reset or a new setup ran while finalizing; leave their state alone.
                if let Some(artifact) = &artifact {
                    self.shared.urls.revoke(&artifact.url);
                }
                tracing::warn!("{} session moved on while stopping, discarding its artifact", self.name());
                return artifact;
            }
            inner.will_stop_soon = false;
            inner.state = RecordingState::Idle;
            if let Some(old) = std::mem::replace(&mut inner.artifact, artifact.clone()) {
                self.shared.urls.revoke(&old.url);
            }
        }
        self.shared.preview.send_replace(None);

        if let Some(artifact) = &artifact {
            tracing::info!(
                "{} recording stopped: {:.1}s, {} bytes",
                self.name(),
                artifact.duration_secs,
                artifact.size()
            );
            if !terminate {
                if let Some(callback) = &self.shared.after_stop {
                    callback(artifact);
                }
            }
        }
        self.emit(SessionEvent::Stopped(artifact.clone()));
        artifact
    }

    /// Return the session to its initial state
    ///
    /// An active recording is stopped without invoking the after-stop
    /// callback and its artifact discarded. The permission-denied flag
    /// survives a reset.
    pub async fn reset(&self) {
        let capturing = self.shared.inner.lock().state.is_capturing();
        if capturing {
            self.stop_recording(true).await;
        }

        let (acquired, artifact) = {
            let mut inner = self.shared.inner.lock();
            inner.stop_timer();
            inner.generation += 1;
            inner.recorder = None;
            inner.state = RecordingState::Idle;
            inner.elapsed = 0;
            inner.will_stop_soon = false;
            (inner.detach_stream(), inner.artifact.take())
        };

        if let Some(acquired) = acquired {
            acquired.release();
        }
        if let Some(artifact) = artifact {
            self.shared.urls.revoke(&artifact.url);
        }
        self.shared.preview.send_replace(None);

        tracing::debug!("{} session reset", self.name());
        self.emit(SessionEvent::Reset);
    }

    // ---------------------------------------------------------------------
    // Timer
    // ---------------------------------------------------------------------

    fn start_timer(&self, inner: &mut SessionInner) {
        inner.stop_timer();
        let epoch = inner.timer_epoch;
        let weak = Arc::downgrade(&self.shared);
        inner.timer = Some(ElapsedTimer::spawn(TICK_PERIOD, move || {
            Self::on_tick(&weak, epoch)
        }));
    }

    fn on_tick(weak: &Weak<Shared>, epoch: u64) -> ControlFlow<()> {
        let Some(shared) = weak.upgrade() else {
            return ControlFlow::Break(());
        };
        let session = CaptureSession { shared };
        let config = &session.shared.config;

        let (elapsed, warn_now, limit_reached) = {
            let mut inner = session.shared.inner.lock();
            if inner.timer_epoch != epoch || inner.state != RecordingState::Recording {
                return ControlFlow::Break(());
            }
            inner.elapsed += 1;
            let warn_now = !inner.will_stop_soon && config.in_warning_window(inner.elapsed);
            if warn_now {
                inner.will_stop_soon = true;
            }
            (inner.elapsed, warn_now, config.limit_reached(inner.elapsed))
        };

        session.emit(SessionEvent::Tick(elapsed));
        if warn_now {
            tracing::info!("{} recording stops in {}s", session.name(), config.alert_time_before_stop);
            session.emit(SessionEvent::StoppingSoon);
        }

        if limit_reached {
            tracing::info!("{} recording reached its {}s limit", session.name(), elapsed);
            tokio::spawn(async move {
                session.stop_recording(false).await;
            });
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    // ---------------------------------------------------------------------
    // Display helpers and state accessors
    // ---------------------------------------------------------------------

    /// Elapsed time as `mm:ss`
    pub fn elapsed_as_clock(&self) -> String {
        format_clock(self.elapsed_seconds())
    }

    /// Remaining time once recording has begun, elapsed time otherwise
    pub fn countdown(&self) -> String {
        let elapsed = self.elapsed_seconds();
        match self.shared.config.remaining(elapsed) {
            Some(remaining) if elapsed >= 1 => format_countdown(remaining),
            _ => format_countdown(elapsed),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.shared.inner.lock();
        SessionSnapshot {
            state: inner.state,
            is_recording: inner.state == RecordingState::Recording,
            is_paused: inner.state == RecordingState::Paused,
            permission_denied: inner.permission_denied,
            elapsed_seconds: inner.elapsed,
            recorded_blob: inner.artifact.as_ref().map(|a| a.blob.clone()),
            recorded_url: inner
                .artifact
                .as_ref()
                .map(|a| a.url.clone())
                .unwrap_or_default(),
            will_stop_soon: inner.will_stop_soon,
            has_stream: inner.acquired.is_some(),
        }
    }

    pub fn state(&self) -> RecordingState {
        self.shared.inner.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    pub fn is_paused(&self) -> bool {
        self.state() == RecordingState::Paused
    }

    pub fn permission_denied(&self) -> bool {
        self.shared.inner.lock().permission_denied
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.shared.inner.lock().elapsed
    }

    pub fn will_stop_soon(&self) -> bool {
        self.shared.inner.lock().will_stop_soon
    }

    /// Last artifact, if any
    pub fn artifact(&self) -> Option<RecordingArtifact> {
        self.shared.inner.lock().artifact.clone()
    }

    /// URL of the last artifact, empty when none
    pub fn recorded_url(&self) -> String {
        self.artifact().map(|a| a.url).unwrap_or_default()
    }

    /// URL registry backing this session's artifacts
    pub fn url_registry(&self) -> &Arc<ObjectUrlRegistry> {
        &self.shared.urls
    }
}
