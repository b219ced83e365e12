use async_trait::async_trait;
use media_recorder_lib::capture::{
    CaptureError, MediaStream, PermissionName, PermissionState, PromptResponse, VirtualDevices,
};
use media_recorder_lib::recorder::{
    CameraCapture, CaptureSession, CaptureStrategy, MemoryRecorderFactory, RecordedMedia,
    RecorderError, RecorderFactory, RecorderOptions, RecorderState, RecordingArtifact,
    RecordingState, ScreenCapture, SessionConfig, SessionEvent, StreamRecorder, VoiceCapture,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

struct Harness {
    session: CaptureSession,
    devices: Arc<VirtualDevices>,
    callbacks: Arc<AtomicUsize>,
}

fn harness(strategy: impl CaptureStrategy + 'static, config: SessionConfig, devices: VirtualDevices) -> Harness {
    let devices = Arc::new(devices);
    let callbacks = Arc::new(AtomicUsize::new(0));
    let counter = callbacks.clone();
    let session = CaptureSession::builder(strategy)
        .config(config)
        .after_stop(move |_artifact: &RecordingArtifact| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build(devices.clone(), Arc::new(MemoryRecorderFactory::new()));

    Harness {
        session,
        devices,
        callbacks,
    }
}

/// Recorder whose pause and stop take a second to complete
struct SlowRecorder {
    inner: Box<dyn StreamRecorder>,
    busy: Arc<AtomicUsize>,
}

impl SlowRecorder {
    async fn settle(&self) {
        self.busy.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

#[async_trait]
impl StreamRecorder for SlowRecorder {
    async fn start(&self) -> Result<(), RecorderError> {
        self.inner.start().await
    }

    async fn pause(&self) -> Result<(), RecorderError> {
        self.settle().await;
        self.inner.pause().await
    }

    async fn resume(&self) -> Result<(), RecorderError> {
        self.inner.resume().await
    }

    async fn stop(&self) -> Result<RecordedMedia, RecorderError> {
        self.settle().await;
        self.inner.stop().await
    }

    fn state(&self) -> RecorderState {
        self.inner.state()
    }
}

#[derive(Default)]
struct SlowRecorderFactory {
    memory: MemoryRecorderFactory,
    busy: Arc<AtomicUsize>,
}

impl RecorderFactory for SlowRecorderFactory {
    fn create(&self, stream: &MediaStream, options: &RecorderOptions) -> Result<Box<dyn StreamRecorder>, RecorderError> {
        Ok(Box::new(SlowRecorder {
            inner: self.memory.create(stream, options)?,
            busy: self.busy.clone(),
        }))
    }
}

fn slow_harness(strategy: impl CaptureStrategy + 'static) -> (Harness, Arc<AtomicUsize>) {
    let devices = Arc::new(VirtualDevices::granted());
    let callbacks = Arc::new(AtomicUsize::new(0));
    let counter = callbacks.clone();
    let factory = SlowRecorderFactory::default();
    let busy = factory.busy.clone();
    let session = CaptureSession::builder(strategy)
        .after_stop(move |_artifact: &RecordingArtifact| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build(devices.clone(), Arc::new(factory));

    let harness = Harness {
        session,
        devices,
        callbacks,
    };
    (harness, busy)
}

async fn wait_until_busy(busy: &AtomicUsize, count: usize) {
    while busy.load(Ordering::SeqCst) < count {
        tokio::task::yield_now().await;
    }
}

async fn next_stop(events: &mut broadcast::Receiver<SessionEvent>) -> Option<RecordingArtifact> {
    loop {
        if let SessionEvent::Stopped(artifact) = events.recv().await.unwrap() {
            return artifact;
        }
    }
}

fn limited(max: u64, alert: u64) -> SessionConfig {
    SessionConfig::default()
        .with_max_record_length(max)
        .with_alert_time_before_stop(alert)
}

#[tokio::test(start_paused = true)]
async fn test_auto_stop_at_max_length_fires_callback_once() {
    let h = harness(CameraCapture, limited(30, 10), VirtualDevices::granted());
    let mut events = h.session.subscribe();

    assert!(h.session.setup_stream().await);
    assert!(h.session.start_recording().await);
    let started = Instant::now();

    let artifact = next_stop(&mut events).await.expect("artifact");
    let stopped_after = started.elapsed();
    assert!(stopped_after >= Duration::from_secs(30));
    assert!(stopped_after < Duration::from_secs(31));

    assert_eq!(h.callbacks.load(Ordering::SeqCst), 1);
    assert_eq!(h.session.state(), RecordingState::Idle);
    assert_eq!(h.session.elapsed_seconds(), 30);
    assert_eq!(h.session.recorded_url(), artifact.url);
    assert_eq!(h.devices.live_track_count(), 0);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.callbacks.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stopping_soon_latches_until_stop() {
    let h = harness(VoiceCapture, limited(30, 10), VirtualDevices::granted());
    let mut events = h.session.subscribe();

    assert!(h.session.start_recording().await);
    assert!(!h.session.will_stop_soon());

    tokio::time::sleep(Duration::from_millis(19_500)).await;
    assert_eq!(h.session.elapsed_seconds(), 19);
    assert!(!h.session.will_stop_soon());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.session.elapsed_seconds(), 20);
    assert!(h.session.will_stop_soon());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.session.will_stop_soon());

    next_stop(&mut events).await;
    assert!(!h.session.will_stop_soon());
}

#[tokio::test(start_paused = true)]
async fn test_alert_longer_than_limit_warns_immediately() {
    let h = harness(VoiceCapture, limited(5, 10), VirtualDevices::granted());
    assert!(h.session.start_recording().await);
    assert!(h.session.will_stop_soon());
}

#[tokio::test]
async fn test_stop_without_stream_resets_without_callback() {
    let h = harness(CameraCapture, SessionConfig::default(), VirtualDevices::granted());
    let mut events = h.session.subscribe();

    assert!(h.session.stop_recording(false).await.is_none());
    assert_eq!(h.session.elapsed_seconds(), 0);
    assert_eq!(h.callbacks.load(Ordering::SeqCst), 0);
    assert!(next_stop(&mut events).await.is_none());
}

#[tokio::test]
async fn test_stop_during_preview_releases_stream() {
    let h = harness(CameraCapture, SessionConfig::default(), VirtualDevices::granted());

    assert!(h.session.setup_stream().await);
    assert_eq!(h.session.state(), RecordingState::Streaming);
    assert!(h.session.preview().borrow().is_some());

    assert!(h.session.stop_recording(false).await.is_none());
    assert_eq!(h.session.state(), RecordingState::Idle);
    assert!(h.session.preview().borrow().is_none());
    assert_eq!(h.devices.live_track_count(), 0);
    assert_eq!(h.callbacks.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reset_during_recording_is_terminating() {
    let h = harness(CameraCapture, SessionConfig::default(), VirtualDevices::granted());

    assert!(h.session.setup_stream().await);
    assert!(h.session.start_recording().await);
    tokio::time::sleep(Duration::from_millis(5500)).await;
    assert_eq!(h.session.elapsed_seconds(), 5);

    h.session.reset().await;

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.state, RecordingState::Idle);
    assert_eq!(snapshot.elapsed_seconds, 0);
    assert!(snapshot.recorded_blob.is_none());
    assert!(snapshot.recorded_url.is_empty());
    assert!(!snapshot.has_stream);
    assert_eq!(h.callbacks.load(Ordering::SeqCst), 0);
    assert_eq!(h.devices.live_track_count(), 0);
    assert!(h.session.url_registry().is_empty());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.session.elapsed_seconds(), 0);
}

#[tokio::test]
async fn test_permission_denial_is_sticky() {
    let devices = VirtualDevices::new();
    devices.set_prompt_response(PromptResponse::Deny);
    let h = harness(VoiceCapture, SessionConfig::default(), devices);
    let mut events = h.session.subscribe();

    assert!(!h.session.has_permission().await);
    assert!(!h.session.request_permission().await);
    assert!(h.session.permission_denied());
    assert!(!h.session.request_permission().await);

    h.devices
        .set_permission(PermissionName::Microphone, PermissionState::Granted);
    assert!(h.session.has_permission().await);
    assert!(h.session.request_permission().await);
    assert!(h.session.permission_denied());

    h.session.reset().await;
    assert!(h.session.permission_denied());

    let mut denials = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::PermissionDenied) {
            denials += 1;
        }
    }
    assert_eq!(denials, 1);
    assert_eq!(h.devices.live_track_count(), 0);
}

#[tokio::test]
async fn test_failed_permission_query_reads_as_not_granted() {
    let devices = VirtualDevices::granted();
    devices.set_query_fails(true);
    let h = harness(VoiceCapture, SessionConfig::default(), devices);

    assert!(!h.session.has_permission().await);
}

#[tokio::test]
async fn test_acquisition_failure_is_soft() {
    let devices = VirtualDevices::granted();
    devices.fail_next_acquisition(CaptureError::Aborted("picker closed".into()));
    let h = harness(ScreenCapture, SessionConfig::default(), devices);

    assert!(!h.session.setup_stream().await);
    assert!(!h.session.is_recording());
    assert!(!h.session.start_recording().await);
    assert_eq!(h.session.state(), RecordingState::Idle);
}

#[tokio::test]
async fn test_start_without_setup_is_refused() {
    let h = harness(CameraCapture, SessionConfig::default(), VirtualDevices::granted());

    assert!(!h.session.start_recording().await);
    assert!(!h.session.resume_recording().await);
    assert!(!h.session.pause_recording().await);
    assert_eq!(h.session.state(), RecordingState::Idle);
}

#[tokio::test]
async fn test_voice_start_sets_up_implicitly() {
    let h = harness(VoiceCapture, SessionConfig::default(), VirtualDevices::granted());

    assert!(h.session.start_recording().await);
    assert!(h.session.is_recording());
    assert_eq!(h.devices.user_media_requests(), 1);
    assert!(h.session.preview().borrow().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_pause_keeps_elapsed_time() {
    let h = harness(VoiceCapture, SessionConfig::default(), VirtualDevices::granted());

    assert!(h.session.start_recording().await);
    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert!(h.session.pause_recording().await);
    assert!(h.session.is_paused());
    assert!(!h.session.pause_recording().await);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.session.elapsed_seconds(), 3);

    assert!(h.session.resume_recording().await);
    assert!(!h.session.resume_recording().await);
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(h.session.elapsed_seconds(), 5);

    let artifact = h.session.stop_recording(false).await.expect("artifact");
    assert!((artifact.duration_secs - 6.0).abs() < 0.01);
    assert_eq!(artifact.mime_type, "audio/wav");
    assert_eq!(h.callbacks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_screen_cannot_pause() {
    let h = harness(ScreenCapture, SessionConfig::default(), VirtualDevices::granted());

    assert!(h.session.setup_stream().await);
    assert_eq!(h.session.state(), RecordingState::Idle);
    assert!(h.session.start_recording().await);
    assert!(!h.session.pause_recording().await);
    assert!(h.session.is_recording());
}

#[tokio::test(start_paused = true)]
async fn test_platform_stop_sharing_stops_recording() {
    let h = harness(ScreenCapture, SessionConfig::default(), VirtualDevices::granted());
    let mut events = h.session.subscribe();

    assert!(h.session.setup_stream().await);
    assert!(h.session.start_recording().await);
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(h.devices.display_media_requests(), 1);
    assert_eq!(h.devices.end_display_share(), 1);
    let artifact = next_stop(&mut events).await.expect("artifact");

    assert_eq!(artifact.mime_type, "video/webm;codecs=vp9");
    assert_eq!(h.callbacks.load(Ordering::SeqCst), 1);
    assert_eq!(h.devices.live_track_count(), 0);
    assert_eq!(h.session.state(), RecordingState::Idle);
}

#[tokio::test]
async fn test_own_stop_does_not_trigger_share_watcher() {
    let h = harness(ScreenCapture, SessionConfig::default(), VirtualDevices::granted());

    assert!(h.session.setup_stream().await);
    assert!(h.session.start_recording().await);
    assert!(h.session.stop_recording(false).await.is_some());

    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.callbacks.load(Ordering::SeqCst), 1);
    assert!(!h.session.recorded_url().is_empty());
}

#[tokio::test]
async fn test_late_acquisition_after_reset_is_discarded() {
    let h = harness(CameraCapture, SessionConfig::default(), VirtualDevices::granted());
    h.devices.hold_acquisitions();

    let setup = {
        let session = h.session.clone();
        tokio::spawn(async move { session.setup_stream().await })
    };
    h.devices.wait_for_pending(1).await;

    h.session.reset().await;
    h.devices.release_acquisitions();

    assert!(!setup.await.unwrap());
    assert!(!h.session.snapshot().has_stream);
    assert_eq!(h.session.state(), RecordingState::Idle);
    assert_eq!(h.devices.issued_tracks().len(), 2);
    assert_eq!(h.devices.live_track_count(), 0);
}

#[tokio::test]
async fn test_new_setup_releases_previous_stream() {
    let h = harness(CameraCapture, SessionConfig::default(), VirtualDevices::granted());

    assert!(h.session.setup_stream().await);
    assert!(h.session.setup_stream().await);
    assert_eq!(h.devices.issued_tracks().len(), 4);
    assert_eq!(h.devices.live_track_count(), 2);
}

#[tokio::test]
async fn test_setup_refused_while_recording() {
    let h = harness(CameraCapture, SessionConfig::default(), VirtualDevices::granted());

    assert!(h.session.setup_stream().await);
    assert!(h.session.start_recording().await);
    assert!(!h.session.setup_stream().await);
    assert!(h.session.is_recording());
    assert_eq!(h.devices.live_track_count(), 2);
}

#[tokio::test]
async fn test_new_recording_supersedes_previous_artifact() {
    let h = harness(VoiceCapture, SessionConfig::default(), VirtualDevices::granted());
    let urls = h.session.url_registry().clone();

    assert!(h.session.start_recording().await);
    let first = h.session.stop_recording(false).await.expect("artifact");
    assert!(urls.resolve(&first.url).is_some());
    assert_eq!(h.session.snapshot().recorded_url, first.url);

    assert!(h.session.start_recording().await);
    assert!(urls.resolve(&first.url).is_none());
    assert!(h.session.snapshot().recorded_url.is_empty());
    assert!(h.session.snapshot().recorded_blob.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_countdown_and_clock() {
    let h = harness(VoiceCapture, limited(30, 10), VirtualDevices::granted());
    assert_eq!(h.session.countdown(), "00:00");

    assert!(h.session.start_recording().await);
    tokio::time::sleep(Duration::from_millis(5500)).await;
    assert_eq!(h.session.elapsed_as_clock(), "00:05");
    assert_eq!(h.session.countdown(), "00:25");

    let unlimited = harness(VoiceCapture, SessionConfig::default(), VirtualDevices::granted());
    assert!(unlimited.session.start_recording().await);
    tokio::time::sleep(Duration::from_secs(65)).await;
    assert_eq!(unlimited.session.countdown(), unlimited.session.elapsed_as_clock());
}

#[tokio::test]
async fn test_dropping_session_releases_devices() {
    let h = harness(CameraCapture, SessionConfig::default(), VirtualDevices::granted());
    assert!(h.session.setup_stream().await);
    assert_eq!(h.devices.live_track_count(), 2);

    let devices = h.devices.clone();
    drop(h);
    assert_eq!(devices.live_track_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reset_wins_over_stop_still_finalizing() {
    let (h, busy) = slow_harness(VoiceCapture);

    assert!(h.session.start_recording().await);
    tokio::time::sleep(Duration::from_secs(2)).await;

    let stop = {
        let session = h.session.clone();
        tokio::spawn(async move { session.stop_recording(false).await })
    };
    wait_until_busy(&busy, 1).await;

    h.session.reset().await;
    assert!(h.session.recorded_url().is_empty());

    let artifact = stop.await.unwrap().expect("artifact for the caller");
    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.state, RecordingState::Idle);
    assert!(snapshot.recorded_url.is_empty());
    assert!(snapshot.recorded_blob.is_none());
    assert_eq!(h.callbacks.load(Ordering::SeqCst), 0);
    assert!(h.session.url_registry().resolve(&artifact.url).is_none());
    assert!(h.session.url_registry().is_empty());
    assert_eq!(h.devices.live_track_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pause_does_not_outlive_stop() {
    let (h, busy) = slow_harness(VoiceCapture);

    assert!(h.session.start_recording().await);
    let pause = {
        let session = h.session.clone();
        tokio::spawn(async move { session.pause_recording().await })
    };
    wait_until_busy(&busy, 1).await;

    let artifact = h.session.stop_recording(false).await;
    assert!(artifact.is_some());
    assert!(!pause.await.unwrap());

    assert_eq!(h.session.state(), RecordingState::Idle);
    assert!(!h.session.is_paused());
    assert_eq!(h.callbacks.load(Ordering::SeqCst), 1);
}
