use crate::audio::AudioFormat;
use crate::error::Alert;
use crate::services::{CaptureService, PermissionService, PlaybackService, RecordingStorage};
use crate::session::{Action, Controls, Effect, Phase, Session};
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::sync::oneshot;

/// What the user sees after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub controls: Controls,
    /// Size of the recording, present whenever Play is offered
    pub file_size: Option<u64>,
}

/// Drives a `Session` against the host services
pub struct SessionController {
    session: Session,
    format: AudioFormat,
    capture: Box<dyn CaptureService>,
    playback: Box<dyn PlaybackService>,
    permission: Box<dyn PermissionService>,
    storage: Box<dyn RecordingStorage>,
    pending_permission: Option<oneshot::Receiver<bool>>,
}

impl SessionController {
    pub fn new(
        slot: PathBuf,
        format: AudioFormat,
        capture: Box<dyn CaptureService>,
        playback: Box<dyn PlaybackService>,
        permission: Box<dyn PermissionService>,
        storage: Box<dyn RecordingStorage>,
    ) -> Self {
        Self {
            session: Session::new(slot),
            format,
            capture,
            playback,
            permission,
            storage,
            pending_permission: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn awaiting_permission(&self) -> bool {
        self.pending_permission.is_some()
    }

    pub fn view(&self) -> View {
        let controls = self.session.controls();
        let file_size = self
            .session
            .recording()
            .filter(|_| controls.play)
            .map(|recording| self.storage.byte_len(&recording.path));

        View {
            controls,
            file_size,
        }
    }

    /// Wait for the outstanding permission request; never resolves if none is open
    ///
    /// Cancel safe: the request stays outstanding if this future is dropped.
    pub async fn permission_response(&mut self) -> bool {
        match self.pending_permission.as_mut() {
            // A dropped sender counts as a denial
            Some(rx) => rx.await.unwrap_or(false),
            None => std::future::pending().await,
        }
    }

    pub async fn resolve_permission(&mut self, granted: bool) -> Vec<Alert> {
        self.pending_permission = None;
        self.handle(Action::PermissionResolved(granted)).await
    }

    /// Apply an action and every follow-up its effects produce
    pub async fn handle(&mut self, action: Action) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let mut queue = VecDeque::from([action]);

        while let Some(action) = queue.pop_front() {
            tracing::debug!("Session {:?} <- {:?}", self.session.phase(), action);

            let (session, effects) = self.session.clone().transition(action);
            self.session = session;

            for effect in effects {
                if let Some(follow_up) = self.execute(effect, &mut alerts).await {
                    // An outcome supersedes the rest of the batch
                    queue.push_back(follow_up);
                    break;
                }
            }
        }

        alerts
    }

    async fn execute(&mut self, effect: Effect, alerts: &mut Vec<Alert>) -> Option<Action> {
        match effect {
            Effect::ActivateSession => match self.capture.activate().await {
                Ok(()) => None,
                Err(e) => Some(Action::StartFailed(e.into())),
            },

            Effect::RequestPermission => {
                self.pending_permission = Some(self.permission.request());
                None
            }

            Effect::StartCapture(path) => match self.capture.start(&path, self.format).await {
                Ok(()) => Some(Action::CaptureStarted),
                Err(e) => Some(Action::StartFailed(e.into())),
            },

            Effect::StopCapture => match self.capture.stop().await {
                Ok(()) => Some(Action::CaptureStopped),
                Err(e) => Some(Action::StopFailed(e.into())),
            },

            Effect::StartPlayback(path) => {
                if let Err(e) = self.playback.play(&path).await {
                    tracing::warn!("Playback failed: {:#}", e);
                }
                None
            }

            Effect::DeleteRecording(path) => match self.storage.remove(&path) {
                Ok(()) => Some(Action::RecordingDeleted),
                Err(e) => Some(Action::DeleteFailed(e.into())),
            },

            Effect::ShowAlert(alert) => {
                tracing::warn!("{}: {}", alert.title, alert.message);
                alerts.push(alert);
                None
            }
        }
    }

    /// Finish an in-progress capture so the file on disk is complete
    pub async fn shutdown(&mut self) {
        if self.capture.is_active() {
            tracing::info!("Stopping active recording before exit");
            if let Err(e) = self.capture.stop().await {
                tracing::error!("Failed to stop recording: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecorderError;
    use crate::services::FileSlot;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// Writes the next entry of `takes` as the byte length of each recording
    #[derive(Default)]
    struct FakeCapture {
        no_device: Arc<AtomicBool>,
        fail_start: bool,
        fail_stop: bool,
        takes: VecDeque<usize>,
        path: Option<PathBuf>,
    }

    #[async_trait]
    impl CaptureService for FakeCapture {
        async fn activate(&mut self) -> Result<(), RecorderError> {
            if self.no_device.load(Ordering::Relaxed) {
                return Err(RecorderError::InputDeviceUnavailable);
            }
            Ok(())
        }

        async fn start(&mut self, path: &Path, _format: AudioFormat) -> Result<(), RecorderError> {
            if self.fail_start {
                return Err(RecorderError::capture_start(anyhow::anyhow!("device busy")));
            }
            std::fs::File::create(path).unwrap();
            self.path = Some(path.to_path_buf());
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), RecorderError> {
            let path = self.path.take().unwrap();
            let len = self.takes.pop_front().unwrap_or(0);
            std::fs::write(path, vec![1u8; len]).unwrap();
            if self.fail_stop {
                return Err(RecorderError::capture_stop(anyhow::anyhow!("disk full")));
            }
            Ok(())
        }

        fn is_active(&self) -> bool {
            self.path.is_some()
        }
    }

    #[derive(Default)]
    struct FakePlayback {
        played: Arc<Mutex<Vec<PathBuf>>>,
    }

    #[async_trait]
    impl PlaybackService for FakePlayback {
        async fn play(&mut self, path: &Path) -> Result<()> {
            self.played.lock().unwrap().push(path.to_path_buf());
            if !path.exists() {
                anyhow::bail!("missing");
            }
            Ok(())
        }
    }

    /// Answers every request with a fixed value, or leaves it open
    struct FakePermission {
        answer: Option<bool>,
        pending: Vec<oneshot::Sender<bool>>,
        requests: Arc<Mutex<usize>>,
    }

    impl PermissionService for FakePermission {
        fn request(&mut self) -> oneshot::Receiver<bool> {
            *self.requests.lock().unwrap() += 1;
            let (tx, rx) = oneshot::channel();
            match self.answer {
                Some(answer) => tx.send(answer).unwrap(),
                None => self.pending.push(tx),
            }
            rx
        }
    }

    /// A slot whose directory refuses deletes
    struct ReadOnlySlot;

    impl RecordingStorage for ReadOnlySlot {
        fn byte_len(&self, path: &Path) -> u64 {
            FileSlot.byte_len(path)
        }

        fn remove(&self, path: &Path) -> Result<(), RecorderError> {
            Err(RecorderError::Delete {
                path: path.to_path_buf(),
                source: std::io::ErrorKind::PermissionDenied.into(),
            })
        }
    }

    struct Harness {
        controller: SessionController,
        slot: PathBuf,
        played: Arc<Mutex<Vec<PathBuf>>>,
        requests: Arc<Mutex<usize>>,
        _dir: tempfile::TempDir,
    }

    fn harness(capture: FakeCapture, answer: Option<bool>) -> Harness {
        harness_with_storage(capture, answer, Box::new(FileSlot))
    }

    fn harness_with_storage(
        capture: FakeCapture,
        answer: Option<bool>,
        storage: Box<dyn RecordingStorage>,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let slot = dir.path().join("slot.wav");
        let playback = FakePlayback::default();
        let played = playback.played.clone();
        let requests = Arc::new(Mutex::new(0));
        let permission = FakePermission {
            answer,
            pending: Vec::new(),
            requests: requests.clone(),
        };

        let controller = SessionController::new(
            slot.clone(),
            AudioFormat::default(),
            Box::new(capture),
            Box::new(playback),
            Box::new(permission),
            storage,
        );

        Harness {
            controller,
            slot,
            played,
            requests,
            _dir: dir,
        }
    }

    impl Harness {
        /// Press record and answer the permission prompt if one is raised
        async fn record(&mut self) -> Vec<Alert> {
            let mut alerts = self.controller.handle(Action::Record).await;
            if self.controller.awaiting_permission() {
                let granted = self.controller.permission_response().await;
                alerts.extend(self.controller.resolve_permission(granted).await);
            }
            alerts
        }

        async fn record_take(&mut self) {
            assert!(self.record().await.is_empty());
            assert!(self.controller.handle(Action::Stop).await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_record_stop_reports_written_size() {
        let mut h = harness(
            FakeCapture {
                takes: VecDeque::from([4096]),
                ..Default::default()
            },
            Some(true),
        );

        assert!(h.record().await.is_empty());
        assert_eq!(h.controller.phase(), Phase::Recording);
        assert_eq!(h.controller.view().file_size, None);
        assert!(h.controller.view().controls.stop);

        assert!(h.controller.handle(Action::Stop).await.is_empty());
        let view = h.controller.view();
        assert!(view.controls.play && view.controls.clear && view.controls.record);
        assert_eq!(view.file_size, Some(4096));
        assert_eq!(std::fs::metadata(&h.slot).unwrap().len(), 4096);
    }

    #[tokio::test]
    async fn test_second_recording_replaces_first() {
        let mut h = harness(
            FakeCapture {
                takes: VecDeque::from([9000, 2500]),
                ..Default::default()
            },
            Some(true),
        );

        h.record().await;
        h.controller.handle(Action::Stop).await;
        assert_eq!(h.controller.view().file_size, Some(9000));

        h.record().await;
        h.controller.handle(Action::Stop).await;

        let files: Vec<_> = std::fs::read_dir(h.slot.parent().unwrap()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(h.controller.view().file_size, Some(2500));
        // Permission is only asked for once per run
        assert_eq!(*h.requests.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_denied_permission_is_silent() {
        let mut h = harness(FakeCapture::default(), Some(false));
        let before = h.controller.view();

        assert!(h.record().await.is_empty());
        assert_eq!(h.controller.phase(), Phase::Idle);
        assert_eq!(h.controller.view(), before);
        assert!(!h.slot.exists());
    }

    #[tokio::test]
    async fn test_start_failure_shows_one_alert() {
        let mut h = harness(
            FakeCapture {
                fail_start: true,
                ..Default::default()
            },
            Some(true),
        );
        let before = h.controller.view();

        let alerts = h.record().await;

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "The recording could not be started");
        assert_eq!(h.controller.view(), before);
        assert_eq!(h.controller.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_missing_device_skips_permission_prompt() {
        let mut h = harness(
            FakeCapture {
                no_device: Arc::new(AtomicBool::new(true)),
                ..Default::default()
            },
            None,
        );

        let alerts = h.record().await;

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "No microphone is available");
        assert!(!h.controller.awaiting_permission());
        assert_eq!(*h.requests.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_record_while_prompt_open_is_ignored() {
        let mut h = harness(FakeCapture::default(), None);

        h.controller.handle(Action::Record).await;
        h.controller.handle(Action::Record).await;

        assert!(h.controller.awaiting_permission());
        assert_eq!(h.controller.phase(), Phase::AwaitingPermission);
        assert_eq!(*h.requests.lock().unwrap(), 1);

        h.controller.resolve_permission(true).await;
        assert_eq!(h.controller.phase(), Phase::Recording);
        assert!(!h.controller.awaiting_permission());
    }

    #[tokio::test]
    async fn test_clear_removes_file_and_hides_controls() {
        let mut h = harness(
            FakeCapture {
                takes: VecDeque::from([10]),
                ..Default::default()
            },
            Some(true),
        );
        h.record().await;
        h.controller.handle(Action::Stop).await;

        assert!(h.controller.handle(Action::Clear).await.is_empty());

        let view = h.controller.view();
        assert!(!view.controls.play && !view.controls.clear);
        assert_eq!(view.file_size, None);
        assert!(!h.slot.exists());
    }

    #[tokio::test]
    async fn test_clear_without_recording_is_noop() {
        let mut h = harness(FakeCapture::default(), Some(true));
        let before = h.controller.view();

        assert!(h.controller.handle(Action::Clear).await.is_empty());
        assert_eq!(h.controller.view(), before);
    }

    #[tokio::test]
    async fn test_playback_failure_is_silent() {
        let mut h = harness(
            FakeCapture {
                takes: VecDeque::from([10]),
                ..Default::default()
            },
            Some(true),
        );
        h.record().await;
        h.controller.handle(Action::Stop).await;
        std::fs::remove_file(&h.slot).unwrap();

        let alerts = h.controller.handle(Action::Play).await;

        assert!(alerts.is_empty());
        assert_eq!(h.played.lock().unwrap().as_slice(), [h.slot.clone()]);
        // The slot is still the source of truth for what is offered
        assert_eq!(h.controller.view().file_size, Some(0));
    }

    #[tokio::test]
    async fn test_shutdown_stops_active_capture() {
        let mut h = harness(
            FakeCapture {
                takes: VecDeque::from([64]),
                ..Default::default()
            },
            Some(true),
        );
        h.record().await;

        h.controller.shutdown().await;

        assert_eq!(std::fs::metadata(&h.slot).unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_unplugged_microphone_after_grant_alerts() {
        let no_device = Arc::new(AtomicBool::new(false));
        let mut h = harness(
            FakeCapture {
                no_device: no_device.clone(),
                takes: VecDeque::from([300]),
                ..Default::default()
            },
            Some(true),
        );
        h.record_take().await;
        let before = h.controller.view();

        no_device.store(true, Ordering::Relaxed);
        let alerts = h.record().await;

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "No microphone is available");
        assert_eq!(h.controller.phase(), Phase::Idle);
        assert_eq!(h.controller.view(), before);
        assert_eq!(std::fs::metadata(&h.slot).unwrap().len(), 300);
    }

    #[tokio::test]
    async fn test_stop_failure_alerts_and_keeps_partial_file() {
        let mut h = harness(
            FakeCapture {
                fail_stop: true,
                takes: VecDeque::from([700]),
                ..Default::default()
            },
            Some(true),
        );
        assert!(h.record().await.is_empty());

        let alerts = h.controller.handle(Action::Stop).await;

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "The recording could not be saved");
        assert!(alerts[0].message.contains("disk full"));
        assert_eq!(h.controller.phase(), Phase::Idle);
        let view = h.controller.view();
        assert!(view.controls.record && view.controls.play && view.controls.clear);
        assert!(!view.controls.stop);
        assert_eq!(view.file_size, Some(700));
    }

    #[tokio::test]
    async fn test_delete_failure_alerts_and_keeps_recording() {
        let mut h = harness_with_storage(
            FakeCapture {
                takes: VecDeque::from([512]),
                ..Default::default()
            },
            Some(true),
            Box::new(ReadOnlySlot),
        );
        h.record_take().await;
        let before = h.controller.view();

        let alerts = h.controller.handle(Action::Clear).await;

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "The recording could not be deleted");
        assert_eq!(h.controller.view(), before);
        assert_eq!(before.file_size, Some(512));
        assert!(h.slot.exists());
    }

    #[tokio::test]
    async fn test_clear_after_external_delete_alerts() {
        let mut h = harness(
            FakeCapture {
                takes: VecDeque::from([10]),
                ..Default::default()
            },
            Some(true),
        );
        h.record_take().await;
        std::fs::remove_file(&h.slot).unwrap();

        let alerts = h.controller.handle(Action::Clear).await;

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "The recording could not be deleted");
        let view = h.controller.view();
        assert!(view.controls.play && view.controls.clear);
        assert_eq!(view.file_size, Some(0));
    }
}
