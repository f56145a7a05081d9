use crate::error::Alert;
use std::path::PathBuf;

/// Where the session is in the record lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingPermission,
    Starting,
    Recording,
    Stopping,
}

/// The recording currently held in the slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub path: PathBuf,
}

/// Inputs to the state machine: user presses and service outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Record,
    Stop,
    Play,
    Clear,
    PermissionResolved(bool),
    CaptureStarted,
    StartFailed(Alert),
    CaptureStopped,
    StopFailed(Alert),
    RecordingDeleted,
    DeleteFailed(Alert),
}

/// Side effects requested by a transition, executed by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ActivateSession,
    RequestPermission,
    StartCapture(PathBuf),
    StopCapture,
    StartPlayback(PathBuf),
    DeleteRecording(PathBuf),
    ShowAlert(Alert),
}

/// Which of the four buttons are offered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub record: bool,
    pub stop: bool,
    pub play: bool,
    pub clear: bool,
}

/// Recorder session state
///
/// Transitions are pure: `transition` consumes the session and returns the
/// next one together with the effects the caller must carry out. Outcomes of
/// those effects come back in as further actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    slot: PathBuf,
    phase: Phase,
    permission_granted: bool,
    recording: Option<Recording>,
}

impl Session {
    pub fn new(slot: impl Into<PathBuf>) -> Self {
        Self {
            slot: slot.into(),
            phase: Phase::Idle,
            permission_granted: false,
            recording: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn recording(&self) -> Option<&Recording> {
        self.recording.as_ref()
    }

    /// True while the capture service owns the slot
    pub fn is_capturing(&self) -> bool {
        matches!(
            self.phase,
            Phase::Starting | Phase::Recording | Phase::Stopping
        )
    }

    pub fn controls(&self) -> Controls {
        let capturing = self.is_capturing();
        let has_recording = self.recording.is_some();

        Controls {
            record: !capturing,
            stop: capturing,
            play: has_recording && !capturing,
            clear: has_recording && !capturing,
        }
    }

    pub fn transition(mut self, action: Action) -> (Self, Vec<Effect>) {
        let mut effects = Vec::new();

        match (self.phase, action) {
            (Phase::Idle, Action::Record) => {
                effects.push(Effect::ActivateSession);
                if self.permission_granted {
                    self.phase = Phase::Starting;
                    effects.push(Effect::StartCapture(self.slot.clone()));
                } else {
                    self.phase = Phase::AwaitingPermission;
                    effects.push(Effect::RequestPermission);
                }
            }

            (Phase::AwaitingPermission, Action::Record) => {
                tracing::debug!("Permission request outstanding, ignoring record");
            }

            (Phase::AwaitingPermission, Action::PermissionResolved(true)) => {
                self.permission_granted = true;
                self.phase = Phase::Starting;
                effects.push(Effect::StartCapture(self.slot.clone()));
            }

            (Phase::AwaitingPermission, Action::PermissionResolved(false)) => {
                tracing::info!("Microphone permission denied");
                self.phase = Phase::Idle;
            }

            (Phase::Starting, Action::CaptureStarted) => {
                // Starting a capture truncated the slot
                self.recording = None;
                self.phase = Phase::Recording;
            }

            (Phase::AwaitingPermission | Phase::Starting, Action::StartFailed(alert)) => {
                self.phase = Phase::Idle;
                effects.push(Effect::ShowAlert(alert));
            }

            (Phase::Recording, Action::Stop) => {
                self.phase = Phase::Stopping;
                effects.push(Effect::StopCapture);
            }

            (Phase::Stopping, Action::CaptureStopped) => {
                self.phase = Phase::Idle;
                self.recording = Some(Recording {
                    path: self.slot.clone(),
                });
            }

            (Phase::Stopping, Action::StopFailed(alert)) => {
                // Whatever was flushed before the failure is still on disk
                self.phase = Phase::Idle;
                self.recording = Some(Recording {
                    path: self.slot.clone(),
                });
                effects.push(Effect::ShowAlert(alert));
            }

            (Phase::Idle | Phase::AwaitingPermission, Action::Play) => match &self.recording {
                Some(recording) => effects.push(Effect::StartPlayback(recording.path.clone())),
                None => tracing::debug!("Nothing to play"),
            },

            (Phase::Idle | Phase::AwaitingPermission, Action::Clear) => match &self.recording {
                Some(recording) => effects.push(Effect::DeleteRecording(recording.path.clone())),
                None => tracing::debug!("Nothing to clear"),
            },

            (_, Action::RecordingDeleted) => {
                self.recording = None;
            }

            (_, Action::DeleteFailed(alert)) => {
                effects.push(Effect::ShowAlert(alert));
            }

            (phase, action) => {
                tracing::debug!("Ignoring {:?} in phase {:?}", action, phase);
            }
        }

        (self, effects)
    }
}
