use std::path::PathBuf;
use thiserror::Error;

/// Failures the user is told about
///
/// The `Display` text is the short description shown as an alert title;
/// `recovery_suggestion` is the body.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("No microphone is available")]
    InputDeviceUnavailable,

    #[error("The recording could not be started")]
    CaptureStart { reason: String },

    #[error("The recording could not be saved")]
    CaptureStop { reason: String },

    #[error("The recorder is not running")]
    RecorderUnavailable,

    #[error("The recording could not be deleted")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RecorderError {
    pub fn capture_start(err: anyhow::Error) -> Self {
        Self::CaptureStart {
            reason: format!("{:#}", err),
        }
    }

    pub fn capture_stop(err: anyhow::Error) -> Self {
        Self::CaptureStop {
            reason: format!("{:#}", err),
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::InputDeviceUnavailable => {
                "Connect a microphone or select a default input device, then try again.".to_string()
            }
            Self::CaptureStart { reason } => format!(
                "Make sure no other application is holding the microphone and try again ({}).",
                reason
            ),
            Self::CaptureStop { reason } => format!(
                "The file may be incomplete. Record again to replace it ({}).",
                reason
            ),
            Self::RecorderUnavailable => "Restart voice-memo and try again.".to_string(),
            Self::Delete { path, source } => format!(
                "Check that {} is writable and try again ({}).",
                path.parent().unwrap_or(path).display(),
                source
            ),
        }
    }
}

/// A user-facing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl From<&RecorderError> for Alert {
    fn from(err: &RecorderError) -> Self {
        Self {
            title: err.to_string(),
            message: err.recovery_suggestion(),
        }
    }
}

impl From<RecorderError> for Alert {
    fn from(err: RecorderError) -> Self {
        Self::from(&err)
    }
}
