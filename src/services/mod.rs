pub mod permission;
pub mod player;
pub mod recorder;
pub mod storage;

pub use permission::{ConsentGate, ConsentResponder, MicrophoneAccess};
pub use player::RodioPlayer;
pub use recorder::{Recorder, RecorderHandle};
pub use storage::FileSlot;

use crate::audio::AudioFormat;
use crate::error::RecorderError;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::oneshot;

/// Records audio into a file
#[async_trait]
pub trait CaptureService: Send {
    /// Make sure an input is available; runs before every recording
    async fn activate(&mut self) -> Result<(), RecorderError>;

    /// Truncate `path` and start writing captured audio to it
    async fn start(&mut self, path: &Path, format: AudioFormat) -> Result<(), RecorderError>;

    /// Stop capturing and flush the file
    async fn stop(&mut self) -> Result<(), RecorderError>;

    fn is_active(&self) -> bool;
}

/// Plays a recording in the background
#[async_trait]
pub trait PlaybackService: Send {
    /// Returns once playback has started or failed to start
    async fn play(&mut self, path: &Path) -> Result<()>;
}

/// Asks the user for microphone access
pub trait PermissionService: Send {
    /// The receiver resolves once the user has answered
    fn request(&mut self) -> oneshot::Receiver<bool>;
}

/// The file system view of the recording slot
pub trait RecordingStorage: Send {
    /// Byte length of the file, zero if it does not exist
    fn byte_len(&self, path: &Path) -> u64;

    fn remove(&self, path: &Path) -> Result<(), RecorderError>;
}
