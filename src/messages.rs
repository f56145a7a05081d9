use crate::audio::AudioFormat;
use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::oneshot;

/// Commands for the Recorder service
pub enum RecorderCommand {
    Start {
        path: PathBuf,
        format: AudioFormat,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop(oneshot::Sender<Result<()>>),
}

/// Commands typed by the user
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Record,
    Stop,
    Play,
    Clear,
    Status,
    Allow,
    Deny,
    Help,
    Quit,
}
