use super::RecordingStorage;
use crate::error::RecorderError;
use std::path::Path;

/// The recording slot on the local file system
#[derive(Debug, Default)]
pub struct FileSlot;

impl RecordingStorage for FileSlot {
    fn byte_len(&self, path: &Path) -> u64 {
        std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
    }

    fn remove(&self, path: &Path) -> Result<(), RecorderError> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::info!("Deleted {}", path.display());
                Ok(())
            }
            Err(source) => Err(RecorderError::Delete {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
