//! Sound library backed by a directory of clips

use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

use super::{AlarmAudio, AudioBackend};
use crate::error::AudioError;

/// File extensions recognised as clips, in lookup order
const CLIP_EXTENSIONS: [&str; 3] = ["mp3", "wav", "ogg"];

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Resolves sound ids to clip files
///
/// With no directory configured the library is headless: any id is accepted
/// and the connected client is expected to own the actual asset.
#[derive(Debug, Clone, Default)]
pub struct SoundLibrary {
    dir: Option<PathBuf>,
}

impl SoundLibrary {
    /// Create a library rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Create a library that accepts every sound id
    pub fn headless() -> Self {
        Self { dir: None }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Find the clip file for a sound id
    pub fn resolve(&self, sound: &str) -> Result<Option<PathBuf>, AudioError> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };

        // Ids are bare names, never paths
        if sound.is_empty() || sound.contains(['/', '\\']) || sound.starts_with('.') {
            return Err(AudioError::NotFound {
                sound: sound.to_string(),
            });
        }

        CLIP_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", sound, ext)))
            .find(|path| path.is_file())
            .map(Some)
            .ok_or_else(|| AudioError::NotFound {
                sound: sound.to_string(),
            })
    }

    /// List the sound ids available in the library directory, sorted
    pub fn available(&self) -> Vec<String> {
        let Some(dir) = &self.dir else {
            return Vec::new();
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read sound directory {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut sounds: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| CLIP_EXTENSIONS.contains(&ext))
            })
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        sounds.sort();
        sounds.dedup();
        sounds
    }
}

impl AudioBackend for SoundLibrary {
    fn open(&self, sound: &str) -> Result<Box<dyn AlarmAudio>, AudioError> {
        let source = self.resolve(sound)?;
        let handle = ClipHandle::new(sound, source);
        debug!("Opened audio handle {} for sound '{}'", handle.id, sound);
        Ok(Box::new(handle))
    }
}

/// Playback cursor for one clip
#[derive(Debug)]
pub struct ClipHandle {
    id: u64,
    sound: String,
    source: Option<PathBuf>,
    started_at: Option<Instant>,
    offset: Duration,
}

impl ClipHandle {
    fn new(sound: &str, source: Option<PathBuf>) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            sound: sound.to_string(),
            source,
            started_at: None,
            offset: Duration::ZERO,
        }
    }

    /// Clip file backing this handle, if the library has a directory
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// How far into the clip playback has advanced
    pub fn position(&self) -> Duration {
        match self.started_at {
            Some(started) => self.offset + started.elapsed(),
            None => self.offset,
        }
    }
}

impl AlarmAudio for ClipHandle {
    fn id(&self) -> u64 {
        self.id
    }

    fn sound(&self) -> &str {
        &self.sound
    }

    fn play(&mut self) -> Result<(), AudioError> {
        if let Some(path) = self.source() {
            if !path.is_file() {
                return Err(AudioError::Device(format!(
                    "clip {} is no longer readable",
                    path.display()
                )));
            }
        }
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
            match self.source() {
                Some(path) => info!(
                    "Alarm '{}' playing from {} (handle {})",
                    self.sound,
                    path.display(),
                    self.id
                ),
                None => info!("Alarm '{}' playing headless (handle {})", self.sound, self.id),
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(started) = self.started_at.take() {
            self.offset += started.elapsed();
            debug!("Alarm '{}' stopped (handle {})", self.sound, self.id);
        }
        Ok(())
    }

    fn rewind(&mut self) -> Result<(), AudioError> {
        self.offset = Duration::ZERO;
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.started_at.is_some()
    }
}

impl Drop for ClipHandle {
    fn drop(&mut self) {
        if self.started_at.is_some() {
            debug!("Releasing playing alarm '{}' (handle {})", self.sound, self.id);
        }
    }
}
