//! Alert-sound resources
//!
//! Every timer owns exactly one `AlarmAudio` handle for its whole life.
//! Handles are opened through an `AudioBackend`, which in production is the
//! `SoundLibrary`.

pub mod library;

use std::fmt;

pub use library::{ClipHandle, SoundLibrary};

use crate::error::AudioError;

/// Sound every timer is bound to when the pool is created
pub const DEFAULT_SOUND: &str = "alarm";

/// A playable alert clip owned by a single timer
pub trait AlarmAudio: Send + fmt::Debug {
    /// Unique id of this handle, distinct for every opened resource
    fn id(&self) -> u64;

    /// Sound id the handle was opened for
    fn sound(&self) -> &str;

    fn play(&mut self) -> Result<(), AudioError>;

    fn stop(&mut self) -> Result<(), AudioError>;

    /// Move the playback position back to the start of the clip
    fn rewind(&mut self) -> Result<(), AudioError>;

    fn is_playing(&self) -> bool;
}

/// Opens alert clips by sound id
pub trait AudioBackend: Send + Sync {
    fn open(&self, sound: &str) -> Result<Box<dyn AlarmAudio>, AudioError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory backend that can be told to fail

    use std::sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    };

    use super::{AlarmAudio, AudioBackend};
    use crate::error::AudioError;

    #[derive(Debug, Default)]
    pub struct Recorder {
        pub opened: Mutex<Vec<(u64, String)>>,
        pub released: Mutex<Vec<u64>>,
        pub fail_playback: AtomicBool,
    }

    #[derive(Debug)]
    pub struct MockClip {
        id: u64,
        sound: String,
        playing: bool,
        position: u64,
        recorder: Arc<Recorder>,
    }

    impl AlarmAudio for MockClip {
        fn id(&self) -> u64 {
            self.id
        }

        fn sound(&self) -> &str {
            &self.sound
        }

        fn play(&mut self) -> Result<(), AudioError> {
            if self.recorder.fail_playback.load(Ordering::SeqCst) {
                return Err(AudioError::Device("no output device".to_string()));
            }
            self.playing = true;
            Ok(())
        }

        fn stop(&mut self) -> Result<(), AudioError> {
            if self.recorder.fail_playback.load(Ordering::SeqCst) {
                return Err(AudioError::Device("no output device".to_string()));
            }
            self.playing = false;
            Ok(())
        }

        fn rewind(&mut self) -> Result<(), AudioError> {
            self.position = 0;
            Ok(())
        }

        fn is_playing(&self) -> bool {
            self.playing
        }
    }

    impl Drop for MockClip {
        fn drop(&mut self) {
            if let Ok(mut released) = self.recorder.released.lock() {
                released.push(self.id);
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct MockBackend {
        next_id: AtomicU64,
        pub recorder: Arc<Recorder>,
        pub missing: Mutex<Vec<String>>,
    }

    impl MockBackend {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn mark_missing(&self, sound: &str) {
            self.missing.lock().unwrap().push(sound.to_string());
        }
    }

    impl AudioBackend for MockBackend {
        fn open(&self, sound: &str) -> Result<Box<dyn AlarmAudio>, AudioError> {
            if self.missing.lock().unwrap().iter().any(|s| s == sound) {
                return Err(AudioError::NotFound {
                    sound: sound.to_string(),
                });
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.recorder
                .opened
                .lock()
                .unwrap()
                .push((id, sound.to_string()));
            Ok(Box::new(MockClip {
                id,
                sound: sound.to_string(),
                playing: false,
                position: 0,
                recorder: Arc::clone(&self.recorder),
            }))
        }
    }
}
