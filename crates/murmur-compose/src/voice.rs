use std::future::Future;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use murmur_types::models::Attachment;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::ComposeError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MicrophoneError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("microphone unavailable: {0}")]
    Unavailable(String),
}

/// Platform access to an audio input device.
pub trait Microphone: Send + Sync {
    /// Ask for an input stream. Resolves once the user has granted or
    /// refused access.
    fn open(&self) -> impl Future<Output = Result<AudioStream, MicrophoneError>> + Send;
}

/// A live microphone stream. Encoded audio arrives on `chunks` and is
/// buffered there until the recording stops. The release hook runs exactly
/// once, on `release` or on drop.
pub struct AudioStream {
    mime_type: String,
    chunks: mpsc::UnboundedReceiver<Bytes>,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl AudioStream {
    pub fn new(
        mime_type: impl Into<String>,
        chunks: mpsc::UnboundedReceiver<Bytes>,
        on_release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            mime_type: mime_type.into(),
            chunks,
            on_release: Some(Box::new(on_release)),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Concatenate every chunk received so far.
    fn drain(&mut self) -> Bytes {
        let mut buf = BytesMut::new();
        while let Ok(chunk) = self.chunks.try_recv() {
            buf.extend_from_slice(&chunk);
        }
        buf.freeze()
    }

    fn release(&mut self) {
        self.chunks.close();
        if let Some(release) = self.on_release.take() {
            release();
        }
    }
}

impl Drop for AudioStream {
    fn drop(&mut self) {
        self.release();
    }
}

enum VoiceState {
    Idle,
    Recording { started_at: Instant, stream: AudioStream },
}

/// `Idle -> Recording -> Idle` wrapper turning a microphone session into a
/// voice attachment.
pub struct VoiceCapture<M> {
    microphone: M,
    state: VoiceState,
}

impl<M: Microphone> VoiceCapture<M> {
    pub fn new(microphone: M) -> Self {
        Self {
            microphone,
            state: VoiceState::Idle,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, VoiceState::Recording { .. })
    }

    /// Time since the current recording started.
    pub fn elapsed(&self) -> Option<Duration> {
        match &self.state {
            VoiceState::Recording { started_at, .. } => Some(started_at.elapsed()),
            VoiceState::Idle => None,
        }
    }

    pub async fn start(&mut self) -> Result<(), ComposeError> {
        if self.is_recording() {
            return Err(ComposeError::AlreadyRecording);
        }

        let stream = self.microphone.open().await.map_err(|e| match e {
            MicrophoneError::PermissionDenied => ComposeError::PermissionDenied,
            MicrophoneError::Unavailable(reason) => ComposeError::Microphone(reason),
        })?;

        info!("Voice recording started ({})", stream.mime_type());
        self.state = VoiceState::Recording {
            started_at: Instant::now(),
            stream,
        };
        Ok(())
    }

    /// Finish the recording and package the buffered audio as an attachment.
    /// The duration is whole seconds since `start`.
    pub fn stop(&mut self) -> Result<Attachment, ComposeError> {
        let VoiceState::Recording { started_at, mut stream } = std::mem::replace(&mut self.state, VoiceState::Idle)
        else {
            return Err(ComposeError::NotRecording);
        };

        let data = stream.drain();
        let duration = u32::try_from(started_at.elapsed().as_secs()).unwrap_or(u32::MAX);
        let mime_type = stream.mime_type().to_string();
        stream.release();

        let name = format!(
            "voice-{}.{}",
            chrono::Utc::now().format("%Y%m%d-%H%M%S"),
            extension_for(&mime_type)
        );
        info!("Voice recording stopped: {}s, {} bytes", duration, data.len());
        Ok(Attachment::voice(name, mime_type, data, duration))
    }

    /// Force-stop and throw away the current recording. Returns whether a
    /// recording was in progress.
    pub fn cancel(&mut self) -> bool {
        match std::mem::replace(&mut self.state, VoiceState::Idle) {
            VoiceState::Recording { mut stream, .. } => {
                stream.release();
                debug!("Voice recording discarded");
                true
            }
            VoiceState::Idle => false,
        }
    }
}

fn extension_for(mime_type: &str) -> &str {
    mime_type
        .split(';')
        .next()
        .and_then(|essence| essence.split('/').nth(1))
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .unwrap_or("bin")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use murmur_types::models::AttachmentKind;

    #[derive(Default)]
    struct FakeMic {
        deny: bool,
        feed: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
        released: Arc<AtomicUsize>,
    }

    impl FakeMic {
        fn push(&self, chunk: &'static [u8]) {
            let feed = self.feed.lock().unwrap();
            feed.as_ref().unwrap().send(Bytes::from_static(chunk)).unwrap();
        }
    }

    impl Microphone for FakeMic {
        async fn open(&self) -> Result<AudioStream, MicrophoneError> {
            if self.deny {
                return Err(MicrophoneError::PermissionDenied);
            }
            let (tx, rx) = mpsc::unbounded_channel();
            *self.feed.lock().unwrap() = Some(tx);
            let released = self.released.clone();
            Ok(AudioStream::new("audio/webm;codecs=opus", rx, move || {
                released.fetch_add(1, Ordering::SeqCst);
            }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_produces_timed_voice_attachment() {
        let mut voice = VoiceCapture::new(FakeMic::default());
        voice.start().await.unwrap();
        voice.microphone.push(b"abc");
        voice.microphone.push(b"def");

        tokio::time::advance(Duration::from_millis(3_400)).await;
        let attachment = voice.stop().unwrap();

        assert_eq!(attachment.kind, AttachmentKind::Voice);
        assert_eq!(attachment.duration_seconds, Some(3));
        assert_eq!(&attachment.raw_data[..], b"abcdef");
        assert_eq!(attachment.size_bytes, 6);
        assert!(attachment.name.ends_with(".webm"));
        assert!(!voice.is_recording());
        assert_eq!(voice.microphone.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let mut voice = VoiceCapture::new(FakeMic::default());
        voice.start().await.unwrap();
        assert_eq!(voice.start().await, Err(ComposeError::AlreadyRecording));
        assert!(voice.is_recording());
    }

    #[tokio::test]
    async fn denied_permission_stays_idle() {
        let mut voice = VoiceCapture::new(FakeMic {
            deny: true,
            ..Default::default()
        });
        assert_eq!(voice.start().await, Err(ComposeError::PermissionDenied));
        assert!(!voice.is_recording());
        assert_eq!(voice.stop().unwrap_err(), ComposeError::NotRecording);
    }

    #[tokio::test]
    async fn cancel_discards_and_releases_once() {
        let mut voice = VoiceCapture::new(FakeMic::default());
        voice.start().await.unwrap();
        voice.microphone.push(b"abc");

        assert!(voice.cancel());
        assert!(!voice.cancel());
        assert_eq!(voice.stop().unwrap_err(), ComposeError::NotRecording);
        assert_eq!(voice.microphone.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_while_recording_releases_stream() {
        let mic = FakeMic::default();
        let released = mic.released.clone();
        let mut voice = VoiceCapture::new(mic);
        voice.start().await.unwrap();
        drop(voice);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn extension_from_mime() {
        assert_eq!(extension_for("audio/ogg; codecs=opus"), "ogg");
        assert_eq!(extension_for("audio/mp4"), "mp4");
        assert_eq!(extension_for("garbage"), "bin");
    }
}
