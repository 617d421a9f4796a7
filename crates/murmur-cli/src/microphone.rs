use murmur_compose::{AudioStream, Microphone, MicrophoneError};

/// The terminal has no capture device.
pub struct NoMicrophone;

impl Microphone for NoMicrophone {
    async fn open(&self) -> Result<AudioStream, MicrophoneError> {
        Err(MicrophoneError::Unavailable("no capture device in terminal mode".into()))
    }
}
