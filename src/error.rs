// SPDX-License-Identifier: MPL-2.0
use std::fmt;

#[derive(Debug, Clone)]
pub enum Error {
    Io(String),
    Media(MediaError),
}

/// Specific error types for media playback issues.
///
/// Only open-time failures are surfaced through these variants; transient
/// decode errors are recovered internally by skipping the offending packet.
#[derive(Debug, Clone)]
pub enum MediaError {
    /// File exists but contains no video stream.
    NoVideoStream,

    /// Codec is not supported by the linked FFmpeg.
    UnsupportedCodec(String),

    /// Container could not be opened or probed.
    OpenFailed(String),

    /// Decoding failed in a way that cannot be skipped (e.g. scaler or
    /// resampler construction).
    DecodeFailed(String),

    /// A container seek was rejected.
    SeekFailed(String),

    /// Audio output device could not be initialized.
    DeviceInit(String),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::NoVideoStream => write!(f, "No video stream found"),
            MediaError::UnsupportedCodec(codec) => {
                write!(f, "Unsupported codec: {}", codec)
            }
            MediaError::OpenFailed(msg) => write!(f, "Failed to open media: {}", msg),
            MediaError::DecodeFailed(msg) => write!(f, "Decoding failed: {}", msg),
            MediaError::SeekFailed(msg) => write!(f, "Seek failed: {}", msg),
            MediaError::DeviceInit(msg) => write!(f, "Audio device error: {}", msg),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O Error: {}", e),
            Error::Media(e) => write!(f, "Media Error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<MediaError> for Error {
    fn from(err: MediaError) -> Self {
        Error::Media(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_io_error() {
        let err = Error::Io("disk failure".to_string());
        assert_eq!(format!("{}", err), "I/O Error: disk failure");
    }

    #[test]
    fn from_io_error_produces_io_variant() {
        let io_error = std::io::Error::other("boom");
        let err: Error = io_error.into();
        match err {
            Error::Io(message) => assert!(message.contains("boom")),
            _ => panic!("expected Io variant"),
        }
    }

    #[test]
    fn media_error_converts_to_error() {
        let err: Error = MediaError::NoVideoStream.into();
        assert!(matches!(err, Error::Media(MediaError::NoVideoStream)));
    }

    #[test]
    fn media_error_display() {
        let err = MediaError::UnsupportedCodec("H264".to_string());
        assert!(format!("{}", err).contains("H264"));

        let err = MediaError::SeekFailed("out of range".to_string());
        assert_eq!(format!("{}", err), "Seek failed: out of range");
    }

    #[test]
    fn error_display_wraps_media_error() {
        let err = Error::Media(MediaError::NoVideoStream);
        assert_eq!(format!("{}", err), "Media Error: No video stream found");
    }
}
