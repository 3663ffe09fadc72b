//! Error taxonomy for the control loop.
//!
//! Library functions return `anyhow::Result`; the kinds below travel inside the
//! `anyhow::Error` so the loop can decide whether a failure is fatal (startup)
//! or degrades to a no-op for the current iteration.

use std::fmt;

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FacelinkError {
    /// A reference image could not be read or decoded.
    ImageLoad { path: String, message: String },
    /// A reference image decoded but yielded no face.
    Encoding { identity: String, message: String },
    /// The detection capability failed on a live frame.
    Detection(String),
    ChannelWrite(String),
    ChannelRead(String),
    /// The platform refused or failed to carry out an action.
    PlatformAction(String),
    /// The video source cannot deliver frames any more.
    Capture(String),
    Config(String),
}

impl FacelinkError {
    pub fn code(&self) -> &'static str {
        match self {
            FacelinkError::ImageLoad { .. } => "IMAGE_LOAD",
            FacelinkError::Encoding { .. } => "ENCODING",
            FacelinkError::Detection(_) => "DETECTION",
            FacelinkError::ChannelWrite(_) => "CHANNEL_WRITE",
            FacelinkError::ChannelRead(_) => "CHANNEL_READ",
            FacelinkError::PlatformAction(_) => "PLATFORM_ACTION",
            FacelinkError::Capture(_) => "CAPTURE",
            FacelinkError::Config(_) => "CONFIG",
        }
    }

    /// Only startup failures may terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FacelinkError::ImageLoad { .. } | FacelinkError::Encoding { .. } | FacelinkError::Config(_)
        )
    }

    /// Find the taxonomy entry carried by an `anyhow::Error`, if any.
    pub fn classify(err: &anyhow::Error) -> Option<&FacelinkError> {
        err.chain().find_map(|cause| cause.downcast_ref::<FacelinkError>())
    }
}

impl fmt::Display for FacelinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacelinkError::ImageLoad { path, message } => {
                write!(f, "{}: cannot load {}: {}", self.code(), path, message)
            }
            FacelinkError::Encoding { identity, message } => {
                write!(f, "{}: identity '{}': {}", self.code(), identity, message)
            }
            FacelinkError::Detection(message)
            | FacelinkError::ChannelWrite(message)
            | FacelinkError::ChannelRead(message)
            | FacelinkError::PlatformAction(message)
            | FacelinkError::Capture(message)
            | FacelinkError::Config(message) => write!(f, "{}: {}", self.code(), message),
        }
    }
}

impl std::error::Error for FacelinkError {}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn classify_finds_kind_through_context() {
        let err: anyhow::Error = FacelinkError::ChannelWrite("port gone".into()).into();
        let err = Err::<(), _>(err).context("dispatch").unwrap_err();

        let kind = FacelinkError::classify(&err).expect("classified");
        assert_eq!(kind.code(), "CHANNEL_WRITE");
        assert!(!kind.is_fatal());
    }

    #[test]
    fn only_startup_kinds_are_fatal() {
        assert!(FacelinkError::Encoding {
            identity: "A".into(),
            message: "no face".into()
        }
        .is_fatal());
        assert!(!FacelinkError::Detection("boom".into()).is_fatal());
        assert!(!FacelinkError::PlatformAction("low battery".into()).is_fatal());
    }
}
