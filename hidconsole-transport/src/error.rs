//! Transport error types

use thiserror::Error;

/// Errors that can occur during transport operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Device not open")]
    NotOpen,

    /// The device is already being opened or closed by another handle.
    ///
    /// Callers that retry opens automatically (hot-plug reconnect) treat this
    /// as a benign race rather than a failure.
    #[error("Device state change already in progress: {0}")]
    StateTransition(String),

    #[error("HID error: {0}")]
    HidError(String),

    #[error("HID permission denied: {0}")]
    HidPermissionDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransportError {
    /// Whether this is the benign "already transitioning" open failure
    pub fn is_state_transition(&self) -> bool {
        matches!(self, Self::StateTransition(_))
    }
}

impl From<hidapi::HidError> for TransportError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") {
            TransportError::HidPermissionDenied(msg)
        } else {
            TransportError::HidError(msg)
        }
    }
}
