//! Error type for device access and frame production.

/// Errors raised while opening, running, or reading from a motion frame
/// producer.
#[derive(Debug, thiserror::Error)]
pub enum HidError {
    #[error("HID device not found (vendor={vendor_id:#06x}, product={product_id:#06x})")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("failed to open HID device: {0}")]
    OpenFailed(String),

    #[error("failed to read HID report: {0}")]
    ReadFailed(String),

    #[error("frame producer is not running")]
    NotRunning,
}

pub type HidResult<T> = Result<T, HidError>;
