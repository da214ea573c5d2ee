// Capture provider contract
//
// The core never enumerates devices. It asks a provider for a stream handle,
// polls it for the most recent image once per tick, and hands the handle back
// on deactivation.

use crate::error::RehabResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Opaque handle to an acquired capture stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamHandle {
    pub id: u64,
    pub label: String,
}

/// Most recent image from the capture stream
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureFrame {
    /// Presentation time reported by the capture source. Unchanged between
    /// polls means no new data.
    pub timestamp_ms: f64,
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl CaptureFrame {
    pub fn new(timestamp_ms: f64, width: u32, height: u32, pixels: Arc<[u8]>) -> Self {
        Self {
            timestamp_ms,
            width,
            height,
            pixels,
        }
    }

    /// Frame with no pixel payload, for detectors that read from elsewhere
    pub fn empty(timestamp_ms: f64) -> Self {
        Self::new(timestamp_ms, 0, 0, Arc::from(Vec::new()))
    }
}

#[async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Acquire the capture stream. May wait on a user permission prompt;
    /// fails with `RehabError::PermissionDenied` when refused.
    async fn acquire(&self) -> RehabResult<StreamHandle>;

    /// Release a previously acquired stream
    fn release(&self, handle: StreamHandle);

    /// Latest available image. `Ok(None)` when nothing has arrived yet,
    /// `Err(RehabError::SourceExhausted)` once the stream has ended.
    fn poll_frame(&self, handle: &StreamHandle) -> RehabResult<Option<CaptureFrame>>;
}

/// Provider for hosts without a camera. Acquisition always fails.
#[derive(Debug, Default, Clone)]
pub struct NoCapture;

#[async_trait]
impl CaptureProvider for NoCapture {
    async fn acquire(&self) -> RehabResult<StreamHandle> {
        Err(crate::error::RehabError::PermissionDenied(
            "no capture device available".to_string(),
        ))
    }

    fn release(&self, _handle: StreamHandle) {}

    fn poll_frame(&self, _handle: &StreamHandle) -> RehabResult<Option<CaptureFrame>> {
        Err(crate::error::RehabError::SourceExhausted)
    }
}
