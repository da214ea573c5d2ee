// Frame sources
//
// Two producers share one capability, `next_raw_frame(t)`:
// - Synthetic: physiological simulator driven only by elapsed time
// - Detected: camera stream run through an external face detector
//
// The set is closed, so it is modelled as an enum rather than a trait object.
// Capture and detector failures are absorbed here and surface only as frame
// data (confidence, staleness).

pub mod capture;
pub mod detector;
pub mod synthetic;

use crate::error::{RehabError, RehabResult};
use crate::types::{Frame, PhysiologicalProfile, SourceMode};
use std::sync::Arc;

pub use capture::{CaptureFrame, CaptureProvider, NoCapture, StreamHandle};
pub use detector::{
    is_blink, Detection, DetectorAdapter, DetectorResource, FaceDetector, ModelState, ModelStatus,
};
pub use synthetic::SyntheticGenerator;

/// Camera-backed source: capture stream plus detector adapter
pub struct DetectedSource {
    adapter: DetectorAdapter,
    capture: Arc<dyn CaptureProvider>,
    handle: Option<StreamHandle>,
    denied: Option<String>,
}

impl DetectedSource {
    /// Acquire the capture stream. Permission failures do not fail
    /// activation; the source then emits zero-confidence frames.
    pub async fn activate(
        capture: Arc<dyn CaptureProvider>,
        resource: Arc<DetectorResource>,
    ) -> RehabResult<Self> {
        let (handle, denied) = match capture.acquire().await {
            Ok(handle) => {
                log::info!("Capture stream acquired: {}", handle.label);
                (Some(handle), None)
            }
            Err(RehabError::PermissionDenied(reason)) => {
                log::warn!("Capture permission denied: {}", reason);
                (None, Some(reason))
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            adapter: DetectorAdapter::new(resource),
            capture,
            handle,
            denied,
        })
    }

    pub fn permission_denied(&self) -> Option<&str> {
        self.denied.as_deref()
    }

    /// Hand the capture stream back to the provider
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            log::info!("Releasing capture stream: {}", handle.label);
            self.capture.release(handle);
        }
    }

    fn next_raw_frame(&mut self) -> RehabResult<Option<Frame>> {
        let Some(handle) = self.handle.as_ref() else {
            return Ok(Some(self.adapter.unavailable_frame()));
        };

        match self.capture.poll_frame(handle)? {
            Some(image) => Ok(self.adapter.process(&image)),
            None => Ok(None),
        }
    }
}

impl Drop for DetectedSource {
    fn drop(&mut self) {
        self.release();
    }
}

pub enum FrameSource {
    Synthetic(SyntheticGenerator),
    Detected(DetectedSource),
}

impl FrameSource {
    pub fn mode(&self) -> SourceMode {
        match self {
            Self::Synthetic(_) => SourceMode::Synthetic,
            Self::Detected(_) => SourceMode::Detected,
        }
    }

    /// Produce the raw frame for elapsed time `t_ms`.
    ///
    /// `Ok(None)` means the camera had nothing new. `Err(SourceExhausted)`
    /// means the capture stream ended.
    pub fn next_raw_frame(&mut self, t_ms: f64) -> RehabResult<Option<Frame>> {
        match self {
            Self::Synthetic(generator) => Ok(Some(generator.next_frame(t_ms))),
            Self::Detected(source) => source.next_raw_frame(),
        }
    }

    pub fn set_profile(&mut self, profile: PhysiologicalProfile) {
        if let Self::Synthetic(generator) = self {
            generator.set_profile(profile);
        }
    }

    pub fn release(&mut self) {
        if let Self::Detected(source) = self {
            source.release();
        }
    }
}
