// Frame scheduler
//
// Pulls one frame per animation tick from the active source, runs it through
// the smoothing filter and blink edge detector, and hands the result to the
// caller. The scheduler is the single writer of the pipeline state; nothing
// else holds a reference to the previous frame.
//
// Detector frames are throttled to roughly 30 Hz. Synthetic frames are
// produced on every tick and bypass smoothing.

use crate::blink::BlinkEdgeDetector;
use crate::error::{RehabError, RehabResult};
use crate::filter::SmoothingFilter;
use crate::source::{
    CaptureProvider, DetectedSource, DetectorResource, FrameSource, SyntheticGenerator,
};
use crate::types::{Frame, PhysiologicalProfile, SourceMode};
use std::sync::Arc;

/// Minimum spacing between processed detector frames (~30 Hz)
pub const DETECTOR_FRAME_INTERVAL_MS: f64 = 32.0;

/// Mutable per-loop state, owned exclusively by the scheduler
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub previous: Option<Frame>,
    pub blink: BlinkEdgeDetector,
    pub last_processed_ms: Option<f64>,
    pub processed_frames: u64,
}

/// Result of one scheduler tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Published { frame: Frame, blink_started: bool },
    /// Detector path, too soon after the last processed frame
    Throttled,
    /// Camera reported no new image since the last poll
    Duplicate,
    Inactive,
    /// Capture stream ended or failed; the scheduler has deactivated itself
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub profile: PhysiologicalProfile,
    pub filter: SmoothingFilter,
    pub detector_interval_ms: f64,
    /// Seed for the synthetic generator's random terms
    pub seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            profile: PhysiologicalProfile::Healthy,
            filter: SmoothingFilter::default(),
            detector_interval_ms: DETECTOR_FRAME_INTERVAL_MS,
            seed: None,
        }
    }
}

pub struct FrameScheduler {
    config: SchedulerConfig,
    source: FrameSource,
    state: PipelineState,
    capture: Arc<dyn CaptureProvider>,
    detector: Arc<DetectorResource>,
    active: bool,
}

impl FrameScheduler {
    /// Create a scheduler in synthetic mode
    pub fn new(
        config: SchedulerConfig,
        capture: Arc<dyn CaptureProvider>,
        detector: Arc<DetectorResource>,
    ) -> Self {
        let source = FrameSource::Synthetic(Self::make_generator(&config));
        Self {
            config,
            source,
            state: PipelineState::default(),
            capture,
            detector,
            active: true,
        }
    }

    fn make_generator(config: &SchedulerConfig) -> SyntheticGenerator {
        match config.seed {
            Some(seed) => SyntheticGenerator::seeded(config.profile, seed),
            None => SyntheticGenerator::from_entropy(config.profile),
        }
    }

    pub fn mode(&self) -> SourceMode {
        self.source.mode()
    }

    pub fn profile(&self) -> PhysiologicalProfile {
        self.config.profile
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Capture permission failure for the current detector source, if any
    pub fn permission_denied(&self) -> Option<&str> {
        match &self.source {
            FrameSource::Detected(source) => source.permission_denied(),
            FrameSource::Synthetic(_) => None,
        }
    }

    /// Change the synthetic profile; takes effect on the next tick
    pub fn set_profile(&mut self, profile: PhysiologicalProfile) {
        if self.config.profile != profile {
            log::info!("Profile switched: {} -> {}", self.config.profile, profile);
        }
        self.config.profile = profile;
        self.source.set_profile(profile);
    }

    /// Switch between synthetic and detector sources without restarting the
    /// loop. Switching to the detector waits for capture acquisition.
    pub async fn set_mode(&mut self, mode: SourceMode) -> RehabResult<()> {
        if mode == self.mode() && self.active {
            return Ok(());
        }
        self.install(mode).await?;
        self.active = true;
        Ok(())
    }

    /// Acquire the capture stream and dispatch to the detector adapter.
    /// A denied permission leaves the scheduler publishing zero-confidence
    /// frames rather than failing.
    pub async fn activate_detector(&mut self) -> RehabResult<()> {
        self.set_mode(SourceMode::Detected).await
    }

    /// Re-activate after `deactivate`, re-acquiring capture when needed
    pub async fn activate(&mut self) -> RehabResult<()> {
        if self.active {
            return Ok(());
        }
        self.install(self.mode()).await?;
        self.active = true;
        Ok(())
    }

    async fn install(&mut self, mode: SourceMode) -> RehabResult<()> {
        let next = match mode {
            SourceMode::Synthetic => FrameSource::Synthetic(Self::make_generator(&self.config)),
            SourceMode::Detected => FrameSource::Detected(
                DetectedSource::activate(Arc::clone(&self.capture), Arc::clone(&self.detector))
                    .await?,
            ),
        };

        self.source.release();
        log::info!("Frame source: {} -> {}", self.mode(), mode);
        self.source = next;

        // New source starts unsmoothed; blink edge state carries over
        self.state.previous = None;
        self.state.last_processed_ms = None;
        Ok(())
    }

    /// Stop producing frames and release the capture stream
    pub fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.source.release();
        log::info!(
            "Frame scheduler deactivated after {} frames",
            self.state.processed_frames
        );
    }

    /// Run one iteration at monotonic time `now_ms`
    pub fn tick(&mut self, now_ms: f64) -> TickOutcome {
        if !self.active {
            return TickOutcome::Inactive;
        }

        let detected = self.mode() == SourceMode::Detected;
        if detected {
            if let Some(last) = self.state.last_processed_ms {
                if now_ms - last < self.config.detector_interval_ms {
                    return TickOutcome::Throttled;
                }
            }
        }

        let raw = match self.source.next_raw_frame(now_ms) {
            Ok(Some(raw)) => raw,
            Ok(None) => return TickOutcome::Duplicate,
            Err(RehabError::SourceExhausted) => {
                log::info!("Capture source exhausted, stopping scheduler");
                self.deactivate();
                return TickOutcome::Exhausted;
            }
            Err(e) if e.is_degrading() => {
                log::warn!("Frame source degraded: {}", e);
                return TickOutcome::Duplicate;
            }
            Err(e) => {
                log::error!("Capture stream failed, stopping scheduler: {}", e);
                self.deactivate();
                return TickOutcome::Exhausted;
            }
        };

        let frame = if detected {
            self.config.filter.apply(&mut self.state.previous, raw)
        } else {
            self.state.previous = Some(raw.clone());
            raw
        };

        let blink_started = self.state.blink.observe(&frame);
        self.state.last_processed_ms = Some(now_ms);
        self.state.processed_frames += 1;

        log::trace!(
            "Frame {} at {:.0}ms: yaw={:.2} pitch={:.2} blink={}",
            self.state.processed_frames,
            now_ms,
            frame.yaw,
            frame.pitch,
            frame.blink_detected
        );

        TickOutcome::Published {
            frame,
            blink_started,
        }
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.source.release();
    }
}
