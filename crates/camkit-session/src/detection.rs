// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Live rectangle detection — throttles preview frames, runs the detector on
// the survivors and publishes the best rectangle in overlay space.

use std::sync::Arc;
use std::time::Duration;

use camkit_bridge::{CaptureBridge, FrameSink, RectangleDetector};
use camkit_core::error::Result;
use camkit_core::geometry::detector_to_overlay;
use camkit_core::types::{DetectionOptions, DetectionResult, RectangleObservation};
use camkit_image::VideoFrame;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace, warn};

/// Minimum spacing between two detector runs.
pub const DETECTION_INTERVAL: Duration = Duration::from_millis(200);

/// Throttled detector front end.
///
/// Owns the detector and the time of the last detection; publishes each
/// result on a `watch` channel, so observers always read the latest frame's
/// outcome and never a backlog.
pub struct DetectionSampler {
    detector: Arc<dyn RectangleDetector + Send + Sync>,
    options: DetectionOptions,
    interval: Duration,
    last_detection: Option<Duration>,
    publisher: Arc<watch::Sender<DetectionResult>>,
}

impl DetectionSampler {
    pub fn new(
        detector: Arc<dyn RectangleDetector + Send + Sync>,
        publisher: Arc<watch::Sender<DetectionResult>>,
    ) -> Self {
        Self {
            detector,
            options: DetectionOptions::default(),
            interval: DETECTION_INTERVAL,
            last_detection: None,
            publisher,
        }
    }

    /// Whether a frame at `timestamp` would run the detector.
    pub fn admits(&self, timestamp: Duration) -> bool {
        match self.last_detection {
            Some(last) => timestamp.saturating_sub(last) >= self.interval,
            None => true,
        }
    }

    /// Handle one preview frame. Returns `true` when the detector ran.
    ///
    /// Blocks for as long as the detector does; call from a blocking context.
    #[instrument(skip_all, fields(ts = ?frame.timestamp))]
    pub fn on_frame(&mut self, frame: &VideoFrame) -> bool {
        if !self.admits(frame.timestamp) {
            trace!("frame throttled");
            return false;
        }
        self.last_detection = Some(frame.timestamp);

        let result = match self.detector.detect(frame, &self.options) {
            Ok(candidates) => {
                best_observation(candidates).map(|best| detector_to_overlay(best.bounding_box))
            }
            Err(err) => {
                debug!(error = %err, "rectangle detection failed");
                None
            }
        };
        trace!(?result, "detection published");
        self.publisher.send_replace(result);
        true
    }
}

/// The candidate with the highest confidence.
pub fn best_observation(candidates: Vec<RectangleObservation>) -> Option<RectangleObservation> {
    candidates
        .into_iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
}

/// Lets a whole bridge stand in where only its detector is wanted.
pub struct BridgeDetector(pub Arc<dyn CaptureBridge>);

impl RectangleDetector for BridgeDetector {
    fn detect(
        &self,
        frame: &VideoFrame,
        options: &DetectionOptions,
    ) -> Result<Vec<RectangleObservation>> {
        self.0.detect(frame, options)
    }
}

/// Frame sink backed by a one-slot channel. A frame offered while the slot
/// is full is discarded.
struct ChannelFrameSink {
    frames: mpsc::Sender<VideoFrame>,
}

impl FrameSink for ChannelFrameSink {
    fn offer(&self, frame: VideoFrame) {
        if self.frames.try_send(frame).is_err() {
            trace!("detector busy; frame dropped");
        }
    }
}

/// Background task feeding a [`DetectionSampler`] from the camera.
///
/// The device pushes frames into [`DetectionWorker::sink`]; the worker runs
/// the sampler on the blocking pool. Dropping the worker stops it.
pub struct DetectionWorker {
    sink: Arc<ChannelFrameSink>,
    handle: JoinHandle<()>,
}

impl DetectionWorker {
    /// Start the worker. Must be called inside a tokio runtime.
    pub fn spawn(sampler: DetectionSampler) -> Self {
        let (frames, mut incoming) = mpsc::channel::<VideoFrame>(1);
        let handle = tokio::spawn(async move {
            let mut sampler = sampler;
            while let Some(frame) = incoming.recv().await {
                if !sampler.admits(frame.timestamp) {
                    continue;
                }
                let joined = tokio::task::spawn_blocking(move || {
                    sampler.on_frame(&frame);
                    sampler
                })
                .await;
                match joined {
                    Ok(returned) => sampler = returned,
                    Err(err) => {
                        warn!(error = %err, "detection task failed; live detection stopped");
                        break;
                    }
                }
            }
        });
        Self {
            sink: Arc::new(ChannelFrameSink { frames }),
            handle,
        }
    }

    /// Where the camera session should deliver preview frames.
    pub fn sink(&self) -> Arc<dyn FrameSink> {
        self.sink.clone()
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use camkit_core::error::CaptureError;
    use camkit_core::types::NormalizedRect;
    use image::DynamicImage;

    use super::*;

    /// Returns a fixed set of candidates and counts invocations.
    struct ScriptedDetector {
        calls: AtomicUsize,
        candidates: Mutex<Option<Vec<RectangleObservation>>>,
    }

    impl ScriptedDetector {
        fn returning(candidates: Option<Vec<RectangleObservation>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                candidates: Mutex::new(candidates),
            })
        }
    }

    impl RectangleDetector for ScriptedDetector {
        fn detect(
            &self,
            _frame: &VideoFrame,
            _options: &DetectionOptions,
        ) -> Result<Vec<RectangleObservation>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.candidates
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| CaptureError::Bridge("detector offline".into()))
        }
    }

    fn frame_at(millis: u64) -> VideoFrame {
        VideoFrame::new(DynamicImage::new_luma8(4, 4), Duration::from_millis(millis))
    }

    fn observation(y: f64, confidence: f32) -> RectangleObservation {
        RectangleObservation {
            bounding_box: NormalizedRect::new(0.1, y, 0.5, 0.3),
            confidence,
        }
    }

    #[test]
    fn frames_within_interval_run_detector_once() {
        let detector = ScriptedDetector::returning(Some(vec![]));
        let (publisher, _rx) = watch::channel(None);
        let mut sampler = DetectionSampler::new(detector.clone(), Arc::new(publisher));

        assert!(sampler.on_frame(&frame_at(1_000)));
        assert!(!sampler.on_frame(&frame_at(1_150)));
        assert_eq!(detector.calls.load(Ordering::SeqCst), 1);

        assert!(sampler.on_frame(&frame_at(1_200)));
        assert_eq!(detector.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn earlier_timestamp_is_throttled() {
        let detector = ScriptedDetector::returning(Some(vec![]));
        let (publisher, _rx) = watch::channel(None);
        let mut sampler = DetectionSampler::new(detector.clone(), Arc::new(publisher));

        assert!(sampler.on_frame(&frame_at(5_000)));
        assert!(!sampler.on_frame(&frame_at(4_000)));
        assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn most_confident_candidate_is_flipped_and_published() {
        let detector = ScriptedDetector::returning(Some(vec![
            observation(0.1, 0.6),
            observation(0.2, 0.9),
            observation(0.3, 0.7),
        ]));
        let (publisher, rx) = watch::channel(None);
        let mut sampler = DetectionSampler::new(detector, Arc::new(publisher));

        sampler.on_frame(&frame_at(0));
        let rect = rx.borrow().expect("detection published");
        assert!((rect.y - 0.5).abs() < 1e-9);
        assert!((rect.x - 0.1).abs() < 1e-9);
    }

    #[test]
    fn detector_failure_publishes_no_detection() {
        let detector = ScriptedDetector::returning(None);
        let (publisher, rx) = watch::channel(Some(NormalizedRect::UNIT));
        let mut sampler = DetectionSampler::new(detector, Arc::new(publisher));

        assert!(sampler.on_frame(&frame_at(0)));
        assert_eq!(*rx.borrow(), None);
    }

    #[tokio::test]
    async fn worker_publishes_from_offered_frames() {
        let detector = ScriptedDetector::returning(Some(vec![observation(0.0, 0.8)]));
        let (publisher, mut rx) = watch::channel(None);
        let worker = DetectionWorker::spawn(DetectionSampler::new(detector, Arc::new(publisher)));

        worker.sink().offer(frame_at(0));
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("detection within timeout")
            .unwrap();
        let rect = rx.borrow().expect("rect");
        assert!((rect.y - 0.7).abs() < 1e-9);
    }
}
