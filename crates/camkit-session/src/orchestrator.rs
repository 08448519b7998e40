// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture orchestrator — the session state machine behind the camera screen.
//
// Drives permission checks, the camera session, still capture, the optional
// crop step and image finishing, and reports the outcome to the host over a
// `CaptureEvent` channel. Device work is serialized on the session queue and
// image work runs on the blocking pool.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camkit_bridge::{CaptureBridge, StillSettings};
use camkit_core::config::CaptureConfig;
use camkit_core::crop::{Corner, CropEditor};
use camkit_core::error::{CaptureError, Result};
use camkit_core::geometry::{clamp_realtime_height, default_crop_rect};
use camkit_core::human_errors::CaptureFailure;
use camkit_core::types::{
    CameraPosition, CaptureSessionState, DetectionResult, FlashMode, NormalizedPoint,
    NormalizedRect,
};
use camkit_image::{FinishedImages, ImageAsset, ImageFinisher};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::detection::{BridgeDetector, DetectionSampler, DetectionWorker};
use crate::queue::SessionQueue;

/// What the host hears back from a capture flow.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Finished images, in capture order, with their unprocessed originals.
    Finished(FinishedImages),
    /// The user left the flow without producing images.
    Cancelled,
    Failed(CaptureFailure),
}

/// An image waiting for the user's crop.
struct PendingCrop {
    editor: CropEditor,
    source: ImageAsset,
    /// Further images from the same import, delivered after the crop.
    companions: Vec<ImageAsset>,
}

struct Controls {
    flash_mode: FlashMode,
    flash_available: bool,
    position: Option<CameraPosition>,
    realtime_height: f64,
    crop: Option<PendingCrop>,
    detection: Option<DetectionWorker>,
}

struct Inner {
    config: CaptureConfig,
    bridge: Arc<dyn CaptureBridge>,
    finisher: ImageFinisher,
    queue: SessionQueue,
    state: watch::Sender<CaptureSessionState>,
    detection: Arc<watch::Sender<DetectionResult>>,
    events: mpsc::UnboundedSender<CaptureEvent>,
    invalidated: AtomicBool,
    /// Bumped by `stop` and `invalidate`; work that started under an older
    /// value must not touch the session when it resumes.
    generation: AtomicU64,
    controls: Mutex<Controls>,
}

/// Runs one capture flow.
///
/// Cheap to clone; clones drive the same session. Every public operation
/// checks the current [`CaptureSessionState`] and is ignored (logged at
/// `debug`) when the state does not allow it.
#[derive(Clone)]
pub struct CaptureOrchestrator {
    inner: Arc<Inner>,
}

impl CaptureOrchestrator {
    /// Create an orchestrator and the receiver for its events. Must be called
    /// inside a tokio runtime.
    pub fn new(
        config: CaptureConfig,
        bridge: Arc<dyn CaptureBridge>,
    ) -> (Self, mpsc::UnboundedReceiver<CaptureEvent>) {
        let config = config.normalized();
        let (events, receiver) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(CaptureSessionState::Idle);
        let (detection, _) = watch::channel(None);

        info!(
            mode = ?config.mode,
            platform = bridge.platform_name(),
            "Capture orchestrator created"
        );

        let controls = Controls {
            flash_mode: config.default_flash_mode,
            flash_available: false,
            position: None,
            realtime_height: config.default_realtime_height,
            crop: None,
            detection: None,
        };

        let inner = Inner {
            finisher: ImageFinisher::from_config(&config),
            config,
            bridge,
            queue: SessionQueue::spawn(),
            state,
            detection: Arc::new(detection),
            events,
            invalidated: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            controls: Mutex::new(controls),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            receiver,
        )
    }

    // -- Observation ----------------------------------------------------------

    pub fn config(&self) -> &CaptureConfig {
        &self.inner.config
    }

    pub fn state(&self) -> CaptureSessionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CaptureSessionState> {
        self.inner.state.subscribe()
    }

    /// The live overlay rectangle, in overlay space.
    pub fn subscribe_detection(&self) -> watch::Receiver<DetectionResult> {
        self.inner.detection.subscribe()
    }

    pub fn flash_mode(&self) -> FlashMode {
        self.controls().flash_mode
    }

    pub fn flash_available(&self) -> bool {
        self.controls().flash_available
    }

    /// The attached camera, or `None` when the session has no input.
    pub fn camera_position(&self) -> Option<CameraPosition> {
        self.controls().position
    }

    pub fn realtime_height(&self) -> f64 {
        self.controls().realtime_height
    }

    pub fn is_invalidated(&self) -> bool {
        self.inner.invalidated.load(Ordering::SeqCst)
    }

    // -- Session lifecycle ----------------------------------------------------

    /// Ask for camera access, attach the back camera and start the preview.
    ///
    /// In `Scan` mode the document scanner runs instead. Permission and
    /// device failures are reported with `dismisses_flow` set and leave the
    /// session `Idle`. A `stop` or `invalidate` while starting wins: the
    /// start is abandoned and never reaches `Running`.
    #[instrument(skip(self))]
    pub async fn start(&self) {
        if self.is_invalidated() {
            debug!("Start ignored after invalidation");
            return;
        }
        if self.inner.config.mode.uses_document_scanner() {
            self.scan_documents().await;
            return;
        }
        if !self.transition(CaptureSessionState::Starting) {
            return;
        }
        let generation = self.generation();

        let bridge = Arc::clone(&self.inner.bridge);
        let granted = tokio::task::spawn_blocking(move || bridge.request_camera_access())
            .await
            .unwrap_or(false);
        if !self.still_starting(generation) {
            debug!("Start abandoned during permission request");
            return;
        }
        if !granted {
            self.fail(CaptureError::PermissionDenied, true);
            self.transition(CaptureSessionState::Idle);
            return;
        }

        let sink = if self.inner.config.shows_detection_overlay() {
            let sampler = DetectionSampler::new(
                Arc::new(BridgeDetector(Arc::clone(&self.inner.bridge))),
                Arc::clone(&self.inner.detection),
            );
            let worker = DetectionWorker::spawn(sampler);
            let sink = worker.sink();
            self.controls().detection = Some(worker);
            Some(sink)
        } else {
            None
        };

        let bridge = Arc::clone(&self.inner.bridge);
        let configured = self
            .inner
            .queue
            .run(move || {
                let device = bridge.attach_input(CameraPosition::Back)?;
                if let Err(err) = bridge.start_running(sink) {
                    bridge.detach_input();
                    return Err(err);
                }
                Ok(device)
            })
            .await
            .and_then(|result| result);

        if !self.still_starting(generation) {
            debug!("Start abandoned during device configuration");
            let torn_down =
                self.is_invalidated() || self.state() == CaptureSessionState::Idle;
            if configured.is_ok() && torn_down {
                self.release_device();
            }
            return;
        }

        match configured {
            Ok(device) => {
                {
                    let mut controls = self.controls();
                    controls.position = Some(device.position);
                    controls.flash_available = device.flash_available;
                }
                info!(
                    position = ?device.position,
                    flash = device.flash_available,
                    "Camera session running"
                );
                self.transition(CaptureSessionState::Running);
            }
            Err(err) => {
                self.stop_detection();
                self.fail(device_error(err), true);
                self.transition(CaptureSessionState::Idle);
            }
        }
    }

    /// Stop the preview and return to `Idle`. Any pending crop is discarded.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        self.end_generation();
        self.stop_detection();
        self.controls().crop = None;

        let bridge = Arc::clone(&self.inner.bridge);
        let released = self
            .inner
            .queue
            .run(move || {
                bridge.stop_running();
                bridge.detach_input();
            })
            .await;
        if let Err(err) = released {
            warn!(error = %err, "Failed to stop camera session");
        }
        {
            let mut controls = self.controls();
            controls.position = None;
            controls.flash_available = false;
        }
        self.transition(CaptureSessionState::Idle);
        info!("Camera session stopped");
    }

    /// The user dismissed the flow.
    pub async fn cancel(&self) {
        self.stop().await;
        self.emit(CaptureEvent::Cancelled);
    }

    /// Tear the flow down without waiting. Results that arrive afterwards
    /// are dropped.
    pub fn invalidate(&self) {
        if self.inner.invalidated.swap(true, Ordering::SeqCst) {
            return;
        }
        self.end_generation();
        self.stop_detection();
        {
            let mut controls = self.controls();
            controls.crop = None;
            controls.position = None;
            controls.flash_available = false;
        }
        self.release_device();
        self.inner
            .state
            .send_replace(CaptureSessionState::Idle);
        info!("Capture orchestrator invalidated");
    }

    // -- Capture --------------------------------------------------------------

    /// Take a still. Returns `false` when the session is not `Running`, so a
    /// second tap while a capture is in flight takes nothing.
    #[instrument(skip(self))]
    pub async fn capture(&self) -> bool {
        if !self.transition(CaptureSessionState::Capturing) {
            return false;
        }
        let generation = self.generation();

        let settings = StillSettings {
            flash: self.effective_flash(),
        };
        let bridge = Arc::clone(&self.inner.bridge);
        let captured = self
            .inner
            .queue
            .run(move || bridge.capture_still(&settings))
            .await
            .and_then(|result| result);
        if !self.is_current(generation) {
            debug!("Session ended during capture; still dropped");
            return true;
        }

        match captured {
            Ok(image) => {
                debug!(flash = ?settings.flash, "Still captured");
                self.route(vec![image]).await;
            }
            Err(err) => {
                let err = match err {
                    CaptureError::CaptureFailed(_) => err,
                    other => CaptureError::CaptureFailed(other.to_string()),
                };
                self.fail(err, false);
                self.transition(CaptureSessionState::Running);
            }
        }
        true
    }

    /// Attach the camera on the other side. On failure the session is left
    /// without an input and `DeviceUnavailable` is reported.
    #[instrument(skip(self))]
    pub async fn switch_camera(&self) -> bool {
        if self.state() != CaptureSessionState::Running {
            debug!(state = ?self.state(), "Camera switch ignored");
            return false;
        }
        let generation = self.generation();

        let target = self
            .camera_position()
            .map(CameraPosition::opposite)
            .unwrap_or(CameraPosition::Back);
        let bridge = Arc::clone(&self.inner.bridge);
        let switched = self
            .inner
            .queue
            .run(move || {
                bridge.detach_input();
                bridge.attach_input(target)
            })
            .await
            .and_then(|result| result);
        if !self.is_current(generation) {
            debug!("Session ended during camera switch");
            return false;
        }

        match switched {
            Ok(device) => {
                let mut controls = self.controls();
                controls.position = Some(device.position);
                controls.flash_available = device.flash_available;
                info!(position = ?device.position, "Camera switched");
                true
            }
            Err(err) => {
                {
                    let mut controls = self.controls();
                    controls.position = None;
                    controls.flash_available = false;
                }
                self.fail(device_error(err), false);
                false
            }
        }
    }

    /// Cycle Auto → On → Off and return the new mode.
    pub fn toggle_flash(&self) -> FlashMode {
        let mut controls = self.controls();
        controls.flash_mode = controls.flash_mode.next();
        debug!(mode = ?controls.flash_mode, "Flash mode changed");
        controls.flash_mode
    }

    /// Set the overlay height; returns the clamped value actually used.
    pub fn set_realtime_height(&self, height: f64) -> f64 {
        let height = clamp_realtime_height(height);
        self.controls().realtime_height = height;
        height
    }

    // -- Photo library --------------------------------------------------------

    /// Ask for library access and present the system picker. Picked images
    /// follow [`CaptureOrchestrator::import_images`].
    #[instrument(skip(self))]
    pub async fn present_photo_picker(&self) {
        if !self.inner.config.allows_photo_library_import {
            debug!("Photo library import not enabled");
            return;
        }
        if self.state() != CaptureSessionState::Running {
            debug!(state = ?self.state(), "Photo picker ignored");
            return;
        }
        let generation = self.generation();

        let bridge = Arc::clone(&self.inner.bridge);
        let granted = tokio::task::spawn_blocking(move || bridge.request_photo_library_access())
            .await
            .unwrap_or(false);
        if !self.is_current(generation) {
            return;
        }
        if !granted {
            self.fail(CaptureError::PhotoLibraryUnavailable, false);
            return;
        }

        let limit = if self.inner.config.allows_post_capture_cropping {
            1
        } else {
            0
        };
        let bridge = Arc::clone(&self.inner.bridge);
        let picked = tokio::task::spawn_blocking(move || bridge.pick_images(limit))
            .await
            .map_err(|err| CaptureError::Bridge(err.to_string()))
            .and_then(|result| result);
        if !self.is_current(generation) {
            debug!("Session ended while picking; selection dropped");
            return;
        }

        match picked {
            Ok(Some(images)) if !images.is_empty() => {
                self.import_images(images).await;
            }
            Ok(_) => debug!("Photo picker dismissed"),
            Err(err) => {
                warn!(error = %err, "Photo picker failed");
                self.fail(CaptureError::PhotoLibraryUnavailable, false);
            }
        }
    }

    /// Bring library images into the flow. They are cropped (first image
    /// only) or delivered exactly like a captured still.
    pub async fn import_images(&self, images: Vec<ImageAsset>) -> bool {
        if !self.inner.config.allows_photo_library_import {
            debug!("Photo library import not enabled");
            return false;
        }
        if images.is_empty() || self.state() != CaptureSessionState::Running {
            debug!(count = images.len(), state = ?self.state(), "Import ignored");
            return false;
        }
        info!(count = images.len(), "Importing images");
        self.route(images).await;
        true
    }

    // -- Crop -----------------------------------------------------------------

    /// The crop rect while awaiting a crop.
    pub fn crop_rect(&self) -> Option<NormalizedRect> {
        self.with_crop(|crop| crop.editor.rect())
    }

    /// The image being cropped, for display.
    pub fn crop_source(&self) -> Option<ImageAsset> {
        self.with_crop(|crop| crop.source.clone())
    }

    pub fn translate_crop(&self, delta: NormalizedPoint) -> Option<NormalizedRect> {
        self.with_crop(|crop| {
            crop.editor.translate(delta);
            crop.editor.rect()
        })
    }

    pub fn end_crop_translate(&self) {
        self.with_crop(|crop| crop.editor.end_translate());
    }

    pub fn resize_crop_corner(&self, corner: Corner, point: NormalizedPoint) -> Option<NormalizedRect> {
        self.with_crop(|crop| {
            crop.editor.resize_corner(corner, point);
            crop.editor.rect()
        })
    }

    pub fn reset_crop(&self) -> Option<NormalizedRect> {
        self.with_crop(|crop| {
            crop.editor.reset();
            crop.editor.rect()
        })
    }

    /// Crop the pending image with the current rect and deliver it. If the
    /// crop produces nothing the flow returns to the camera as if cancelled.
    #[instrument(skip(self))]
    pub async fn complete_crop(&self) {
        // Leave AwaitingCrop before cropping so a late cancel is rejected.
        if !self.transition_from(
            CaptureSessionState::AwaitingCrop,
            CaptureSessionState::Processing,
        ) {
            debug!(state = ?self.state(), "No crop to complete");
            return;
        }
        let generation = self.generation();
        let Some(pending) = self.controls().crop.take() else {
            self.transition(CaptureSessionState::Running);
            return;
        };

        let PendingCrop {
            editor,
            source,
            companions,
        } = pending;
        let rect = editor.rect();
        let cropped = tokio::task::spawn_blocking(move || ImageFinisher::crop(&source, rect))
            .await
            .ok()
            .flatten();
        if !self.is_current(generation) {
            debug!("Session ended during crop; image dropped");
            return;
        }

        match cropped {
            Some(image) => {
                let mut images = Vec::with_capacity(companions.len() + 1);
                images.push(image);
                images.extend(companions);
                self.finish_batch(images).await;
            }
            None => {
                warn!(?rect, "Crop produced no image");
                self.transition(CaptureSessionState::Running);
            }
        }
    }

    /// Discard the pending image and return to the camera.
    pub fn cancel_crop(&self) {
        if !self.transition_from(
            CaptureSessionState::AwaitingCrop,
            CaptureSessionState::Running,
        ) {
            debug!(state = ?self.state(), "No crop to cancel");
            return;
        }
        self.controls().crop = None;
    }

    // -- Delivery -------------------------------------------------------------

    /// Finish `images` and report the result. The session is back in
    /// `Running` afterwards, whether or not finishing succeeded.
    #[instrument(skip_all, fields(count = images.len()))]
    pub async fn deliver(&self, images: Vec<ImageAsset>) {
        if !self.transition(CaptureSessionState::Processing) {
            return;
        }
        self.finish_batch(images).await;
    }

    /// The `Processing` step proper. The caller has already entered
    /// `Processing`.
    async fn finish_batch(&self, images: Vec<ImageAsset>) {
        let generation = self.generation();
        let finisher = self.inner.finisher;
        let finished = tokio::task::spawn_blocking(move || finisher.process(images))
            .await
            .map_err(|err| CaptureError::ProcessingFailed(err.to_string()))
            .and_then(|result| result);
        if !self.is_current(generation) {
            debug!("Session ended during processing; images dropped");
            return;
        }

        match finished {
            Ok(finished) => {
                info!(count = finished.len(), "Delivering finished images");
                self.emit(CaptureEvent::Finished(finished));
            }
            Err(err) => self.fail(err, false),
        }
        self.transition(CaptureSessionState::Running);
    }

    // -- Document scanner -----------------------------------------------------

    /// Present the platform document scanner and deliver its pages.
    ///
    /// The session passes through `Starting` and `Running` while the scanner
    /// is up and ends `Idle`. A cancelled scan emits `Cancelled`; a failed
    /// one emits the error and then `Cancelled`.
    #[instrument(skip(self))]
    pub async fn scan_documents(&self) {
        if !self.transition(CaptureSessionState::Starting) {
            return;
        }
        self.transition(CaptureSessionState::Running);
        let generation = self.generation();

        let bridge = Arc::clone(&self.inner.bridge);
        let scanned = tokio::task::spawn_blocking(move || bridge.scan())
            .await
            .map_err(|err| CaptureError::Bridge(err.to_string()))
            .and_then(|result| result);
        if !self.is_current(generation) {
            debug!("Session ended during scan; pages dropped");
            return;
        }

        match scanned {
            Ok(Some(pages)) if !pages.is_empty() => {
                info!(pages = pages.len(), "Document scan complete");
                self.deliver(pages).await;
            }
            Ok(_) => {
                debug!("Document scan cancelled");
                self.emit(CaptureEvent::Cancelled);
            }
            Err(err) => {
                let err = match err {
                    CaptureError::PlatformUnavailable => CaptureError::ScannerUnavailable,
                    other => other,
                };
                self.fail(err, true);
                self.emit(CaptureEvent::Cancelled);
            }
        }
        self.transition(CaptureSessionState::Idle);
    }

    // -- Internals ------------------------------------------------------------

    fn controls(&self) -> MutexGuard<'_, Controls> {
        self.inner
            .controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn end_generation(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether work begun under `generation` may still act on the session.
    fn is_current(&self, generation: u64) -> bool {
        !self.is_invalidated() && self.generation() == generation
    }

    fn still_starting(&self, generation: u64) -> bool {
        self.is_current(generation) && self.state() == CaptureSessionState::Starting
    }

    /// Queue a device stop and input detach behind any in-flight device job.
    fn release_device(&self) {
        let bridge = Arc::clone(&self.inner.bridge);
        self.inner.queue.submit(move || {
            bridge.stop_running();
            bridge.detach_input();
        });
    }

    fn with_crop<R>(&self, f: impl FnOnce(&mut PendingCrop) -> R) -> Option<R> {
        if self.state() != CaptureSessionState::AwaitingCrop {
            return None;
        }
        self.controls().crop.as_mut().map(f)
    }

    /// Apply `next` if the state machine allows it from the current state.
    /// Once invalidated only `Idle` is accepted.
    fn transition(&self, next: CaptureSessionState) -> bool {
        self.transition_if(|_| true, next)
    }

    /// Transition only out of `expected`, checked atomically with the move.
    fn transition_from(&self, expected: CaptureSessionState, next: CaptureSessionState) -> bool {
        self.transition_if(|state| state == expected, next)
    }

    fn transition_if(
        &self,
        accept: impl Fn(CaptureSessionState) -> bool,
        next: CaptureSessionState,
    ) -> bool {
        if next != CaptureSessionState::Idle && self.is_invalidated() {
            debug!(to = ?next, "Transition rejected after invalidation");
            return false;
        }
        let mut from = None;
        self.inner.state.send_if_modified(|state| {
            if accept(*state) && state.can_transition_to(next) {
                from = Some(*state);
                *state = next;
                true
            } else {
                debug!(from = ?*state, to = ?next, "Transition rejected");
                false
            }
        });
        if let Some(from) = from {
            debug!(?from, to = ?next, "Session state changed");
        }
        from.is_some()
    }

    /// Route captured or imported images: crop first when cropping is
    /// allowed, otherwise straight to delivery.
    async fn route(&self, mut images: Vec<ImageAsset>) {
        if images.is_empty() {
            self.transition(CaptureSessionState::Running);
            return;
        }
        if !self.inner.config.allows_post_capture_cropping {
            self.deliver(images).await;
            return;
        }
        if !self.transition(CaptureSessionState::AwaitingCrop) {
            return;
        }

        let source = images.remove(0);
        let mut controls = self.controls();
        let editor = CropEditor::new(default_crop_rect(controls.realtime_height));
        debug!(rect = ?editor.rect(), "Awaiting crop");
        controls.crop = Some(PendingCrop {
            editor,
            source,
            companions: images,
        });
    }

    fn effective_flash(&self) -> FlashMode {
        let controls = self.controls();
        if controls.flash_available {
            controls.flash_mode
        } else {
            FlashMode::Off
        }
    }

    fn stop_detection(&self) {
        if self.controls().detection.take().is_some() {
            debug!("Live detection stopped");
        }
        self.inner.detection.send_replace(None);
    }

    fn fail(&self, err: CaptureError, dismisses_flow: bool) {
        warn!(error = %err, dismisses_flow, "Capture flow error");
        self.emit(CaptureEvent::Failed(CaptureFailure::new(&err, dismisses_flow)));
    }

    fn emit(&self, event: CaptureEvent) {
        if self.is_invalidated() {
            debug!(?event, "Orchestrator invalidated; event dropped");
            return;
        }
        if self.inner.events.send(event).is_err() {
            debug!("Event receiver gone; event dropped");
        }
    }
}

/// Device-acquisition failures all read as `DeviceUnavailable`.
fn device_error(err: CaptureError) -> CaptureError {
    match err {
        CaptureError::DeviceUnavailable(_) => err,
        other => CaptureError::DeviceUnavailable(other.to_string()),
    }
}
