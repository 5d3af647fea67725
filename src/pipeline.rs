// src/pipeline.rs
//
// Frame pipeline: capture, perception, compositing and per-frame fan-out
// to the gesture detector and hit-test path. One iteration handles one
// frame snapshot end to end; a failed capture or inference abandons that
// iteration and the next tick starts clean.

use std::sync::Arc;

use anyhow::Result;
use image::{ImageBuffer, Rgba, RgbaImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::{CaptureError, PerceptionError};
use crate::game::GameController;
use crate::geometry;
use crate::gesture::{GestureDetector, GestureReading};
use crate::perception::{
    FrameAnalysis, HandTracker, PerceptionAdapter, PoseEstimator, SegmentationMask, Segmenter,
};
use crate::presentation::PresentationPort;

/// Capture abstraction: yields mirrored RGBA frames ready for self-view.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<RgbaImage, CaptureError>;
    fn dimensions(&self) -> (u32, u32);
}

impl FrameSource for Box<dyn FrameSource> {
    fn next_frame(&mut self) -> Result<RgbaImage, CaptureError> {
        (**self).next_frame()
    }

    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }
}

/// Webcam capture. Frames are decoded to RGBA and flipped horizontally
/// so the self-view reads as a mirror.
pub struct CameraSource {
    camera: Camera,
    width: u32,
    height: u32,
}

impl CameraSource {
    pub fn open(index: u32, width: u32, height: u32) -> Result<Self, CaptureError> {
        let format = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, 30);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Exact(format));
        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
        Ok(Self {
            camera,
            width,
            height,
        })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<RgbaImage, CaptureError> {
        let frame = self
            .camera
            .frame()
            .map_err(|e| CaptureError::Frame(e.to_string()))?;
        let decoded = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::Frame(e.to_string()))?;

        let (width, height) = (decoded.width(), decoded.height());
        let rgb = decoded.into_vec();
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for chunk in rgb.chunks(3) {
            rgba.extend_from_slice(chunk);
            rgba.push(255);
        }
        let img: RgbaImage = ImageBuffer::from_raw(width, height, rgba)
            .ok_or_else(|| CaptureError::Frame("frame buffer size mismatch".to_string()))?;
        Ok(image::imageops::flip_horizontal(&img))
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        let _ = self.camera.stop_stream();
    }
}

/// Synthetic frames for camera-less runs, paired with the synthetic
/// perception backends.
pub struct SimFrameSource {
    width: u32,
    height: u32,
}

impl SimFrameSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl FrameSource for SimFrameSource {
    fn next_frame(&mut self) -> Result<RgbaImage, CaptureError> {
        let (w, h) = (self.width, self.height);
        Ok(ImageBuffer::from_fn(w, h, |x, y| {
            let shade = ((x * 255 / w.max(1)) / 2 + (y * 255 / h.max(1)) / 2) as u8;
            Rgba([shade, shade, shade, 255])
        }))
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Cut the person out of the frame along the segmentation mask. Person
/// pixels keep the live frame; everything else takes the background
/// image, or becomes transparent when none is configured.
pub fn composite_cutout(
    frame: &RgbaImage,
    mask: &SegmentationMask,
    background: Option<&RgbaImage>,
) -> RgbaImage {
    let (width, height) = frame.dimensions();
    if mask.dimensions() != (width, height) {
        debug!("mask does not match frame dimensions, presenting raw frame");
        return frame.clone();
    }
    ImageBuffer::from_fn(width, height, |x, y| {
        if mask.is_person(x, y) {
            *frame.get_pixel(x, y)
        } else if let Some(bg) = background {
            let (bw, bh) = bg.dimensions();
            *bg.get_pixel(x * bw / width, y * bh / height)
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// Drives capture → perception → composite → gesture/hit-test at the
/// configured refresh rate.
pub struct Orchestrator<F, S, P, H> {
    source: F,
    perception: PerceptionAdapter<S, P, H>,
    gesture: GestureDetector,
    controller: GameController,
    presenter: Arc<dyn PresentationPort>,
    config: PipelineConfig,
    background: Option<RgbaImage>,
}

// Consecutive failed frame grabs tolerated before the loop concludes the
// camera is gone. Inference failures never count toward this.
const MAX_CONSECUTIVE_CAPTURE_FAILURES: u32 = 30;

impl<F, S, P, H> Orchestrator<F, S, P, H>
where
    F: FrameSource,
    S: Segmenter,
    P: PoseEstimator,
    H: HandTracker,
{
    pub fn new(
        source: F,
        perception: PerceptionAdapter<S, P, H>,
        gesture: GestureDetector,
        controller: GameController,
        presenter: Arc<dyn PresentationPort>,
        config: PipelineConfig,
    ) -> Self {
        let background = config.background_path.as_ref().and_then(|path| {
            match image::open(path) {
                Ok(img) => Some(img.to_rgba8()),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "background image unavailable");
                    None
                }
            }
        });
        Self {
            source,
            perception,
            gesture,
            controller,
            presenter,
            config,
            background,
        }
    }

    /// One frame through the whole pipeline.
    pub async fn iteration(&mut self) -> Result<()> {
        let frame = self.source.next_frame()?;
        let (frame_w, frame_h) = frame.dimensions();
        let analysis = self.perception.analyze(&frame).await?;

        let composited = composite_cutout(&frame, &analysis.mask, self.background.as_ref());
        self.presenter.show_frame(&composited);
        self.presenter.show_overlay(&analysis.poses, &analysis.hands);

        let canvas = self.presenter.canvas_rect();
        self.dispatch_gesture(&analysis, frame_w, frame_h);

        let mut points = Vec::new();
        for hand in &analysis.hands {
            points.extend(hand.screen_points(&canvas));
        }
        self.controller.on_hand_points(&points);
        Ok(())
    }

    fn dispatch_gesture(&self, analysis: &FrameAnalysis, frame_w: u32, frame_h: u32) {
        let reading = self.gesture.evaluate(&analysis.poses, frame_w as f32);
        // The anchor is detected in frame pixels; sessions work in
        // screen space.
        let canvas = self.presenter.canvas_rect();
        let mapped = GestureReading {
            is_ready_gesture: reading.is_ready_gesture,
            anchor_point: reading
                .anchor_point
                .map(|p| geometry::frame_to_screen(p, frame_w, frame_h, &canvas)),
        };
        self.controller.on_gesture(&mapped);
    }

    /// Run the loop. Inference failures drop the frame and are retried
    /// indefinitely; only a sustained run of failed frame grabs ends the
    /// loop, as the camera is the one collaborator the game cannot run
    /// without. Ticks that fall behind the refresh rate are coalesced
    /// rather than replayed.
    pub async fn run(mut self) -> Result<()> {
        let period = std::time::Duration::from_secs(1) / self.config.refresh_hz.max(1);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut consecutive_capture_failures = 0u32;
        loop {
            ticker.tick().await;
            match self.iteration().await {
                Ok(()) => consecutive_capture_failures = 0,
                Err(e) if e.downcast_ref::<PerceptionError>().is_some() => {
                    // The grab itself succeeded, so the camera is alive.
                    consecutive_capture_failures = 0;
                    warn!(error = %e, "inference failed, dropping frame");
                }
                Err(e) => {
                    consecutive_capture_failures += 1;
                    warn!(error = %e, "capture failed, dropping frame");
                    if consecutive_capture_failures >= MAX_CONSECUTIVE_CAPTURE_FAILURES {
                        return Err(e.context("camera stream lost"));
                    }
                }
            }
        }
    }
}
