// src/perception/sim.rs
//
// Deterministic synthetic perception backends. They stand in for the real
// models so the pipeline runs end to end without any inference runtime,
// and they drive the praying-hands gesture periodically so a session
// starts by itself in demo runs.

use image::RgbaImage;
use nalgebra::Point2;

use super::{
    HandLandmarks, HandOptions, HandTracker, Keypoint, KeypointName, Pose, PoseEstimator,
    PoseOptions, SegmentationMask, Segmenter, HAND_LANDMARK_COUNT,
};
use crate::error::PerceptionError;

/// A standing figure in frame pixel space. `clasp` in [0, 1] moves the
/// wrists from a resting position toward a palms-together position in
/// front of the chest.
pub fn standing_pose(width: u32, height: u32, clasp: f32) -> Pose {
    let w = width as f32;
    let h = height as f32;
    let clasp = clasp.clamp(0.0, 1.0);

    let (lw, rw) = wrist_positions(width, height, clasp);

    let mut keypoints = [Keypoint::new(0.0, 0.0, 0.0, KeypointName::Nose); KeypointName::COUNT];
    let mut set = |name: KeypointName, x: f32, y: f32, confidence: f32| {
        keypoints[name as usize] = Keypoint::new(x, y, confidence, name);
    };

    set(KeypointName::Nose, 0.5 * w, 0.22 * h, 0.9);
    set(KeypointName::LeftEye, 0.47 * w, 0.20 * h, 0.6);
    set(KeypointName::RightEye, 0.53 * w, 0.20 * h, 0.6);
    set(KeypointName::LeftEar, 0.44 * w, 0.21 * h, 0.5);
    set(KeypointName::RightEar, 0.56 * w, 0.21 * h, 0.5);
    set(KeypointName::LeftShoulder, 0.38 * w, 0.35 * h, 0.9);
    set(KeypointName::RightShoulder, 0.62 * w, 0.35 * h, 0.9);
    set(KeypointName::LeftElbow, 0.33 * w, 0.48 * h, 0.7);
    set(KeypointName::RightElbow, 0.67 * w, 0.48 * h, 0.7);
    set(KeypointName::LeftWrist, lw.x, lw.y, 0.85);
    set(KeypointName::RightWrist, rw.x, rw.y, 0.85);
    set(KeypointName::LeftHip, 0.42 * w, 0.62 * h, 0.8);
    set(KeypointName::RightHip, 0.58 * w, 0.62 * h, 0.8);
    set(KeypointName::LeftKnee, 0.42 * w, 0.80 * h, 0.7);
    set(KeypointName::RightKnee, 0.58 * w, 0.80 * h, 0.7);
    set(KeypointName::LeftAnkle, 0.42 * w, 0.96 * h, 0.6);
    set(KeypointName::RightAnkle, 0.58 * w, 0.96 * h, 0.6);

    Pose::new(keypoints)
}

/// Wrist positions for the synthetic figure, in frame pixels.
pub fn wrist_positions(width: u32, height: u32, clasp: f32) -> (Point2<f32>, Point2<f32>) {
    let w = width as f32;
    let h = height as f32;
    let lerp = |a: f32, b: f32| a + (b - a) * clasp;
    let left = Point2::new(lerp(0.36 * w, 0.5 * w - 8.0), lerp(0.58 * h, 0.42 * h));
    let right = Point2::new(lerp(0.64 * w, 0.5 * w + 8.0), lerp(0.58 * h, 0.42 * h));
    (left, right)
}

fn clasp_for_tick(tick: u64) -> f32 {
    let t = tick as f32 * 0.033;
    let s = (t * 0.4).sin();
    ((s - 0.6) / 0.4).clamp(0.0, 1.0)
}

/// Person mask: an upright ellipse in the middle of the frame.
#[derive(Debug, Default)]
pub struct SimSegmenter;

impl SimSegmenter {
    pub fn new() -> Self {
        Self
    }
}

impl Segmenter for SimSegmenter {
    async fn segment(&mut self, frame: &RgbaImage) -> Result<SegmentationMask, PerceptionError> {
        let (width, height) = frame.dimensions();
        let cx = width as f32 / 2.0;
        let cy = height as f32 * 0.55;
        let rx = width as f32 * 0.18;
        let ry = height as f32 * 0.38;

        let mut data = vec![0u8; (width * height) as usize];
        for y in 0..height {
            for x in 0..width {
                let dx = (x as f32 - cx) / rx;
                let dy = (y as f32 - cy) / ry;
                if dx * dx + dy * dy <= 1.0 {
                    data[(y * width + x) as usize] = 1;
                }
            }
        }
        SegmentationMask::new(width, height, data)
    }
}

/// One synthetic body whose wrists periodically come together in the
/// praying-hands position.
#[derive(Debug, Default)]
pub struct SimPoseEstimator {
    tick: u64,
}

impl SimPoseEstimator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PoseEstimator for SimPoseEstimator {
    async fn estimate_poses(
        &mut self,
        frame: &RgbaImage,
        opts: &PoseOptions,
    ) -> Result<Vec<Pose>, PerceptionError> {
        let (width, height) = frame.dimensions();
        let clasp = clasp_for_tick(self.tick);
        self.tick += 1;

        let pose = standing_pose(width, height, clasp);
        if pose.average_confidence() < opts.score_threshold {
            return Ok(Vec::new());
        }
        Ok(vec![pose])
    }
}

/// Two synthetic hands riding on the figure's wrists.
#[derive(Debug, Default)]
pub struct SimHandTracker {
    tick: u64,
}

impl SimHandTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn hand_at(center: Point2<f32>, width: u32, height: u32) -> HandLandmarks {
        let w = width as f32;
        let h = height as f32;
        let points = (0..HAND_LANDMARK_COUNT)
            .map(|i| {
                // Small deterministic splay around the wrist.
                let angle = i as f32 * 0.3;
                let reach = 4.0 + (i % 5) as f32 * 6.0;
                Point2::new(
                    (center.x + angle.cos() * reach) / w,
                    (center.y + angle.sin() * reach) / h,
                )
            })
            .collect();
        HandLandmarks::new(points).expect("synthetic hand has 21 landmarks")
    }
}

impl HandTracker for SimHandTracker {
    async fn track_hands(
        &mut self,
        frame: &RgbaImage,
        opts: &HandOptions,
    ) -> Result<Vec<HandLandmarks>, PerceptionError> {
        let (width, height) = frame.dimensions();
        let clasp = clasp_for_tick(self.tick);
        self.tick += 1;

        let (left, right) = wrist_positions(width, height, clasp);
        let mut hands = vec![
            Self::hand_at(left, width, height),
            Self::hand_at(right, width, height),
        ];
        hands.truncate(opts.max_hands);
        Ok(hands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::PerceptionAdapter;

    fn frame() -> RgbaImage {
        RgbaImage::new(64, 48)
    }

    #[tokio::test]
    async fn segmenter_marks_a_person_region() {
        let mut seg = SimSegmenter::new();
        let mask = seg.segment(&frame()).await.expect("mask");
        assert_eq!(mask.dimensions(), (64, 48));
        assert!(mask.person_pixel_count() > 0);
        assert!(mask.is_person(32, 26));
        assert!(!mask.is_person(0, 0));
    }

    #[tokio::test]
    async fn hand_tracker_honors_max_hands() {
        let mut tracker = SimHandTracker::new();
        let opts = HandOptions {
            max_hands: 1,
            ..Default::default()
        };
        let hands = tracker.track_hands(&frame(), &opts).await.expect("hands");
        assert_eq!(hands.len(), 1);
    }

    #[tokio::test]
    async fn adapter_joins_all_three_and_feeds_the_sink() {
        let mut adapter = PerceptionAdapter::new(
            SimSegmenter::new(),
            SimPoseEstimator::new(),
            SimHandTracker::new(),
            PoseOptions::default(),
            HandOptions::default(),
        );
        let seen = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let sink_seen = seen.clone();
        adapter.set_hand_sink(Box::new(move |hands| {
            sink_seen.fetch_add(hands.len(), std::sync::atomic::Ordering::SeqCst);
        }));

        let analysis = adapter.analyze(&frame()).await.expect("analysis");
        assert_eq!(analysis.poses.len(), 1);
        assert_eq!(analysis.hands.len(), 2);
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn clasp_reaches_full_praying_position() {
        let max = (0u64..600).map(clasp_for_tick).fold(0.0f32, f32::max);
        assert!(max > 0.99);
    }
}
