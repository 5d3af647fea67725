// src/perception.rs
//
// Uniform per-frame contract over the three inference collaborators:
// person segmentation, body pose estimation and hand landmark tracking.
// The models themselves are external; everything here is the boundary.

pub mod sim;

use image::RgbaImage;
use nalgebra::Point2;

use crate::error::PerceptionError;
use crate::geometry::{self, Rect};

/// MoveNet 17-keypoint order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointName {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointName {
    pub const COUNT: usize = 17;

    pub const ALL: [KeypointName; Self::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];
}

/// Adjacent keypoint pairs for skeleton overlays.
pub const POSE_ADJACENCY: [(usize, usize); 16] = [
    (0, 1),
    (0, 2),
    (1, 3),
    (2, 4),
    (5, 7),
    (7, 9),
    (6, 8),
    (8, 10),
    (5, 6),
    (5, 11),
    (6, 12),
    (11, 12),
    (11, 13),
    (13, 15),
    (12, 14),
    (14, 16),
];

/// A single keypoint in frame pixel space. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub point: Point2<f32>,
    pub confidence: f32,
    pub name: KeypointName,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32, name: KeypointName) -> Self {
        Self {
            point: Point2::new(x, y),
            confidence,
            name,
        }
    }

    pub fn is_confident(&self, floor: f32) -> bool {
        self.confidence >= floor
    }
}

/// Ordered keypoints for one detected body. No identity across frames.
#[derive(Debug, Clone)]
pub struct Pose {
    pub keypoints: [Keypoint; KeypointName::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; KeypointName::COUNT]) -> Self {
        Self { keypoints }
    }

    pub fn get(&self, name: KeypointName) -> &Keypoint {
        &self.keypoints[name as usize]
    }

    pub fn average_confidence(&self) -> f32 {
        let sum: f32 = self.keypoints.iter().map(|k| k.confidence).sum();
        sum / KeypointName::COUNT as f32
    }

    /// Horizontal shoulder separation in frame pixels.
    pub fn shoulder_separation(&self) -> f32 {
        let l = self.get(KeypointName::LeftShoulder);
        let r = self.get(KeypointName::RightShoulder);
        (l.point.x - r.point.x).abs()
    }
}

/// MediaPipe hand landmark count and the indices used by this crate.
pub const HAND_LANDMARK_COUNT: usize = 21;

pub mod hand_landmark {
    pub const WRIST: usize = 0;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_TIP: usize = 16;
    pub const PINKY_TIP: usize = 20;
}

/// Connection pairs for hand overlays.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (13, 17),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
];

/// 21 normalized landmarks for one detected hand.
#[derive(Debug, Clone)]
pub struct HandLandmarks {
    points: Vec<Point2<f32>>,
}

impl HandLandmarks {
    pub fn new(points: Vec<Point2<f32>>) -> Result<Self, PerceptionError> {
        if points.len() != HAND_LANDMARK_COUNT {
            return Err(PerceptionError::Malformed(format!(
                "expected {} hand landmarks, got {}",
                HAND_LANDMARK_COUNT,
                points.len()
            )));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point2<f32>] {
        &self.points
    }

    /// Every landmark mapped into screen space against the canvas rect.
    pub fn screen_points(&self, rect: &Rect) -> Vec<Point2<f32>> {
        self.points
            .iter()
            .map(|p| geometry::norm_to_screen(p.x, p.y, rect))
            .collect()
    }
}

/// Per-pixel person/background classification aligned to frame dimensions.
#[derive(Debug, Clone)]
pub struct SegmentationMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl SegmentationMask {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PerceptionError> {
        if data.len() != (width * height) as usize {
            return Err(PerceptionError::Malformed(format!(
                "mask size {} does not match {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_person(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[(y * self.width + x) as usize] != 0
    }

    pub fn person_pixel_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoseOptions {
    pub score_threshold: f32,
    pub max_poses: usize,
}

impl Default for PoseOptions {
    fn default() -> Self {
        Self {
            score_threshold: 0.3,
            max_poses: 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HandOptions {
    pub max_hands: usize,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for HandOptions {
    fn default() -> Self {
        Self {
            max_hands: 2,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait Segmenter: Send {
    async fn segment(&mut self, frame: &RgbaImage) -> Result<SegmentationMask, PerceptionError>;
}

#[allow(async_fn_in_trait)]
pub trait PoseEstimator: Send {
    async fn estimate_poses(
        &mut self,
        frame: &RgbaImage,
        opts: &PoseOptions,
    ) -> Result<Vec<Pose>, PerceptionError>;
}

#[allow(async_fn_in_trait)]
pub trait HandTracker: Send {
    async fn track_hands(
        &mut self,
        frame: &RgbaImage,
        opts: &HandOptions,
    ) -> Result<Vec<HandLandmarks>, PerceptionError>;
}

/// Callback sink for hand results, covering the deployment mode where
/// landmarks arrive via a registered callback instead of a direct return.
pub type HandSink = Box<dyn FnMut(&[HandLandmarks]) + Send>;

/// Everything the perception adapter produced for one frame.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub mask: SegmentationMask,
    pub poses: Vec<Pose>,
    pub hands: Vec<HandLandmarks>,
}

/// Issues the three logically parallel inference requests against one
/// frame snapshot. Completion order does not matter; a single failure
/// abandons the whole iteration.
pub struct PerceptionAdapter<S, P, H> {
    segmenter: S,
    poses: P,
    hands: H,
    pose_opts: PoseOptions,
    hand_opts: HandOptions,
    hand_sink: Option<HandSink>,
}

impl<S: Segmenter, P: PoseEstimator, H: HandTracker> PerceptionAdapter<S, P, H> {
    pub fn new(
        segmenter: S,
        poses: P,
        hands: H,
        pose_opts: PoseOptions,
        hand_opts: HandOptions,
    ) -> Self {
        Self {
            segmenter,
            poses,
            hands,
            pose_opts,
            hand_opts,
            hand_sink: None,
        }
    }

    pub fn set_hand_sink(&mut self, sink: HandSink) {
        self.hand_sink = Some(sink);
    }

    pub async fn analyze(&mut self, frame: &RgbaImage) -> Result<FrameAnalysis, PerceptionError> {
        let (mask, poses, hands) = tokio::try_join!(
            self.segmenter.segment(frame),
            self.poses.estimate_poses(frame, &self.pose_opts),
            self.hands.track_hands(frame, &self.hand_opts),
        )?;
        if let Some(sink) = self.hand_sink.as_mut() {
            sink(&hands);
        }
        Ok(FrameAnalysis { mask, poses, hands })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_landmarks_reject_wrong_count() {
        let points = vec![Point2::new(0.5, 0.5); 20];
        assert!(HandLandmarks::new(points).is_err());
        let points = vec![Point2::new(0.5, 0.5); 21];
        assert!(HandLandmarks::new(points).is_ok());
    }

    #[test]
    fn hand_screen_points_use_canvas_rect() {
        let mut points = vec![Point2::new(0.0, 0.0); 21];
        points[hand_landmark::INDEX_TIP] = Point2::new(0.5, 0.5);
        let hand = HandLandmarks::new(points).expect("21 landmarks");
        let rect = Rect::new(0.0, 0.0, 640.0, 480.0);
        let screen = hand.screen_points(&rect);
        assert_eq!(screen.len(), 21);
        assert_eq!(screen[hand_landmark::INDEX_TIP], Point2::new(320.0, 240.0));
    }

    #[test]
    fn mask_rejects_mismatched_dimensions() {
        assert!(SegmentationMask::new(4, 4, vec![0; 15]).is_err());
        let mask = SegmentationMask::new(4, 4, vec![0; 16]).expect("aligned");
        assert!(!mask.is_person(0, 0));
        assert!(!mask.is_person(10, 10));
    }

    #[test]
    fn mask_person_lookup() {
        let mut data = vec![0u8; 16];
        data[5] = 1; // (x=1, y=1)
        let mask = SegmentationMask::new(4, 4, data).expect("aligned");
        assert!(mask.is_person(1, 1));
        assert!(!mask.is_person(2, 1));
        assert_eq!(mask.person_pixel_count(), 1);
    }

    #[test]
    fn pose_shoulder_separation() {
        let pose = sim::standing_pose(640, 480, 0.0);
        assert!(pose.shoulder_separation() > 0.15 * 640.0);
    }
}
