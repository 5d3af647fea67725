// src/gesture.rs
//
// Praying-hands detector. Consumes one body pose per frame and reports
// whether the ready gesture is held, together with the wrist-pair
// midpoint that anchors the session. Only evaluated while the game is
// idle; the lifecycle controller ignores it in every other phase.

use nalgebra::Point2;

use crate::config::GestureConfig;
use crate::geometry;
use crate::perception::{KeypointName, Pose};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureReading {
    pub is_ready_gesture: bool,
    /// Wrist-pair midpoint in frame pixel space, present only when the
    /// gesture is held.
    pub anchor_point: Option<Point2<f32>>,
}

impl GestureReading {
    pub fn not_detected() -> Self {
        Self {
            is_ready_gesture: false,
            anchor_point: None,
        }
    }
}

pub struct GestureDetector {
    config: GestureConfig,
}

impl GestureDetector {
    pub fn new(config: GestureConfig) -> Self {
        Self { config }
    }

    /// Pick the pose to evaluate. With a single body that body wins; with
    /// several, the first one facing the camera (shoulders separated by
    /// more than the configured fraction of frame width), falling back to
    /// the highest average confidence.
    pub fn select_pose<'a>(&self, poses: &'a [Pose], frame_width: f32) -> Option<&'a Pose> {
        match poses {
            [] => None,
            [only] => Some(only),
            many => {
                let min_separation = self.config.min_shoulder_separation_frac * frame_width;
                many.iter()
                    .find(|p| p.shoulder_separation() > min_separation)
                    .or_else(|| {
                        many.iter().max_by(|a, b| {
                            a.average_confidence()
                                .partial_cmp(&b.average_confidence())
                                .unwrap_or(std::cmp::Ordering::Equal)
                        })
                    })
            }
        }
    }

    /// Evaluate the praying-hands conditions against one pose. A pose
    /// missing any required keypoint reads as "not detected", never as an
    /// error.
    pub fn detect(&self, pose: &Pose) -> GestureReading {
        let required = [
            KeypointName::LeftWrist,
            KeypointName::RightWrist,
            KeypointName::LeftShoulder,
            KeypointName::RightShoulder,
            KeypointName::Nose,
        ];
        if required
            .iter()
            .any(|&name| !pose.get(name).is_confident(self.config.confidence_floor))
        {
            return GestureReading::not_detected();
        }

        let left_wrist = pose.get(KeypointName::LeftWrist).point;
        let right_wrist = pose.get(KeypointName::RightWrist).point;
        let left_shoulder = pose.get(KeypointName::LeftShoulder).point;
        let right_shoulder = pose.get(KeypointName::RightShoulder).point;

        if geometry::distance(left_wrist, right_wrist) > self.config.wrist_closeness_px {
            return GestureReading::not_detected();
        }
        if (left_wrist.y - right_wrist.y).abs() > self.config.vertical_alignment_px {
            return GestureReading::not_detected();
        }

        let chest_center = geometry::midpoint(left_shoulder, right_shoulder);
        let hand_center = geometry::midpoint(left_wrist, right_wrist);
        if (hand_center.x - chest_center.x).abs() > self.config.chest_proximity_px
            || (hand_center.y - chest_center.y).abs() > self.config.chest_proximity_px
        {
            return GestureReading::not_detected();
        }

        GestureReading {
            is_ready_gesture: true,
            anchor_point: Some(hand_center),
        }
    }

    /// Select a pose and evaluate it in one step.
    pub fn evaluate(&self, poses: &[Pose], frame_width: f32) -> GestureReading {
        match self.select_pose(poses, frame_width) {
            Some(pose) => self.detect(pose),
            None => GestureReading::not_detected(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::Keypoint;

    // A pose with explicit wrist/shoulder placement, everything else at
    // low confidence so only the required keypoints matter.
    fn pose_with(
        left_wrist: (f32, f32),
        right_wrist: (f32, f32),
        left_shoulder: (f32, f32),
        right_shoulder: (f32, f32),
        confidence: f32,
    ) -> Pose {
        let mut keypoints =
            [Keypoint::new(0.0, 0.0, 0.1, KeypointName::Nose); KeypointName::COUNT];
        for name in KeypointName::ALL {
            keypoints[name as usize] = Keypoint::new(0.0, 0.0, 0.1, name);
        }
        let mut set = |name: KeypointName, (x, y): (f32, f32)| {
            keypoints[name as usize] = Keypoint::new(x, y, confidence, name);
        };
        set(KeypointName::LeftWrist, left_wrist);
        set(KeypointName::RightWrist, right_wrist);
        set(KeypointName::LeftShoulder, left_shoulder);
        set(KeypointName::RightShoulder, right_shoulder);
        set(KeypointName::Nose, (320.0, 100.0));
        Pose::new(keypoints)
    }

    #[test]
    fn praying_hands_close_and_centered_is_ready() {
        // Wrist distance 40px, vertical misalignment 10px, hand pair
        // center within 20px of chest center.
        let pose = pose_with(
            (300.0, 240.0),
            (338.7, 250.0),
            (280.0, 230.0),
            (360.0, 230.0),
            0.9,
        );
        let detector = GestureDetector::new(GestureConfig::default());
        let reading = detector.detect(&pose);
        assert!(reading.is_ready_gesture);
        let anchor = reading.anchor_point.expect("anchor present");
        assert!((anchor.x - 319.35).abs() < 0.01);
        assert!((anchor.y - 245.0).abs() < 0.01);
    }

    #[test]
    fn wide_apart_wrists_are_not_ready() {
        // Same placement, wrist distance 300px.
        let pose = pose_with(
            (170.0, 240.0),
            (470.0, 240.0),
            (280.0, 230.0),
            (360.0, 230.0),
            0.9,
        );
        let detector = GestureDetector::new(GestureConfig::default());
        let reading = detector.detect(&pose);
        assert!(!reading.is_ready_gesture);
        assert!(reading.anchor_point.is_none());
    }

    #[test]
    fn low_confidence_keypoints_read_as_not_detected() {
        let pose = pose_with(
            (300.0, 240.0),
            (330.0, 245.0),
            (280.0, 230.0),
            (360.0, 230.0),
            0.1,
        );
        let detector = GestureDetector::new(GestureConfig::default());
        assert!(!detector.detect(&pose).is_ready_gesture);
    }

    #[test]
    fn vertical_misalignment_rejects() {
        let config = GestureConfig::default();
        let pose = pose_with(
            (300.0, 200.0),
            (330.0, 200.0 + config.vertical_alignment_px + 1.0),
            (280.0, 230.0),
            (360.0, 230.0),
            0.9,
        );
        assert!(!GestureDetector::new(config).detect(&pose).is_ready_gesture);
    }

    #[test]
    fn hands_far_from_chest_reject() {
        let pose = pose_with(
            (300.0, 440.0),
            (330.0, 445.0),
            (280.0, 230.0),
            (360.0, 230.0),
            0.9,
        );
        let detector = GestureDetector::new(GestureConfig::default());
        assert!(!detector.detect(&pose).is_ready_gesture);
    }

    #[test]
    fn selects_forward_facing_pose_among_several() {
        let sideways = pose_with(
            (100.0, 240.0),
            (120.0, 240.0),
            (100.0, 230.0),
            (140.0, 230.0), // 40px separation, under 15% of 640
            0.9,
        );
        let facing = pose_with(
            (300.0, 240.0),
            (330.0, 245.0),
            (280.0, 230.0),
            (400.0, 230.0), // 120px separation
            0.9,
        );
        let detector = GestureDetector::new(GestureConfig::default());
        let poses = vec![sideways, facing];
        let selected = detector.select_pose(&poses, 640.0).expect("pose");
        assert!((selected.shoulder_separation() - 120.0).abs() < 0.01);
    }

    #[test]
    fn no_poses_reads_as_not_detected() {
        let detector = GestureDetector::new(GestureConfig::default());
        assert!(!detector.evaluate(&[], 640.0).is_ready_gesture);
    }
}
