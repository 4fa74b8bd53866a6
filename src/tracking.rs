use serde::{Deserialize, Serialize};

use crate::Point2D;

/// Hand landmark indices, as per the MediaPipe hand landmarker model
pub mod landmark_index {
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const PINKY_TIP: usize = 20;
}

/// Number of landmarks a complete hand is expected to have
pub const HAND_LANDMARK_COUNT: usize = landmark_index::PINKY_TIP + 1;

/// A single landmark, normalised to [0,1] relative to the frame dimensions.
/// The depth (`z`) is carried along but not used for pinch detection.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Keypoint { x, y, z: 0. }
    }

    pub fn position(&self) -> Point2D {
        (self.x, self.y)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HandLandmarks {
    #[serde(default)]
    pub handedness: String,
    #[serde(default = "default_score")]
    pub score: f32,
    pub landmarks: Vec<Keypoint>,
}

fn default_score() -> f32 {
    1.0
}

impl HandLandmarks {
    pub fn thumb_tip(&self) -> Option<&Keypoint> {
        self.landmarks.get(landmark_index::THUMB_TIP)
    }

    pub fn index_finger_tip(&self) -> Option<&Keypoint> {
        self.landmarks.get(landmark_index::INDEX_FINGER_TIP)
    }

    /// Both pinch keypoints (thumb tip, index fingertip), if the hand has them
    pub fn pinch_keypoints(&self) -> Option<(Keypoint, Keypoint)> {
        match (self.thumb_tip(), self.index_finger_tip()) {
            (Some(thumb), Some(index)) => Some((*thumb, *index)),
            _ => None,
        }
    }
}

/// The output of the (external) hand landmark detector for one camera frame
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DetectionFrame {
    #[serde(default)]
    pub hands: Vec<HandLandmarks>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What gets published for every frame where a pinch was measured
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PinchReading {
    pub distance: f32,
    pub raw: f32,
    pub brightness: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_with(count: usize) -> HandLandmarks {
        HandLandmarks {
            handedness: String::from("Right"),
            score: 0.9,
            landmarks: (0..count)
                .map(|i| Keypoint::new(i as f32 / 100., 0.5))
                .collect(),
        }
    }

    #[test]
    fn test_pinch_keypoints_full_hand() {
        let hand = hand_with(HAND_LANDMARK_COUNT);
        let (thumb, index) = hand.pinch_keypoints().unwrap();
        assert_eq!(thumb.position(), (0.04, 0.5));
        assert_eq!(index.position(), (0.08, 0.5));
    }

    #[test]
    fn test_pinch_keypoints_truncated_hand() {
        assert!(hand_with(5).pinch_keypoints().is_none());
        assert!(hand_with(9).pinch_keypoints().is_some());
    }

    #[test]
    fn test_parse_frame_json_without_optional_fields() {
        let frame: DetectionFrame =
            serde_json::from_str(r#"{"hands":[{"landmarks":[{"x":0.1,"y":0.2}]}]}"#).unwrap();
        assert_eq!(frame.hands.len(), 1);
        assert_eq!(frame.hands[0].score, 1.0);
        assert_eq!(frame.hands[0].landmarks[0], Keypoint::new(0.1, 0.2));
        assert!(frame.error.is_none());

        let empty: DetectionFrame = serde_json::from_str("{}").unwrap();
        assert!(empty.hands.is_empty());
    }
}
