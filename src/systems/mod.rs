pub mod pinch;
pub mod presence;
pub mod smoothing;

use anyhow::Result;
use log::debug;
use pinch::{PinchCalibration, pinch_distance};
use smoothing::{BrightnessSmoother, SmoothSettings, smooth};

use crate::tracking::{HandLandmarks, Keypoint, PinchReading};

/// The whole signal chain in one pure function: pinch distance, normalised,
/// then blended with the previous output. Callers keep the result and pass it
/// back in as `previous_smoothed` next time.
pub fn compute_command(
    thumb: &Keypoint,
    index: &Keypoint,
    previous_smoothed: f32,
    alpha: f32,
    calibration: &PinchCalibration,
) -> f32 {
    let raw = calibration.normalise(pinch_distance(thumb, index));
    smooth(raw, previous_smoothed, alpha)
}

/// Signal pipeline with its retained state (the smoothed brightness)
pub struct SignalPipeline {
    calibration: PinchCalibration,
    smoother: BrightnessSmoother,
}

impl SignalPipeline {
    pub fn new(calibration: PinchCalibration, smooth_settings: SmoothSettings) -> Result<Self> {
        Ok(SignalPipeline {
            calibration,
            smoother: BrightnessSmoother::new(smooth_settings)?,
        })
    }

    pub fn smoothed(&self) -> f32 {
        self.smoother.value()
    }

    pub fn calibration(&self) -> &PinchCalibration {
        &self.calibration
    }

    pub fn smooth_settings(&self) -> &SmoothSettings {
        self.smoother.settings()
    }

    /// Swap in new calibration and smoothing settings without resetting the
    /// smoothed value
    pub fn update_settings(
        &mut self,
        calibration: PinchCalibration,
        smooth_settings: SmoothSettings,
    ) -> Result<()> {
        self.smoother.update_settings(smooth_settings)?;
        self.calibration = calibration;
        Ok(())
    }

    pub fn process_keypoints(&mut self, thumb: &Keypoint, index: &Keypoint) -> PinchReading {
        let distance = pinch_distance(thumb, index);
        let raw = self.calibration.normalise(distance);
        let brightness = self.smoother.update(raw);
        debug!("Distance: {:.4}, PWM: {:.4}", distance, brightness);
        PinchReading {
            distance,
            raw,
            brightness,
        }
    }

    /// Returns None (and leaves the state untouched) if the hand is missing
    /// either of the pinch keypoints
    pub fn process_hand(&mut self, hand: &HandLandmarks) -> Option<PinchReading> {
        let (thumb, index) = hand.pinch_keypoints()?;
        Some(self.process_keypoints(&thumb, &index))
    }

    /// No hand this frame; see [smoothing::HandLostMode]
    pub fn hand_lost(&mut self) -> Option<f32> {
        self.smoother.hand_lost()
    }
}

#[cfg(test)]
mod tests {
    use super::smoothing::HandLostMode;
    use super::*;

    fn pipeline() -> SignalPipeline {
        SignalPipeline::new(
            PinchCalibration::default(),
            SmoothSettings {
                alpha: 0.5,
                hand_lost_mode: HandLostMode::Hold,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_compute_command_touching_fingertips() {
        let p = Keypoint::new(0.30, 0.50);
        assert_eq!(
            compute_command(&p, &p, 0., 0.5, &PinchCalibration::default()),
            0.
        );
        assert_eq!(
            compute_command(&p, &p, 0.8, 0.5, &PinchCalibration::default()),
            0.4
        );
    }

    #[test]
    fn test_compute_command_wide_pinch_converges() {
        let thumb = Keypoint::new(0.1, 0.5);
        let index = Keypoint::new(0.6, 0.5);
        let calibration = PinchCalibration::default();
        let first = compute_command(&thumb, &index, 0., 0.5, &calibration);
        assert_eq!(first, 0.5);
        let second = compute_command(&thumb, &index, first, 0.5, &calibration);
        assert_eq!(second, 0.75);
    }

    #[test]
    fn test_pipeline_reading_mid_range() {
        let mut p = pipeline();
        let reading = p.process_keypoints(&Keypoint::new(0.2, 0.5), &Keypoint::new(0.4, 0.5));
        assert!((reading.distance - 0.2).abs() < 1e-5);
        assert!((reading.raw - 0.5).abs() < 1e-5);
        assert!((reading.brightness - 0.25).abs() < 1e-5);
        assert_eq!(p.smoothed(), reading.brightness);
    }

    #[test]
    fn test_incomplete_hand_leaves_state_alone() {
        let mut p = pipeline();
        p.process_keypoints(&Keypoint::new(0., 0.), &Keypoint::new(1., 0.));
        let hand = HandLandmarks {
            handedness: String::new(),
            score: 1.,
            landmarks: vec![Keypoint::new(0., 0.); 4],
        };
        assert!(p.process_hand(&hand).is_none());
        assert_eq!(p.smoothed(), 0.5);
    }

    #[test]
    fn test_update_settings_keeps_smoothed_value() {
        let mut p = pipeline();
        p.process_keypoints(&Keypoint::new(0., 0.), &Keypoint::new(1., 0.));
        p.update_settings(
            PinchCalibration::new(0.1, 0.2).unwrap(),
            SmoothSettings {
                alpha: 1.0,
                hand_lost_mode: HandLostMode::FadeOut,
            },
        )
        .unwrap();
        assert_eq!(p.smoothed(), 0.5);
        assert_eq!(p.calibration().max_distance(), 0.2);
        assert_eq!(p.hand_lost(), Some(0.));
    }

    #[test]
    fn test_update_settings_rejects_bad_alpha() {
        let mut p = pipeline();
        assert!(
            p.update_settings(
                PinchCalibration::default(),
                SmoothSettings {
                    alpha: 0.,
                    hand_lost_mode: HandLostMode::Hold,
                },
            )
            .is_err()
        );
        assert_eq!(p.smooth_settings().alpha, 0.5);
    }
}
