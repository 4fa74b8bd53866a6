use anyhow::{Error, Result};
use log::info;

use crate::{
    actuator::ActuatorSink,
    systems::{
        SignalPipeline, pinch::PinchCalibration, presence::HandPresence,
        smoothing::SmoothSettings,
    },
    tracking::{HandLandmarks, PinchReading},
};

/// What happened during one pass of the control loop
#[derive(Debug, Default)]
pub struct StepOutcome {
    pub reading: Option<PinchReading>,
    /// The value sent to the actuator, if anything was sent
    pub command: Option<f32>,
    pub presence_changed: Option<bool>,
    /// Set if sending `command` failed; the rest of the outcome still holds
    pub write_error: Option<Error>,
}

/// Everything the control loop needs to carry from one frame to the next:
/// the signal pipeline (with its smoothed value) and the actuator handle
pub struct PinchController<A: ActuatorSink> {
    pipeline: SignalPipeline,
    actuator: A,
    presence: HandPresence,
}

impl<A: ActuatorSink> PinchController<A> {
    pub fn new(pipeline: SignalPipeline, actuator: A) -> Self {
        PinchController {
            pipeline,
            actuator,
            presence: HandPresence::default(),
        }
    }

    pub fn smoothed(&self) -> f32 {
        self.pipeline.smoothed()
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn update_settings(
        &mut self,
        calibration: PinchCalibration,
        smooth_settings: SmoothSettings,
    ) -> Result<()> {
        self.pipeline.update_settings(calibration, smooth_settings)?;
        info!(
            "Pipeline settings now: {:?}, {:?}",
            self.pipeline.calibration(),
            self.pipeline.smooth_settings()
        );
        Ok(())
    }

    /// Run one frame's worth of detection result through the pipeline and on
    /// to the actuator. With no hand, the pipeline is not invoked and (in Hold
    /// mode) nothing is written, so the LED keeps its last brightness.
    pub fn step(&mut self, hand: Option<&HandLandmarks>) -> StepOutcome {
        let reading = hand.and_then(|h| self.pipeline.process_hand(h));
        let presence_changed = self.presence.update(reading.is_some());

        let command = match reading {
            Some(r) => Some(r.brightness),
            None => self.pipeline.hand_lost(),
        };

        let write_error = command.and_then(|value| self.actuator.write(value).err());

        StepOutcome {
            reading,
            command,
            presence_changed,
            write_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        systems::smoothing::HandLostMode,
        tracking::{HAND_LANDMARK_COUNT, Keypoint, landmark_index},
    };

    #[derive(Default)]
    struct RecordingSink {
        written: Vec<f32>,
    }

    impl ActuatorSink for RecordingSink {
        fn write(&mut self, value: f32) -> Result<()> {
            self.written.push(value);
            Ok(())
        }
    }

    struct FailingSink;

    impl ActuatorSink for FailingSink {
        fn write(&mut self, _value: f32) -> Result<()> {
            Err(anyhow::anyhow!("serial port unplugged"))
        }
    }

    fn controller(mode: HandLostMode) -> PinchController<RecordingSink> {
        let pipeline = SignalPipeline::new(
            PinchCalibration::default(),
            SmoothSettings {
                alpha: 0.5,
                hand_lost_mode: mode,
            },
        )
        .unwrap();
        PinchController::new(pipeline, RecordingSink::default())
    }

    fn hand(thumb: (f32, f32), index: (f32, f32)) -> HandLandmarks {
        let mut landmarks = vec![Keypoint::default(); HAND_LANDMARK_COUNT];
        landmarks[landmark_index::THUMB_TIP] = Keypoint::new(thumb.0, thumb.1);
        landmarks[landmark_index::INDEX_FINGER_TIP] = Keypoint::new(index.0, index.1);
        HandLandmarks {
            handedness: String::from("Right"),
            score: 0.95,
            landmarks,
        }
    }

    #[test]
    fn test_wide_pinch_written_to_actuator() {
        let mut c = controller(HandLostMode::Hold);
        let wide = hand((0.1, 0.5), (0.6, 0.5));

        let first = c.step(Some(&wide));
        assert_eq!(first.command, Some(0.5));
        assert_eq!(first.presence_changed, Some(true));
        assert_eq!(first.reading.unwrap().raw, 1.);

        let second = c.step(Some(&wide));
        assert_eq!(second.command, Some(0.75));
        assert_eq!(second.presence_changed, None);

        assert_eq!(c.actuator().written, vec![0.5, 0.75]);
    }

    #[test]
    fn test_no_hand_holds_last_value() {
        let mut c = controller(HandLostMode::Hold);
        c.step(Some(&hand((0.1, 0.5), (0.6, 0.5))));
        for _ in 0..10 {
            let outcome = c.step(None);
            assert_eq!(outcome.command, None);
            assert!(outcome.reading.is_none());
        }
        assert_eq!(c.smoothed(), 0.5);
        assert_eq!(c.actuator().written, vec![0.5]);
    }

    #[test]
    fn test_no_hand_from_start_writes_nothing() {
        let mut c = controller(HandLostMode::Hold);
        let outcome = c.step(None);
        assert!(outcome.reading.is_none());
        assert_eq!(outcome.command, None);
        assert_eq!(outcome.presence_changed, None);
        assert!(outcome.write_error.is_none());
        assert_eq!(c.smoothed(), 0.);
        assert!(c.actuator().written.is_empty());
    }

    #[test]
    fn test_no_hand_fade_out() {
        let mut c = controller(HandLostMode::FadeOut);
        c.step(Some(&hand((0.1, 0.5), (0.6, 0.5))));
        c.step(None);
        c.step(None);
        assert_eq!(c.actuator().written, vec![0.5, 0.25, 0.125]);
    }

    #[test]
    fn test_touching_fingertips_drive_to_zero() {
        let mut c = controller(HandLostMode::Hold);
        c.step(Some(&hand((0.1, 0.5), (0.6, 0.5))));
        let outcome = c.step(Some(&hand((0.3, 0.5), (0.3, 0.5))));
        let reading = outcome.reading.unwrap();
        assert_eq!(reading.distance, 0.);
        assert_eq!(reading.raw, 0.);
        assert_eq!(outcome.command, Some(0.25));
    }

    #[test]
    fn test_update_settings_mid_run() {
        let mut c = controller(HandLostMode::Hold);
        c.step(Some(&hand((0.1, 0.5), (0.6, 0.5))));
        c.update_settings(
            PinchCalibration::default(),
            SmoothSettings {
                alpha: 1.0,
                hand_lost_mode: HandLostMode::Hold,
            },
        )
        .unwrap();
        assert_eq!(c.smoothed(), 0.5);
        let outcome = c.step(Some(&hand((0.3, 0.5), (0.3, 0.5))));
        assert_eq!(outcome.command, Some(0.));
    }

    #[test]
    fn test_presence_reported_even_when_write_fails() {
        let pipeline = SignalPipeline::new(
            PinchCalibration::default(),
            SmoothSettings {
                alpha: 0.5,
                hand_lost_mode: HandLostMode::Hold,
            },
        )
        .unwrap();
        let mut c = PinchController::new(pipeline, FailingSink);

        let outcome = c.step(Some(&hand((0.1, 0.5), (0.6, 0.5))));
        assert_eq!(outcome.presence_changed, Some(true));
        assert!(outcome.reading.is_some());
        let err = outcome.write_error.unwrap();
        assert!(err.to_string().contains("unplugged"));

        let outcome = c.step(Some(&hand((0.1, 0.5), (0.6, 0.5))));
        assert_eq!(outcome.presence_changed, None);
        assert!(outcome.write_error.is_some());
    }
}
