use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::geometry_utils::lerp;

/// What to do with the brightness while no hand is visible
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum HandLostMode {
    /// Keep the last commanded brightness
    #[default]
    Hold,
    /// Keep smoothing towards zero, as if the fingertips were touching
    FadeOut,
}

#[derive(Debug, Clone, Copy)]
pub struct SmoothSettings {
    /// EMA factor in (0,1]; 1.0 means no smoothing at all
    pub alpha: f32,
    pub hand_lost_mode: HandLostMode,
}

impl SmoothSettings {
    pub fn check(&self) -> Result<()> {
        if self.alpha > 0. && self.alpha <= 1. {
            Ok(())
        } else {
            Err(anyhow!(
                "Smoothing alpha must be in the range (0,1]; got {}",
                self.alpha
            ))
        }
    }
}

/// Exponential moving average of the normalised pinch signal.
/// Starts at 0, and stays within [0,1] as long as every input does.
pub struct BrightnessSmoother {
    settings: SmoothSettings,
    smoothed: f32,
}

impl BrightnessSmoother {
    pub fn new(settings: SmoothSettings) -> Result<Self> {
        settings.check()?;
        Ok(BrightnessSmoother {
            settings,
            smoothed: 0.,
        })
    }

    pub fn value(&self) -> f32 {
        self.smoothed
    }

    pub fn settings(&self) -> &SmoothSettings {
        &self.settings
    }

    /// Replace alpha and hand-lost mode; the current value is kept
    pub fn update_settings(&mut self, settings: SmoothSettings) -> Result<()> {
        settings.check()?;
        self.settings = settings;
        Ok(())
    }

    pub fn update(&mut self, raw: f32) -> f32 {
        self.smoothed = smooth(raw, self.smoothed, self.settings.alpha);
        self.smoothed
    }

    /// Called for a frame with no hand in it. Returns the new value if it
    /// changed as a result, i.e. only in FadeOut mode.
    pub fn hand_lost(&mut self) -> Option<f32> {
        match self.settings.hand_lost_mode {
            HandLostMode::Hold => None,
            HandLostMode::FadeOut => Some(self.update(0.)),
        }
    }
}

pub fn smooth(raw: f32, previous: f32, alpha: f32) -> f32 {
    lerp(previous, raw, alpha)
}
