use std::{fs, io::ErrorKind, time::Duration};

use log::{debug, error, info, warn};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    actuator::SerialSettings,
    firmata::PinSpec,
    frame_source::CameraHints,
    systems::{
        pinch::{MAX_DISTANCE, MIN_DISTANCE, PinchCalibration},
        smoothing::{HandLostMode, SmoothSettings},
    },
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum LandmarkSourceKind {
    /// Detection frames arrive as Tether messages
    Tether,
    /// JSON lines on stdin
    Stdin,
    /// JSON lines from a detector process we spawn
    Command,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    // -------- PINCH CALIBRATION
    /// Pinch distance (normalised frame units) at or below which brightness is 0
    pub min_distance: f32,

    /// Pinch distance at or above which brightness is 1
    pub max_distance: f32,

    // -------- SMOOTHING SETTINGS
    /// EMA factor in (0,1]; higher tracks faster but is noisier
    pub smoothing_alpha: f32,

    /// Either "hold" the last brightness when the hand is lost, or "fadeOut"
    pub hand_lost_mode: HandLostMode,

    // -------- DETECTION
    pub landmark_source: LandmarkSourceKind,

    /// Program + arguments for the "command" landmark source; arguments may
    /// contain {width}, {height} and {fps}
    pub detector_command: Vec<String>,

    /// Ignore hands detected with a lower score than this
    pub min_hand_score: f32,

    pub camera_width: u32,
    pub camera_height: u32,
    pub camera_fps: u32,

    // -------- HARDWARE
    pub serial_port: String,
    pub baud_rate: u32,

    /// Firmata pin definition, e.g. "d:3:p" for PWM on digital pin 3
    pub led_pin: String,

    /// How long (ms) to wait after opening the port before talking to the board
    pub board_setup_wait_ms: u64,

    // -------- OUTPUTS
    /// If enabled, do not publish every pinch reading on Tether
    pub skip_pinch_output: bool,
}

fn default_serial_port() -> String {
    if cfg!(windows) {
        String::from("COM8")
    } else {
        String::from("/dev/ttyACM0")
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            min_distance: MIN_DISTANCE,
            max_distance: MAX_DISTANCE,
            smoothing_alpha: 0.5,
            hand_lost_mode: HandLostMode::Hold,
            landmark_source: LandmarkSourceKind::Tether,
            detector_command: Vec::new(),
            min_hand_score: 0.5,
            camera_width: 600,
            camera_height: 500,
            camera_fps: 30,
            serial_port: default_serial_port(),
            baud_rate: 57600,
            led_pin: String::from("d:3:p"),
            board_setup_wait_ms: 5000,
            skip_pinch_output: false,
        }
    }
}

impl AgentConfig {
    pub fn calibration(&self) -> Result<PinchCalibration> {
        PinchCalibration::new(self.min_distance, self.max_distance)
    }

    pub fn smooth_settings(&self) -> SmoothSettings {
        SmoothSettings {
            alpha: self.smoothing_alpha,
            hand_lost_mode: self.hand_lost_mode,
        }
    }

    pub fn camera_hints(&self) -> CameraHints {
        CameraHints {
            width: self.camera_width,
            height: self.camera_height,
            fps: self.camera_fps,
        }
    }

    pub fn serial_settings(&self) -> SerialSettings<'_> {
        SerialSettings {
            port: &self.serial_port,
            baud_rate: self.baud_rate,
            pin: &self.led_pin,
            board_setup_wait: Duration::from_millis(self.board_setup_wait_ms),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.calibration()?;
        self.smooth_settings().check()?;
        self.led_pin
            .parse::<PinSpec>()
            .with_context(|| format!("bad ledPin \"{}\"", self.led_pin))?;
        if self.landmark_source == LandmarkSourceKind::Command && self.detector_command.is_empty()
        {
            return Err(anyhow!(
                "landmarkSource is \"command\" but no detectorCommand was given"
            ));
        }
        Ok(())
    }

    /// Hardware settings only take effect on restart
    pub fn needs_restart_from(&self, other: &AgentConfig) -> bool {
        self.serial_port != other.serial_port
            || self.baud_rate != other.baud_rate
            || self.led_pin != other.led_pin
            || self.landmark_source != other.landmark_source
            || self.detector_command != other.detector_command
    }

    pub fn parse_remote_config(payload: &[u8]) -> Result<AgentConfig> {
        let config = rmp_serde::from_slice::<AgentConfig>(payload)
            .map_err(|e| anyhow!("Failed to parse Config from message: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn write_config_to_file(&self, config_file_path: &str) -> Result<()> {
        debug!("Current state of config: {:?}", self);
        let text = serde_json::to_string_pretty(self)?;
        match fs::write(config_file_path, text) {
            Ok(()) => {
                info!("Wrote config to file: {:?}", config_file_path);
                Ok(())
            }
            Err(e) => {
                error!("Error writing config to file: {:?}", e);
                Err(anyhow!("failed to write {}: {}", config_file_path, e))
            }
        }
    }
}

/// Load config from disk; if there is no file yet, the defaults are written
/// there so they can be edited
pub fn load_config_from_file(config_file_path: &str) -> Result<AgentConfig> {
    let config = match fs::read_to_string(config_file_path) {
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(
                "Agent config file not found, will create one with defaults at {}",
                config_file_path
            );
            let config = AgentConfig::default();
            config.write_config_to_file(config_file_path)?;
            config
        }
        Err(e) => {
            return Err(anyhow!(
                "Failed to load config from {}: {}",
                config_file_path,
                e
            ));
        }
        Ok(s) => {
            info!("Loaded config OK from \"{}\"", config_file_path);
            let loaded = serde_json::from_str::<AgentConfig>(&s)
                .map_err(|e| anyhow!("Failed to parse config data: {}", e))?;
            debug!("Config parsed data from file: {:?}", &loaded);
            loaded
        }
    };
    config.validate()?;
    Ok(config)
}
