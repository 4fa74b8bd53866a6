use std::net::{IpAddr, Ipv4Addr};

use clap::Parser;

use crate::agent_config::LandmarkSourceKind;

// Some defaults; some of which can be overriden via CLI args
const CONFIG_FILE_PATH: &str = "./pinchLed.json";
const TETHER_HOST: std::net::IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));

const AGENT_ROLE: &str = "pinchLed";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Where to load agent config (calibration, smoothing, hardware)
    #[arg(long="configPath",default_value_t=String::from(CONFIG_FILE_PATH))]
    pub config_path: String,

    /// The IP address of the MQTT broker (server)
    #[arg(long = "tether.host", default_value_t=TETHER_HOST)]
    pub tether_host: std::net::IpAddr,

    /// The Agent Role (type)
    #[arg(long="tether.role",default_value_t=String::from(AGENT_ROLE))]
    pub agent_role: String,

    /// The Agent Group (ID)
    #[arg(long="tether.group",default_value_t=String::from("any"))]
    pub agent_group: String,

    /// Run without connecting to a Tether broker at all
    #[arg(long = "tether.disable")]
    pub tether_disable: bool,

    #[arg(long = "loglevel",default_value_t=String::from("info"))]
    pub log_level: String,

    /// Override the serial port given in the config file
    #[arg(long = "serial.port")]
    pub serial_port: Option<String>,

    /// Do not open the serial port; only log the brightness values
    #[arg(long = "dryRun")]
    pub dry_run: bool,

    /// Override the landmark source given in the config file
    #[arg(long = "landmarks.source", value_enum)]
    pub landmark_source: Option<LandmarkSourceKind>,

    /// Key (+ Enter) which quits the agent
    #[arg(long = "quitKey", default_value_t = 'q')]
    pub quit_key: char,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["pinch-led"]);
        assert_eq!(cli.config_path, CONFIG_FILE_PATH);
        assert_eq!(cli.agent_role, "pinchLed");
        assert!(!cli.dry_run);
        assert!(!cli.tether_disable);
        assert_eq!(cli.landmark_source, None);
        assert_eq!(cli.quit_key, 'q');
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "pinch-led",
            "--landmarks.source",
            "stdin",
            "--serial.port",
            "COM3",
            "--dryRun",
            "--tether.disable",
        ]);
        assert_eq!(cli.landmark_source, Some(LandmarkSourceKind::Stdin));
        assert_eq!(cli.serial_port.as_deref(), Some("COM3"));
        assert!(cli.dry_run);
        assert!(cli.tether_disable);
    }
}
