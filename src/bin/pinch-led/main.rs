use anyhow::{Context, Result, anyhow};
use clap::Parser;
use env_logger::Env;
use log::{debug, error, info, warn};
use std::process;
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;
use tether_agent::TetherAgentOptionsBuilder;

use tether_pinch_led::actuator::{ActuatorSink, FirmataSink, NullSink, SerialSettings};
use tether_pinch_led::agent_config::{AgentConfig, LandmarkSourceKind, load_config_from_file};
use tether_pinch_led::frame_source::{
    DetectorProcess, FrameSource, HandDetector, LandmarkSource, LatestFrame, SingleHandDetector,
};
use tether_pinch_led::keyboard::spawn_quit_watcher;
use tether_pinch_led::pinch_controller::PinchController;
use tether_pinch_led::settings::Cli;
use tether_pinch_led::systems::SignalPipeline;
use tether_pinch_led::tether_interface::{Incoming, TetherInterface};

fn main() {
    let cli = Cli::parse();

    // Initialize the logger from the environment

    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level))
        .filter_module("paho_mqtt", log::LevelFilter::Warn)
        .filter_module("tether_agent", log::LevelFilter::Warn)
        .init();

    debug!("Started; args: {:?}", cli);

    let config = match load_config_from_file(&cli.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading config: {:#}", e);
            process::exit(1);
        }
    };

    let result = if cli.dry_run {
        warn!("Dry run; no serial connection will be made");
        run(&cli, config, NullSink::default())
    } else {
        let serial_port = cli
            .serial_port
            .clone()
            .unwrap_or_else(|| config.serial_port.clone());
        let settings = SerialSettings {
            port: &serial_port,
            ..config.serial_settings()
        };
        match FirmataSink::connect(&settings) {
            Ok(sink) => run(&cli, config, sink),
            Err(e) => {
                error!("Error connecting to board: {:#}", e);
                process::exit(1);
            }
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        process::exit(1);
    }
    info!("Bye");
}

fn run<A: ActuatorSink>(cli: &Cli, mut config: AgentConfig, actuator: A) -> Result<()> {
    let source_kind = cli.landmark_source.unwrap_or(config.landmark_source);

    let pipeline = SignalPipeline::new(config.calibration()?, config.smooth_settings())?;
    let mut controller = PinchController::new(pipeline, actuator);
    let mut detector = SingleHandDetector {
        min_score: config.min_hand_score,
    };

    let mut tether = if cli.tether_disable {
        None
    } else {
        let tether_agent = TetherAgentOptionsBuilder::new(&cli.agent_role)
            .id(Some(&cli.agent_group))
            .host(Some(&cli.tether_host.to_string()))
            .build()
            .context("failed to init and/or connect Tether Agent")?;
        let tether = TetherInterface::new(tether_agent, source_kind == LandmarkSourceKind::Tether)?;
        // Always publish on first start/load...
        tether.publish_config(&config)?;
        Some(tether)
    };

    // Keep the detector process alive for as long as we read from it
    let mut _detector_process = None;
    let mut source = match source_kind {
        LandmarkSourceKind::Tether => {
            if tether.is_none() {
                return Err(anyhow!(
                    "Tether is disabled, so it cannot be the landmark source"
                ));
            }
            LandmarkSource::Tether(LatestFrame::new())
        }
        LandmarkSourceKind::Stdin => LandmarkSource::stdin(),
        LandmarkSourceKind::Command => {
            let (process, source) =
                DetectorProcess::spawn(&config.detector_command, &config.camera_hints())?;
            _detector_process = Some(process);
            source
        }
    };
    info!("Reading hand landmarks from {:?}", source_kind);

    // stdin is taken when it carries the landmarks; end of input quits instead
    let quit: Option<Receiver<()>> = if source_kind == LandmarkSourceKind::Stdin {
        None
    } else {
        Some(spawn_quit_watcher(cli.quit_key))
    };

    loop {
        let mut work_done = false;

        if let Some(rx) = &quit {
            if rx.try_recv().is_ok() {
                info!("Quit requested");
                break;
            }
        }

        if let Some(tether) = tether.as_mut() {
            while let Some(incoming) = tether.check_messages() {
                work_done = true;
                match incoming {
                    Incoming::Landmarks(frame) => source.push(frame),
                    Incoming::SaveConfig(new_config) => {
                        if let Err(e) = handle_save_config(
                            *new_config,
                            &mut config,
                            &mut controller,
                            &mut detector,
                            tether,
                            &cli.config_path,
                        ) {
                            error!("Failed to apply remote config: {:#}", e);
                        }
                    }
                }
            }
        }

        if let Some(frame) = source.read() {
            work_done = true;
            let hand = detector.detect(&frame);
            let outcome = controller.step(hand.as_ref());
            if let Some(e) = &outcome.write_error {
                error!("Failed to write to actuator: {:#}", e);
            }
            if let Some(present) = outcome.presence_changed {
                info!("Hand {}", if present { "found" } else { "lost" });
            }
            if let Some(tether) = &tether {
                if let Some(reading) = &outcome.reading {
                    if !config.skip_pinch_output {
                        tether.publish_pinch(reading);
                    }
                }
                if let Some(present) = outcome.presence_changed {
                    tether.publish_presence_change(present);
                }
            }
        } else if source.is_finished() {
            break;
        }

        if !work_done {
            thread::sleep(Duration::from_millis(1));
        }
    }

    info!(
        "Stopping; last brightness was {:.4}",
        controller.smoothed()
    );
    debug!("{} stale landmark frames were skipped", source.dropped());
    Ok(())
}

fn handle_save_config<A: ActuatorSink>(
    new_config: AgentConfig,
    config: &mut AgentConfig,
    controller: &mut PinchController<A>,
    detector: &mut SingleHandDetector,
    tether: &TetherInterface,
    config_file_path: &str,
) -> Result<()> {
    if new_config.needs_restart_from(config) {
        warn!("Hardware or landmark source settings changed; these only apply after a restart");
    }
    controller.update_settings(new_config.calibration()?, new_config.smooth_settings())?;
    detector.min_score = new_config.min_hand_score;
    *config = new_config;

    info!("Remote-provided config applied OK; now save to disk and (re) publish");
    config.write_config_to_file(config_file_path)?;
    tether.publish_config(config)
}
