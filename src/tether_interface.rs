use anyhow::Result;
use log::{debug, error, warn};
use tether_agent::{ChannelDefinition, ChannelOptionsBuilder, TetherAgent};

use crate::{
    agent_config::AgentConfig,
    tracking::{DetectionFrame, PinchReading},
};

pub struct Outputs {
    pub config_output: ChannelDefinition,
    pub pinch_output: ChannelDefinition,
    pub presence_output: ChannelDefinition,
}

impl Outputs {
    pub fn new(tether_agent: &mut TetherAgent) -> Result<Outputs> {
        let config_output = ChannelOptionsBuilder::create_sender("providePinchConfig")
            .qos(Some(2))
            .retain(Some(true))
            .build(tether_agent)?;

        let pinch_output = ChannelOptionsBuilder::create_sender("pinch")
            .qos(Some(0))
            .build(tether_agent)?;

        let presence_output = ChannelOptionsBuilder::create_sender("handPresence")
            .qos(Some(2))
            .build(tether_agent)?;

        Ok(Outputs {
            config_output,
            pinch_output,
            presence_output,
        })
    }
}

pub struct Inputs {
    /// Only subscribed when Tether is the landmark source
    pub landmarks_input: Option<ChannelDefinition>,
    pub save_config_input: ChannelDefinition,
}

impl Inputs {
    pub fn new(tether_agent: &mut TetherAgent, subscribe_landmarks: bool) -> Result<Inputs> {
        let landmarks_input = if subscribe_landmarks {
            Some(
                ChannelOptionsBuilder::create_receiver("handLandmarks")
                    .qos(Some(0))
                    .build(tether_agent)?,
            )
        } else {
            None
        };
        let save_config_input = ChannelOptionsBuilder::create_receiver("savePinchConfig")
            .qos(Some(2))
            .build(tether_agent)?;

        Ok(Inputs {
            landmarks_input,
            save_config_input,
        })
    }
}

pub enum Incoming {
    Landmarks(DetectionFrame),
    SaveConfig(Box<AgentConfig>),
}

pub struct TetherInterface {
    tether_agent: TetherAgent,
    inputs: Inputs,
    outputs: Outputs,
}

impl TetherInterface {
    pub fn new(mut tether_agent: TetherAgent, subscribe_landmarks: bool) -> Result<Self> {
        let inputs = Inputs::new(&mut tether_agent, subscribe_landmarks)?;
        let outputs = Outputs::new(&mut tether_agent)?;
        Ok(TetherInterface {
            tether_agent,
            inputs,
            outputs,
        })
    }

    /// Next decodable message, if any. Messages that fail to decode are
    /// logged and skipped.
    pub fn check_messages(&mut self) -> Option<Incoming> {
        while let Some((topic, payload)) = self.tether_agent.check_messages() {
            if let Some(landmarks_input) = &self.inputs.landmarks_input {
                if landmarks_input.matches(&topic) {
                    match rmp_serde::from_slice::<DetectionFrame>(&payload) {
                        Ok(frame) => return Some(Incoming::Landmarks(frame)),
                        Err(e) => {
                            debug!("Failed to decode landmarks message: {}", e);
                            continue;
                        }
                    }
                }
            }

            if self.inputs.save_config_input.matches(&topic) {
                match AgentConfig::parse_remote_config(&payload) {
                    Ok(config) => return Some(Incoming::SaveConfig(Box::new(config))),
                    Err(e) => {
                        error!("Ignoring remote config: {}", e);
                        continue;
                    }
                }
            }
        }
        None
    }

    pub fn publish_config(&self, config: &AgentConfig) -> Result<()> {
        let payload = rmp_serde::to_vec_named(config)?;
        self.tether_agent
            .send(&self.outputs.config_output, Some(&payload))?;
        Ok(())
    }

    pub fn publish_pinch(&self, reading: &PinchReading) {
        match rmp_serde::to_vec_named(reading) {
            Ok(payload) => {
                if let Err(e) = self
                    .tether_agent
                    .send(&self.outputs.pinch_output, Some(&payload))
                {
                    warn!("Failed to publish pinch reading: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize pinch reading: {}", e),
        }
    }

    pub fn publish_presence_change(&self, present: bool) {
        debug!("HAND PRESENCE CHANGED: {}", present);
        match rmp_serde::to_vec(&present) {
            Ok(payload) => {
                if let Err(e) = self
                    .tether_agent
                    .send(&self.outputs.presence_output, Some(&payload))
                {
                    warn!("Failed to publish presence change: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize presence: {}", e),
        }
    }
}
