pub mod actuator;
pub mod agent_config;
pub mod firmata;
pub mod frame_source;
pub mod geometry_utils;
pub mod keyboard;
pub mod pinch_controller;
pub mod settings;
pub mod systems;
pub mod tether_interface;
pub mod tracking;

pub type Point2D = (f32, f32);
