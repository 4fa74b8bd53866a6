//! Just enough of the Firmata protocol to drive a single PWM pin on an
//! Arduino running StandardFirmata.

use std::{fmt, io::Write, str::FromStr};

use anyhow::{Context, Result};
use log::{debug, info};

pub const ANALOG_MESSAGE: u8 = 0xE0;
pub const SET_PIN_MODE: u8 = 0xF4;

/// Digital pins on the Arduino (Uno) layout, and the ones of those that can do PWM
const DIGITAL_PIN_COUNT: u8 = 14;
const ANALOG_PIN_COUNT: u8 = 6;
const PWM_PINS: &[u8] = &[3, 5, 6, 9, 10, 11];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinType {
    Analog,
    Digital,
}

/// Pin modes as numbered by the Firmata protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input = 0,
    Output = 1,
    Pwm = 3,
    Servo = 4,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PinSpecError {
    Malformed(String),
    UnknownType(String),
    UnknownMode(String),
    BadNumber(String),
    NoSuchPin(PinType, u8),
    NotPwmCapable(u8),
}

impl fmt::Display for PinSpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinSpecError::Malformed(s) => {
                write!(f, "invalid pin definition \"{}\"; expected e.g. \"d:3:p\"", s)
            }
            PinSpecError::UnknownType(t) => write!(f, "unknown pin type \"{}\" (use a or d)", t),
            PinSpecError::UnknownMode(m) => {
                write!(f, "unknown pin mode \"{}\" (use i, o, p or s)", m)
            }
            PinSpecError::BadNumber(n) => write!(f, "invalid pin number \"{}\"", n),
            PinSpecError::NoSuchPin(t, n) => write!(f, "there is no {:?} pin {}", t, n),
            PinSpecError::NotPwmCapable(n) => write!(f, "digital pin {} cannot do PWM", n),
        }
    }
}

impl std::error::Error for PinSpecError {}

/// A pin definition such as `d:3:p` (digital pin 3, PWM mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinSpec {
    pub pin_type: PinType,
    pub number: u8,
    pub mode: PinMode,
}

impl FromStr for PinSpec {
    type Err = PinSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let &[t, n, m] = parts.as_slice() else {
            return Err(PinSpecError::Malformed(String::from(s)));
        };

        let pin_type = match t {
            "a" => PinType::Analog,
            "d" => PinType::Digital,
            _ => return Err(PinSpecError::UnknownType(String::from(t))),
        };
        let number: u8 = n
            .parse()
            .map_err(|_| PinSpecError::BadNumber(String::from(n)))?;
        let mode = match m {
            "i" => PinMode::Input,
            "o" => PinMode::Output,
            "p" => PinMode::Pwm,
            "s" => PinMode::Servo,
            _ => return Err(PinSpecError::UnknownMode(String::from(m))),
        };

        let pin_count = match pin_type {
            PinType::Analog => ANALOG_PIN_COUNT,
            PinType::Digital => DIGITAL_PIN_COUNT,
        };
        if number >= pin_count {
            return Err(PinSpecError::NoSuchPin(pin_type, number));
        }
        if mode == PinMode::Pwm && (pin_type == PinType::Analog || !PWM_PINS.contains(&number)) {
            return Err(PinSpecError::NotPwmCapable(number));
        }

        Ok(PinSpec {
            pin_type,
            number,
            mode,
        })
    }
}

pub fn set_pin_mode_message(pin: u8, mode: PinMode) -> [u8; 3] {
    [SET_PIN_MODE, pin, mode as u8]
}

/// 0..1 scaled to the 8-bit duty cycle the board expects
pub fn duty_from_unit(value: f32) -> u16 {
    (value.clamp(0., 1.) * 255.).round() as u16
}

/// 14-bit value split over two 7-bit data bytes
pub fn analog_message(pin: u8, value: u16) -> [u8; 3] {
    [
        ANALOG_MESSAGE | (pin & 0x0F),
        (value & 0x7F) as u8,
        ((value >> 7) & 0x7F) as u8,
    ]
}

/// A single PWM output on a Firmata board, over any byte stream
pub struct PwmPin<W: Write> {
    port: W,
    pin: u8,
    last_duty: Option<u16>,
}

impl<W: Write> PwmPin<W> {
    /// Puts the pin into PWM mode
    pub fn new(mut port: W, spec: PinSpec) -> Result<Self> {
        if spec.mode != PinMode::Pwm {
            return Err(PinSpecError::NotPwmCapable(spec.number).into());
        }
        port.write_all(&set_pin_mode_message(spec.number, PinMode::Pwm))
            .context("failed to set pin mode")?;
        port.flush()?;
        info!("Pin {} set to PWM mode", spec.number);
        Ok(PwmPin {
            port,
            pin: spec.number,
            last_duty: None,
        })
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Set the duty cycle from a value in [0,1]. Nothing is sent if the
    /// resulting duty is the same as last time.
    pub fn write(&mut self, value: f32) -> Result<()> {
        let duty = duty_from_unit(value);
        if self.last_duty == Some(duty) {
            return Ok(());
        }
        debug!("Pin {} duty {}", self.pin, duty);
        self.port
            .write_all(&analog_message(self.pin, duty))
            .with_context(|| format!("failed to write duty to pin {}", self.pin))?;
        self.port.flush()?;
        self.last_duty = Some(duty);
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pwm_pin() {
        let spec: PinSpec = "d:3:p".parse().unwrap();
        assert_eq!(
            spec,
            PinSpec {
                pin_type: PinType::Digital,
                number: 3,
                mode: PinMode::Pwm
            }
        );
        assert_eq!("a:0:i".parse::<PinSpec>().unwrap().pin_type, PinType::Analog);
        assert_eq!("d:13:o".parse::<PinSpec>().unwrap().mode, PinMode::Output);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "d:3".parse::<PinSpec>(),
            Err(PinSpecError::Malformed(String::from("d:3")))
        );
        assert_eq!(
            "x:3:p".parse::<PinSpec>(),
            Err(PinSpecError::UnknownType(String::from("x")))
        );
        assert_eq!(
            "d:three:p".parse::<PinSpec>(),
            Err(PinSpecError::BadNumber(String::from("three")))
        );
        assert_eq!(
            "d:3:z".parse::<PinSpec>(),
            Err(PinSpecError::UnknownMode(String::from("z")))
        );
        assert_eq!(
            "d:20:o".parse::<PinSpec>(),
            Err(PinSpecError::NoSuchPin(PinType::Digital, 20))
        );
        assert_eq!(
            "d:4:p".parse::<PinSpec>(),
            Err(PinSpecError::NotPwmCapable(4))
        );
        assert_eq!(
            "a:3:p".parse::<PinSpec>(),
            Err(PinSpecError::NotPwmCapable(3))
        );
    }

    #[test]
    fn test_duty_scaling() {
        assert_eq!(duty_from_unit(0.), 0);
        assert_eq!(duty_from_unit(1.), 255);
        assert_eq!(duty_from_unit(0.5), 128);
        assert_eq!(duty_from_unit(-1.), 0);
        assert_eq!(duty_from_unit(2.), 255);
    }

    #[test]
    fn test_analog_message_encoding() {
        assert_eq!(analog_message(3, 0), [0xE3, 0x00, 0x00]);
        assert_eq!(analog_message(3, 255), [0xE3, 0x7F, 0x01]);
        assert_eq!(analog_message(9, 128), [0xE9, 0x00, 0x01]);
    }

    #[test]
    fn test_pwm_pin_writes_mode_then_changed_values_only() {
        let spec: PinSpec = "d:3:p".parse().unwrap();
        let mut pin = PwmPin::new(Vec::new(), spec).unwrap();
        pin.write(1.0).unwrap();
        pin.write(1.0).unwrap();
        pin.write(0.).unwrap();
        assert_eq!(
            pin.into_inner(),
            vec![0xF4, 3, 3, 0xE3, 0x7F, 0x01, 0xE3, 0x00, 0x00]
        );
    }

    #[test]
    fn test_pwm_pin_refuses_other_modes() {
        let spec: PinSpec = "d:3:o".parse().unwrap();
        assert!(PwmPin::new(Vec::new(), spec).is_err());
    }
}
