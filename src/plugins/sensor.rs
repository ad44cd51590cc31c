//! Temperature/humidity sensor collaborators.
//!
//! The bus protocol itself is owned by an external I2C transfer tool; this
//! module only runs it, checks the SHT3x frame and converts the raw words.

use crate::core::config::{MockConfig, SensorConfig};
use crate::core::error::DropletError;
use serde::{Deserialize, Serialize};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub temperature: f64,
    pub humidity: f64,
}

pub trait SensorReader: Send + Sync {
    fn read(&self) -> Result<SensorReading, DropletError>;
}

/// Returns the same reading every time.
#[derive(Debug, Clone)]
pub struct FixedSensor {
    reading: SensorReading,
}

impl FixedSensor {
    pub fn new(temperature: f64, humidity: f64) -> Self {
        Self {
            reading: SensorReading {
                temperature,
                humidity,
            },
        }
    }

    pub fn from_config(mock: &MockConfig) -> Self {
        Self::new(mock.temperature, mock.humidity)
    }
}

impl SensorReader for FixedSensor {
    fn read(&self) -> Result<SensorReading, DropletError> {
        Ok(self.reading)
    }
}

/// Reads an SHT3x frame through an external command such as `i2ctransfer`.
#[derive(Debug)]
pub struct CommandSensor {
    program: String,
    args: Vec<String>,
    init_args: Option<Vec<String>>,
    initialized: AtomicBool,
}

impl CommandSensor {
    pub fn from_config(config: &SensorConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            init_args: config.init_args.clone(),
            initialized: AtomicBool::new(false),
        }
    }

    fn run(&self, args: &[String]) -> Result<String, DropletError> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| DropletError::SensorError(format!("failed to run {}: {}", self.program, e)))?;
        if !output.status.success() {
            return Err(DropletError::SensorError(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl SensorReader for CommandSensor {
    fn read(&self) -> Result<SensorReading, DropletError> {
        if let Some(init_args) = &self.init_args
            && !self.initialized.load(Ordering::Acquire)
        {
            self.run(init_args)?;
            self.initialized.store(true, Ordering::Release);
        }
        let stdout = self.run(&self.args)?;
        let frame = parse_frame(&stdout)?;
        decode_sht3x(&frame)
    }
}

/// Parse six whitespace-separated bytes, hex (`0x63`) or decimal.
pub fn parse_frame(text: &str) -> Result<[u8; 6], DropletError> {
    let mut bytes = Vec::with_capacity(6);
    for token in text.split_whitespace() {
        let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => token.parse::<u8>(),
        };
        let byte = parsed
            .map_err(|_| DropletError::SensorError(format!("unparseable sensor byte '{}'", token)))?;
        bytes.push(byte);
    }
    bytes.try_into().map_err(|v: Vec<u8>| {
        DropletError::SensorError(format!("expected 6 sensor bytes, got {}", v.len()))
    })
}

/// CRC-8 used by Sensirion sensors (poly 0x31, init 0xFF).
pub fn sht3x_crc(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Decode `[T_msb, T_lsb, T_crc, RH_msb, RH_lsb, RH_crc]`, rounded to 0.1.
pub fn decode_sht3x(frame: &[u8; 6]) -> Result<SensorReading, DropletError> {
    if sht3x_crc(&frame[0..2]) != frame[2] || sht3x_crc(&frame[3..5]) != frame[5] {
        return Err(DropletError::SensorError(
            "sensor frame failed CRC check".to_string(),
        ));
    }
    let raw_t = u16::from_be_bytes([frame[0], frame[1]]) as f64;
    let raw_rh = u16::from_be_bytes([frame[3], frame[4]]) as f64;
    Ok(SensorReading {
        temperature: round1(-45.0 + raw_t * 175.0 / 65535.0),
        humidity: round1(100.0 * raw_rh / 65535.0),
    })
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
