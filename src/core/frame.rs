//! Sensor frame packing and inbound command decoding
//! This module turns backend state strings into the fixed binary frame the
//! display firmware expects, and parses the `key:verb|key:verb` text the
//! peripheral sends back.

use std::collections::HashMap;

use crate::error::{BridgeError, Result};

/// Size of the outbound frame in bytes: 6 x f32, 2 x u8, 2 x u16, no padding.
pub const FRAME_LEN: usize = 30;

const FLAGS_OFFSET: usize = 24;
const CO_OFFSET: usize = 26;
const PM_OFFSET: usize = 28;

/// Protocol keys the frame is built from, in wire order.
pub const REQUIRED_KEYS: [&str; 10] = ["bt", "bh", "kt", "kh", "ot", "oh", "dh", "ad", "co", "pm"];

/// One poll worth of sensor readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSnapshot {
    /// Bathroom temperature / humidity
    pub bathroom_temperature: f32,
    pub bathroom_humidity: f32,
    /// Kitchen temperature / humidity
    pub kitchen_temperature: f32,
    pub kitchen_humidity: f32,
    /// Outdoor temperature / humidity
    pub outdoor_temperature: f32,
    pub outdoor_humidity: f32,
    pub dehumidifier_on: bool,
    pub air_duct_on: bool,
    /// CO level
    pub co_level: u16,
    /// Particulate level
    pub particulate_level: u16,
}

/// Encoded frame, ready for a characteristic write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryFrame([u8; FRAME_LEN]);

impl BinaryFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl SensorSnapshot {
    /// Builds a snapshot from a protocol key -> state string mapping.
    ///
    /// Every key in [`REQUIRED_KEYS`] must be present. Nothing is defaulted.
    pub fn build(raw_states: &HashMap<String, String>) -> Result<Self> {
        Ok(Self {
            bathroom_temperature: parse_float(raw_states, "bt")?,
            bathroom_humidity: parse_float(raw_states, "bh")?,
            kitchen_temperature: parse_float(raw_states, "kt")?,
            kitchen_humidity: parse_float(raw_states, "kh")?,
            outdoor_temperature: parse_float(raw_states, "ot")?,
            outdoor_humidity: parse_float(raw_states, "oh")?,
            dehumidifier_on: parse_flag(raw_states, "dh")?,
            air_duct_on: parse_flag(raw_states, "ad")?,
            co_level: parse_count(raw_states, "co")?,
            particulate_level: parse_count(raw_states, "pm")?,
        })
    }

    /// Packs the snapshot little-endian in firmware field order.
    pub fn encode(&self) -> BinaryFrame {
        let mut buf = [0u8; FRAME_LEN];

        let floats = [
            self.bathroom_temperature,
            self.bathroom_humidity,
            self.kitchen_temperature,
            self.kitchen_humidity,
            self.outdoor_temperature,
            self.outdoor_humidity,
        ];
        for (i, value) in floats.iter().enumerate() {
            buf[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }

        buf[FLAGS_OFFSET] = self.dehumidifier_on as u8;
        buf[FLAGS_OFFSET + 1] = self.air_duct_on as u8;
        buf[CO_OFFSET..CO_OFFSET + 2].copy_from_slice(&self.co_level.to_le_bytes());
        buf[PM_OFFSET..PM_OFFSET + 2].copy_from_slice(&self.particulate_level.to_le_bytes());

        BinaryFrame(buf)
    }

    /// Inverse of [`SensorSnapshot::encode`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        let data: &[u8; FRAME_LEN] = data.try_into().map_err(|_| {
            BridgeError::Protocol(format!(
                "sensor frame must be {} bytes, got {}",
                FRAME_LEN,
                data.len()
            ))
        })?;

        let float_at =
            |i: usize| f32::from_le_bytes([data[i * 4], data[i * 4 + 1], data[i * 4 + 2], data[i * 4 + 3]]);

        Ok(Self {
            bathroom_temperature: float_at(0),
            bathroom_humidity: float_at(1),
            kitchen_temperature: float_at(2),
            kitchen_humidity: float_at(3),
            outdoor_temperature: float_at(4),
            outdoor_humidity: float_at(5),
            dehumidifier_on: data[FLAGS_OFFSET] != 0,
            air_duct_on: data[FLAGS_OFFSET + 1] != 0,
            co_level: u16::from_le_bytes([data[CO_OFFSET], data[CO_OFFSET + 1]]),
            particulate_level: u16::from_le_bytes([data[PM_OFFSET], data[PM_OFFSET + 1]]),
        })
    }
}

fn lookup<'a>(raw_states: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    raw_states
        .get(key)
        .map(|s| s.trim())
        .ok_or_else(|| BridgeError::MissingField(key.to_string()))
}

fn format_error(key: &str, value: &str) -> BridgeError {
    BridgeError::Format {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_float(raw_states: &HashMap<String, String>, key: &str) -> Result<f32> {
    let value = lookup(raw_states, key)?;
    value.parse::<f32>().map_err(|_| format_error(key, value))
}

fn parse_flag(raw_states: &HashMap<String, String>, key: &str) -> Result<bool> {
    Ok(lookup(raw_states, key)? == "on")
}

fn parse_count(raw_states: &HashMap<String, String>, key: &str) -> Result<u16> {
    let value = lookup(raw_states, key)?;
    value.parse::<u16>().map_err(|_| format_error(key, value))
}

/// Action requested by the peripheral for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Toggle,
    /// Anything the bridge does not act on yet.
    Unknown(String),
}

impl Verb {
    pub fn parse(verb: &str) -> Self {
        match verb {
            "toggle" => Self::Toggle,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// One decoded `key:verb` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub key: String,
    pub verb: Verb,
}

/// Decodes a notification payload into ordered `(key, verb)` commands.
///
/// Trailing NUL padding and surrounding whitespace are ignored.
pub fn decode_commands(payload: &[u8]) -> Result<Vec<Command>> {
    if !payload.is_ascii() {
        return Err(BridgeError::Protocol(format!(
            "command payload is not ASCII: {:?}",
            payload
        )));
    }
    let text = std::str::from_utf8(payload)
        .map_err(|e| BridgeError::Protocol(e.to_string()))?
        .trim_end_matches('\0')
        .trim();

    text.split('|')
        .map(|segment| {
            let mut parts = segment.split(':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(verb), None) => Ok(Command {
                    key: key.to_string(),
                    verb: Verb::parse(verb),
                }),
                _ => Err(BridgeError::Protocol(format!(
                    "segment {:?} is not a key:verb pair",
                    segment
                ))),
            }
        })
        .collect()
}
