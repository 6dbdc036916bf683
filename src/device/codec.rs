//! Decoding of the telemetry and stat characteristic payloads.
//!
//! Telemetry frames are 16 bytes, little-endian:
//! `u32 red, u32 ir, u16 gsr, u16 flex, u16 emg1, u16 emg2`.
//! Stat frames are four unsigned bytes: heart rate, breath rate and two stride rates.

use crate::device::constants::{OPTICAL_SCALE, STAT_PAYLOAD_LEN, TELEMETRY_PAYLOAD_LEN};
use crate::device::types::{StatSample, TelemetrySample};
use crate::error::DecodeError;

/// A telemetry frame as sent by the device, before the optical channels are scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawTelemetry {
    pub red: u32,
    pub ir: u32,
    pub gsr: u16,
    pub flex: u16,
    pub emg1: u16,
    pub emg2: u16,
}

impl RawTelemetry {
    pub fn decode(bytes: &[u8]) -> Result<RawTelemetry, DecodeError> {
        let frame: &[u8; TELEMETRY_PAYLOAD_LEN] = bytes.try_into().map_err(|_| DecodeError::Length {
            expected: TELEMETRY_PAYLOAD_LEN,
            actual: bytes.len(),
        })?;

        let u32_at = |offset: usize| {
            u32::from_le_bytes([frame[offset], frame[offset + 1], frame[offset + 2], frame[offset + 3]])
        };
        let u16_at = |offset: usize| u16::from_le_bytes([frame[offset], frame[offset + 1]]);

        Ok(RawTelemetry {
            red: u32_at(0),
            ir: u32_at(4),
            gsr: u16_at(8),
            flex: u16_at(10),
            emg1: u16_at(12),
            emg2: u16_at(14),
        })
    }

    pub fn encode(&self) -> [u8; TELEMETRY_PAYLOAD_LEN] {
        let mut frame = [0u8; TELEMETRY_PAYLOAD_LEN];
        frame[0..4].copy_from_slice(&self.red.to_le_bytes());
        frame[4..8].copy_from_slice(&self.ir.to_le_bytes());
        frame[8..10].copy_from_slice(&self.gsr.to_le_bytes());
        frame[10..12].copy_from_slice(&self.flex.to_le_bytes());
        frame[12..14].copy_from_slice(&self.emg1.to_le_bytes());
        frame[14..16].copy_from_slice(&self.emg2.to_le_bytes());
        frame
    }
}

// One way: recovering the raw optical value means multiplying by OPTICAL_SCALE again.
impl From<RawTelemetry> for TelemetrySample {
    fn from(raw: RawTelemetry) -> Self {
        TelemetrySample {
            red_optical: f64::from(raw.red) / OPTICAL_SCALE,
            ir_optical: f64::from(raw.ir) / OPTICAL_SCALE,
            gsr: raw.gsr,
            flex: raw.flex,
            emg1: raw.emg1,
            emg2: raw.emg2,
        }
    }
}

pub fn decode_telemetry(bytes: &[u8]) -> Result<TelemetrySample, DecodeError> {
    RawTelemetry::decode(bytes).map(TelemetrySample::from)
}

pub fn decode_stat(bytes: &[u8]) -> Result<StatSample, DecodeError> {
    match *bytes {
        [hr, br, sr1, sr2] => Ok(StatSample {
            heart_rate_bpm: hr,
            breath_rate_bpm: br,
            stride_rate1_bpm: sr1,
            stride_rate2_bpm: sr2,
        }),
        _ => Err(DecodeError::Length { expected: STAT_PAYLOAD_LEN, actual: bytes.len() }),
    }
}
