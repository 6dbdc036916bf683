use crate::device::types::TelemetrySample;
use crate::session::ring_buffer::RingBuffer;

/// One sliding window per telemetry channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelBuffers {
    red_optical: RingBuffer<f64>,
    ir_optical: RingBuffer<f64>,
    gsr: RingBuffer<u16>,
    flex: RingBuffer<u16>,
    emg1: RingBuffer<u16>,
    emg2: RingBuffer<u16>,
}

/// Read-only copy of all channels, oldest sample first, handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    pub red_optical: Vec<f64>,
    pub ir_optical: Vec<f64>,
    pub gsr: Vec<u16>,
    pub flex: Vec<u16>,
    pub emg1: Vec<u16>,
    pub emg2: Vec<u16>,
}

impl TelemetrySnapshot {
    pub fn latest(&self) -> Option<TelemetrySample> {
        Some(TelemetrySample {
            red_optical: *self.red_optical.last()?,
            ir_optical: *self.ir_optical.last()?,
            gsr: *self.gsr.last()?,
            flex: *self.flex.last()?,
            emg1: *self.emg1.last()?,
            emg2: *self.emg2.last()?,
        })
    }
}

impl ChannelBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: &TelemetrySample) {
        self.red_optical.push(sample.red_optical);
        self.ir_optical.push(sample.ir_optical);
        self.gsr.push(sample.gsr);
        self.flex.push(sample.flex);
        self.emg1.push(sample.emg1);
        self.emg2.push(sample.emg2);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            red_optical: self.red_optical.snapshot(),
            ir_optical: self.ir_optical.snapshot(),
            gsr: self.gsr.snapshot(),
            flex: self.flex.snapshot(),
            emg1: self.emg1.snapshot(),
            emg2: self.emg2.snapshot(),
        }
    }
}
