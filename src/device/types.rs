use std::fmt;
use std::str::FromStr;

/// A candidate device reported by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor {
    pub name: String,
    pub address: String,
}

impl DeviceDescriptor {
    pub const UNKNOWN_NAME: &'static str = "Unknown";

    pub fn new(name: Option<String>, address: impl Into<String>) -> Self {
        DeviceDescriptor {
            name: name.unwrap_or_else(|| Self::UNKNOWN_NAME.to_string()),
            address: address.into(),
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.name, self.address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnecting => "Disconnecting",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub address: Option<String>,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connected to: {}", self.address.as_deref().unwrap_or("None"))
    }
}

/// Opcodes accepted by the command characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CommandCode {
    /// Nothing selected, never written to the device.
    #[default]
    None = 0,
    Reset = 1,
    Calibration = 2,
}

impl CommandCode {
    pub fn opcode(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CommandCode::None),
            1 => Ok(CommandCode::Reset),
            2 => Ok(CommandCode::Calibration),
            other => Err(other),
        }
    }
}

impl FromStr for CommandCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" => Ok(CommandCode::Reset),
            "calibration" => Ok(CommandCode::Calibration),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            CommandCode::None => "None",
            CommandCode::Reset => "Reset",
            CommandCode::Calibration => "Calibration",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySample {
    pub red_optical: f64,
    pub ir_optical: f64,
    pub gsr: u16,
    pub flex: u16,
    pub emg1: u16,
    pub emg2: u16,
}

impl fmt::Display for TelemetrySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Red: {:.2}, IR: {:.2}, GSR: {}, Flex: {}, EMG1: {}, EMG2: {}",
            self.red_optical, self.ir_optical, self.gsr, self.flex, self.emg1, self.emg2,
        )
    }
}

/// Aggregate vitals, averaged on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatSample {
    pub heart_rate_bpm: u8,
    pub breath_rate_bpm: u8,
    pub stride_rate1_bpm: u8,
    pub stride_rate2_bpm: u8,
}

impl fmt::Display for StatSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HR: {} bpm, BR: {} bpm, SR1: {} bpm, SR2: {} bpm",
            self.heart_rate_bpm, self.breath_rate_bpm, self.stride_rate1_bpm, self.stride_rate2_bpm,
        )
    }
}

#[derive(Debug, Clone)]
pub enum DeviceEvent {
    Telemetry(TelemetrySample),
    Stats(StatSample),
    // something the user should be told about, such as a failed connection attempt
    Notice(String),
}

#[derive(Debug, Clone)]
pub enum ScanEvent {
    Results(Vec<DeviceDescriptor>),
    Failed(String),
}
