use uuid::Uuid;

/**
 * How long (milliseconds) a write to the command characteristic may take.
 */
pub const WRITE_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) checking if the peripheral is still connected may take.
 */
pub const IS_CONNECTED_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) a best-effort disconnect may take before it is abandoned.
 */
pub const DISCONNECT_DEADLINE: u64 = 2000;

/**
 * Extra time (milliseconds) granted to the transport on top of the requested scan duration.
 */
pub const SCAN_GRACE: u64 = 1000;

/**
 * How often (milliseconds) the adapters are checked for the requested peripheral while connecting.
 */
pub const FIND_PERIPHERAL_DELAY: u64 = 250;

/**
 * Number of samples kept per channel.
 */
pub const RING_BUFFER_CAPACITY: usize = 256;

/**
 * The raw optical values are fixed point, with 7 fractional bits.
 */
pub const OPTICAL_SCALE: f64 = 128.0;

pub const TELEMETRY_PAYLOAD_LEN: usize = 16;
pub const STAT_PAYLOAD_LEN: usize = 4;

/**
 * All GATT identifiers of the sensor hub share the base 32e6xxxx-2b22-4db5-a914-43ce41986c70,
 * only the 16 bit field in the first group differs.
 */
const SENSOR_HUB_UUID_BASE: u128 = 0x32e6_0000_2b22_4db5_a914_43ce_4198_6c70;

pub const fn sensor_hub_uuid(uuid16: u16) -> Uuid {
    Uuid::from_u128(SENSOR_HUB_UUID_BASE | ((uuid16 as u128) << 96))
}

pub const SERVICE_UUID: Uuid = sensor_hub_uuid(0x1089);
pub const COMMAND_CHARACTERISTIC: Uuid = sensor_hub_uuid(0x108a);
pub const TELEMETRY_CHARACTERISTIC: Uuid = sensor_hub_uuid(0x108b);
pub const STAT_CHARACTERISTIC: Uuid = sensor_hub_uuid(0x108c);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuids_share_the_sensor_hub_base() {
        assert_eq!(SERVICE_UUID.to_string(), "32e61089-2b22-4db5-a914-43ce41986c70");
        assert_eq!(COMMAND_CHARACTERISTIC.to_string(), "32e6108a-2b22-4db5-a914-43ce41986c70");
        assert_eq!(TELEMETRY_CHARACTERISTIC.to_string(), "32e6108b-2b22-4db5-a914-43ce41986c70");
        assert_eq!(STAT_CHARACTERISTIC.to_string(), "32e6108c-2b22-4db5-a914-43ce41986c70");
    }
}
