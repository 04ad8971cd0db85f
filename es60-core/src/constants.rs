//! Constants and limits for the ES60 telegram format

/// Telegram type tag for configuration datagrams
pub const CONFIG_TAG: &[u8; 4] = b"CON0";

/// Telegram type tag for NMEA datagrams
pub const NMEA_TAG: &[u8; 4] = b"NME0";

/// Telegram type tag for sample (RAW) datagrams
pub const RAW_TAG: &[u8; 4] = b"RAW0";

/// Size of the datagram header: type tag (4) + low time (4) + high time (4)
pub const HEADER_LENGTH: usize = 12;

/// Size of each length field framing a telegram
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Bytes a telegram occupies in a file beyond its payload
pub const FRAMING_OVERHEAD: usize = 2 * LENGTH_FIELD_SIZE + HEADER_LENGTH;

/// Maximum telegram length accepted from a length prefix (16 MB)
pub const MAX_TELEGRAM_SIZE: u32 = 16 * 1024 * 1024;

/// Fixed header of a RAW0 payload, before the sample arrays
pub const RAW_HEADER_LENGTH: usize = 72;

/// Offset of the int32 sample count inside a RAW0 payload
pub const RAW_COUNT_OFFSET: usize = 68;

/// Fixed header of a CON0 payload, before the transducer table
pub const CONFIG_HEADER_LENGTH: usize = 516;

/// Offset of the int32 transducer count inside a CON0 payload
pub const CONFIG_COUNT_OFFSET: usize = 512;

/// Size of one transducer record in a CON0 payload
pub const CONFIG_TRANSDUCER_LENGTH: usize = 320;

/// Width of the NUL padded strings in a CON0 payload
pub const CONFIG_STRING_LENGTH: usize = 128;

/// Entries in the per transducer pulse length, gain and sa correction tables
pub const PULSE_TABLE_LENGTH: usize = 5;

/// Telegram timestamps count 100ns ticks
pub const TICKS_PER_MILLI: i64 = 10_000;

/// Milliseconds from the tick epoch (1601-01-01T00:00:00Z) to the Unix epoch
pub const TICK_EPOCH_OFFSET_MILLIS: i64 = 11_644_473_600_000;

/// Highest channel count tracked by ping frame masks and statistics
pub const MAX_CHANNELS: usize = 64;

/// Length of the triangle wave in pings
pub const PERIOD: i64 = 2721;

/// Turning point where the wave starts descending
pub const TURN_DESCENDING: i64 = PERIOD / 4 + 1;

/// Turning point where the wave starts ascending again
pub const TURN_ASCENDING: i64 = PERIOD * 3 / 4 + 1;

/// Minimum distance from a turning point for short data sets to be trusted
pub const TURNING_POINT_EPSILON: i64 = 32;

/// Maximum time between NMEA records belonging to one track point
pub const POINT_WINDOW_MILLIS: i64 = 5_000;
