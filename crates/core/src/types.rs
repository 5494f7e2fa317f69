//! Scalar types that appear on the wire.
//!
//! Signedness follows the protocol exactly: item ids are signed 16-bit
//! (with `-1` as the empty-slot sentinel), entity ids signed 32-bit,
//! angles either degrees (`f32`) or 1/256-turn bytes (`i8`).

use serde::{Deserialize, Serialize};

/// Server-wide unique entity identifier, allocated monotonically.
pub type EntityId = i32;
/// Window identifier; `0` is the player's persistent inventory.
pub type WindowId = i8;
/// Slot index within a window or inventory.
pub type SlotId = i16;
/// Item type identifier; `-1` means "no item".
pub type ItemTypeId = i16;
/// Block type identifier.
pub type BlockId = u8;
/// Window click transaction identifier.
pub type TxId = i16;
/// World time in ticks.
pub type TimeOfDay = i64;
/// World generation seed.
pub type RandomSeed = i64;
/// Dimension identifier (0 = overworld).
pub type DimensionId = i8;
/// Angle quantised to 1/256 of a turn.
pub type AngleBytes = i8;
/// Angle in degrees.
pub type AngleDegrees = f32;

/// Block face hit or placed against. `-1` means no face.
pub type Face = i8;

/// Sentinel face value for "none" (e.g. dropping an item into the air).
pub const FACE_NONE: Face = -1;

/// Digging progress reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum DigStatus {
    Started = 0,
    Digging = 1,
    Stopped = 2,
    BlockBroke = 3,
}

impl DigStatus {
    /// Decode a wire value; unknown values are rejected by the caller.
    pub fn from_wire(value: i8) -> Option<Self> {
        match value {
            0 => Some(DigStatus::Started),
            1 => Some(DigStatus::Digging),
            2 => Some(DigStatus::Stopped),
            3 => Some(DigStatus::BlockBroke),
            _ => None,
        }
    }

    pub fn to_wire(self) -> i8 {
        self as i8
    }
}

/// Mode byte of the pre-chunk packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkLoadMode {
    Unload = 0,
    Init = 1,
}

impl ChunkLoadMode {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(ChunkLoadMode::Unload),
            1 => Some(ChunkLoadMode::Init),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }
}

/// Look direction in degrees, as reported by clients.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LookDegrees {
    pub yaw: AngleDegrees,
    pub pitch: AngleDegrees,
}

impl LookDegrees {
    pub const fn new(yaw: AngleDegrees, pitch: AngleDegrees) -> Self {
        Self { yaw, pitch }
    }

    /// Quantise to the byte angles used by entity packets.
    pub fn to_look_bytes(self) -> LookBytes {
        LookBytes {
            yaw: angle_to_byte(self.yaw),
            pitch: angle_to_byte(self.pitch),
        }
    }
}

/// Look direction quantised to 1/256-turn bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LookBytes {
    pub yaw: AngleBytes,
    pub pitch: AngleBytes,
}

/// Full orientation of a spawned non-player entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrientationBytes {
    pub yaw: AngleBytes,
    pub pitch: AngleBytes,
    pub roll: AngleBytes,
}

/// Entity velocity in fixed-point units per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Velocity {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

fn angle_to_byte(degrees: AngleDegrees) -> AngleBytes {
    let turns = degrees.rem_euclid(360.0) / 360.0;
    (turns * 256.0) as i64 as u8 as i8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dig_status_wire_round_trip() {
        for raw in 0..4i8 {
            let status = DigStatus::from_wire(raw).unwrap();
            assert_eq!(status.to_wire(), raw);
        }
        assert!(DigStatus::from_wire(4).is_none());
        assert!(DigStatus::from_wire(-1).is_none());
    }

    #[test]
    fn chunk_load_mode_wire_round_trip() {
        assert_eq!(ChunkLoadMode::from_wire(0), Some(ChunkLoadMode::Unload));
        assert_eq!(ChunkLoadMode::from_wire(1), Some(ChunkLoadMode::Init));
        assert!(ChunkLoadMode::from_wire(2).is_none());
    }

    #[test]
    fn angles_quantise_to_quarter_turns() {
        let look = LookDegrees::new(90.0, 0.0).to_look_bytes();
        assert_eq!(look.yaw, 64);
        assert_eq!(look.pitch, 0);

        // 180 degrees wraps to the negative half of the byte range.
        let look = LookDegrees::new(180.0, -90.0).to_look_bytes();
        assert_eq!(look.yaw, -128);
        assert_eq!(look.pitch, -64);
    }
}
