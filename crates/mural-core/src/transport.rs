#![forbid(unsafe_code)]

//! Sensor transport: raw touch-sensor samples to normalized [`Touch`] values.
//!
//! The sensor reports fingers in its own fixed resolution (for example
//! 4095×4095) with a four-valued status. [`TouchTransport`] rescales to
//! display coordinates, folds `Lost` into `Up`, and filters samples for
//! touches it never saw go down.
//!
//! # Sample record
//!
//! One sample is 13 little-endian bytes:
//!
//! | offset | type | field  |
//! |--------|------|--------|
//! | 0      | u32  | id     |
//! | 4      | f32  | x      |
//! | 8      | f32  | y      |
//! | 12     | u8   | status (0 down, 1 moved, 2 up, 3 lost) |
//!
//! A datagram carries any whole number of records.
//!
//! Bit 31 of a touch id is reserved for touches forwarded by peers
//! ([`FORWARDED_TOUCH`]); sensor ids have it cleared on ingest.

use ahash::AHashMap;
use thiserror::Error;

use crate::geometry::Point;
use crate::touch::{Touch, TouchId, TouchPhase};

/// Size of one encoded sample.
pub const SAMPLE_LEN: usize = 13;

/// Id bit marking a touch forwarded from another screen.
pub const FORWARDED_TOUCH: u32 = 1 << 31;

/// Status reported by the sensor for one finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorStatus {
    Down,
    Moved,
    Up,
    /// The sensor lost track of the finger. Treated as a release.
    Lost,
}

impl SensorStatus {
    fn from_byte(byte: u8) -> Result<Self, SampleError> {
        match byte {
            0 => Ok(Self::Down),
            1 => Ok(Self::Moved),
            2 => Ok(Self::Up),
            3 => Ok(Self::Lost),
            other => Err(SampleError::UnknownStatus(other)),
        }
    }

    const fn to_byte(self) -> u8 {
        match self {
            Self::Down => 0,
            Self::Moved => 1,
            Self::Up => 2,
            Self::Lost => 3,
        }
    }
}

impl From<TouchPhase> for SensorStatus {
    fn from(phase: TouchPhase) -> Self {
        match phase {
            TouchPhase::Down => Self::Down,
            TouchPhase::Moved => Self::Moved,
            TouchPhase::Up => Self::Up,
        }
    }
}

/// Errors from decoding raw sensor bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("sample datagram of {0} bytes is not a multiple of {SAMPLE_LEN}")]
    Truncated(usize),
    #[error("unknown sensor status byte {0}")]
    UnknownStatus(u8),
    #[error("non-finite coordinate in sample for touch {0}")]
    NonFinite(u32),
}

/// One raw sample in sensor resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub status: SensorStatus,
}

impl SensorSample {
    /// Decode one record. `bytes` must hold exactly [`SAMPLE_LEN`] bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, SampleError> {
        let record: &[u8; SAMPLE_LEN] = bytes
            .try_into()
            .map_err(|_| SampleError::Truncated(bytes.len()))?;
        let id = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        let x = f32::from_le_bytes([record[4], record[5], record[6], record[7]]);
        let y = f32::from_le_bytes([record[8], record[9], record[10], record[11]]);
        if !x.is_finite() || !y.is_finite() {
            return Err(SampleError::NonFinite(id));
        }
        let status = SensorStatus::from_byte(record[12])?;
        Ok(Self { id, x, y, status })
    }

    /// Decode every record of a datagram.
    pub fn decode_batch(bytes: &[u8]) -> Result<Vec<Self>, SampleError> {
        if bytes.len() % SAMPLE_LEN != 0 {
            return Err(SampleError::Truncated(bytes.len()));
        }
        bytes.chunks_exact(SAMPLE_LEN).map(Self::decode).collect()
    }

    /// Encode into one record.
    #[must_use]
    pub fn encode(&self) -> [u8; SAMPLE_LEN] {
        let mut out = [0u8; SAMPLE_LEN];
        out[0..4].copy_from_slice(&self.id.to_le_bytes());
        out[4..8].copy_from_slice(&self.x.to_le_bytes());
        out[8..12].copy_from_slice(&self.y.to_le_bytes());
        out[12] = self.status.to_byte();
        out
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Sensor and display resolutions used to rescale samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub sensor_width: f64,
    pub sensor_height: f64,
    pub display_width: f64,
    pub display_height: f64,
}

impl Resolution {
    #[must_use]
    pub const fn new(sensor: (f64, f64), display: (f64, f64)) -> Self {
        Self {
            sensor_width: sensor.0,
            sensor_height: sensor.1,
            display_width: display.0,
            display_height: display.1,
        }
    }

    /// Sensor coordinates to display coordinates.
    #[must_use]
    pub fn to_display(&self, x: f64, y: f64) -> Point {
        Point::new(
            x * self.display_width / self.sensor_width,
            y * self.display_height / self.sensor_height,
        )
    }

    /// Display coordinates back to sensor coordinates.
    #[must_use]
    pub fn to_sensor(&self, point: Point) -> (f64, f64) {
        (
            point.x * self.sensor_width / self.display_width,
            point.y * self.sensor_height / self.display_height,
        )
    }
}

/// Normalizes sensor samples for one screen.
#[derive(Debug, Clone)]
pub struct TouchTransport {
    resolution: Resolution,
    live: AHashMap<TouchId, Point>,
}

impl TouchTransport {
    #[must_use]
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            live: AHashMap::new(),
        }
    }

    #[must_use]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Number of fingers currently down.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Normalize one sample.
    ///
    /// Returns `None` for moves and releases of touches never seen going
    /// down. A repeated down for a live id is reported as a move.
    pub fn normalize(&mut self, sample: SensorSample) -> Option<Touch> {
        let id = TouchId(sample.id & !FORWARDED_TOUCH);
        let position = self
            .resolution
            .to_display(f64::from(sample.x), f64::from(sample.y));
        let phase = match sample.status {
            SensorStatus::Down => {
                if self.live.insert(id, position).is_some() {
                    TouchPhase::Moved
                } else {
                    TouchPhase::Down
                }
            }
            SensorStatus::Moved => {
                let slot = self.live.get_mut(&id)?;
                *slot = position;
                TouchPhase::Moved
            }
            SensorStatus::Up | SensorStatus::Lost => {
                self.live.remove(&id)?;
                TouchPhase::Up
            }
        };
        #[cfg(feature = "tracing")]
        tracing::trace!(touch = id.0, ?phase, x = position.x, y = position.y, "normalized sample");
        Some(Touch::new(id, position, phase))
    }

    /// Decode and normalize a whole datagram. Malformed datagrams yield nothing.
    pub fn ingest(&mut self, datagram: &[u8]) -> Vec<Touch> {
        match SensorSample::decode_batch(datagram) {
            Ok(samples) => samples.into_iter().filter_map(|s| self.normalize(s)).collect(),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(error = %_err, "dropping malformed sensor datagram");
                Vec::new()
            }
        }
    }

    /// Express a touch received in sensor coordinates from a peer. The id is
    /// tagged with [`FORWARDED_TOUCH`].
    #[must_use]
    pub fn from_wire(&self, id: TouchId, sensor: Point, phase: TouchPhase) -> Touch {
        Touch::new(
            TouchId(id.0 | FORWARDED_TOUCH),
            self.resolution.to_display(sensor.x, sensor.y),
            phase,
        )
    }

    /// Sensor-resolution position of a display point, for forwarding.
    #[must_use]
    pub fn to_sensor(&self, position: Point) -> Point {
        let (x, y) = self.resolution.to_sensor(position);
        Point::new(x, y)
    }

    /// Forget one live touch without reporting a release.
    pub fn forget(&mut self, id: TouchId) -> bool {
        self.live.remove(&id).is_some()
    }

    /// Forget every live touch.
    pub fn clear(&mut self) {
        self.live.clear();
    }
}
