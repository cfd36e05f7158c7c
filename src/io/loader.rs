use std::collections::{BTreeMap, VecDeque};
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{DogmError, Result};
use crate::types::{RadarDetection, SensorFrame};

/// One row of the input CSV: `timestamp, kind, a, b, c, d` where `kind` is
/// one of `odom` (a=ego_x, b=ego_y, c=ego_yaw), `lidar` (a=range, b=angle)
/// or `radar` (a=pos_x, b=pos_y, c=radial_velocity, d=snr).
#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: f64,
    kind: String,
    a: Option<f32>,
    b: Option<f32>,
    c: Option<f32>,
    d: Option<f32>,
}

/// Reads a CSV of interleaved odom/lidar/radar rows and regroups them into
/// [`SensorFrame`]s keyed by timestamp.
///
/// Unlike the core pipeline, which never errors, the loader is strict: a
/// malformed row, an unknown `kind`, or an input with no rows at all are
/// reported via [`DogmError`].
pub struct FrameLoader {
    frames: VecDeque<SensorFrame>,
}

impl FrameLoader {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = csv::Reader::from_path(path)?;
        Self::from_csv_reader(reader)
    }

    pub fn from_reader<R: Read>(rdr: R) -> Result<Self> {
        let reader = csv::Reader::from_reader(rdr);
        Self::from_csv_reader(reader)
    }

    fn from_csv_reader<R: Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let mut grouped: BTreeMap<u64, SensorFrame> = BTreeMap::new();

        for result in reader.deserialize() {
            let row: CsvRow = result?;
            let key = row.timestamp.to_bits();
            let frame = grouped.entry(key).or_insert_with(|| SensorFrame {
                timestamp: row.timestamp,
                ..Default::default()
            });

            match row.kind.as_str() {
                "odom" => {
                    frame.ego_pose = (row.a.unwrap_or(0.0), row.b.unwrap_or(0.0));
                    frame.ego_yaw = row.c.unwrap_or(0.0);
                }
                "lidar" => {
                    frame.lidar.ranges.push(row.a.unwrap_or(0.0));
                    frame.lidar.angles.push(row.b.unwrap_or(0.0));
                }
                "radar" => {
                    frame.radar.push(RadarDetection {
                        position: (row.a.unwrap_or(0.0), row.b.unwrap_or(0.0)),
                        radial_velocity: row.c.unwrap_or(0.0),
                        snr: row.d.unwrap_or(0.0),
                    });
                }
                other => {
                    return Err(DogmError::InvalidParams(format!(
                        "unknown row kind '{other}'"
                    )))
                }
            }
        }

        if grouped.is_empty() {
            return Err(DogmError::NoFrames);
        }

        Ok(Self {
            frames: grouped.into_values().collect(),
        })
    }

    /// Pops the next frame in timestamp order, or `None` once exhausted.
    pub fn next_frame(&mut self) -> Option<SensorFrame> {
        self.frames.pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
