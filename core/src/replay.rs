//! Replay of recorded IMU logs through a [Preintegrator].
//!
//! Logs are CSV files with one sample per row:
//!
//! ```text
//! time,gyro_x,gyro_y,gyro_z,accel_x,accel_y,accel_z
//! 0.000,0.001,-0.002,0.100,0.05,0.01,9.81
//! 0.005,0.001,-0.002,0.100,0.05,0.01,9.81
//! ```
//!
//! with time in seconds, angular rate in rad/s and specific force in m/s^2. Consecutive samples
//! inside a time window are fed pairwise; no interpolation is done at the window edges.

use std::path::Path;

use log::{debug, info};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::CpiError;
use crate::{IMUData, Preintegrator};

/// Struct representing a single row of an IMU log.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImuRecord {
    /// Sample time in seconds
    pub time: f64,
    /// Angular rate about the x axis in rad/s
    pub gyro_x: f64,
    /// Angular rate about the y axis in rad/s
    pub gyro_y: f64,
    /// Angular rate about the z axis in rad/s
    pub gyro_z: f64,
    /// Specific force along the x axis in m/s^2
    pub accel_x: f64,
    /// Specific force along the y axis in m/s^2
    pub accel_y: f64,
    /// Specific force along the z axis in m/s^2
    pub accel_z: f64,
}

impl ImuRecord {
    pub fn new(time: f64, gyro: &Vector3<f64>, accel: &Vector3<f64>) -> ImuRecord {
        ImuRecord {
            time,
            gyro_x: gyro[0],
            gyro_y: gyro[1],
            gyro_z: gyro[2],
            accel_x: accel[0],
            accel_y: accel[1],
            accel_z: accel[2],
        }
    }
    pub fn gyro(&self) -> Vector3<f64> {
        Vector3::new(self.gyro_x, self.gyro_y, self.gyro_z)
    }
    pub fn accel(&self) -> Vector3<f64> {
        Vector3::new(self.accel_x, self.accel_y, self.accel_z)
    }
    pub fn imu_data(&self) -> IMUData {
        IMUData::new(self.accel(), self.gyro())
    }
    /// Reads a CSV file and returns its records in file order.
    ///
    /// # Arguments
    /// * `path` - Path to the CSV file to read.
    ///
    /// # Returns
    /// * `Ok(Vec<ImuRecord>)` if successful.
    /// * `Err` if the file cannot be read or parsed.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Self>, CpiError> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: Self = result?;
            records.push(record);
        }
        Ok(records)
    }
    /// Writes records to a CSV file with a header row.
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> Result<(), CpiError> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Feed every consecutive pair of records whose times fall inside `[start, end]` into the
/// preintegrator, in order.
///
/// Duplicate timestamps are passed through (the preintegrator ignores zero-length steps).
/// Decreasing timestamps are rejected before anything is integrated.
///
/// # Returns
/// The number of sample pairs integrated.
pub fn preintegrate_records(
    preintegrator: &mut Preintegrator,
    records: &[ImuRecord],
    start: f64,
    end: f64,
) -> Result<usize, CpiError> {
    if start.is_nan() || end.is_nan() {
        return Err(CpiError::InvalidParameter(format!(
            "window bounds must be numbers, got [{}, {}]",
            start, end
        )));
    }
    if start > end {
        return Err(CpiError::InvalidParameter(format!(
            "window start {} is after window end {}",
            start, end
        )));
    }
    let window: Vec<&ImuRecord> = records
        .iter()
        .filter(|r| r.time >= start && r.time <= end)
        .collect();
    if window.len() < 2 {
        return Err(CpiError::InsufficientSamples {
            start,
            end,
            found: window.len(),
        });
    }
    if let Some(pair) = window.windows(2).find(|pair| pair[1].time < pair[0].time) {
        return Err(CpiError::InvalidParameter(format!(
            "timestamps must be non-decreasing, found {} after {}",
            pair[1].time, pair[0].time
        )));
    }
    debug!(
        "Replaying {} samples over [{}, {}]",
        window.len(),
        window[0].time,
        window[window.len() - 1].time
    );
    for pair in window.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        preintegrator.integrate_sample_interval(
            first.time,
            second.time,
            &first.gyro(),
            &first.accel(),
            &second.gyro(),
            &second.accel(),
        );
    }
    info!(
        "Preintegrated {} sample pairs covering {:.6} s",
        window.len() - 1,
        preintegrator.elapsed_time()
    );
    Ok(window.len() - 1)
}
