//! Allocates timestamped product paths, takes out a `.lock` sentinel,
//! delegates to `archive::write_product`, and hands the closed file to the
//! `Compressor`.
//!
//! Grounded on `examples/original_source/FITSWriter.cpp`'s path/lock
//! discipline and header-key names, and on the teacher's `src/file_sink.rs`
//! for the idiom of a sink that owns a file end to end and closes it
//! deterministically before handing off.

use std::path::PathBuf;

use log::{info, warn};

use crate::archive::{self, Column, HeaderValue, Image2D, Table};
use crate::compressor::Compressor;
use crate::error::{Error, Result};
use crate::image_assembler::ImageRecord;
use crate::time::{TaiTimestamp, Ydhms};

/// Product channel, used to build the `level0b/<channel>/...` path segment
/// and the filename prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductChannel {
    /// MEGS-A image.
    MegsA,
    /// MEGS-B image.
    MegsB,
    /// MEGS-P photometer batch.
    MegsP,
    /// ESP photometer batch.
    Esp,
    /// Housekeeping batch.
    Shk,
}

impl ProductChannel {
    fn dir_name(self) -> &'static str {
        match self {
            ProductChannel::MegsA => "megs_a",
            ProductChannel::MegsB => "megs_b",
            ProductChannel::MegsP => "megs_p",
            ProductChannel::Esp => "esp",
            ProductChannel::Shk => "shk",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            ProductChannel::MegsA => "MA",
            ProductChannel::MegsB => "MB",
            ProductChannel::MegsP => "MP",
            ProductChannel::Esp => "ESP",
            ProductChannel::Shk => "SHK",
        }
    }

    fn extname(self) -> &'static str {
        match self {
            ProductChannel::MegsA => "MEGS-A",
            ProductChannel::MegsB => "MEGS-B",
            ProductChannel::MegsP => "MEGS-P",
            ProductChannel::Esp => "ESP",
            ProductChannel::Shk => "SHK",
        }
    }
}

/// Allocates and writes Level 0B product files under
/// `${EVE_DATA_ROOT}/level0b/<channel>/<YYYY>/<DDD>/`.
pub struct ProductWriter {
    data_root: PathBuf,
    compressor: Compressor,
}

impl ProductWriter {
    /// Create a writer rooted at `data_root` (the validated
    /// `EVE_DATA_ROOT`).
    pub fn new(data_root: impl Into<PathBuf>, compressor: Compressor) -> Self {
        Self {
            data_root: data_root.into(),
            compressor,
        }
    }

    fn path_for(&self, channel: ProductChannel, tai: &TaiTimestamp) -> PathBuf {
        let stamp = Ydhms::from_utc(tai.to_utc());
        self.data_root
            .join("level0b")
            .join(channel.dir_name())
            .join(format!("{:04}", stamp.year))
            .join(format!("{:03}", stamp.day_of_year))
            .join(format!(
                "{}_{}_{}.fit",
                channel.prefix(),
                stamp.yyyyddd(),
                stamp.hhmmss()
            ))
    }

    fn header_for(channel: ProductChannel, tai: &TaiTimestamp) -> Vec<(String, HeaderValue)> {
        let stamp = Ydhms::from_utc(tai.to_utc());
        vec![
            ("EXTNAME".to_string(), HeaderValue::Str(channel.extname().to_string())),
            ("SOD".to_string(), HeaderValue::Int(stamp.seconds_of_day() as i64)),
            ("YDOY".to_string(), HeaderValue::Int(stamp.yyyyddd() as i64)),
            ("TAI_TIME".to_string(), HeaderValue::Int(tai.seconds as i64)),
            (
                "REC_TAI".to_string(),
                HeaderValue::Int(tai.tai_seconds_since_unix_epoch()),
            ),
            (
                "DATE-BEG".to_string(),
                HeaderValue::Str(tai.to_utc().to_rfc3339()),
            ),
            ("SOLARNET".to_string(), HeaderValue::Float(0.5)),
            ("OBS_HDU".to_string(), HeaderValue::Int(1)),
        ]
    }

    fn with_lock<R>(&self, path: &std::path::Path, write: impl FnOnce() -> Result<R>) -> Result<R> {
        let lock_path = path.with_extension("lock");
        std::fs::create_dir_all(path.parent().expect("product path has a parent"))?;
        std::fs::File::create(&lock_path).map_err(|e| Error::Lock {
            path: lock_path.clone(),
            source: e,
        })?;
        let result = write();
        std::fs::remove_file(&lock_path).map_err(|e| Error::Lock {
            path: lock_path.clone(),
            source: e,
        })?;
        result
    }

    /// Write a completed MEGS-A/MEGS-B image product.
    pub fn write_image(&mut self, channel: ProductChannel, image: &ImageRecord) -> Result<PathBuf> {
        let path = self.path_for(channel, &image.tai);
        let header = Self::header_for(channel, &image.tai);
        let img = Image2D {
            width: crate::image_assembler::WIDTH,
            height: crate::image_assembler::HEIGHT,
            data: image.pixels.clone(),
        };
        self.with_lock(&path, || archive::write_product(&path, &header, Some(&img), None))?;
        info!("wrote {}", path.display());
        Ok(self.compressor.compress(&path))
    }

    /// Write a completed ESP batch product.
    pub fn write_esp(
        &mut self,
        rows: &[crate::integration_accumulator::EspSample],
    ) -> Result<PathBuf> {
        let tai = TaiTimestamp {
            seconds: rows[0].tai_seconds,
            subseconds: rows[0].tai_subseconds,
        };
        let path = self.path_for(ProductChannel::Esp, &tai);
        let header = Self::header_for(ProductChannel::Esp, &tai);
        let table = Table {
            columns: vec![
                (
                    "q0".to_string(),
                    Column::U16(rows.iter().map(|r| r.q[0]).collect()),
                ),
                (
                    "q1".to_string(),
                    Column::U16(rows.iter().map(|r| r.q[1]).collect()),
                ),
                (
                    "q2".to_string(),
                    Column::U16(rows.iter().map(|r| r.q[2]).collect()),
                ),
                (
                    "q3".to_string(),
                    Column::U16(rows.iter().map(|r| r.q[3]).collect()),
                ),
                (
                    "171".to_string(),
                    Column::U16(rows.iter().map(|r| r.bands[0]).collect()),
                ),
                (
                    "257".to_string(),
                    Column::U16(rows.iter().map(|r| r.bands[1]).collect()),
                ),
                (
                    "304".to_string(),
                    Column::U16(rows.iter().map(|r| r.bands[2]).collect()),
                ),
                (
                    "366".to_string(),
                    Column::U16(rows.iter().map(|r| r.bands[3]).collect()),
                ),
                (
                    "dark".to_string(),
                    Column::U16(rows.iter().map(|r| r.bands[4]).collect()),
                ),
                (
                    "filter_position".to_string(),
                    Column::U16(rows.iter().map(|r| r.filter_position as u16).collect()),
                ),
                (
                    "resolver".to_string(),
                    Column::U16(rows.iter().map(|r| r.resolver).collect()),
                ),
                (
                    "temperature_dn".to_string(),
                    Column::U16(rows.iter().map(|r| r.temperature_dn).collect()),
                ),
                (
                    "tai_seconds".to_string(),
                    Column::U32(rows.iter().map(|r| r.tai_seconds).collect()),
                ),
            ],
        };
        self.with_lock(&path, || archive::write_product(&path, &header, None, Some(&table)))?;
        info!("wrote {}", path.display());
        Ok(self.compressor.compress(&path))
    }

    /// Write a completed MEGS-P batch product.
    pub fn write_megs_p(
        &mut self,
        rows: &[crate::integration_accumulator::MegsPSample],
    ) -> Result<PathBuf> {
        let tai = TaiTimestamp {
            seconds: rows[0].tai_seconds,
            subseconds: rows[0].tai_subseconds,
        };
        let path = self.path_for(ProductChannel::MegsP, &tai);
        let header = Self::header_for(ProductChannel::MegsP, &tai);
        let table = Table {
            columns: vec![
                (
                    "lya".to_string(),
                    Column::U16(rows.iter().map(|r| r.lya).collect()),
                ),
                (
                    "dark".to_string(),
                    Column::U16(rows.iter().map(|r| r.dark).collect()),
                ),
                (
                    "resolver".to_string(),
                    Column::U16(rows.iter().map(|r| r.resolver).collect()),
                ),
                (
                    "temperature_dn".to_string(),
                    Column::U16(rows.iter().map(|r| r.temperature_dn).collect()),
                ),
                (
                    "tai_seconds".to_string(),
                    Column::U32(rows.iter().map(|r| r.tai_seconds).collect()),
                ),
            ],
        };
        self.with_lock(&path, || archive::write_product(&path, &header, None, Some(&table)))?;
        info!("wrote {}", path.display());
        Ok(self.compressor.compress(&path))
    }

    /// Write a completed housekeeping batch product.
    pub fn write_shk(
        &mut self,
        rows: &[crate::housekeeping::HousekeepingRow],
    ) -> Result<PathBuf> {
        let tai = TaiTimestamp {
            seconds: rows[0].tai_seconds,
            subseconds: rows[0].tai_subseconds,
        };
        let path = self.path_for(ProductChannel::Shk, &tai);
        let header = Self::header_for(ProductChannel::Shk, &tai);

        let mut columns = vec![
            (
                "tai_seconds".to_string(),
                Column::U32(rows.iter().map(|r| r.tai_seconds).collect()),
            ),
            (
                "mode".to_string(),
                Column::U32(rows.iter().map(|r| r.mode).collect()),
            ),
        ];
        for (i, name) in crate::housekeeping::RAW_SENSOR_COLUMNS.iter().enumerate() {
            columns.push((
                name.to_string(),
                Column::U32(rows.iter().map(|r| r.raw[i]).collect()),
            ));
        }
        if let Some(first) = rows.first() {
            for (name, _) in first.engineering_columns() {
                let values: Vec<f64> = rows
                    .iter()
                    .map(|r| {
                        r.engineering_columns()
                            .into_iter()
                            .find(|(n, _)| *n == name)
                            .map(|(_, v)| v)
                            .unwrap_or(0.0)
                    })
                    .collect();
                columns.push((name.to_string(), Column::F64(values)));
            }
        } else {
            warn!("empty SHK batch, writing header only");
        }
        let table = Table { columns };
        self.with_lock(&path, || archive::write_product(&path, &header, None, Some(&table)))?;
        info!("wrote {}", path.display());
        Ok(self.compressor.compress(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration_accumulator::EspSample;

    #[test]
    fn allocates_expected_path_layout() {
        let tmpd = tempfile::tempdir().unwrap();
        let mut writer = ProductWriter::new(tmpd.path(), Compressor::new("gzip"));

        let rows = vec![EspSample {
            tai_seconds: (crate::time::TAI_EPOCH_OFFSET_TO_UNIX + crate::time::LEAP_SECONDS as i64)
                as u32,
            ..Default::default()
        }];
        let out = writer.write_esp(&rows).unwrap();
        assert!(out.to_string_lossy().contains("level0b"));
        assert!(out.to_string_lossy().contains("esp"));
    }

    #[test]
    fn lock_file_is_removed_after_write() {
        let tmpd = tempfile::tempdir().unwrap();
        let mut writer = ProductWriter::new(tmpd.path(), Compressor::new("gzip"));
        let rows = vec![EspSample {
            tai_seconds: (crate::time::TAI_EPOCH_OFFSET_TO_UNIX + crate::time::LEAP_SECONDS as i64)
                as u32,
            ..Default::default()
        }];
        writer.write_esp(&rows).unwrap();

        let walked = walk_files(tmpd.path());
        assert!(!walked.iter().any(|p| p.extension().map(|e| e == "lock").unwrap_or(false)));
    }

    fn walk_files(dir: &std::path::Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            if path.is_dir() {
                out.extend(walk_files(&path));
            } else {
                out.push(path);
            }
        }
        out
    }
}
