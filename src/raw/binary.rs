// In: src/raw/binary.rs

//! Binary FID files: an optional file header, then fixed-size records, each
//! optionally preceded by a block header. Samples are little-endian in the
//! configured `SampleFormat`, complex records interleave `re, im`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use num_complex::Complex64;

use crate::config::RawConfig;
use crate::error::NmrProcError;
use crate::raw::{missing_record, FidSource};
use crate::utils::pack_complex;

#[derive(Debug)]
pub struct BinaryFid {
    path: PathBuf,
    file: Mutex<File>,
    layout: RawConfig,
    points: usize,
    complex: bool,
    record_count: usize,
}

impl BinaryFid {
    /// Opens `path` for records of `points` points.
    ///
    /// The record count is derived from the file length; a trailing partial
    /// record is not counted.
    pub fn open(path: impl AsRef<Path>, points: usize, complex: bool, layout: RawConfig) -> Result<Self, NmrProcError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        let stride = layout.block_header_bytes + record_bytes(points, complex, &layout);
        let record_count = if stride == 0 {
            0
        } else {
            (len.saturating_sub(layout.header_bytes) / stride) as usize
        };
        log::debug!(
            "Opened {} ({} bytes): {} records of {} {} points",
            path.display(),
            len,
            record_count,
            points,
            layout.sample_format
        );
        Ok(Self {
            path,
            file: Mutex::new(file),
            layout,
            points,
            complex,
            record_count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record_bytes(&self) -> u64 {
        record_bytes(self.points, self.complex, &self.layout)
    }
}

fn record_bytes(points: usize, complex: bool, layout: &RawConfig) -> u64 {
    let samples = if complex { points * 2 } else { points };
    (samples * layout.sample_format.byte_width()) as u64
}

impl FidSource for BinaryFid {
    fn record_count(&self) -> usize {
        self.record_count
    }

    fn points_per_record(&self) -> usize {
        self.points
    }

    fn is_complex(&self) -> bool {
        self.complex
    }

    fn read_record(&self, index: usize, out: &mut [Complex64]) -> Result<(), NmrProcError> {
        if index >= self.record_count {
            return Err(missing_record(index, self.record_count));
        }
        let size = self.record_bytes();
        let offset = self.layout.header_bytes
            + index as u64 * (self.layout.block_header_bytes + size)
            + self.layout.block_header_bytes;

        let mut bytes = vec![0u8; size as usize];
        {
            let mut file = self
                .file
                .lock()
                .map_err(|_| NmrProcError::InternalError("FID file lock poisoned".to_string()))?;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut bytes)?;
        }
        let samples = self.layout.sample_format.decode(&bytes)?;
        pack_complex(&samples, self.complex, out)
    }
}
