//! Batch result records and the memory-mapped file they stream into
//!
//! The output file is a 4-byte record-count header followed by densely packed
//! fixed-width records, written in native byte order through a mutable map.
//! The writer is the sole mutator until `close` flushes, rewrites the header
//! with the true count, and truncates; after that any reader may remap the
//! file and page through the records.

use crate::error::Error;
use crate::layout;
use byteorder::{ByteOrder, NativeEndian};
use log::debug;
use memmap2::{Mmap, MmapMut};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

///Fixed-size batch record: one neighbor of one query point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NNResult {
    pub point_id: u64,
    pub neighbor_id: u64,
    pub distance: f32,
}

impl NNResult {
    pub fn encode(&self, buf: &mut [u8]) {
        NativeEndian::write_u64(
            &mut buf[layout::RESULT_POINT_ID_OFFSET
                ..layout::RESULT_POINT_ID_OFFSET + layout::RESULT_POINT_ID_SIZE],
            self.point_id,
        );
        NativeEndian::write_u64(
            &mut buf[layout::RESULT_NEIGHBOR_ID_OFFSET
                ..layout::RESULT_NEIGHBOR_ID_OFFSET + layout::RESULT_NEIGHBOR_ID_SIZE],
            self.neighbor_id,
        );
        NativeEndian::write_f32(
            &mut buf[layout::RESULT_DISTANCE_OFFSET
                ..layout::RESULT_DISTANCE_OFFSET + layout::RESULT_DISTANCE_SIZE],
            self.distance,
        );
    }

    pub fn decode(buf: &[u8]) -> Self {
        return Self {
            point_id: NativeEndian::read_u64(
                &buf[layout::RESULT_POINT_ID_OFFSET
                    ..layout::RESULT_POINT_ID_OFFSET + layout::RESULT_POINT_ID_SIZE],
            ),
            neighbor_id: NativeEndian::read_u64(
                &buf[layout::RESULT_NEIGHBOR_ID_OFFSET
                    ..layout::RESULT_NEIGHBOR_ID_OFFSET + layout::RESULT_NEIGHBOR_ID_SIZE],
            ),
            distance: NativeEndian::read_f32(
                &buf[layout::RESULT_DISTANCE_OFFSET
                    ..layout::RESULT_DISTANCE_OFFSET + layout::RESULT_DISTANCE_SIZE],
            ),
        };
    }
}

#[derive(Debug)]
pub struct ResultWriter {
    path: PathBuf,
    file: File,
    mmap: MmapMut,
    capacity: usize,
    written: usize,
}

impl ResultWriter {
    ///Creates (or truncates) the output file sized for `expected_records` and maps it
    pub fn create(path: &Path, expected_records: usize) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;

        let size = layout::RESULT_DATA_START + expected_records * layout::RESULT_RECORD_SIZE;
        file.set_len(size as u64).map_err(|e| Error::io(path, e))?;

        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|e| Error::io(path, e))?;

        return Ok(Self {
            path: path.to_path_buf(),
            file,
            mmap,
            capacity: expected_records,
            written: 0,
        });
    }

    pub fn capacity(&self) -> usize {
        return self.capacity;
    }

    ///High-water record count so far
    pub fn written(&self) -> usize {
        return self.written;
    }

    ///Stores `record` at the given slot, growing the mapping if needed
    pub fn write(&mut self, slot: usize, record: &NNResult) -> Result<(), Error> {
        self.ensure_capacity(slot + 1)?;

        let start = layout::RESULT_DATA_START + slot * layout::RESULT_RECORD_SIZE;
        record.encode(&mut self.mmap[start..start + layout::RESULT_RECORD_SIZE]);

        if slot + 1 > self.written {
            self.written = slot + 1;
        }

        Ok(())
    }

    ///Stores `record` behind the running cursor, for variable-count batches
    pub fn append(&mut self, record: &NNResult) -> Result<(), Error> {
        let slot = self.written;
        return self.write(slot, record);
    }

    fn ensure_capacity(&mut self, records: usize) -> Result<(), Error> {
        if records <= self.capacity {
            return Ok(());
        }

        let mut new_capacity = if self.capacity == 0 { records } else { self.capacity };
        while new_capacity < records {
            new_capacity *= 2;
        }

        debug!(
            "growing result file {} from {} to {} record slots",
            self.path.display(),
            self.capacity,
            new_capacity
        );

        self.mmap.flush().map_err(|e| Error::io(&self.path, e))?;
        let size = layout::RESULT_DATA_START + new_capacity * layout::RESULT_RECORD_SIZE;
        self.file
            .set_len(size as u64)
            .map_err(|e| Error::io(&self.path, e))?;
        self.mmap = unsafe { MmapMut::map_mut(&self.file) }.map_err(|e| Error::io(&self.path, e))?;
        self.capacity = new_capacity;

        Ok(())
    }

    ///Flushes, writes the true record count into the header, and truncates
    ///any reserved-but-unwritten tail
    pub fn close(mut self) -> Result<(), Error> {
        let written = self.written;

        NativeEndian::write_i32(
            &mut self.mmap
                [layout::RESULT_COUNT_OFFSET..layout::RESULT_COUNT_OFFSET + layout::RESULT_COUNT_SIZE],
            written as i32,
        );
        self.mmap.flush().map_err(|e| Error::io(&self.path, e))?;

        let ResultWriter {
            path, file, mmap, ..
        } = self;
        drop(mmap);

        let size = layout::RESULT_DATA_START + written * layout::RESULT_RECORD_SIZE;
        file.set_len(size as u64).map_err(|e| Error::io(&path, e))?;
        file.sync_all().map_err(|e| Error::io(&path, e))?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct ResultReader {
    mmap: Mmap,
    count: usize,
}

impl ResultReader {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(path, e))?;

        if mmap.len() < layout::RESULT_DATA_START {
            return Err(Error::Corrupt(format!(
                "result file {} is shorter than its header",
                path.display()
            )));
        }

        let count = NativeEndian::read_i32(
            &mmap[layout::RESULT_COUNT_OFFSET..layout::RESULT_COUNT_OFFSET + layout::RESULT_COUNT_SIZE],
        );
        if count < 0 {
            return Err(Error::Corrupt(format!(
                "result file {} reports a negative record count",
                path.display()
            )));
        }

        let count = count as usize;
        let expected = layout::RESULT_DATA_START + count * layout::RESULT_RECORD_SIZE;
        if mmap.len() < expected {
            return Err(Error::Corrupt(format!(
                "result file {} holds {} bytes but its header implies {}",
                path.display(),
                mmap.len(),
                expected
            )));
        }

        return Ok(Self { mmap, count });
    }

    pub fn len(&self) -> usize {
        return self.count;
    }

    pub fn is_empty(&self) -> bool {
        return self.count == 0;
    }

    pub fn get(&self, index: usize) -> Result<NNResult, Error> {
        if index >= self.count {
            return Err(Error::OffsetOutOfBounds {
                offset: index,
                len: self.count,
            });
        }

        let start = layout::RESULT_DATA_START + index * layout::RESULT_RECORD_SIZE;
        return Ok(NNResult::decode(
            &self.mmap[start..start + layout::RESULT_RECORD_SIZE],
        ));
    }

    pub fn records(&self) -> Vec<NNResult> {
        return (0..self.count).map(|i| self.get(i).unwrap()).collect();
    }
}
