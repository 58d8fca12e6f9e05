//! Fixed point set the tree is built over
//!
//! A dataset is an array of D-dimensional f32 coordinate vectors, each tagged
//! with a stable integer identity distinct from its array position. Points are
//! written during load and immutable once a tree references them. On disk a
//! dataset is a file pair: the primary data file (count and dimension header,
//! then row-major coordinates) and a companion identity file at the same base
//! name with an `.ind` suffix.

use crate::error::Error;
use crate::layout;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use rand::Rng;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub type PointId = u64;

///Borrowed view of a single point: its coordinates and its identity
#[derive(Debug, Clone, Copy)]
pub struct PointRef<'a> {
    pub coords: &'a [f32],
    pub id: PointId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryDataset {
    coords: Vec<f32>,
    ids: Vec<PointId>,
    dimension: usize,
}

impl BinaryDataset {
    ///Zero-filled dataset with identities defaulting to the array position
    pub fn new(num_points: usize, dimension: usize) -> Self {
        return Self {
            coords: vec![0.0; num_points * dimension],
            ids: (0..num_points as PointId).collect(),
            dimension,
        };
    }

    pub fn random(num_points: usize, dimension: usize) -> Self {
        let mut rng = rand::thread_rng();
        let mut dataset = Self::new(num_points, dimension);

        for i in 0..num_points {
            for j in 0..dimension {
                dataset.set_coord(i, j, rng.gen::<f32>() - 0.48);
            }
        }

        return dataset;
    }

    pub fn num_points(&self) -> usize {
        return self.ids.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.ids.is_empty();
    }

    pub fn dimension(&self) -> usize {
        return self.dimension;
    }

    pub fn coord(&self, point: usize, axis: usize) -> f32 {
        return self.coords[point * self.dimension + axis];
    }

    pub fn set_coord(&mut self, point: usize, axis: usize, value: f32) {
        self.coords[point * self.dimension + axis] = value;
    }

    pub fn coords(&self, point: usize) -> &[f32] {
        let start = point * self.dimension;
        return &self.coords[start..start + self.dimension];
    }

    pub fn id(&self, point: usize) -> PointId {
        return self.ids[point];
    }

    pub fn set_id(&mut self, point: usize, id: PointId) {
        self.ids[point] = id;
    }

    pub fn point(&self, index: usize) -> PointRef<'_> {
        return PointRef {
            coords: self.coords(index),
            id: self.ids[index],
        };
    }

    ///Position of the first point carrying `id`, if any
    pub fn find_by_id(&self, id: PointId) -> Option<usize> {
        return self.ids.iter().position(|&x| x == id);
    }

    pub fn index_path(path: &Path) -> PathBuf {
        let mut os = path.as_os_str().to_os_string();
        os.push(layout::INDEX_FILE_SUFFIX);
        return PathBuf::from(os);
    }

    pub fn to_file(&self, path: &Path) -> Result<(), Error> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);

        writer
            .write_u64::<BigEndian>(self.num_points() as u64)
            .map_err(|e| Error::io(path, e))?;
        writer
            .write_u64::<BigEndian>(self.dimension as u64)
            .map_err(|e| Error::io(path, e))?;

        for value in self.coords.iter() {
            writer
                .write_f32::<BigEndian>(*value)
                .map_err(|e| Error::io(path, e))?;
        }
        writer.flush().map_err(|e| Error::io(path, e))?;

        let index_path = Self::index_path(path);
        let index_file = File::create(&index_path).map_err(|e| Error::io(&index_path, e))?;
        let mut index_writer = BufWriter::new(index_file);

        for id in self.ids.iter() {
            index_writer
                .write_u64::<BigEndian>(*id)
                .map_err(|e| Error::io(&index_path, e))?;
        }
        index_writer.flush().map_err(|e| Error::io(&index_path, e))?;

        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut reader = BufReader::new(file);

        let num_points = reader
            .read_u64::<BigEndian>()
            .map_err(|e| Error::io(path, e))? as usize;
        let dimension = reader
            .read_u64::<BigEndian>()
            .map_err(|e| Error::io(path, e))? as usize;

        let mut coords = vec![0.0f32; num_points * dimension];
        reader
            .read_f32_into::<BigEndian>(&mut coords)
            .map_err(|e| Error::io(path, e))?;

        let index_path = Self::index_path(path);
        let index_file = File::open(&index_path).map_err(|e| Error::io(&index_path, e))?;
        let mut index_reader = BufReader::new(index_file);

        let mut ids = vec![0u64; num_points];
        index_reader
            .read_u64_into::<BigEndian>(&mut ids)
            .map_err(|e| Error::io(&index_path, e))?;

        return Ok(Self {
            coords,
            ids,
            dimension,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_access_and_identity() {
        let mut dataset = BinaryDataset::new(3, 2);

        dataset.set_coord(1, 0, 0.5);
        dataset.set_coord(1, 1, -0.25);
        dataset.set_id(1, 77);

        assert_eq!(dataset.num_points(), 3);
        assert_eq!(dataset.dimension(), 2);
        assert_eq!(dataset.coords(1), &[0.5, -0.25]);
        assert_eq!(dataset.point(1).id, 77);
        assert_eq!(dataset.find_by_id(77), Some(1));
        assert_eq!(dataset.find_by_id(999), None);
    }

    #[test]
    fn quick_file_pair_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");

        let mut dataset = BinaryDataset::random(100, 4);
        dataset.set_id(42, 100042);
        dataset.to_file(&path).unwrap();

        assert!(path.exists());
        assert!(BinaryDataset::index_path(&path).exists());

        let reloaded = BinaryDataset::from_file(&path).unwrap();
        assert_eq!(reloaded, dataset);
        assert_eq!(reloaded.id(42), 100042);
    }
}
