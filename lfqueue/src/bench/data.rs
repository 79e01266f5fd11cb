// Input values for the benchmark: a flat file of little-endian u32s.
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::DataError;

const VALUE_SIZE: usize = std::mem::size_of::<u32>();

/// `count` pseudo-random values, reproducible from `seed`.
pub fn generate(count: usize, seed: u64) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.gen()).collect()
}

pub fn write_values(path: &Path, values: &[u32]) -> Result<(), DataError> {
    let io_err = |source| DataError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut out = BufWriter::new(File::create(path).map_err(io_err)?);
    for value in values {
        out.write_all(&value.to_le_bytes()).map_err(io_err)?;
    }
    out.flush().map_err(io_err)?;

    debug!(path = %path.display(), count = values.len(), "wrote input values");
    Ok(())
}

/// Reads the first `count` values of `path`. Extra trailing values are ignored.
pub fn load_values(path: &Path, count: usize) -> Result<Vec<u32>, DataError> {
    let bytes = fs::read(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let found = bytes.len() / VALUE_SIZE;
    if found < count {
        return Err(DataError::Truncated {
            path: path.to_path_buf(),
            expected: count,
            found,
        });
    }

    let values: Vec<u32> = bytes
        .chunks_exact(VALUE_SIZE)
        .take(count)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    debug!(path = %path.display(), count, "loaded input values");
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_is_deterministic_per_seed() {
        assert_eq!(generate(64, 7), generate(64, 7));
        assert_ne!(generate(64, 7), generate(64, 8));
        assert!(generate(0, 7).is_empty());
    }

    #[test]
    fn file_holds_exactly_the_written_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("random_values_insert.bin");
        let values = vec![0, 1, u32::MAX, 0xDEAD_BEEF, 42];

        write_values(&path, &values).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 20);
        assert_eq!(load_values(&path, 5).unwrap(), values);
        assert_eq!(load_values(&path, 2).unwrap(), vec![0, 1]);
    }

    #[test]
    fn short_file_is_truncated_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        // Six bytes: one whole value plus a partial one.
        fs::write(&path, [1, 0, 0, 0, 9, 9]).unwrap();

        match load_values(&path, 2) {
            Err(DataError::Truncated {
                expected, found, ..
            }) => {
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("expected truncation error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_values(&dir.path().join("absent.bin"), 1).unwrap_err();
        assert!(matches!(err, DataError::Io { .. }));
        assert!(err.to_string().contains("absent.bin"));
    }
}
