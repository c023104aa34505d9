//! Content fingerprints for sets of files.
//!
//! The aggregate fingerprint of a set of paths is meant to be fed into
//! [`ComposeTask::add_config_dependency`](crate::ComposeTask::add_config_dependency),
//! so that a task becomes stale when any of those files change, without
//! listing them as file dependencies.
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;

use camino::{Utf8Path, Utf8PathBuf};
use glob::{Pattern, glob};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::error::FingerprintError;

/// A 32-byte BLAKE3 hash used for change detection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash32([u8; 32]);

impl<T> From<T> for Hash32
where
    T: Into<[u8; 32]>,
{
    fn from(value: T) -> Self {
        Hash32(value.into())
    }
}

impl Hash32 {
    pub fn hash(buffer: impl AsRef<[u8]>) -> Self {
        blake3::Hasher::new()
            .update(buffer.as_ref())
            .finalize()
            .into()
    }

    pub fn hash_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        Ok(blake3::Hasher::new().update_mmap(path)?.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";

        self.0
            .iter()
            .flat_map(|&byte| [HEX[(byte >> 4) as usize], HEX[(byte & 0xF) as usize]])
            .map(char::from)
            .collect()
    }
}

impl std::fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

/// Find all files below `base_dir` with the given extension.
pub fn find_source_files(
    base_dir: impl AsRef<Utf8Path>,
    extension: &str,
) -> Result<Vec<Utf8PathBuf>, FingerprintError> {
    let base_dir = Pattern::escape(base_dir.as_ref().as_str());
    let pattern = format!("{base_dir}/**/*.{extension}");

    let mut paths = Vec::new();
    for path in glob(&pattern)? {
        paths.push(Utf8PathBuf::try_from(path?)?);
    }

    tracing::debug!(pattern = %pattern, found = paths.len(), "found source files");
    Ok(paths)
}

/// Hash the contents of a file. A missing or empty file yields no bytes.
pub fn hash_path_contents(path: impl AsRef<Utf8Path>) -> Result<Vec<u8>, FingerprintError> {
    let path = path.as_ref();

    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            tracing::trace!(path = %path, "path does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    if metadata.len() == 0 {
        return Ok(Vec::new());
    }

    Ok(Hash32::hash_file(path)?.as_bytes().to_vec())
}

/// Hash every path in parallel, keyed by the path itself.
pub fn create_path_content_map<P>(
    paths: &[P],
) -> Result<BTreeMap<String, Vec<u8>>, FingerprintError>
where
    P: AsRef<Utf8Path> + Sync,
{
    paths
        .par_iter()
        .map(|path| -> Result<_, FingerprintError> {
            let path = path.as_ref();
            Ok((path.to_string(), hash_path_contents(path)?))
        })
        .collect()
}

/// A single hex fingerprint over the contents of all `paths`.
///
/// The per-path map is CBOR-encoded before hashing, so the result only
/// depends on the set of paths and their contents.
pub fn create_path_content_hash<P>(paths: &[P]) -> Result<String, FingerprintError>
where
    P: AsRef<Utf8Path> + Sync,
{
    let contents = create_path_content_map(paths)?;

    let mut buffer = Vec::new();
    ciborium::into_writer(&contents, &mut buffer)?;

    Ok(Hash32::hash(buffer).to_hex())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    struct Sample {
        _dir: TempDir,
        root: Utf8PathBuf,
        some_file: Utf8PathBuf,
        other_file: Utf8PathBuf,
        empty_file: Utf8PathBuf,
        missing: Utf8PathBuf,
    }

    fn sample_project() -> Sample {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        let some_file = root.join("some_file.py");
        let other_file = root.join("src/other_file.py");
        let empty_file = root.join("src/__init__.py");
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(&some_file, "print('some')\n").unwrap();
        fs::write(&other_file, "print('other')\n").unwrap();
        fs::write(&empty_file, "").unwrap();
        fs::write(root.join("README.md"), "# sample\n").unwrap();

        Sample {
            missing: other_file.join("and/so/on/some.py"),
            _dir: dir,
            root,
            some_file,
            other_file,
            empty_file,
        }
    }

    #[test]
    fn test_find_source_files() {
        let sample = sample_project();
        let found = find_source_files(&sample.root, "py").unwrap();

        assert_eq!(found.len(), 3);
        assert!(found.contains(&sample.some_file));
        assert!(found.contains(&sample.other_file));
        assert!(!found.iter().any(|p| p.extension() == Some("md")));
    }

    #[test]
    fn test_hash_path_contents() {
        let sample = sample_project();

        assert_eq!(hash_path_contents(&sample.some_file).unwrap().len(), 32);
        assert!(hash_path_contents(&sample.empty_file).unwrap().is_empty());
        assert!(hash_path_contents(&sample.missing).unwrap().is_empty());
        assert!(hash_path_contents(sample.root.join("nope.py")).unwrap().is_empty());
    }

    #[test]
    fn test_create_path_content_map() {
        let sample = sample_project();
        let paths = [&sample.some_file, &sample.other_file, &sample.missing];
        let map = create_path_content_map(&paths).unwrap();

        assert_eq!(map.len(), 3);
        assert!(map[sample.missing.as_str()].is_empty());
        assert_ne!(map[sample.some_file.as_str()], map[sample.other_file.as_str()]);
    }

    #[test]
    fn test_create_path_content_hash() {
        let sample = sample_project();
        let paths = [&sample.some_file, &sample.other_file, &sample.missing];

        let first = create_path_content_hash(&paths).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(first, create_path_content_hash(&paths).unwrap());

        fs::write(&sample.other_file, "print('changed')\n").unwrap();
        assert_ne!(first, create_path_content_hash(&paths).unwrap());
    }

    #[test]
    fn test_hex() {
        let hash = Hash32::from([0xab; 32]);
        assert_eq!(hash.to_hex(), "ab".repeat(32));
        assert_eq!(Hash32::hash(b"abc"), Hash32::hash("abc"));
    }
}
