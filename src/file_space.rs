//! Working-directory abstraction
//!
//! All file activity in the packager flows through [`FileSpace`]: per-request
//! temp directories, per-table downloads, CSV rewrites, the master archive.
//! [`DiskFileSpace`] is the production implementation; [`InMemoryFileSpace`]
//! backs the crate's own tests so the core can be exercised without touching
//! a real filesystem.

use crate::error::{Error, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Abstraction over a working directory
pub trait FileSpace: Send + Sync {
    /// Create a fresh, uniquely named temp directory and return its path.
    fn create_temp_dir(&self) -> Result<PathBuf>;

    /// Compute the path of a named file inside a directory. No I/O happens;
    /// the file exists only once something is written to it.
    fn new_file(&self, dir: &Path, name: &str) -> PathBuf {
        dir.join(name)
    }

    /// Open a streaming writer for a file, creating or truncating it.
    fn writer(&self, path: &Path) -> Result<Box<dyn Write + Send>>;

    /// Open a streaming reader for an existing file.
    fn reader(&self, path: &Path) -> Result<Box<dyn Read + Send>>;

    /// Write a full byte buffer to a file.
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut writer = self.writer(path)?;
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a whole file into memory.
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let mut reader = self.reader(path)?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Whether a file or directory exists at the path.
    fn exists(&self, path: &Path) -> bool;

    /// Delete a single file.
    fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete a directory and everything under it.
    fn delete_dir(&self, dir: &Path) -> Result<()>;

    /// Whether the space holds no files and no directories. Introspection
    /// for tests verifying the cleanup contract.
    fn is_empty(&self) -> bool;
}

/// Production [`FileSpace`] rooted at a configured directory on disk
#[derive(Clone, Debug)]
pub struct DiskFileSpace {
    root: PathBuf,
}

impl DiskFileSpace {
    /// Create a file space rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this space
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileSpace for DiskFileSpace {
    fn create_temp_dir(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        // A handful of tries is plenty against 8 random alphanumerics.
        for _ in 0..16 {
            let candidate = self.root.join(format!("request-{}", random_suffix()));
            match fs::create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::Internal(
            "could not create a unique temp directory".into(),
        ))
    }

    fn writer(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        let file = fs::File::create(path)?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn reader(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let file = fs::File::open(path)?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    fn delete_dir(&self, dir: &Path) -> Result<()> {
        fs::remove_dir_all(dir)?;
        Ok(())
    }

    fn is_empty(&self) -> bool {
        match fs::read_dir(&self.root) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }
}

/// Random alphanumeric suffix for temp directories and archive names
pub(crate) fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

#[derive(Default)]
struct MemState {
    files: HashMap<PathBuf, Vec<u8>>,
    dirs: HashSet<PathBuf>,
    next_dir: u64,
}

/// In-process [`FileSpace`] used by tests
///
/// Files live in a map keyed by path; a file comes into existence when a
/// writer for it is flushed or dropped, mirroring the "creates on first
/// write" behavior of the disk implementation.
#[derive(Clone, Default)]
pub struct InMemoryFileSpace {
    state: Arc<Mutex<MemState>>,
}

impl InMemoryFileSpace {
    /// Empty in-memory space
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Number of files currently stored
    pub fn file_count(&self) -> usize {
        self.lock().files.len()
    }
}

impl FileSpace for InMemoryFileSpace {
    fn create_temp_dir(&self) -> Result<PathBuf> {
        let mut state = self.lock();
        state.next_dir += 1;
        let dir = PathBuf::from(format!("/in-memory/tmp-{}", state.next_dir));
        state.dirs.insert(dir.clone());
        Ok(dir)
    }

    fn writer(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        Ok(Box::new(MemWriter {
            path: path.to_path_buf(),
            state: Arc::clone(&self.state),
            buf: Vec::new(),
        }))
    }

    fn reader(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let state = self.lock();
        match state.files.get(path) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
            .into()),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.lock();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        if state.files.remove(path).is_none() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
            .into());
        }
        Ok(())
    }

    fn delete_dir(&self, dir: &Path) -> Result<()> {
        let mut state = self.lock();
        if !state.dirs.contains(dir) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {}", dir.display()),
            )
            .into());
        }
        state.dirs.retain(|d| !d.starts_with(dir));
        state.files.retain(|path, _| !path.starts_with(dir));
        Ok(())
    }

    fn is_empty(&self) -> bool {
        let state = self.lock();
        state.files.is_empty() && state.dirs.is_empty()
    }
}

/// Writer that commits its buffer into the in-memory map on flush and drop
struct MemWriter {
    path: PathBuf,
    state: Arc<Mutex<MemState>>,
    buf: Vec<u8>,
}

impl MemWriter {
    fn commit(&mut self) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.files.insert(self.path.clone(), self.buf.clone());
    }
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit();
        Ok(())
    }
}

impl Drop for MemWriter {
    fn drop(&mut self) {
        self.commit();
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn disk_space_round_trips_a_file() {
        let root = TempDir::new().unwrap();
        let space = DiskFileSpace::new(root.path());

        let dir = space.create_temp_dir().unwrap();
        let file = space.new_file(&dir, "data.csv");
        assert!(!space.exists(&file));

        space.write(&file, b"a,b\n1,2\n").unwrap();
        assert!(space.exists(&file));
        assert_eq!(space.read(&file).unwrap(), b"a,b\n1,2\n");

        space.delete_dir(&dir).unwrap();
        assert!(!space.exists(&dir));
        assert!(space.is_empty());
    }

    #[test]
    fn disk_temp_dirs_are_unique() {
        let root = TempDir::new().unwrap();
        let space = DiskFileSpace::new(root.path());
        let first = space.create_temp_dir().unwrap();
        let second = space.create_temp_dir().unwrap();
        assert_ne!(first, second);
        space.delete_dir(&first).unwrap();
        space.delete_dir(&second).unwrap();
    }

    #[test]
    fn memory_space_starts_empty() {
        let space = InMemoryFileSpace::new();
        assert!(space.is_empty());
        assert_eq!(space.file_count(), 0);
    }

    #[test]
    fn memory_file_exists_only_after_write() {
        let space = InMemoryFileSpace::new();
        let dir = space.create_temp_dir().unwrap();
        let file = space.new_file(&dir, "survey.csv");
        assert!(!space.exists(&file));

        space.write(&file, b"dummy survey content").unwrap();
        assert!(space.exists(&file));
        assert_eq!(space.read(&file).unwrap(), b"dummy survey content");
    }

    #[test]
    fn memory_writer_commits_on_drop_without_flush() {
        let space = InMemoryFileSpace::new();
        let dir = space.create_temp_dir().unwrap();
        let file = space.new_file(&dir, "partial.csv");
        {
            let mut writer = space.writer(&file).unwrap();
            writer.write_all(b"partial survey content").unwrap();
            // dropped without flush
        }
        assert!(space.exists(&file));
        assert_eq!(space.read(&file).unwrap(), b"partial survey content");
    }

    #[test]
    fn memory_delete_dir_removes_contents() {
        let space = InMemoryFileSpace::new();
        let dir = space.create_temp_dir().unwrap();
        space.write(&space.new_file(&dir, "a.csv"), b"a").unwrap();
        space.write(&space.new_file(&dir, "b.zip"), b"b").unwrap();

        space.delete_dir(&dir).unwrap();
        assert!(space.is_empty());
    }

    #[test]
    fn memory_reader_on_missing_file_is_not_found() {
        let space = InMemoryFileSpace::new();
        let err = match space.reader(Path::new("/nope")) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, Error::Io(ref io) if io.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn memory_delete_missing_file_is_an_error() {
        let space = InMemoryFileSpace::new();
        assert!(space.delete_file(Path::new("/nope")).is_err());
    }

    #[test]
    fn memory_delete_file_then_dir_leaves_space_empty() {
        let space = InMemoryFileSpace::new();
        let dir = space.create_temp_dir().unwrap();
        let file = space.new_file(&dir, "data.csv");
        space.write(&file, b"x").unwrap();

        space.delete_file(&file).unwrap();
        assert!(!space.exists(&file));
        space.delete_dir(&dir).unwrap();
        assert!(space.is_empty());
    }

    #[test]
    fn random_suffix_is_eight_alphanumerics() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
