//! Master archive assembly

use crate::error::{Error, Result};
use crate::file_space::FileSpace;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Builds one zip from a list of input files.
///
/// Entries are named by file basename, with no directory structure. Entry
/// names must be unique; a duplicate basename aborts before anything is
/// written. The archive is assembled in memory and written out in a single
/// operation, so a failure never leaves a partial output file behind.
pub struct ZipHelper {
    file_space: Arc<dyn FileSpace>,
}

impl ZipHelper {
    /// Create a helper reading and writing through `file_space`.
    pub fn new(file_space: Arc<dyn FileSpace>) -> Self {
        Self { file_space }
    }

    /// Zip `inputs` into `output`. Inputs keep their exact bytes.
    pub fn zip_files(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(inputs.len());
        for path in inputs {
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| {
                    Error::Internal(format!("input file has no usable name: {}", path.display()))
                })?;
            if !seen.insert(name.to_string()) {
                return Err(Error::Internal(format!(
                    "duplicate archive entry name: {name}"
                )));
            }
            entries.push((name.to_string(), path));
        }

        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
            let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

            for (name, path) in &entries {
                zip.start_file(name.as_str(), options)?;
                let mut reader = self.file_space.reader(path)?;
                std::io::copy(&mut reader, &mut zip)?;
            }

            zip.finish()?;
        }

        self.file_space.write(output, &buffer)?;
        tracing::debug!(
            output = %output.display(),
            entries = entries.len(),
            bytes = buffer.len(),
            "created archive"
        );
        Ok(())
    }
}
