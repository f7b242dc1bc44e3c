use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zip::write::FileOptions;
use zip::ZipWriter;

/// Test context with temporary directory management.
/// Automatically cleans up when dropped.
pub struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    /// Create a new test context with a fresh temporary directory
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Get the root path of the temporary directory
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get full path for a relative path
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write a stored (uncompressed) zip archive named `file_name`
    pub fn create_zip(&self, file_name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = self.path(file_name);
        let file = fs::File::create(&path).expect("Failed to create zip");
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Stored);

        for (name, content) in entries {
            zip.start_file(*name, options).expect("Failed to start zip entry");
            zip.write_all(content).expect("Failed to write zip entry");
        }

        zip.finish().expect("Failed to finish zip");
        path
    }

    /// Create a firmware archive with an image and metadata entry
    pub fn create_firmware_zip(&self, file_name: &str, image: &[u8], metadata: &[u8]) -> PathBuf {
        self.create_zip(file_name, &[("firmware.bin", image), ("firmware.dat", metadata)])
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
