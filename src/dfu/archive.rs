//! Firmware archive reader.
//!
//! A firmware zip holds:
//! - an image (`*.bin`), sent with the firmware chunk opcode
//! - init metadata (`*.dat`), sent with the metadata opcode
//! - optionally `manifest.json` naming both files
//!
//! Without a manifest the first `.bin` and `.dat` entries are used.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;

use crate::error::{UpdateError, UpdateResult};

const MANIFEST_NAME: &str = "manifest.json";

/// Contents of a firmware archive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FirmwarePayload {
    /// Firmware image (`.bin` contents).
    pub image: Vec<u8>,
    /// Init metadata (`.dat` contents).
    pub metadata: Vec<u8>,
}

/// Source of firmware payloads.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FirmwareArchive: Send + Sync {
    /// Extract the image and metadata from the archive at `path`.
    async fn extract(&self, path: &Path) -> UpdateResult<FirmwarePayload>;
}

/// Reads firmware archives from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipFirmwareArchive;

#[async_trait]
impl FirmwareArchive for ZipFirmwareArchive {
    async fn extract(&self, path: &Path) -> UpdateResult<FirmwarePayload> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || read_firmware_zip(&path))
            .await
            .map_err(|e| UpdateError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }
}

/// Raw manifest.json structure for deserialization.
#[derive(Debug, Deserialize)]
struct RawManifest {
    manifest: ManifestInner,
}

#[derive(Debug, Deserialize)]
struct ManifestInner {
    application: ApplicationManifest,
}

#[derive(Debug, Deserialize)]
struct ApplicationManifest {
    bin_file: String,
    dat_file: String,
}

/// Read a firmware archive synchronously.
pub fn read_firmware_zip<P: AsRef<Path>>(path: P) -> UpdateResult<FirmwarePayload> {
    let file = File::open(path.as_ref())?;
    let mut archive = zip::ZipArchive::new(file)?;

    let (bin_name, dat_name) = match read_manifest(&mut archive)? {
        Some(application) => (application.bin_file, application.dat_file),
        None => (
            find_entry(&archive, ".bin")?,
            find_entry(&archive, ".dat")?,
        ),
    };
    debug!("Firmware archive: image={} metadata={}", bin_name, dat_name);

    let image = read_file_from_zip(&mut archive, &bin_name)?;
    let metadata = read_file_from_zip(&mut archive, &dat_name)?;

    Ok(FirmwarePayload { image, metadata })
}

/// Read manifest.json if the archive has one.
fn read_manifest(archive: &mut zip::ZipArchive<File>) -> UpdateResult<Option<ApplicationManifest>> {
    let mut manifest_file = match archive.by_name(MANIFEST_NAME) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut contents = String::new();
    manifest_file.read_to_string(&mut contents)?;

    let raw: RawManifest = serde_json::from_str(&contents)?;
    let application = raw.manifest.application;
    if application.bin_file.is_empty() || application.dat_file.is_empty() {
        return Err(UpdateError::InvalidManifest {
            reason: "bin_file and dat_file must be named".to_string(),
        });
    }
    Ok(Some(application))
}

/// First entry whose name ends with `extension`, ignoring case.
fn find_entry(archive: &zip::ZipArchive<File>, extension: &str) -> UpdateResult<String> {
    archive
        .file_names()
        .filter(|name| name.to_ascii_lowercase().ends_with(extension))
        .min()
        .map(str::to_string)
        .ok_or_else(|| UpdateError::MissingFile {
            filename: format!("*{}", extension),
        })
}

/// Read a file from the zip archive by name.
fn read_file_from_zip(archive: &mut zip::ZipArchive<File>, name: &str) -> UpdateResult<Vec<u8>> {
    let mut file = archive.by_name(name).map_err(|_| UpdateError::MissingFile {
        filename: name.to_string(),
    })?;

    let mut data = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut data)?;

    Ok(data)
}
