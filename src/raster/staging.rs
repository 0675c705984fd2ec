//! Staging area for uploaded rasters
//!
//! Uploads are written under a sanitized name in the upload folder so a
//! later request can resume them, e.g. once the user has supplied an EPSG
//! code. Converted outputs live next to their source with a
//! `converted_` prefix.

use log::{debug, warn};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read};
use std::path::{Path, PathBuf};

use crate::error::StagingError;
use crate::utils::string_utils::secure_filename;

const CONVERTED_PREFIX: &str = "converted_";

/// Directory holding staged uploads
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

/// A file that has been written to the staging area
#[derive(Debug, Clone, PartialEq)]
pub struct StagedFile {
    /// Sanitized name, the key used to resume
    pub filename: String,
    pub path: PathBuf,
}

impl StagingArea {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        StagingArea { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the upload folder if it does not exist
    pub fn ensure_directories(&self) -> Result<(), StagingError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Writes an upload into the staging area
    ///
    /// # Arguments
    /// * `original_name` - Client-supplied filename, sanitized before use
    /// * `reader` - Upload body
    ///
    /// # Returns
    /// The staged file; an existing file with the same name is replaced
    pub fn save<R: Read + ?Sized>(&self, original_name: &str, reader: &mut R) -> Result<StagedFile, StagingError> {
        let filename = sanitize(original_name)?;
        self.ensure_directories()?;

        let path = self.root.join(&filename);
        let mut writer = BufWriter::new(File::create(&path)?);
        let written = io::copy(reader, &mut writer)?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        debug!("Staged {} bytes as {}", written, path.display());
        Ok(StagedFile { filename, path })
    }

    /// Finds a previously staged file by name
    ///
    /// The name goes through the same sanitization as `save`, so a resume
    /// request can never address a path outside the upload folder.
    pub fn locate(&self, filename: &str) -> Result<StagedFile, StagingError> {
        let filename = sanitize(filename)?;
        let path = self.root.join(&filename);
        if !path.is_file() {
            return Err(StagingError::NotFound(filename));
        }
        Ok(StagedFile { filename, path })
    }

    /// Path for the converted counterpart of a staged file
    pub fn converted_path(&self, staged: &StagedFile) -> PathBuf {
        self.root.join(format!("{}{}", CONVERTED_PREFIX, staged.filename))
    }

    /// Removes a staged file, logging instead of failing
    pub fn discard(&self, staged: &StagedFile) {
        remove_quietly(&staged.path);
    }
}

fn sanitize(name: &str) -> Result<String, StagingError> {
    let filename = secure_filename(name);
    if filename.is_empty() {
        return Err(StagingError::InvalidFilename(name.to_string()));
    }
    Ok(filename)
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}

/// Deletes its path on drop unless `keep` is called
///
/// Used for intermediate files that must not outlive a failed request.
#[derive(Debug)]
pub struct ScopedPath {
    path: PathBuf,
    armed: bool,
}

impl ScopedPath {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        ScopedPath {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarms the guard and hands the path back
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ScopedPath {
    fn drop(&mut self) {
        if self.armed {
            remove_quietly(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_save_sanitizes_name() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join("uploads"));

        let staged = staging.save("../../etc/my dem.tif", &mut Cursor::new(b"data".to_vec())).unwrap();
        assert_eq!(staged.filename, "etc_my_dem.tif");
        assert_eq!(staged.path, dir.path().join("uploads").join("etc_my_dem.tif"));
        assert_eq!(fs::read(&staged.path).unwrap(), b"data");
    }

    #[test]
    fn test_save_rejects_empty_name() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());

        assert!(matches!(
            staging.save("../..", &mut Cursor::new(Vec::new())),
            Err(StagingError::InvalidFilename(_))
        ));
    }

    #[test]
    fn test_locate_and_discard() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let staged = staging.save("ortho.tif", &mut Cursor::new(vec![1, 2, 3])).unwrap();

        assert_eq!(staging.locate("ortho.tif").unwrap(), staged);
        staging.discard(&staged);
        assert!(matches!(staging.locate("ortho.tif"), Err(StagingError::NotFound(name)) if name == "ortho.tif"));

        // Discarding twice is harmless
        staging.discard(&staged);
    }

    #[test]
    fn test_locate_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("uploads");
        fs::create_dir_all(&root).unwrap();
        fs::write(dir.path().join("secret.tif"), b"x").unwrap();

        let staging = StagingArea::new(&root);
        assert!(matches!(staging.locate("../secret.tif"), Err(StagingError::NotFound(_))));
    }

    #[test]
    fn test_converted_path() {
        let staging = StagingArea::new("/tmp/uploads");
        let staged = StagedFile {
            filename: "dem.tif".to_string(),
            path: PathBuf::from("/tmp/uploads/dem.tif"),
        };
        assert_eq!(staging.converted_path(&staged), PathBuf::from("/tmp/uploads/converted_dem.tif"));
    }

    #[test]
    fn test_scoped_path() {
        let dir = tempfile::tempdir().unwrap();
        let dropped = dir.path().join("dropped.tif");
        let kept = dir.path().join("kept.tif");
        fs::write(&dropped, b"x").unwrap();
        fs::write(&kept, b"x").unwrap();

        drop(ScopedPath::new(&dropped));
        assert!(!dropped.exists());

        let path = ScopedPath::new(&kept).keep();
        assert_eq!(path, kept);
        assert!(kept.exists());
    }
}
