// SPDX-License-Identifier: Apache-2.0

//! File identity used to notice when a followed path starts pointing at a
//! different file (rename-and-recreate rotation).

use std::fs::{self, File, Metadata};
use std::io;
use std::path::Path;

/// Device and inode of a file. Stable across renames of the same file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    /// Identity from metadata. `None` on platforms without inode numbers,
    /// where rotation is only detected through truncation.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;

        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }

    pub fn from_file(file: &File) -> io::Result<Option<Self>> {
        Ok(Self::from_metadata(&file.metadata()?))
    }

    /// Identity of whatever the path currently names, following symlinks.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Option<Self>> {
        Ok(Self::from_metadata(&fs::metadata(path)?))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_same_file_same_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        fs::write(&path, "x").unwrap();

        let file = File::open(&path).unwrap();
        assert_eq!(
            FileId::from_file(&file).unwrap(),
            FileId::from_path(&path).unwrap()
        );
    }

    #[test]
    fn test_rename_keeps_id_recreate_changes_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        let rotated = dir.path().join("a.log.1");
        fs::write(&path, "x").unwrap();

        let original = FileId::from_path(&path).unwrap();
        fs::rename(&path, &rotated).unwrap();
        assert_eq!(FileId::from_path(&rotated).unwrap(), original);

        fs::write(&path, "y").unwrap();
        assert_ne!(FileId::from_path(&path).unwrap(), original);
    }

    #[test]
    fn test_missing_path() {
        let err = FileId::from_path("/no/such/file").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
