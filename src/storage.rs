//! PEM file storage
//!
//! Every byte the issuer reads or writes goes through [`PersistenceGateway`].
//! [`FileStorage`] is the implementation over the local file system; tests
//! and embedders can swap in their own.

use std::fs;
use std::path::Path;

use openssl::ec::EcKey;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509Req, X509};

use crate::error::{Artifact, CertError, Result};

/// Mode applied to every file written: owner read/write, group/other read.
pub const ARTIFACT_FILE_MODE: u32 = 0o644;

pub trait PersistenceGateway {
    fn exists(&self, path: &Path) -> bool;

    fn delete(&self, path: &Path) -> Result<()>;

    fn write(&self, path: &Path, bytes: &[u8], mode: u32) -> Result<()>;

    /// Create `dir` and its ancestors. Returns `true` when something was
    /// created, `false` when the directory was already there.
    fn ensure_dir(&self, dir: &Path) -> Result<bool>;

    fn read_key(&self, path: &Path) -> Result<PKey<Private>>;

    fn read_csr(&self, path: &Path) -> Result<X509Req>;

    fn read_certificate(&self, path: &Path) -> Result<X509>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileStorage;

impl FileStorage {
    pub fn new() -> Self {
        FileStorage
    }

    fn read_pem(&self, path: &Path, artifact: Artifact) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CertError::NotFound {
                artifact,
                path: path.to_path_buf(),
            },
            _ => CertError::io("read", path, e),
        })
    }
}

impl PersistenceGateway for FileStorage {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn delete(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| CertError::io("delete", path, e))
    }

    fn write(&self, path: &Path, bytes: &[u8], mode: u32) -> Result<()> {
        fs::write(path, bytes).map_err(|e| CertError::io("write", path, e))?;
        set_mode(path, mode)
    }

    fn ensure_dir(&self, dir: &Path) -> Result<bool> {
        if dir.as_os_str().is_empty() || dir.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(dir).map_err(|e| CertError::io("create directory", dir, e))?;
        Ok(true)
    }

    fn read_key(&self, path: &Path) -> Result<PKey<Private>> {
        let pem = self.read_pem(path, Artifact::PrivateKey)?;
        let decode = |source| CertError::DecodingFailure {
            artifact: Artifact::PrivateKey,
            path: path.to_path_buf(),
            source,
        };
        let ec_key = EcKey::private_key_from_pem(&pem).map_err(decode)?;
        PKey::from_ec_key(ec_key).map_err(decode)
    }

    fn read_csr(&self, path: &Path) -> Result<X509Req> {
        let pem = self.read_pem(path, Artifact::SigningRequest)?;
        X509Req::from_pem(&pem).map_err(|source| CertError::DecodingFailure {
            artifact: Artifact::SigningRequest,
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_certificate(&self, path: &Path) -> Result<X509> {
        let pem = self.read_pem(path, Artifact::Certificate)?;
        X509::from_pem(&pem).map_err(|source| CertError::DecodingFailure {
            artifact: Artifact::Certificate,
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| CertError::io("set permissions on", path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Make sure the directory holding `path` exists, returning `true` when it
/// had to be created.
pub(crate) fn ensure_parent_dir(gateway: &dyn PersistenceGateway, path: &Path) -> Result<bool> {
    match path.parent() {
        Some(dir) => gateway.ensure_dir(dir),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_dir_reports_creation() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new();
        let dir = tmp.path().join("a/b/c");

        assert!(storage.ensure_dir(&dir).unwrap());
        assert!(!storage.ensure_dir(&dir).unwrap());
        assert!(dir.is_dir());
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new();
        let err = storage.read_certificate(&tmp.path().join("none.pem")).unwrap_err();
        assert!(matches!(
            err,
            CertError::NotFound {
                artifact: Artifact::Certificate,
                ..
            }
        ));
    }

    #[test]
    fn test_read_garbage_is_decoding_failure() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new();
        let path = tmp.path().join("bad.key");
        storage.write(&path, b"not a pem file", ARTIFACT_FILE_MODE).unwrap();

        let err = storage.read_key(&path).unwrap_err();
        assert!(matches!(err, CertError::DecodingFailure { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_write_applies_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new();
        let path = tmp.path().join("file.pem");
        storage.write(&path, b"data", ARTIFACT_FILE_MODE).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
        assert!(storage.exists(&path));
        storage.delete(&path).unwrap();
        assert!(!storage.exists(&path));
    }
}
