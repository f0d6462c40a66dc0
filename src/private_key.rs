//! Private key generation
//!
//! Keys are ECDSA on NIST P-256 and are persisted as SEC1 `EC PRIVATE KEY`
//! PEM blocks. A key is only ever generated on an explicit create call or to
//! fill a gap where no key file exists yet; an existing key file is never
//! replaced behind the caller's back.

use std::path::Path;

use openssl::ec::{EcGroup, EcKey};
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};

use crate::error::{Artifact, CertError, Result};
use crate::observer::{report, IssuanceObserver, Milestone};
use crate::storage::{ensure_parent_dir, PersistenceGateway, ARTIFACT_FILE_MODE};

const EC_CURVE: Nid = Nid::X9_62_PRIME256V1;

/// Generate a fresh P-256 key, write it to `path` and return it.
///
/// Fails with [`CertError::AlreadyExists`] when a key is already present and
/// `overwrite` is false. With `overwrite` the old file is deleted first.
pub fn create_private_key(
    gateway: &dyn PersistenceGateway,
    observer: &dyn IssuanceObserver,
    path: &Path,
    overwrite: bool,
) -> Result<PKey<Private>> {
    observer.milestone(&Milestone::Started {
        operation: "create private key",
    });
    report(
        observer,
        "create private key",
        create_private_key_inner(gateway, observer, path, overwrite),
    )
}

fn create_private_key_inner(
    gateway: &dyn PersistenceGateway,
    observer: &dyn IssuanceObserver,
    path: &Path,
    overwrite: bool,
) -> Result<PKey<Private>> {
    if gateway.exists(path) {
        if !overwrite {
            return Err(CertError::AlreadyExists {
                artifact: Artifact::PrivateKey,
                path: path.to_path_buf(),
            });
        }
        observer.milestone(&Milestone::Replacing {
            artifact: Artifact::PrivateKey,
            path,
        });
        gateway.delete(path)?;
    }

    let ec_key = generate_ec_key()?;
    let pem = ec_key
        .private_key_to_pem()
        .map_err(|source| CertError::EncodingFailure {
            what: "private key",
            source,
        })?;
    let private_key = PKey::from_ec_key(ec_key).map_err(|source| CertError::GenerationFailure {
        what: "private key",
        source,
    })?;

    if ensure_parent_dir(gateway, path)? {
        if let Some(dir) = path.parent() {
            observer.milestone(&Milestone::DirectoryCreated { path: dir });
        }
    }
    gateway.write(path, &pem, ARTIFACT_FILE_MODE)?;

    observer.milestone(&Milestone::KeyCreated { path });
    Ok(private_key)
}

/// Read the key at `path`, generating it first when the file is absent.
///
/// An existing key is returned as-is; `overwrite` only reaches the create
/// path, where there is nothing to overwrite. Errors are not sent to
/// `observer`: the operation that needed the key reports them.
pub fn resolve_private_key(
    gateway: &dyn PersistenceGateway,
    observer: &dyn IssuanceObserver,
    path: &Path,
    overwrite: bool,
) -> Result<PKey<Private>> {
    if !gateway.exists(path) {
        observer.milestone(&Milestone::PrerequisiteMissing {
            artifact: Artifact::PrivateKey,
            path,
        });
        return create_private_key_inner(gateway, observer, path, overwrite);
    }
    gateway.read_key(path)
}

fn generate_ec_key() -> Result<EcKey<Private>> {
    let group = EcGroup::from_curve_name(EC_CURVE).map_err(|source| {
        CertError::GenerationFailure {
            what: "EC group",
            source,
        }
    })?;
    EcKey::generate(&group).map_err(|source| CertError::GenerationFailure {
        what: "EC key pair",
        source,
    })
}
