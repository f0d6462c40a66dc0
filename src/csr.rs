//! Certificate signing requests
//!
//! A CSR carries the subject and SANs of a chained profile together with the
//! subject's public key, signed by the subject's own private key. The
//! signature only proves possession of the key; the issuer checks it again
//! right before signing so that a CSR swapped on disk is caught.

use std::path::Path;

use openssl::hash::MessageDigest;
use openssl::stack::Stack;
use openssl::x509::{X509Req, X509ReqBuilder};

use crate::error::{Artifact, CertError, Result};
use crate::extensions;
use crate::observer::{report, IssuanceObserver, Milestone};
use crate::private_key::resolve_private_key;
use crate::profile::ProfileSpec;
use crate::storage::{ensure_parent_dir, PersistenceGateway, ARTIFACT_FILE_MODE};

const X509_REQ_VERSION_1: i32 = 0; // The only defined CSR version is encoded as 0

/// Build, sign and persist a CSR for `spec` at `spec.paths.csr`.
///
/// The subject key is read from `spec.paths.key`, or generated there when the
/// file does not exist yet. Fails with [`CertError::AlreadyExists`] when a
/// CSR is already present and `overwrite` is false.
pub fn create_csr(
    gateway: &dyn PersistenceGateway,
    observer: &dyn IssuanceObserver,
    spec: &ProfileSpec,
    overwrite: bool,
) -> Result<X509Req> {
    observer.milestone(&Milestone::Started {
        operation: "create certificate signing request",
    });
    report(
        observer,
        "create certificate signing request",
        create_csr_inner(gateway, observer, spec, overwrite),
    )
}

fn create_csr_inner(
    gateway: &dyn PersistenceGateway,
    observer: &dyn IssuanceObserver,
    spec: &ProfileSpec,
    overwrite: bool,
) -> Result<X509Req> {
    let path = spec.paths.csr.as_path();
    if gateway.exists(path) {
        if !overwrite {
            return Err(CertError::AlreadyExists {
                artifact: Artifact::SigningRequest,
                path: path.to_path_buf(),
            });
        }
        observer.milestone(&Milestone::Replacing {
            artifact: Artifact::SigningRequest,
            path,
        });
        gateway.delete(path)?;
    }

    let private_key = resolve_private_key(gateway, observer, &spec.paths.key, overwrite)?;

    let mut builder = X509ReqBuilder::new().map_err(CertError::build("create CSR builder"))?;
    builder
        .set_version(X509_REQ_VERSION_1)
        .map_err(CertError::build("set CSR version"))?;

    let subject =
        extensions::subject_name(&spec.subject).map_err(CertError::build("build subject name"))?;
    builder
        .set_subject_name(&subject)
        .map_err(CertError::build("set CSR subject"))?;
    builder
        .set_pubkey(&private_key)
        .map_err(CertError::build("set CSR public key"))?;

    let san = extensions::alt_names(&spec.alt_names, &builder.x509v3_context(None))
        .map_err(CertError::build("build subjectAltName"))?;
    if let Some(san) = san {
        let mut requested = Stack::new().map_err(CertError::build("allocate extension stack"))?;
        requested
            .push(san)
            .map_err(CertError::build("stack subjectAltName"))?;
        builder
            .add_extensions(&requested)
            .map_err(CertError::build("add CSR extensions"))?;
    }

    builder
        .sign(&private_key, MessageDigest::sha256())
        .map_err(CertError::build("sign CSR"))?;
    let csr = builder.build();

    let pem = csr.to_pem().map_err(|source| CertError::EncodingFailure {
        what: "certificate signing request",
        source,
    })?;

    if ensure_parent_dir(gateway, path)? {
        if let Some(dir) = path.parent() {
            observer.milestone(&Milestone::DirectoryCreated { path: dir });
        }
    }
    gateway.write(path, &pem, ARTIFACT_FILE_MODE)?;

    observer.milestone(&Milestone::CsrCreated { path });
    Ok(csr)
}

/// Read the CSR of `spec`, creating it (and its key, if needed) when the
/// file is absent. An existing CSR is never regenerated. Like
/// [`resolve_private_key`], errors are left to the calling operation.
pub fn resolve_csr(
    gateway: &dyn PersistenceGateway,
    observer: &dyn IssuanceObserver,
    spec: &ProfileSpec,
    overwrite: bool,
) -> Result<X509Req> {
    let path = spec.paths.csr.as_path();
    if !gateway.exists(path) {
        observer.milestone(&Milestone::PrerequisiteMissing {
            artifact: Artifact::SigningRequest,
            path,
        });
        return create_csr_inner(gateway, observer, spec, overwrite);
    }
    gateway.read_csr(path)
}

/// Check the CSR's signature against the public key it carries.
pub fn verify_csr(csr: &X509Req, path: &Path) -> Result<()> {
    let failed = || CertError::SignatureVerificationFailure {
        path: path.to_path_buf(),
    };
    let public_key = csr.public_key().map_err(|_| failed())?;
    match csr.verify(&public_key) {
        Ok(true) => Ok(()),
        Ok(false) | Err(_) => Err(failed()),
    }
}
