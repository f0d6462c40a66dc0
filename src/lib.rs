//! cert-chain - File-based X.509 Chain Issuer
//!
//! Issues a root, intermediate, server and client certificate chain from a
//! single declarative profile file. Private keys and certificate signing
//! requests are generated on first use, and every artifact is persisted as a
//! PEM file next to where the profile says it belongs.
//!
//! # Overview
//!
//! ```text
//! Root CA (self-signed)
//!   └── Intermediate CA (signed by Root)
//!       ├── Server certificate (signed by Intermediate)
//!       └── Client certificate (signed by Intermediate)
//! ```
//!
//! Each certificate is produced by its own call. A chained call reads the
//! parent certificate and key that an earlier call wrote, so the chain is
//! built one link at a time:
//!
//! ```no_run
//! use cert_chain::{
//!     sign_client_certificate, sign_intermediate_certificate, sign_root_certificate,
//!     sign_server_certificate,
//! };
//!
//! # fn main() -> cert_chain::error::Result<()> {
//! let root = sign_root_certificate("ca.yaml", false)?;
//! let intermediate = sign_intermediate_certificate("ca.yaml", false)?;
//! let server = sign_server_certificate("ca.yaml", false)?;
//! let client = sign_client_certificate("ca.yaml", false)?;
//!
//! assert_eq!(intermediate.issuer_common_name(), root.common_name());
//! assert_eq!(server.issuer_common_name(), intermediate.common_name());
//! # let _ = client;
//! # Ok(())
//! # }
//! ```
//!
//! # Profile File
//!
//! ```yaml
//! ca:
//!   root:
//!     certFilePath: ./cert/root.pem
//!     keyFilePath: ./private/root.key
//!     csrFilePath: ./csr/root.csr
//!     organization: ACME
//!     commonName: ACME Root CA
//!     validityYears: 10
//!     keyUsage: [certSign, cRLSign, digitalSignature]
//!     isCA: true
//!   server:
//!     certFilePath: ./cert/server.pem
//!     keyFilePath: ./private/server.key
//!     csrFilePath: ./csr/server.csr
//!     parentCertPath: ./cert/intermediate.pem
//!     parentKeyPath: ./private/intermediate.key
//!     organization: ACME
//!     commonName: api.acme.test
//!     validityYears: 1
//!     dnsNames: [api.acme.test]
//!     ipAddresses: [127.0.0.1]
//!     keyUsage: [digitalSignature, keyEncipherment]
//!     extKeyUsage: [serverAuth]
//! ```
//!
//! `keyUsage` also accepts the raw bit mask (e.g. `97`) and `extKeyUsage`
//! the numeric codes (e.g. `[1, 2]`). Files ending in `.toml` are read as
//! TOML with the same field names.
//!
//! # Module Overview
//!
//! - [`private_key`]: P-256 key generation and lazy resolution
//! - [`csr`]: CSR creation, lazy resolution and signature verification
//! - [`issuer`]: the certificate issuance flow
//! - [`storage`]: the persistence gateway and its file system implementation
//! - [`configs`] / [`profile`]: profile file model and typed profiles
//! - [`observer`]: milestone and failure reporting
//!
//! # Overwrite Policy
//!
//! A call refuses to replace an existing target file unless `overwrite` is
//! set. Prerequisites that already exist (the subject key, the CSR) are always
//! reused; only missing ones are generated. Parent certificates and keys are
//! never generated by a chained call.

pub mod certificate;
pub mod configs;
pub mod csr;
pub mod error;
mod extensions;
pub mod issuer;
pub mod observer;
pub mod private_key;
pub mod profile;
pub mod storage;

use std::path::Path;

use openssl::pkey::{PKey, Private};
use openssl::x509::X509Req;

pub use certificate::IssuedCertificate;
pub use error::{Artifact, CertError};
pub use issuer::CertificateIssuer;
pub use profile::{CertificateProfile, Role};

use configs::CaConfig;
use error::Result;
use observer::TracingObserver;
use storage::FileStorage;

/// Issue the certificate of `role` described in the profile file at
/// `config_path`, using the file system and `tracing` for reporting.
pub fn sign_certificate<P: AsRef<Path>>(
    config_path: P,
    role: Role,
    overwrite: bool,
) -> Result<IssuedCertificate> {
    let profile = CaConfig::from_file(config_path)?.profile(role)?;
    CertificateIssuer::new(&FileStorage, &TracingObserver).issue(&profile, overwrite)
}

pub fn sign_root_certificate<P: AsRef<Path>>(
    config_path: P,
    overwrite: bool,
) -> Result<IssuedCertificate> {
    sign_certificate(config_path, Role::Root, overwrite)
}

pub fn sign_intermediate_certificate<P: AsRef<Path>>(
    config_path: P,
    overwrite: bool,
) -> Result<IssuedCertificate> {
    sign_certificate(config_path, Role::Intermediate, overwrite)
}

pub fn sign_server_certificate<P: AsRef<Path>>(
    config_path: P,
    overwrite: bool,
) -> Result<IssuedCertificate> {
    sign_certificate(config_path, Role::Server, overwrite)
}

pub fn sign_client_certificate<P: AsRef<Path>>(
    config_path: P,
    overwrite: bool,
) -> Result<IssuedCertificate> {
    sign_certificate(config_path, Role::Client, overwrite)
}

/// Generate only the private key of `role`'s profile.
pub fn create_private_key_from_config<P: AsRef<Path>>(
    config_path: P,
    role: Role,
    overwrite: bool,
) -> Result<PKey<Private>> {
    let profile = CaConfig::from_file(config_path)?.profile(role)?;
    private_key::create_private_key(
        &FileStorage,
        &TracingObserver,
        &profile.spec().paths.key,
        overwrite,
    )
}

/// Generate only the CSR of `role`'s profile (and its key, when missing).
pub fn create_csr_from_config<P: AsRef<Path>>(
    config_path: P,
    role: Role,
    overwrite: bool,
) -> Result<X509Req> {
    let profile = CaConfig::from_file(config_path)?.profile(role)?;
    csr::create_csr(&FileStorage, &TracingObserver, profile.spec(), overwrite)
}
