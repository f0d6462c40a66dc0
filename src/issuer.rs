//! Certificate issuance
//!
//! [`CertificateIssuer`] turns one [`CertificateProfile`] into a signed,
//! persisted certificate. A call walks the same steps for every role:
//!
//! 1. refuse (or, with `overwrite`, delete) an existing target certificate
//! 2. build the template: random 128-bit serial, validity window, subject,
//!    SANs, key usage, extended key usage and basic constraints taken
//!    verbatim from the profile
//! 3. resolve the signing inputs
//!    - root: the profile's own key, generated when absent (self-signed)
//!    - intermediate/server/client: the profile's CSR, generated with its key
//!      when absent, re-verified, plus the parent certificate and parent key
//!      which must already exist
//! 4. sign with SHA-256
//! 5. write the `CERTIFICATE` PEM, creating the directory if needed
//! 6. parse the written bytes back and return them
//!
//! Key usage, extended key usage and the CA flag are not checked against the
//! role. A client profile asking for `isCA: true` gets exactly that.
//!
//! # Example
//! ```rust,no_run
//! use cert_chain::configs::CaConfig;
//! use cert_chain::issuer::CertificateIssuer;
//! use cert_chain::observer::TracingObserver;
//! use cert_chain::profile::Role;
//! use cert_chain::storage::FileStorage;
//!
//! # fn example() -> cert_chain::error::Result<()> {
//! let config = CaConfig::from_file("ca.yaml")?;
//! let issuer = CertificateIssuer::new(&FileStorage, &TracingObserver);
//! let root = issuer.issue(&config.profile(Role::Root)?, false)?;
//! let intermediate = issuer.issue(&config.profile(Role::Intermediate)?, false)?;
//! assert_eq!(intermediate.issuer_common_name(), root.common_name());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, SubsecRound, Utc};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private, Public};
use openssl::x509::extension::{AuthorityKeyIdentifier, SubjectKeyIdentifier};
use openssl::x509::{X509Builder, X509Ref, X509};

use crate::certificate::IssuedCertificate;
use crate::csr::{resolve_csr, verify_csr};
use crate::error::{Artifact, CertError, Result};
use crate::extensions;
use crate::observer::{report, IssuanceObserver, Milestone};
use crate::private_key::resolve_private_key;
use crate::profile::{CertificateProfile, ParentPaths, ProfileSpec};
use crate::storage::{ensure_parent_dir, PersistenceGateway, ARTIFACT_FILE_MODE};

const X509_VERSION_3: i32 = 2; // X509 version 3 is represented by 2
const SERIAL_NUMBER_BITS: i32 = 128;

/// Key material the certificate is signed with.
enum SigningInputs {
    /// Root: the subject key signs its own certificate.
    SelfSigned { key: PKey<Private> },
    /// Everything else: the CSR's key is certified by the parent.
    Chained {
        subject_key: PKey<Public>,
        parent_cert: X509,
        parent_key: PKey<Private>,
    },
}

/// Validity window and serial picked for one issuance.
struct Template {
    serial: BigNum,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
}

pub struct CertificateIssuer<'a> {
    gateway: &'a dyn PersistenceGateway,
    observer: &'a dyn IssuanceObserver,
}

impl<'a> CertificateIssuer<'a> {
    pub fn new(gateway: &'a dyn PersistenceGateway, observer: &'a dyn IssuanceObserver) -> Self {
        Self { gateway, observer }
    }

    /// Issue the certificate described by `profile` and persist it to the
    /// profile's certificate path.
    ///
    /// `overwrite` governs the target certificate only. Missing keys and
    /// CSRs are created, existing ones are reused untouched.
    pub fn issue(
        &self,
        profile: &CertificateProfile,
        overwrite: bool,
    ) -> Result<IssuedCertificate> {
        self.observer.milestone(&Milestone::Started {
            operation: "sign certificate",
        });
        report(self.observer, "sign certificate", self.issue_inner(profile, overwrite))
    }

    fn issue_inner(
        &self,
        profile: &CertificateProfile,
        overwrite: bool,
    ) -> Result<IssuedCertificate> {
        let spec = profile.spec();
        let cert_path = spec.paths.cert.as_path();

        if self.gateway.exists(cert_path) {
            if !overwrite {
                return Err(CertError::AlreadyExists {
                    artifact: Artifact::Certificate,
                    path: cert_path.to_path_buf(),
                });
            }
            self.observer.milestone(&Milestone::Replacing {
                artifact: Artifact::Certificate,
                path: cert_path,
            });
            self.gateway.delete(cert_path)?;
        }

        let template = new_template(spec)?;
        let inputs = self.resolve_signing_inputs(profile, overwrite)?;
        let certificate = sign(spec, &template, &inputs)?;

        let pem = certificate
            .to_pem()
            .map_err(|source| CertError::EncodingFailure {
                what: "certificate",
                source,
            })?;
        if ensure_parent_dir(self.gateway, cert_path)? {
            if let Some(dir) = cert_path.parent() {
                self.observer.milestone(&Milestone::DirectoryCreated { path: dir });
            }
        }
        self.gateway.write(cert_path, &pem, ARTIFACT_FILE_MODE)?;

        let issued = IssuedCertificate::from_pem(&pem).map_err(|source| CertError::DecodingFailure {
            artifact: Artifact::Certificate,
            path: cert_path.to_path_buf(),
            source,
        })?;

        self.observer.milestone(&Milestone::CertificateSigned {
            role: profile.role(),
            common_name: &spec.subject.common_name,
            organization: &spec.subject.organization,
            not_before: template.not_before,
            not_after: template.not_after,
            path: cert_path,
        });
        Ok(issued)
    }

    fn resolve_signing_inputs(
        &self,
        profile: &CertificateProfile,
        overwrite: bool,
    ) -> Result<SigningInputs> {
        match profile {
            CertificateProfile::Root(spec) => {
                let key =
                    resolve_private_key(self.gateway, self.observer, &spec.paths.key, overwrite)?;
                Ok(SigningInputs::SelfSigned { key })
            }
            CertificateProfile::Intermediate(chained)
            | CertificateProfile::Server(chained)
            | CertificateProfile::Client(chained) => {
                let csr = resolve_csr(self.gateway, self.observer, &chained.spec, overwrite)?;
                verify_csr(&csr, &chained.spec.paths.csr)?;
                let subject_key = csr.public_key().map_err(|source| CertError::DecodingFailure {
                    artifact: Artifact::SigningRequest,
                    path: chained.spec.paths.csr.clone(),
                    source,
                })?;
                let (parent_cert, parent_key) = load_parent(self.gateway, &chained.parent)?;
                Ok(SigningInputs::Chained {
                    subject_key,
                    parent_cert,
                    parent_key,
                })
            }
        }
    }
}

/// Read the parent certificate and key of a chained profile. Neither is ever
/// created here; a missing file is a [`CertError::MissingDependency`].
pub fn load_parent(
    gateway: &dyn PersistenceGateway,
    parent: &ParentPaths,
) -> Result<(X509, PKey<Private>)> {
    if !gateway.exists(&parent.cert) {
        return Err(CertError::MissingDependency {
            artifact: Artifact::ParentCertificate,
            path: parent.cert.clone(),
        });
    }
    if !gateway.exists(&parent.key) {
        return Err(CertError::MissingDependency {
            artifact: Artifact::ParentKey,
            path: parent.key.clone(),
        });
    }
    let cert = gateway
        .read_certificate(&parent.cert)
        .map_err(|e| as_parent(e, Artifact::ParentCertificate))?;
    let key = gateway
        .read_key(&parent.key)
        .map_err(|e| as_parent(e, Artifact::ParentKey))?;
    Ok((cert, key))
}

fn as_parent(error: CertError, parent: Artifact) -> CertError {
    match error {
        CertError::NotFound { path, .. } => CertError::MissingDependency {
            artifact: parent,
            path,
        },
        CertError::DecodingFailure { path, source, .. } => CertError::DecodingFailure {
            artifact: parent,
            path,
            source,
        },
        other => other,
    }
}

fn new_template(spec: &ProfileSpec) -> Result<Template> {
    let mut serial = BigNum::new().map_err(|source| CertError::GenerationFailure {
        what: "serial number",
        source,
    })?;
    serial
        .rand(SERIAL_NUMBER_BITS, MsbOption::MAYBE_ZERO, false)
        .map_err(|source| CertError::GenerationFailure {
            what: "serial number",
            source,
        })?;

    let not_before = Utc::now().trunc_subsecs(0);
    let not_after = spec.validity.not_after(not_before)?;
    Ok(Template {
        serial,
        not_before,
        not_after,
    })
}

fn sign(spec: &ProfileSpec, template: &Template, inputs: &SigningInputs) -> Result<X509> {
    let mut builder = X509::builder().map_err(CertError::build("create X509 builder"))?;
    builder
        .set_version(X509_VERSION_3)
        .map_err(CertError::build("set version"))?;

    let serial = template
        .serial
        .to_asn1_integer()
        .map_err(CertError::build("encode serial number"))?;
    builder
        .set_serial_number(&serial)
        .map_err(CertError::build("set serial number"))?;

    let subject =
        extensions::subject_name(&spec.subject).map_err(CertError::build("build subject name"))?;
    builder
        .set_subject_name(&subject)
        .map_err(CertError::build("set subject"))?;

    let not_before = Asn1Time::from_unix(template.not_before.timestamp())
        .map_err(CertError::build("create not_before"))?;
    builder
        .set_not_before(&not_before)
        .map_err(CertError::build("set not_before"))?;
    let not_after = Asn1Time::from_unix(template.not_after.timestamp())
        .map_err(CertError::build("create not_after"))?;
    builder
        .set_not_after(&not_after)
        .map_err(CertError::build("set not_after"))?;

    match inputs {
        SigningInputs::SelfSigned { key } => {
            builder
                .set_issuer_name(&subject)
                .map_err(CertError::build("set issuer"))?;
            builder
                .set_pubkey(key)
                .map_err(CertError::build("set public key"))?;
            append_extensions(&mut builder, spec, None)?;
            builder
                .sign(key, MessageDigest::sha256())
                .map_err(CertError::build("sign certificate"))?;
        }
        SigningInputs::Chained {
            subject_key,
            parent_cert,
            parent_key,
        } => {
            builder
                .set_issuer_name(parent_cert.subject_name())
                .map_err(CertError::build("set issuer from parent"))?;
            builder
                .set_pubkey(subject_key)
                .map_err(CertError::build("set public key"))?;
            let issuer_cert: &X509Ref = parent_cert;
            append_extensions(&mut builder, spec, Some(issuer_cert))?;
            builder
                .sign(parent_key, MessageDigest::sha256())
                .map_err(CertError::build("sign certificate"))?;
        }
    }

    Ok(builder.build())
}

/// Append the profile's extensions. `parent` is `None` for a self-signed
/// certificate; the public key must already be set on `builder`.
fn append_extensions(
    builder: &mut X509Builder,
    spec: &ProfileSpec,
    parent: Option<&X509Ref>,
) -> Result<()> {
    let bc = extensions::basic_constraints(spec.is_ca)
        .map_err(CertError::build("build BasicConstraints"))?;
    builder
        .append_extension(bc)
        .map_err(CertError::build("add BasicConstraints"))?;

    let ku = extensions::key_usage(spec.key_usage).map_err(CertError::build("build KeyUsage"))?;
    if let Some(ku) = ku {
        builder
            .append_extension(ku)
            .map_err(CertError::build("add KeyUsage"))?;
    }

    let eku = extensions::ext_key_usage(&spec.ext_key_usage)
        .map_err(CertError::build("build ExtendedKeyUsage"))?;
    if let Some(eku) = eku {
        builder
            .append_extension(eku)
            .map_err(CertError::build("add ExtendedKeyUsage"))?;
    }

    let ski = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(parent, None))
        .map_err(CertError::build("build SubjectKeyIdentifier"))?;
    builder
        .append_extension(ski)
        .map_err(CertError::build("add SubjectKeyIdentifier"))?;

    if let Some(parent) = parent {
        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&builder.x509v3_context(Some(parent), None))
            .map_err(CertError::build("build AuthorityKeyIdentifier"))?;
        builder
            .append_extension(aki)
            .map_err(CertError::build("add AuthorityKeyIdentifier"))?;
    }

    let san = extensions::alt_names(&spec.alt_names, &builder.x509v3_context(parent, None))
        .map_err(CertError::build("build SubjectAlternativeName"))?;
    if let Some(san) = san {
        builder
            .append_extension(san)
            .map_err(CertError::build("add SubjectAlternativeName"))?;
    }
    Ok(())
}
