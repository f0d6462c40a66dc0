//! Error taxonomy for key, CSR and certificate issuance.
//!
//! Every variant carries the path or step it failed on so a caller can tell
//! which artifact of which profile went wrong without re-running with more
//! logging. Nothing in the crate retries; any `CertError` ends the current
//! invocation.

use std::fmt;
use std::path::PathBuf;

use openssl::error::ErrorStack;

/// The kind of on-disk artifact an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    PrivateKey,
    SigningRequest,
    Certificate,
    ParentCertificate,
    ParentKey,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Artifact::PrivateKey => "private key",
            Artifact::SigningRequest => "certificate signing request",
            Artifact::Certificate => "certificate",
            Artifact::ParentCertificate => "parent certificate",
            Artifact::ParentKey => "parent private key",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("{artifact} already exists at {}", path.display())]
    AlreadyExists { artifact: Artifact, path: PathBuf },

    #[error("{artifact} not found at {}", path.display())]
    NotFound { artifact: Artifact, path: PathBuf },

    /// A parent certificate or key the issuer needs but never creates.
    #[error("missing {artifact} at {}; issue the parent first", path.display())]
    MissingDependency { artifact: Artifact, path: PathBuf },

    #[error("failed to generate {what}: {source}")]
    GenerationFailure {
        what: &'static str,
        #[source]
        source: ErrorStack,
    },

    #[error("signature of certificate signing request at {} does not verify", path.display())]
    SignatureVerificationFailure { path: PathBuf },

    #[error("failed to encode {what}: {source}")]
    EncodingFailure {
        what: &'static str,
        #[source]
        source: ErrorStack,
    },

    #[error("failed to decode {artifact} at {}: {source}", path.display())]
    DecodingFailure {
        artifact: Artifact,
        path: PathBuf,
        #[source]
        source: ErrorStack,
    },

    #[error("failed to {operation} {}: {source}", path.display())]
    IoFailure {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load configuration {}: {message}", path.display())]
    ConfigFailure { path: PathBuf, message: String },

    #[error("invalid profile: {message}")]
    InvalidProfile { message: String },

    #[error("failed to {step}: {source}")]
    CertificateBuild {
        step: &'static str,
        #[source]
        source: ErrorStack,
    },
}

impl CertError {
    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        CertError::IoFailure {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn build(step: &'static str) -> impl FnOnce(ErrorStack) -> Self {
        move |source| CertError::CertificateBuild { step, source }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        CertError::InvalidProfile {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CertError>;
