//! Issuance observer
//!
//! The key, CSR and certificate builders never log on their own. They report
//! milestones and failures to an [`IssuanceObserver`] handed to them by the
//! caller. [`TracingObserver`] forwards everything to `tracing`, which is what
//! the library entry points and the CLI use.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{Artifact, CertError};
use crate::profile::Role;

/// A step of interest in the life of one issuance call.
#[derive(Debug, Clone, Copy)]
pub enum Milestone<'a> {
    /// An operation started.
    Started { operation: &'static str },
    /// An existing artifact is about to be deleted because overwrite was set.
    Replacing { artifact: Artifact, path: &'a Path },
    /// A prerequisite was absent and will be created on the spot.
    PrerequisiteMissing { artifact: Artifact, path: &'a Path },
    DirectoryCreated { path: &'a Path },
    KeyCreated { path: &'a Path },
    CsrCreated { path: &'a Path },
    CertificateSigned {
        role: Role,
        common_name: &'a str,
        organization: &'a str,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
        path: &'a Path,
    },
}

pub trait IssuanceObserver {
    fn milestone(&self, milestone: &Milestone<'_>);

    fn failure(&self, operation: &'static str, error: &CertError);
}

/// Observer that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl IssuanceObserver for NoopObserver {
    fn milestone(&self, _milestone: &Milestone<'_>) {}

    fn failure(&self, _operation: &'static str, _error: &CertError) {}
}

/// Observer that emits `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl IssuanceObserver for TracingObserver {
    fn milestone(&self, milestone: &Milestone<'_>) {
        match *milestone {
            Milestone::Started { operation } => tracing::info!(operation, "started"),
            Milestone::Replacing { artifact, path } => tracing::warn!(
                path = %path.display(),
                "{} already exists, overwriting it",
                artifact
            ),
            Milestone::PrerequisiteMissing { artifact, path } => tracing::warn!(
                path = %path.display(),
                "{} does not exist, creating it",
                artifact
            ),
            Milestone::DirectoryCreated { path } => {
                tracing::info!(path = %path.display(), "directory created")
            }
            Milestone::KeyCreated { path } => {
                tracing::info!(path = %path.display(), "private key created")
            }
            Milestone::CsrCreated { path } => {
                tracing::info!(path = %path.display(), "certificate signing request created")
            }
            Milestone::CertificateSigned {
                role,
                common_name,
                organization,
                not_before,
                not_after,
                path,
            } => tracing::info!(
                path = %path.display(),
                "{} certificate for CN={} (O={}), valid from {} to {}",
                role,
                common_name,
                organization,
                not_before.format("%Y-%m-%d"),
                not_after.format("%Y-%m-%d"),
            ),
        }
    }

    fn failure(&self, operation: &'static str, error: &CertError) {
        tracing::error!(operation, error = %error, "operation failed");
    }
}

/// Report `result`'s error, if any, to `observer` and hand the result back.
pub(crate) fn report<T>(
    observer: &dyn IssuanceObserver,
    operation: &'static str,
    result: Result<T, CertError>,
) -> Result<T, CertError> {
    if let Err(ref e) = result {
        observer.failure(operation, e);
    }
    result
}
