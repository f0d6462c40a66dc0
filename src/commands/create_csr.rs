use std::path::Path;

use anyhow::{Context, Result};
use cert_chain::Role;
use openssl::nid::Nid;

/// Handle the `csr` command: build the signing request of one profile,
/// generating its key first when missing.
pub fn handle_create_csr(config_path: &Path, role: Role, overwrite: bool) -> Result<()> {
    let csr = cert_chain::create_csr_from_config(config_path, role, overwrite)
        .with_context(|| format!("Failed to create {} certificate signing request", role))?;

    let common_name = csr
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .map(|entry| String::from_utf8_lossy(entry.data().as_slice()).into_owned())
        .unwrap_or_default();
    println!("✓ {} certificate signing request created for CN={}", role, common_name);
    Ok(())
}
