use std::path::Path;

use anyhow::{Context, Result};
use cert_chain::{IssuedCertificate, Role};

/// Handle the `cert` command: issue the certificate of one profile.
pub fn handle_sign_cert(config_path: &Path, role: Role, overwrite: bool) -> Result<()> {
    let certificate = cert_chain::sign_certificate(config_path, role, overwrite)
        .with_context(|| format!("Failed to sign {} certificate", role))?;
    print_summary(role, &certificate)
}

/// Handle the `chain` command: issue root, intermediate, server and client
/// in order, stopping at the first failure.
pub fn handle_sign_chain(config_path: &Path, overwrite: bool) -> Result<()> {
    for role in Role::ALL {
        handle_sign_cert(config_path, role, overwrite)?;
    }
    println!("\n✓ Certificate chain issued");
    Ok(())
}

fn print_summary(role: Role, certificate: &IssuedCertificate) -> Result<()> {
    println!("✓ {} certificate signed", role);
    println!(
        "   Subject: CN={}",
        certificate.common_name().unwrap_or_default()
    );
    println!(
        "   Issuer:  CN={}",
        certificate.issuer_common_name().unwrap_or_default()
    );
    println!(
        "   Serial:  {}",
        certificate
            .serial_hex()
            .context("Failed to read serial number")?
    );
    println!(
        "   Valid:   {} to {}",
        certificate.not_before(),
        certificate.not_after()
    );
    Ok(())
}
