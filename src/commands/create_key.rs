use std::path::Path;

use anyhow::{Context, Result};
use cert_chain::Role;

/// Handle the `key` command: generate the private key of one profile.
pub fn handle_create_key(config_path: &Path, role: Role, overwrite: bool) -> Result<()> {
    let key = cert_chain::create_private_key_from_config(config_path, role, overwrite)
        .with_context(|| format!("Failed to create {} private key", role))?;

    println!("✓ {} private key created (EC P-{})", role, key.bits());
    Ok(())
}
