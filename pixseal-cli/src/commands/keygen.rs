//! Keygen command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use pixseal_core::Ed25519KeyMaterial;
use tracing::info;

/// Execute the keygen command.
pub fn execute(key: PathBuf, public: PathBuf, quiet: bool) -> Result<()> {
    let existed = key.exists();

    let material = Ed25519KeyMaterial::load_or_generate(&key)
        .with_context(|| format!("Failed to load or generate key: {}", key.display()))?;
    material
        .export_public_pem(&public)
        .with_context(|| format!("Failed to export public key: {}", public.display()))?;

    info!(key = %key.display(), public = %public.display(), existed, "key material ready");

    if !quiet {
        println!();
        if existed {
            println!("   {} {}", "Loaded private key:".dimmed(), key.display());
        } else {
            println!(
                "{}",
                "New Ed25519 device key generated".green().bold()
            );
            println!();
            println!("   {} {}", "Private key:".dimmed(), key.display());
        }
        println!("   {} {}", "Public key:".dimmed(), public.display());
        println!(
            "   {} {}",
            "Raw public key:".dimmed(),
            hex::encode(material.public_key_raw())
        );
    }

    Ok(())
}
