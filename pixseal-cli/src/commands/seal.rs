//! Seal command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use pixseal_core::{
    seal_image, CertificateKeyMaterial, DeviceConfig, Ed25519KeyMaterial, HashMode, HashPolicy,
    JpegCommentCarrier, ProofSigner,
};
use tracing::{debug, info};

use crate::utils::{atomic_write, build_sealed_path};

pub struct SealArgs {
    pub file: PathBuf,
    pub output: Option<PathBuf>,
    pub device_id: String,
    pub firmware: String,
    pub key: PathBuf,
    pub cert: Option<PathBuf>,
    pub cert_key: Option<PathBuf>,
    pub policy: HashPolicy,
    pub quiet: bool,
}

/// Execute the seal command.
pub fn execute(args: SealArgs) -> Result<()> {
    let container = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read file: {}", args.file.display()))?;
    info!(path = %args.file.display(), bytes = container.len(), "Read image");

    let signer = match (&args.cert, &args.cert_key) {
        (Some(cert), Some(cert_key)) => {
            debug!(cert = %cert.display(), "Using PKCS#7 certificate scheme");
            let material = CertificateKeyMaterial::from_files(cert_key, cert)
                .context("Failed to load certificate key material")?;
            ProofSigner::Pkcs7Rsa(material)
        }
        _ => {
            let material = Ed25519KeyMaterial::load_or_generate(&args.key)
                .with_context(|| format!("Failed to load or generate key: {}", args.key.display()))?;
            ProofSigner::Ed25519(material)
        }
    };

    let config = DeviceConfig {
        device_id: args.device_id,
        firmware: args.firmware,
        hash_policy: args.policy,
    };

    let outcome =
        seal_image(&container, &config, &signer, &JpegCommentCarrier).context("Failed to seal image")?;

    let output = args.output.unwrap_or_else(|| build_sealed_path(&args.file));
    atomic_write(&output, &outcome.sealed)?;
    info!(path = %output.display(), "Sealed image saved");

    if !args.quiet {
        println!();
        println!("{}", "Image sealed with provenance proof".green().bold());
        println!();
        println!("   {} {}", "Output:".dimmed(), output.display());
        println!(
            "   {} {}",
            "Content hash:".dimmed(),
            &outcome.hash.digest[..16]
        );
        println!("   {} {}", "Scheme:".dimmed(), outcome.proof.payload.sig_alg);
        println!("   {} {}", "Nonce:".dimmed(), outcome.proof.payload.nonce);
        println!(
            "   {} {}",
            "Sealed at:".dimmed(),
            outcome.proof.payload.timestamp
        );
        if outcome.hash.mode == HashMode::FallbackRaw {
            println!();
            println!(
                "{}",
                "Warning: image could not be decoded; the proof covers raw bytes only".yellow()
            );
        }
    }

    Ok(())
}
