//! Verify command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use pixseal_core::{
    verify_image, HashPolicy, JpegCommentCarrier, SignedProof, TrustAnchor, VerificationReport,
    Verdict,
};
use tracing::{error, info};

/// Execute the verify command.
pub fn execute(
    file: PathBuf,
    cert: Option<PathBuf>,
    policy: HashPolicy,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let container = std::fs::read(&file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    info!(path = %file.display(), bytes = container.len(), "Read image");

    let anchor = match cert {
        Some(path) => {
            let pem = std::fs::read(&path)
                .with_context(|| format!("Failed to read certificate: {}", path.display()))?;
            TrustAnchor::CertificatePem(pem)
        }
        None => TrustAnchor::Embedded,
    };

    let report = verify_image(&container, &anchor, policy, &JpegCommentCarrier)
        .context("Verification could not run")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&json_report(&report))?);
    }
    // The JSON report is the whole stdout contract in --json mode.
    let quiet = quiet || json;

    match &report.verdict {
        Verdict::Valid => {
            info!("Verification successful");
            if !quiet {
                print_banner("AUTHENTIC", true);
                println!("   {} {}", "Content hash:".dimmed(), "Matches proof".green());
                println!("   {} {}", "Signature:".dimmed(), "Valid".green());
                if let Some(proof) = &report.proof {
                    print_proof_details(proof);
                }
            }
            Ok(())
        }
        Verdict::MissingProof => {
            error!("No provenance proof embedded");
            if !quiet {
                print_banner("NO PROOF", false);
                println!(
                    "   {}",
                    "The image carries no embedded provenance proof".red()
                );
            }
            bail!("verification failed: no provenance proof embedded")
        }
        Verdict::MalformedProof(reason) => {
            error!(reason = %reason, "Malformed proof");
            if !quiet {
                print_banner("MALFORMED", false);
                println!("   {} {}", "Proof:".dimmed(), reason.red());
            }
            bail!("verification failed: malformed proof: {reason}")
        }
        Verdict::UnsupportedScheme(scheme) => {
            error!(scheme = %scheme, "Unsupported signature scheme");
            if !quiet {
                print_banner("UNSUPPORTED", false);
                println!("   {} {}", "Scheme:".dimmed(), scheme.red());
            }
            bail!("verification failed: unsupported signature scheme: {scheme}")
        }
        Verdict::TamperDetected { expected, actual } => {
            error!(
                expected = %&expected[..16],
                actual = %&actual[..16],
                "Content has been modified"
            );
            if !quiet {
                print_banner("TAMPERED", false);
                println!(
                    "   {} {}",
                    "Content:".dimmed(),
                    "MODIFIED since sealing".red()
                );
                println!("   {} {}", "Expected:".dimmed(), &expected[..16]);
                println!("   {} {}", "Got:".dimmed(), &actual[..16]);
                // Both checks ran; say whether the proof itself held up.
                match report.signature_valid {
                    Some(true) => {
                        println!("   {} {}", "Signature:".dimmed(), "Valid".green())
                    }
                    Some(false) => {
                        println!("   {} {}", "Signature:".dimmed(), "Invalid".red())
                    }
                    None => {}
                }
            }
            bail!("verification failed: image content has been modified")
        }
        Verdict::SignatureInvalid(reason) => {
            error!(reason = %reason, "Signature verification failed");
            if !quiet {
                print_banner("TAMPERED", false);
                println!("   {} {}", "Content hash:".dimmed(), "Matches proof".green());
                println!("   {} {}", "Signature:".dimmed(), reason.red());
            }
            bail!("verification failed: {reason}")
        }
    }
}

fn json_report(report: &VerificationReport) -> serde_json::Value {
    let (verdict, detail) = match &report.verdict {
        Verdict::Valid => ("valid", None),
        Verdict::MissingProof => ("missing_proof", None),
        Verdict::MalformedProof(reason) => ("malformed_proof", Some(reason.clone())),
        Verdict::UnsupportedScheme(scheme) => ("unsupported_scheme", Some(scheme.clone())),
        Verdict::TamperDetected { expected, actual } => (
            "tamper_detected",
            Some(format!("expected {expected}, got {actual}")),
        ),
        Verdict::SignatureInvalid(reason) => ("signature_invalid", Some(reason.clone())),
    };
    serde_json::json!({
        "verdict": verdict,
        "detail": detail,
        "hash_matched": report.hash_matched,
        "signature_valid": report.signature_valid,
        "hash_mode": report.hash_mode,
        "proof": &report.proof,
    })
}

fn print_banner(text: &str, ok: bool) {
    let line = format!("║{text:^40}║");
    let top = "╔════════════════════════════════════════╗";
    let bottom = "╚════════════════════════════════════════╝";
    println!();
    if ok {
        println!("{}", top.green());
        println!("{}", line.green().bold());
        println!("{}", bottom.green());
    } else {
        println!("{}", top.red());
        println!("{}", line.red().bold());
        println!("{}", bottom.red());
    }
    println!();
}

fn print_proof_details(proof: &SignedProof) {
    println!("   {} {}", "Device:".dimmed(), proof.payload.device_id);
    println!("   {} {}", "Firmware:".dimmed(), proof.payload.firmware);
    println!("   {} {}", "Sealed at:".dimmed(), proof.payload.timestamp);
    println!("   {} {}", "Scheme:".dimmed(), proof.payload.sig_alg);
}
