//! Pixseal CLI - tamper-evident provenance for captured images.

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use pixseal_core::HashPolicy;

mod commands;
mod exit_codes;
mod utils;

#[derive(Parser)]
#[command(name = "pixseal")]
#[command(author, version, about = "Sign and verify image provenance proofs", long_about = None)]
struct Cli {
    /// Suppress user-facing output (diagnostics still honor RUST_LOG)
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Canonicalization policy; must match between sealing and verification.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Hash the decoded pixel grid
    Pixel,
    /// Hash a fixed re-encoding of the decoded image
    Reencoded,
}

impl From<PolicyArg> for HashPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Pixel => HashPolicy::PixelGrid,
            PolicyArg::Reencoded => HashPolicy::ReencodedBytes,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Ensure device key material exists and export the public key
    Keygen {
        /// Private key path (created with mode 0600 if absent)
        #[arg(long, default_value = "device_private_key.pem")]
        key: PathBuf,

        /// Public key export path
        #[arg(long, default_value = "device_public_key.pem")]
        public: PathBuf,
    },

    /// Hash an image, sign a provenance proof and embed it
    Seal {
        /// Path to the image to seal
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output path (defaults to <stem>_sealed.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Device identity recorded in the proof
        #[arg(long, default_value = "pi-serial-01")]
        device_id: String,

        /// Firmware version recorded in the proof
        #[arg(long, default_value = "cam-v1.0")]
        firmware: String,

        /// Ed25519 private key path (generated if absent)
        #[arg(long, default_value = "device_private_key.pem")]
        key: PathBuf,

        /// X.509 certificate (PEM); with --cert-key, signs via detached PKCS#7
        #[arg(long, requires = "cert_key")]
        cert: Option<PathBuf>,

        /// RSA private key (PEM) matching --cert
        #[arg(long, requires = "cert")]
        cert_key: Option<PathBuf>,

        /// Canonicalization policy
        #[arg(long, value_enum, default_value_t = PolicyArg::Pixel)]
        policy: PolicyArg,
    },

    /// Verify the provenance proof embedded in an image
    Verify {
        /// Path to the sealed image
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Trust-anchor certificate (PEM), required for PKCS#7 proofs
        #[arg(long)]
        cert: Option<PathBuf>,

        /// Canonicalization policy used at sealing time
        #[arg(long, value_enum, default_value_t = PolicyArg::Pixel)]
        policy: PolicyArg,

        /// Emit a machine-readable JSON report on stdout
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        let exit = exit_codes::ExitCode::from_anyhow(&err);
        eprintln!("Error: {err:#}");
        process::exit(exit.code);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Keygen { key, public } => commands::keygen::execute(key, public, cli.quiet),
        Commands::Seal {
            file,
            output,
            device_id,
            firmware,
            key,
            cert,
            cert_key,
            policy,
        } => commands::seal::execute(commands::seal::SealArgs {
            file,
            output,
            device_id,
            firmware,
            key,
            cert,
            cert_key,
            policy: policy.into(),
            quiet: cli.quiet,
        }),
        Commands::Verify {
            file,
            cert,
            policy,
            json,
        } => commands::verify::execute(file, cert, policy.into(), json, cli.quiet),
    }
}
