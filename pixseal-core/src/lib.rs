//! Pixseal Core - tamper-evident provenance for captured images
//!
//! This crate derives a canonical content hash from a captured image,
//! binds it with device identity, capture time, a nonce and firmware
//! version into a signed proof, embeds the proof in the image's comment
//! field, and later verifies the binding by recomputing the hash and
//! re-checking the signature.
//!
//! # Features
//!
//! - Canonical pixel hashing that survives metadata edits
//! - Self-contained Ed25519 proofs with an embedded public key
//! - Certificate-anchored detached PKCS#7 proofs
//! - Structured verification verdicts (tamper vs invalid signature vs
//!   missing/malformed proof)
//!
//! # Example
//!
//! ```no_run
//! use pixseal_core::{
//!     seal_image, verify_image, DeviceConfig, Ed25519KeyMaterial, HashPolicy,
//!     JpegCommentCarrier, ProofSigner, TrustAnchor,
//! };
//!
//! # fn example() -> pixseal_core::Result<()> {
//! let container = std::fs::read("capture.jpg")?;
//!
//! let keys = Ed25519KeyMaterial::load_or_generate("device_private_key.pem".as_ref())?;
//! let signer = ProofSigner::Ed25519(keys);
//! let config = DeviceConfig {
//!     device_id: "pi-serial-01".into(),
//!     firmware: "cam-v1.0".into(),
//!     hash_policy: HashPolicy::PixelGrid,
//! };
//!
//! let outcome = seal_image(&container, &config, &signer, &JpegCommentCarrier)?;
//!
//! let report = verify_image(
//!     &outcome.sealed,
//!     &TrustAnchor::Embedded,
//!     HashPolicy::PixelGrid,
//!     &JpegCommentCarrier,
//! )?;
//! assert!(report.is_valid());
//! # Ok(())
//! # }
//! ```

pub mod carrier;
pub mod error;
pub mod hash;
pub mod keys;
pub mod proof;
pub mod seal;
pub mod signer;
pub mod verify;

// Re-export main types for convenience
pub use carrier::{JpegCommentCarrier, MetadataCarrier};
pub use error::{PixsealError, Result};
pub use hash::{canonical_hash, CanonicalHash, HashMode, HashPolicy};
pub use keys::{CertificateKeyMaterial, Ed25519KeyMaterial};
pub use proof::{canonical_unsigned_bytes, ProofPayload, SigAlg, SignedProof, NONCE_BYTES};
pub use seal::{seal_image, DeviceConfig, SealOutcome};
pub use signer::ProofSigner;
pub use verify::{verify_image, TrustAnchor, Verdict, VerificationReport};
