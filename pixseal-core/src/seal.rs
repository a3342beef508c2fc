//! Sealing pipeline: hash, build, sign, embed.

use tracing::{debug, info, warn};

use crate::carrier::MetadataCarrier;
use crate::error::Result;
use crate::hash::{canonical_hash, CanonicalHash, HashMode, HashPolicy};
use crate::proof::{ProofPayload, SignedProof};
use crate::signer::ProofSigner;

/// Per-device configuration, carried explicitly through the pipeline
/// rather than held as ambient state.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub device_id: String,
    pub firmware: String,
    /// Must match the policy the verifier will use.
    pub hash_policy: HashPolicy,
}

/// Result of sealing one capture.
pub struct SealOutcome {
    /// Container bytes with the proof embedded.
    pub sealed: Vec<u8>,
    pub proof: SignedProof,
    pub hash: CanonicalHash,
}

/// Hash the image, build and sign a proof over it, and embed the proof
/// in the container's comment field. Synchronous end to end.
pub fn seal_image<C: MetadataCarrier>(
    container: &[u8],
    config: &DeviceConfig,
    signer: &ProofSigner,
    carrier: &C,
) -> Result<SealOutcome> {
    let hash = canonical_hash(container, config.hash_policy);
    if hash.mode == HashMode::FallbackRaw {
        warn!("sealing with raw-byte fallback hash; the proof will not survive metadata edits");
    }
    debug!(digest = %hash.digest, mode = ?hash.mode, "canonical hash computed");

    let payload = ProofPayload::build(
        &config.device_id,
        &hash.digest,
        &config.firmware,
        signer.sig_alg(),
        Some(signer.public_key_b64()?),
    );
    let canonical = payload.canonical_bytes()?;
    let signature = signer.sign(&canonical)?;
    let proof = SignedProof::new(payload, signature);

    let sealed = carrier.set_field(container, &proof.to_json()?)?;
    info!(
        device_id = %config.device_id,
        scheme = %proof.payload.sig_alg,
        nonce = %proof.payload.nonce,
        "image sealed"
    );

    Ok(SealOutcome {
        sealed,
        proof,
        hash,
    })
}
