//! Canonical image hashing.
//!
//! The digest must be a pure function of pixel content so that it
//! survives metadata edits, including embedding the proof itself. Two
//! canonicalization policies exist and are not interchangeable: the same
//! policy must be used at sealing and at verification time, otherwise
//! every verification reports tampering.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{PixsealError, Result};

/// Canonicalization policy applied before hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HashPolicy {
    /// Hash the decoded RGB8 pixel grid directly.
    #[default]
    PixelGrid,
    /// Re-encode the decoded image to a fixed baseline JPEG (quality 95,
    /// no metadata) and hash the encoded bytes.
    ReencodedBytes,
}

/// How a [`CanonicalHash`] digest was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashMode {
    /// Digest over canonicalized pixel content; independent of container
    /// metadata.
    Pixel,
    /// The container could not be decoded, so the digest covers the raw
    /// container bytes. Any metadata edit (including proof embedding)
    /// changes it, so the metadata-independence guarantee does not hold.
    FallbackRaw,
}

/// Deterministic content fingerprint of a captured image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalHash {
    /// SHA-256 digest, 64 lowercase hex characters.
    pub digest: String,
    pub mode: HashMode,
}

/// Compute the canonical content hash of an image container.
///
/// On decode failure the raw container bytes are hashed instead and the
/// result carries [`HashMode::FallbackRaw`], so callers can see that the
/// degraded guarantee applies. This function itself never fails.
pub fn canonical_hash(container: &[u8], policy: HashPolicy) -> CanonicalHash {
    match decode_and_digest(container, policy) {
        Ok(digest) => CanonicalHash {
            digest,
            mode: HashMode::Pixel,
        },
        Err(e) => {
            warn!(error = %e, "canonical decode failed, hashing raw container bytes");
            CanonicalHash {
                digest: hex::encode(Sha256::digest(container)),
                mode: HashMode::FallbackRaw,
            }
        }
    }
}

fn decode_and_digest(container: &[u8], policy: HashPolicy) -> Result<String> {
    let img = image::load_from_memory(container)
        .map_err(|e| PixsealError::ImageDecode(e.to_string()))?;
    match policy {
        HashPolicy::PixelGrid => Ok(pixel_grid_digest(&img)),
        HashPolicy::ReencodedBytes => reencoded_digest(&img),
    }
}

/// SHA-256 over `"{w}x{h}:rgb8:"` followed by the row-major RGB8 samples.
fn pixel_grid_digest(img: &DynamicImage) -> String {
    let rgb = img.to_rgb8();
    let mut hasher = Sha256::new();
    hasher.update(format!("{}x{}:rgb8:", rgb.width(), rgb.height()));
    hasher.update(rgb.as_raw());
    hex::encode(hasher.finalize())
}

fn reencoded_digest(img: &DynamicImage) -> Result<String> {
    let rgb = img.to_rgb8();
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, 95)
        .encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| PixsealError::ImageDecode(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(&encoded)))
}
