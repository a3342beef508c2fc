//! Metadata carrier: embed/extract proof bytes in an image container.
//!
//! The proof travels in the JPEG COM (comment) segment. Header segments
//! are spliced at the byte level; the entropy-coded pixel data after SOS
//! passes through untouched, so embedding never changes what the
//! canonical hasher sees under the pixel policy.

use crate::error::{PixsealError, Result};

/// Opaque get/set access to a container's designated comment field.
pub trait MetadataCarrier {
    /// Read the field, or `None` when the container carries no proof.
    fn get_field(&self, container: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Return new container bytes with the field set, replacing any
    /// previous value. Pixel data must pass through unchanged.
    fn set_field(&self, container: &[u8], value: &[u8]) -> Result<Vec<u8>>;
}

const SOI: [u8; 2] = [0xFF, 0xD8];
const MARKER_COM: u8 = 0xFE;
const MARKER_SOS: u8 = 0xDA;
const MARKER_EOI: u8 = 0xD9;
const MARKER_TEM: u8 = 0x01;

/// Segment length is a u16 that includes its own two bytes.
const MAX_COM_PAYLOAD: usize = u16::MAX as usize - 2;

/// JPEG comment-segment carrier.
pub struct JpegCommentCarrier;

/// One marker segment in the JPEG header (before SOS).
struct Segment {
    marker: u8,
    start: usize,
    payload_start: usize,
    end: usize,
}

/// Walk the header segments of a JPEG. Returns the segments and the
/// offset where the tail (SOS or EOI onward) begins.
fn scan_segments(container: &[u8]) -> Result<(Vec<Segment>, usize)> {
    if container.len() < 4 || container[..2] != SOI {
        return Err(PixsealError::Carrier(
            "not a JPEG container (missing SOI marker)".into(),
        ));
    }

    let mut segments = Vec::new();
    let mut pos = 2;
    loop {
        if pos + 1 >= container.len() {
            return Err(PixsealError::Carrier("truncated JPEG header".into()));
        }
        if container[pos] != 0xFF {
            return Err(PixsealError::Carrier("malformed JPEG marker".into()));
        }
        // Fill bytes before the marker code are legal.
        let mut m = pos + 1;
        while m < container.len() && container[m] == 0xFF {
            m += 1;
        }
        if m >= container.len() {
            return Err(PixsealError::Carrier("truncated JPEG header".into()));
        }
        let marker = container[m];
        match marker {
            MARKER_SOS | MARKER_EOI => return Ok((segments, pos)),
            MARKER_TEM | 0xD0..=0xD7 => {
                // Standalone markers carry no length.
                segments.push(Segment {
                    marker,
                    start: pos,
                    payload_start: m + 1,
                    end: m + 1,
                });
                pos = m + 1;
            }
            _ => {
                if m + 2 >= container.len() {
                    return Err(PixsealError::Carrier("truncated JPEG segment".into()));
                }
                let len = u16::from_be_bytes([container[m + 1], container[m + 2]]) as usize;
                if len < 2 || m + 1 + len > container.len() {
                    return Err(PixsealError::Carrier("invalid JPEG segment length".into()));
                }
                segments.push(Segment {
                    marker,
                    start: pos,
                    payload_start: m + 3,
                    end: m + 1 + len,
                });
                pos = m + 1 + len;
            }
        }
    }
}

impl MetadataCarrier for JpegCommentCarrier {
    fn get_field(&self, container: &[u8]) -> Result<Option<Vec<u8>>> {
        let (segments, _) = scan_segments(container)?;
        Ok(segments
            .iter()
            .find(|s| s.marker == MARKER_COM)
            .map(|s| container[s.payload_start..s.end].to_vec()))
    }

    fn set_field(&self, container: &[u8], value: &[u8]) -> Result<Vec<u8>> {
        if value.len() > MAX_COM_PAYLOAD {
            return Err(PixsealError::Carrier(format!(
                "field value too large for a COM segment: {} bytes",
                value.len()
            )));
        }
        let (segments, tail_start) = scan_segments(container)?;

        let mut out = Vec::with_capacity(container.len() + value.len() + 4);
        out.extend_from_slice(&SOI);
        for seg in &segments {
            if seg.marker == MARKER_COM {
                continue; // replaced below
            }
            out.extend_from_slice(&container[seg.start..seg.end]);
        }
        out.push(0xFF);
        out.push(MARKER_COM);
        out.extend_from_slice(&((value.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(value);
        out.extend_from_slice(&container[tail_start..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{ExtendedColorType, RgbImage};

    fn jpeg_bytes() -> Vec<u8> {
        let img = RgbImage::from_fn(24, 16, |x, y| {
            image::Rgb([(x * 10) as u8, (y * 14) as u8, 120])
        });
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, 90)
            .encode(img.as_raw(), 24, 16, ExtendedColorType::Rgb8)
            .expect("encode test jpeg");
        buf
    }

    #[test]
    fn test_set_then_get_round_trips() {
        let carrier = JpegCommentCarrier;
        let jpeg = jpeg_bytes();
        let with_field = carrier.set_field(&jpeg, b"proof bytes").expect("set");
        let read = carrier.get_field(&with_field).expect("get");
        assert_eq!(read.as_deref(), Some(b"proof bytes".as_slice()));
    }

    #[test]
    fn test_absent_field_reads_none() {
        let carrier = JpegCommentCarrier;
        assert_eq!(carrier.get_field(&jpeg_bytes()).expect("get"), None);
    }

    #[test]
    fn test_set_replaces_previous_value() {
        let carrier = JpegCommentCarrier;
        let jpeg = jpeg_bytes();
        let first = carrier.set_field(&jpeg, b"first").expect("set");
        let second = carrier.set_field(&first, b"second").expect("set");
        assert_eq!(
            carrier.get_field(&second).expect("get").as_deref(),
            Some(b"second".as_slice())
        );
        // Still decodable and exactly one COM segment survives.
        let (segments, _) = scan_segments(&second).expect("scan");
        assert_eq!(
            segments.iter().filter(|s| s.marker == MARKER_COM).count(),
            1
        );
    }

    #[test]
    fn test_embedding_never_touches_pixel_data() {
        let carrier = JpegCommentCarrier;
        let jpeg = jpeg_bytes();
        let with_field = carrier.set_field(&jpeg, b"anything at all").expect("set");

        let before = image::load_from_memory(&jpeg).expect("decode").to_rgb8();
        let after = image::load_from_memory(&with_field)
            .expect("decode with field")
            .to_rgb8();
        assert_eq!(before.as_raw(), after.as_raw());
    }

    #[test]
    fn test_non_jpeg_input_is_rejected() {
        let carrier = JpegCommentCarrier;
        let err = carrier.set_field(b"PNG would go here", b"x").unwrap_err();
        assert!(matches!(err, PixsealError::Carrier(_)));
        let err = carrier.get_field(&[0x89, 0x50, 0x4E, 0x47, 0, 0]).unwrap_err();
        assert!(matches!(err, PixsealError::Carrier(_)));
    }

    #[test]
    fn test_oversized_value_is_rejected() {
        let carrier = JpegCommentCarrier;
        let err = carrier
            .set_field(&jpeg_bytes(), &vec![0u8; MAX_COM_PAYLOAD + 1])
            .unwrap_err();
        assert!(matches!(err, PixsealError::Carrier(_)));
    }
}
