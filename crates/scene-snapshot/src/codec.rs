use scene_types::Element;

use crate::error::{SnapshotError, SnapshotResult};

pub const MAGIC: &[u8; 4] = b"SCNP";
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 16;
const ZSTD_LEVEL: i32 = 3;

/// Encode elements into a snapshot payload.
pub fn encode_payload(elements: &[Element]) -> SnapshotResult<Vec<u8>> {
    let count =
        u32::try_from(elements.len()).map_err(|_| SnapshotError::TooManyElements(elements.len()))?;
    let raw = bincode::serialize(elements).map_err(|e| SnapshotError::Serialization(e.to_string()))?;
    let body = zstd::encode_all(raw.as_slice(), ZSTD_LEVEL)
        .map_err(|e| SnapshotError::CompressionFailed(e.to_string()))?;

    let mut payload = Vec::with_capacity(HEADER_LEN + body.len());
    payload.extend_from_slice(MAGIC);
    payload.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    payload.extend_from_slice(&count.to_be_bytes());
    payload.extend_from_slice(&crc32fast::hash(&body).to_be_bytes());
    payload.extend_from_slice(&body);

    tracing::debug!(
        elements = count,
        raw_bytes = raw.len(),
        payload_bytes = payload.len(),
        "snapshot payload encoded"
    );
    Ok(payload)
}

/// Decode a snapshot payload, validating header, CRC and element count.
pub fn decode_payload(payload: &[u8]) -> SnapshotResult<Vec<Element>> {
    if payload.len() < HEADER_LEN {
        return Err(SnapshotError::Truncated(payload.len()));
    }
    let (header, body) = payload.split_at(HEADER_LEN);

    if &header[0..4] != MAGIC {
        return Err(SnapshotError::InvalidMagic {
            expected: String::from_utf8_lossy(MAGIC).into_owned(),
            actual: String::from_utf8_lossy(&header[0..4]).into_owned(),
        });
    }
    let version = read_u32(&header[4..8]);
    if version != FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }
    let count = read_u32(&header[8..12]);
    let crc = read_u32(&header[12..16]);
    if crc32fast::hash(body) != crc {
        return Err(SnapshotError::CrcMismatch);
    }

    let raw = zstd::decode_all(body).map_err(|e| SnapshotError::DecompressionFailed(e.to_string()))?;
    let elements: Vec<Element> =
        bincode::deserialize(&raw).map_err(|e| SnapshotError::Serialization(e.to_string()))?;
    if elements.len() != count as usize {
        return Err(SnapshotError::CountMismatch {
            expected: count,
            actual: elements.len(),
        });
    }
    Ok(elements)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_be_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use scene_types::{BranchId, Dimensions3D, ElementType, Point2D, Point3D, SceneId};

    fn floor() -> Vec<Element> {
        let scene = SceneId::new();
        let branch = BranchId::new();
        let wall = Element::wall(
            scene,
            branch,
            "north",
            Point2D::new(0.0, 0.0),
            Point2D::new(4.0, 0.0),
            0.2,
            true,
        );
        let room = Element::room(
            scene,
            branch,
            "kitchen",
            "KITCHEN",
            vec![
                Point2D::new(0.0, 0.0),
                Point2D::new(4.0, 0.0),
                Point2D::new(4.0, 3.0),
                Point2D::new(0.0, 3.0),
            ],
            true,
        );
        let sofa = Element::furniture(
            scene,
            branch,
            "sofa",
            "KIVIK",
            Point3D::new(1.0, 1.0, 0.0),
            Dimensions3D::new(2.2, 0.8, 0.9),
        );
        vec![wall, room, sofa]
    }

    #[test]
    fn round_trip_preserves_elements() {
        let elements = floor();
        let payload = encode_payload(&elements).unwrap();
        assert_eq!(&payload[..4], MAGIC);
        assert_eq!(decode_payload(&payload).unwrap(), elements);
    }

    #[test]
    fn empty_branch_is_a_valid_snapshot() {
        let payload = encode_payload(&[]).unwrap();
        assert!(decode_payload(&payload).unwrap().is_empty());
    }

    #[test]
    fn flipped_body_byte_is_rejected() {
        let mut payload = encode_payload(&floor()).unwrap();
        let last = payload.len() - 1;
        payload[last] ^= 0xFF;
        assert!(matches!(decode_payload(&payload), Err(SnapshotError::CrcMismatch)));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut payload = encode_payload(&floor()).unwrap();
        payload[0] = b'X';
        assert!(matches!(
            decode_payload(&payload),
            Err(SnapshotError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut payload = encode_payload(&floor()).unwrap();
        payload[4..8].copy_from_slice(&9u32.to_be_bytes());
        assert!(matches!(
            decode_payload(&payload),
            Err(SnapshotError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let mut payload = encode_payload(&floor()).unwrap();
        payload[8..12].copy_from_slice(&7u32.to_be_bytes());
        let err = decode_payload(&payload).unwrap_err();
        assert!(matches!(err, SnapshotError::CountMismatch { expected: 7, actual: 3 }));
        assert!(err.is_corrupt());
    }

    #[test]
    fn short_payload_is_truncated() {
        assert!(matches!(decode_payload(b"SCNP"), Err(SnapshotError::Truncated(4))));
    }

    proptest! {
        #[test]
        fn any_single_byte_flip_fails_to_decode(index in 0usize..64, mask in 1u8..=255) {
            let mut payload = encode_payload(&floor()).unwrap();
            let i = index % payload.len();
            payload[i] ^= mask;
            prop_assert!(decode_payload(&payload).is_err());
        }
    }
}
