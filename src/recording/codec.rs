//! Volume payload codec.
//!
//! A `volume` row carries a base64 string of run-length-compressed bytes.
//! Decompressed, the stream is:
//!
//! ```text
//! Width:  i32 (little endian)
//! Height: i32
//! Depth:  i32
//! Occupancy: ceil(width * height * depth / 8) bytes, MSB first,
//!            index = z * width * height + y * width + x
//! ```
//!
//! Compression is a flat sequence of `(value, count)` byte pairs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::volume::{DecodedVolume, OccupancyGrid};

/// Size of the dimension header in bytes.
pub const VOLUME_HEADER_SIZE: usize = 12;

/// Longest run a single `(value, count)` pair can describe.
const MAX_RUN: usize = u8::MAX as usize;

/// Failure modes of volume decoding, one per stage.
#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    #[error("Failed to decode base64 payload: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    #[error("Decompressed data is too short: {len} bytes, need at least 12")]
    TooShort { len: usize },
    #[error("Invalid volume dimensions {width}x{height}x{depth}")]
    InvalidDimensions { width: i32, height: i32, depth: i32 },
    #[error("Expected {expected} occupancy bytes, but got {found}")]
    SizeMismatch { expected: usize, found: usize },
}

/// Decodes and encodes `volume` row payloads.
pub struct VolumeCodec;

impl VolumeCodec {
    /// Decode a base64 payload into an occupancy grid.
    pub fn decode(entity_id: &str, payload: &str) -> Result<DecodedVolume, VolumeError> {
        let compressed = STANDARD.decode(payload.trim())?;
        let raw = run_length_decompress(&compressed);

        if raw.len() < VOLUME_HEADER_SIZE {
            return Err(VolumeError::TooShort { len: raw.len() });
        }

        let read_i32 = |offset: usize| {
            i32::from_le_bytes([
                raw[offset],
                raw[offset + 1],
                raw[offset + 2],
                raw[offset + 3],
            ])
        };
        let (width, height, depth) = (read_i32(0), read_i32(4), read_i32(8));

        let cells = cell_count(width, height, depth).ok_or(VolumeError::InvalidDimensions {
            width,
            height,
            depth,
        })?;

        let expected = OccupancyGrid::packed_len(cells);
        let found = raw.len() - VOLUME_HEADER_SIZE;
        if found != expected {
            return Err(VolumeError::SizeMismatch { expected, found });
        }

        let grid = OccupancyGrid::from_packed(
            width as usize,
            height as usize,
            depth as usize,
            raw[VOLUME_HEADER_SIZE..].to_vec(),
        );

        Ok(DecodedVolume {
            entity_id: entity_id.to_string(),
            grid,
        })
    }

    /// Encode an occupancy grid into a payload `decode` accepts.
    pub fn encode(grid: &OccupancyGrid) -> String {
        let packed = grid.to_packed();
        let mut raw = Vec::with_capacity(VOLUME_HEADER_SIZE + packed.len());
        for dim in [grid.width(), grid.height(), grid.depth()] {
            raw.extend_from_slice(&(dim as i32).to_le_bytes());
        }
        raw.extend_from_slice(&packed);
        STANDARD.encode(run_length_compress(&raw))
    }
}

/// Positive dimensions whose product fits in memory, as a cell count.
fn cell_count(width: i32, height: i32, depth: i32) -> Option<usize> {
    if width <= 0 || height <= 0 || depth <= 0 {
        return None;
    }
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(depth as usize)
}

/// Expand `(value, count)` pairs. A trailing unpaired byte is ignored.
pub fn run_length_decompress(data: &[u8]) -> Vec<u8> {
    if data.len() % 2 != 0 {
        log::warn!(
            "Run-length data has odd length {}, ignoring the trailing byte",
            data.len()
        );
    }

    let total: usize = data.chunks_exact(2).map(|pair| pair[1] as usize).sum();
    let mut out = Vec::with_capacity(total);
    for pair in data.chunks_exact(2) {
        out.extend(std::iter::repeat_n(pair[0], pair[1] as usize));
    }
    out
}

/// Compress into `(value, count)` pairs with runs of at most 255.
pub fn run_length_compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut iter = data.iter().copied().peekable();
    while let Some(value) = iter.next() {
        let mut count = 1;
        while count < MAX_RUN && iter.peek() == Some(&value) {
            iter.next();
            count += 1;
        }
        out.push(value);
        out.push(count as u8);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn payload_from_raw(raw: &[u8]) -> String {
        STANDARD.encode(run_length_compress(raw))
    }

    fn header(w: i32, h: i32, d: i32) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&w.to_le_bytes());
        raw.extend_from_slice(&h.to_le_bytes());
        raw.extend_from_slice(&d.to_le_bytes());
        raw
    }

    #[test]
    fn test_decompress_pairs() {
        assert_eq!(run_length_decompress(&[7, 3, 1, 0, 2, 1]), vec![7, 7, 7, 2]);
        assert!(run_length_decompress(&[]).is_empty());
    }

    #[test]
    fn test_decompress_odd_length_uses_whole_pairs() {
        assert_eq!(run_length_decompress(&[5, 2, 9]), vec![5, 5]);
    }

    #[test]
    fn test_compress_splits_long_runs() {
        let data = vec![0u8; 600];
        let compressed = run_length_compress(&data);
        assert_eq!(compressed, vec![0, 255, 0, 255, 0, 90]);
        assert_eq!(run_length_decompress(&compressed), data);
    }

    #[test]
    fn test_decode_known_payload() {
        let mut raw = header(2, 1, 1);
        raw.push(0b1100_0000);
        let volume = VolumeCodec::decode("E1", &payload_from_raw(&raw)).unwrap();
        assert_eq!(volume.entity_id, "E1");
        assert_eq!(volume.grid.dimensions(), (2, 1, 1));
        assert!(volume.grid.is_occupied(0, 0, 0));
        assert!(volume.grid.is_occupied(1, 0, 0));
    }

    #[test]
    fn test_decode_invalid_base64() {
        let err = VolumeCodec::decode("E1", "not*base64!").unwrap_err();
        assert!(matches!(err, VolumeError::InvalidEncoding(_)));
    }

    #[test]
    fn test_decode_too_short() {
        let err = VolumeCodec::decode("E1", &payload_from_raw(&[1, 0, 0, 0, 1])).unwrap_err();
        assert!(matches!(err, VolumeError::TooShort { len: 5 }));
    }

    #[test]
    fn test_decode_size_mismatch() {
        let mut raw = header(4, 4, 1);
        raw.push(0xFF);
        let err = VolumeCodec::decode("E1", &payload_from_raw(&raw)).unwrap_err();
        assert!(matches!(
            err,
            VolumeError::SizeMismatch {
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_decode_rejects_non_positive_dimensions() {
        let raw = header(0, 4, 4);
        let err = VolumeCodec::decode("E1", &payload_from_raw(&raw)).unwrap_err();
        assert!(matches!(err, VolumeError::InvalidDimensions { width: 0, .. }));

        let raw = header(-2, 4, 4);
        let err = VolumeCodec::decode("E1", &payload_from_raw(&raw)).unwrap_err();
        assert!(matches!(err, VolumeError::InvalidDimensions { width: -2, .. }));
    }

    #[test]
    fn test_encode_matches_wire_layout() {
        let grid = OccupancyGrid::from_fn(3, 1, 1, |x, _, _| x != 1);
        let payload = VolumeCodec::encode(&grid);
        let raw = run_length_decompress(&STANDARD.decode(payload).unwrap());
        let mut expected = header(3, 1, 1);
        expected.push(0b1010_0000);
        assert_eq!(raw, expected);
    }

    proptest! {
        #[test]
        fn prop_rle_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            prop_assert_eq!(run_length_decompress(&run_length_compress(&data)), data);
        }

        #[test]
        fn prop_volume_roundtrip(
            w in 1usize..9,
            h in 1usize..9,
            d in 1usize..9,
            seed in any::<u64>(),
        ) {
            let grid = OccupancyGrid::from_fn(w, h, d, |x, y, z| {
                let i = (z * w * h + y * w + x) as u64;
                (seed.rotate_left((i % 64) as u32) ^ i) & 1 == 1
            });
            let decoded = VolumeCodec::decode("E", &VolumeCodec::encode(&grid)).unwrap();
            prop_assert_eq!(decoded.grid, grid);
        }
    }
}
