use crate::chunk_data::{PayloadCompression, BIOME_ARRAY_LENGTH, CHUNK_SECTIONS};
use crate::packed_array::SECTION_VOLUME;
use crate::packet::PacketReader;
use crate::section::LIGHT_DATA;
use blockpatch_common::{PatchError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::debug;
use std::io::{Read, Write};

/// Upper bound on an inflated chunk column: 16 sections of 32-bit entries with
/// both light arrays, a palette allowance of one light array each, and biomes.
pub const MAX_INFLATED_PAYLOAD: usize =
    CHUNK_SECTIONS * (SECTION_VOLUME * 4 + 3 * LIGHT_DATA) + BIOME_ARRAY_LENGTH;

/// Inflates a zlib payload. A corrupt stream, or one inflating past
/// [`MAX_INFLATED_PAYLOAD`], is reported as an unsupported format.
pub fn inflate(payload: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(PacketReader::new(payload)).take(MAX_INFLATED_PAYLOAD as u64 + 1);
    let mut inflated = Vec::with_capacity((payload.len() * 4).min(MAX_INFLATED_PAYLOAD));
    decoder
        .read_to_end(&mut inflated)
        .map_err(|e| PatchError::unsupported(format!("corrupt zlib payload: {}", e)))?;
    if inflated.len() > MAX_INFLATED_PAYLOAD {
        return Err(PatchError::unsupported(format!(
            "zlib payload inflates past {} bytes",
            MAX_INFLATED_PAYLOAD
        )));
    }
    debug!("Inflated {} bytes to {}", payload.len(), inflated.len());
    Ok(inflated)
}

pub fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Plain bytes of a payload sent with `compression`.
pub fn unpack(payload: &[u8], compression: PayloadCompression) -> Result<Vec<u8>> {
    match compression {
        PayloadCompression::None => Ok(payload.to_vec()),
        PayloadCompression::Zlib => inflate(payload),
    }
}

/// Wire bytes for `data` under `compression`.
pub fn pack(data: Vec<u8>, compression: PayloadCompression) -> Result<Vec<u8>> {
    match compression {
        PayloadCompression::None => Ok(data),
        PayloadCompression::Zlib => deflate(&data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_zlib_round_trip() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let packed = pack(data.clone(), PayloadCompression::Zlib).unwrap();
        assert_ne!(packed, data);
        assert_eq!(packed[0], 0x78);
        assert_eq!(unpack(&packed, PayloadCompression::Zlib).unwrap(), data);
    }

    #[test]
    fn test_uncompressed_passes_through() {
        let data = vec![1, 2, 3];
        assert_eq!(unpack(&data, PayloadCompression::None).unwrap(), data);
        assert_eq!(pack(data.clone(), PayloadCompression::None).unwrap(), data);
    }

    #[test]
    fn test_inflate_is_bounded() {
        let largest = deflate(&vec![0; MAX_INFLATED_PAYLOAD]).unwrap();
        assert_eq!(inflate(&largest).unwrap().len(), MAX_INFLATED_PAYLOAD);

        let bomb = deflate(&vec![0; 64 * 1024 * 1024]).unwrap();
        assert!(bomb.len() < 128 * 1024);
        assert_matches!(inflate(&bomb), Err(PatchError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_corrupt_stream() {
        assert_matches!(
            inflate(&[0x78, 0x9C, 0xFF, 0xFF, 0xFF]),
            Err(PatchError::UnsupportedFormat(_))
        );
    }
}
