use lz4_flex::{compress_prepend_size, decompress_size_prepended};

/// Upper bound on how far one compressed byte can expand.
const MAX_RATIO: usize = 255;

/// Compress an entry payload, prefixed with its uncompressed size.
pub fn compress(data: &[u8]) -> Vec<u8> {
    compress_prepend_size(data)
}

/// Decompress a size-prefixed payload. A prefix no lz4 block of this
/// length could produce is rejected before anything is allocated.
pub fn decompress(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    if data.len() < 4 {
        anyhow::bail!("lz4 payload too short: {} bytes", data.len());
    }
    let size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let limit = (data.len() - 4).saturating_mul(MAX_RATIO).saturating_add(16);
    if size > limit {
        anyhow::bail!("lz4 size prefix {size} too large for {} compressed bytes", data.len() - 4);
    }
    decompress_size_prepended(data).map_err(|e| anyhow::anyhow!("lz4 decompress failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highly_compressible_data_roundtrips() {
        let data = vec![0u8; 64 * 1024];
        assert_eq!(decompress(&compress(&data)).unwrap(), data);
        assert_eq!(decompress(&compress(&[])).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn forged_size_prefix_is_rejected() {
        let mut packed = compress(b"hello bitsy");
        packed[..4].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = decompress(&packed).unwrap_err();
        assert!(err.to_string().contains("too large"));
        assert!(decompress(&[1, 0]).is_err());
    }
}
