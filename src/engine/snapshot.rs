use std::io::{Read, Write};

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};

use crate::error::ProvisionResult;
use crate::models::Inventory;

pub fn to_json(inventory: &Inventory) -> ProvisionResult<String> {
    let json = serde_json::to_string(inventory).context("Failed to serialize inventory")?;
    Ok(json)
}

/// Inventory snapshot stored on the pod: zlib-compressed JSON, base64-encoded.
/// Change detection compares the decoded JSON text, so encoding only has to be stable.
pub fn encode(json: &str) -> ProvisionResult<String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(json.as_bytes())
        .context("Failed to compress inventory snapshot")?;
    let compressed = encoder.finish().context("Failed to compress inventory snapshot")?;
    Ok(STANDARD.encode(compressed))
}

pub fn decode(data: &str) -> ProvisionResult<String> {
    let compressed = STANDARD
        .decode(data.trim())
        .context("Inventory snapshot is not valid base64")?;
    let mut json = String::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_string(&mut json)
        .context("Inventory snapshot is not valid zlib data")?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_inventory;

    #[test]
    fn test_snapshot_restores_json_text() {
        let json = to_json(&sample_inventory()).unwrap();
        let stored = encode(&json).unwrap();
        assert_ne!(stored, json);
        assert_eq!(decode(&stored).unwrap(), json);
    }

    #[test]
    fn test_corrupt_snapshot_is_a_storage_error() {
        let err = decode("not base64 at all!").unwrap_err();
        assert!(matches!(err, crate::error::ProvisionError::Storage(_)));
    }
}
