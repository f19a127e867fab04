//! Wire-level chunk metadata shared by sender and receiver.

use serde::{Deserialize, Serialize};

/// Metadata accompanying one uploaded chunk.
///
/// Serialized as the JSON `meta` field of the multipart chunk request;
/// field names are camelCase on the wire. `file_checksum` is the running
/// whole-file CRC-32 and is only meaningful (nonzero) on the final chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMeta {
    pub file_name: String,
    pub chunk_index: u64,
    pub total_chunks: u64,
    /// Declared byte length of this chunk's payload.
    pub chunk_size: u64,
    /// Declared total size of the file in bytes.
    pub total_size: u64,
    pub chunk_checksum: u32,
    #[serde(default)]
    pub file_checksum: u32,
}

impl ChunkMeta {
    pub fn is_last(&self) -> bool {
        self.chunk_index + 1 == self.total_chunks
    }

    /// Structural validation independent of any session state.
    pub fn validate(&self) -> Result<(), String> {
        if self.file_name.is_empty() {
            return Err("fileName is empty".to_string());
        }
        if self.total_chunks == 0 {
            return Err("totalChunks must be >= 1".to_string());
        }
        if self.chunk_index >= self.total_chunks {
            return Err(format!(
                "chunkIndex {} out of range (totalChunks {})",
                self.chunk_index, self.total_chunks
            ));
        }
        Ok(())
    }
}

/// Per-chunk success response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAck {
    pub success: bool,
    #[serde(default)]
    pub duplicate: bool,
    /// Set on the chunk whose write completed the transfer.
    #[serde(default)]
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_round_trips_with_camel_case_keys() {
        let meta = ChunkMeta {
            file_name: "report.pdf".into(),
            chunk_index: 2,
            total_chunks: 3,
            chunk_size: 1024,
            total_size: 3072,
            chunk_checksum: 0xDEAD_BEEF,
            file_checksum: 0x1234_5678,
        };

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["fileName"], "report.pdf");
        assert_eq!(json["chunkIndex"], 2);
        assert_eq!(json["totalChunks"], 3);
        assert_eq!(json["chunkChecksum"], 0xDEAD_BEEFu32);

        let back: ChunkMeta = serde_json::from_value(json).unwrap();
        assert_eq!(back.chunk_size, 1024);
        assert!(back.is_last());
    }

    #[test]
    fn file_checksum_defaults_to_zero_when_absent() {
        // Senders predating the whole-file digest omit the field entirely.
        let meta: ChunkMeta = serde_json::from_str(
            r#"{"fileName":"a.bin","chunkIndex":0,"totalChunks":1,
                "chunkSize":10,"totalSize":10,"chunkChecksum":1}"#,
        )
        .unwrap();
        assert_eq!(meta.file_checksum, 0);
    }

    #[test]
    fn validate_rejects_out_of_range_index() {
        let mut meta = ChunkMeta {
            file_name: "a".into(),
            chunk_index: 3,
            total_chunks: 3,
            chunk_size: 1,
            total_size: 3,
            chunk_checksum: 0,
            file_checksum: 0,
        };
        assert!(meta.validate().is_err());
        meta.chunk_index = 2;
        assert!(meta.validate().is_ok());
        meta.total_chunks = 0;
        assert!(meta.validate().is_err());
        meta.total_chunks = 3;
        meta.file_name.clear();
        assert!(meta.validate().is_err());
    }
}
