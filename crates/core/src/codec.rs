#![forbid(unsafe_code)]

//! Byte payload compression used for node-execution blobs, script bodies and
//! HTTP `Content-Encoding` interop.

use crate::error::CoreError;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Payloads shorter than this are always stored raw.
pub const COMPRESS_THRESHOLD: usize = 1024;

const ZSTD_LEVEL: i32 = 3;
const BROTLI_BUFFER: usize = 4096;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_LGWIN: u32 = 22;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    #[default]
    None,
    Gzip,
    Zstd,
    Brotli,
}

impl Codec {
    pub const ALL: [Codec; 4] = [Codec::None, Codec::Gzip, Codec::Zstd, Codec::Brotli];

    pub fn as_i64(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Gzip => 1,
            Self::Zstd => 2,
            Self::Brotli => 3,
        }
    }

    pub fn from_i64(value: i64) -> Result<Self, CoreError> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Gzip),
            2 => Ok(Self::Zstd),
            3 => Ok(Self::Brotli),
            other => Err(CoreError::UnsupportedEncoding(format!("codec {other}"))),
        }
    }

    /// Maps an HTTP `Content-Encoding` token. An empty value means identity.
    pub fn from_content_encoding(encoding: &str) -> Result<Self, CoreError> {
        let normalized = encoding.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "" | "identity" => Ok(Self::None),
            "gzip" | "x-gzip" => Ok(Self::Gzip),
            "zstd" => Ok(Self::Zstd),
            "br" => Ok(Self::Brotli),
            _ => Err(CoreError::UnsupportedEncoding(encoding.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
            Self::Brotli => "brotli",
        }
    }
}

pub fn compress(data: &[u8], codec: Codec) -> Result<Vec<u8>, CoreError> {
    match codec {
        Codec::None => Ok(data.to_vec()),
        Codec::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        Codec::Zstd => Ok(zstd::stream::encode_all(data, ZSTD_LEVEL)?),
        Codec::Brotli => {
            let mut writer = brotli::CompressorWriter::new(
                Vec::new(),
                BROTLI_BUFFER,
                BROTLI_QUALITY,
                BROTLI_LGWIN,
            );
            writer.write_all(data)?;
            writer.flush()?;
            Ok(writer.into_inner())
        }
    }
}

pub fn decompress(data: &[u8], codec: Codec) -> Result<Vec<u8>, CoreError> {
    match codec {
        Codec::None => Ok(data.to_vec()),
        Codec::Gzip => {
            let mut out = Vec::new();
            GzDecoder::new(data).read_to_end(&mut out)?;
            Ok(out)
        }
        Codec::Zstd => Ok(zstd::stream::decode_all(data)?),
        Codec::Brotli => {
            let mut out = Vec::new();
            brotli::Decompressor::new(data, BROTLI_BUFFER).read_to_end(&mut out)?;
            Ok(out)
        }
    }
}

pub fn decompress_by_encoding(data: &[u8], encoding: &str) -> Result<Vec<u8>, CoreError> {
    decompress(data, Codec::from_content_encoding(encoding)?)
}

/// Storage policy for blobs: raw below `COMPRESS_THRESHOLD`, otherwise zstd
/// when the compressed form is strictly smaller.
pub fn set_compressed(data: &[u8]) -> (Vec<u8>, Codec) {
    if data.len() < COMPRESS_THRESHOLD {
        return (data.to_vec(), Codec::None);
    }
    match compress(data, Codec::Zstd) {
        Ok(compressed) if compressed.len() < data.len() => (compressed, Codec::Zstd),
        _ => (data.to_vec(), Codec::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_codec_round_trips() {
        let payload = br#"{"status":200,"body":"hello hello hello hello"}"#.repeat(40);
        for codec in Codec::ALL {
            let packed = compress(&payload, codec).unwrap();
            assert_eq!(decompress(&packed, codec).unwrap(), payload, "{codec:?}");
        }
        for codec in Codec::ALL {
            let packed = compress(b"", codec).unwrap();
            assert!(decompress(&packed, codec).unwrap().is_empty(), "{codec:?}");
        }
    }

    #[test]
    fn content_encoding_lookup() {
        let payload = b"abcabcabcabcabcabc".repeat(100);
        let gz = compress(&payload, Codec::Gzip).unwrap();
        assert_eq!(decompress_by_encoding(&gz, "gzip").unwrap(), payload);
        let br = compress(&payload, Codec::Brotli).unwrap();
        assert_eq!(decompress_by_encoding(&br, "br").unwrap(), payload);
        let zs = compress(&payload, Codec::Zstd).unwrap();
        assert_eq!(decompress_by_encoding(&zs, "zstd").unwrap(), payload);
        assert_eq!(decompress_by_encoding(&payload, "").unwrap(), payload);

        let err = decompress_by_encoding(&payload, "deflate-9000").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnsupportedEncoding);
    }

    #[test]
    fn codec_column_values_are_stable() {
        for codec in Codec::ALL {
            assert_eq!(Codec::from_i64(codec.as_i64()).unwrap(), codec);
        }
        assert!(Codec::from_i64(9).is_err());
    }

    #[test]
    fn small_payloads_stay_raw() {
        let small = vec![b'a'; COMPRESS_THRESHOLD - 1];
        let (blob, codec) = set_compressed(&small);
        assert_eq!(codec, Codec::None);
        assert_eq!(blob, small);
    }

    #[test]
    fn large_compressible_payloads_use_zstd() {
        let large = vec![b'x'; 4096];
        let (blob, codec) = set_compressed(&large);
        assert_eq!(codec, Codec::Zstd);
        assert!(blob.len() < large.len());
        assert_eq!(decompress(&blob, Codec::Zstd).unwrap(), large);
    }

    #[test]
    fn incompressible_payloads_fall_back_to_raw() {
        // xorshift keeps the bytes reproducible without pulling in an rng crate.
        let mut state = 0x2545_f491_4f6c_dd1du64;
        let noise: Vec<u8> = (0..4096)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 24) as u8
            })
            .collect();
        let (blob, codec) = set_compressed(&noise);
        match codec {
            Codec::None => assert_eq!(blob, noise),
            Codec::Zstd => assert!(blob.len() < noise.len()),
            other => panic!("unexpected codec {other:?}"),
        }
    }
}
