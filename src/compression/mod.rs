// src/compression/mod.rs
//! Compression for export archives
//!
//! Archives are written through one of the supported encoders and read back
//! with the format detected from the leading magic bytes, so an importer
//! never needs to be told how an archive was compressed.

use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::str::FromStr;
use thiserror::Error;

/// Compression-related errors
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Failed to create {format} decoder: {source}")]
    DecoderCreation {
        format: &'static str,
        source: io::Error,
    },

    #[error("Failed to create {format} encoder: {source}")]
    EncoderCreation {
        format: &'static str,
        source: io::Error,
    },

    #[error("Failed to decompress {format} data: {source}")]
    Decompression {
        format: &'static str,
        source: io::Error,
    },

    #[error("Unsupported compression format: {0}")]
    UnsupportedFormat(String),
}

impl From<CompressionError> for crate::Error {
    fn from(err: CompressionError) -> Self {
        crate::Error::ArchiveError(err.to_string())
    }
}

/// Supported compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionFormat {
    /// No compression (plain tar)
    None,
    /// Gzip compression (.gz)
    #[default]
    Gzip,
    /// XZ/LZMA compression (.xz)
    Xz,
    /// Zstandard compression (.zst)
    Zstd,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    ///
    /// # Examples
    /// ```
    /// use vfsport::compression::CompressionFormat;
    ///
    /// assert_eq!(CompressionFormat::from_extension("site.tar.gz"), CompressionFormat::Gzip);
    /// assert_eq!(CompressionFormat::from_extension("site.tar.zst"), CompressionFormat::Zstd);
    /// assert_eq!(CompressionFormat::from_extension("site.tar"), CompressionFormat::None);
    /// ```
    pub fn from_extension(path: &str) -> Self {
        if path.ends_with(".gz") || path.ends_with(".tgz") {
            Self::Gzip
        } else if path.ends_with(".xz") {
            Self::Xz
        } else if path.ends_with(".zst") || path.ends_with(".zstd") {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// Detect compression format from magic bytes
    ///
    /// - Gzip: `1f 8b`
    /// - XZ: `fd 37 7a 58 5a 00`
    /// - Zstd: `28 b5 2f fd`
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if data.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            Self::Xz
        } else if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// File extension appended to `.tar`
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
            Self::Xz => ".xz",
            Self::Zstd => ".zst",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for CompressionFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "gzip" | "gz" => Ok(Self::Gzip),
            "xz" => Ok(Self::Xz),
            "zstd" | "zst" => Ok(Self::Zstd),
            _ => Err(format!("Unsupported compression format: {s}")),
        }
    }
}

/// Create a decompressing reader for the given format
pub fn create_decoder<'a, R: Read + 'a>(
    reader: R,
    format: CompressionFormat,
) -> Result<Box<dyn Read + 'a>, CompressionError> {
    match format {
        CompressionFormat::None => Ok(Box::new(reader)),
        CompressionFormat::Gzip => Ok(Box::new(flate2::read::GzDecoder::new(reader))),
        CompressionFormat::Xz => Ok(Box::new(xz2::read::XzDecoder::new(reader))),
        CompressionFormat::Zstd => {
            let decoder = zstd::Decoder::new(reader).map_err(|e| CompressionError::DecoderCreation {
                format: "zstd",
                source: e,
            })?;
            Ok(Box::new(decoder))
        }
    }
}

/// Create a decompressing reader, detecting the format from the data
pub fn create_decoder_auto(data: &[u8]) -> Result<Box<dyn Read + '_>, CompressionError> {
    let format = CompressionFormat::from_magic_bytes(data);
    create_decoder(data, format)
}

/// Decompress a byte slice using the specified format
pub fn decompress(data: &[u8], format: CompressionFormat) -> Result<Vec<u8>, CompressionError> {
    let mut decoder = create_decoder(data, format)?;
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|e| CompressionError::Decompression {
            format: format.name(),
            source: e,
        })?;
    Ok(output)
}

/// Compressing writer that must be finished explicitly
///
/// Dropping an encoder without calling [`Encoder::finish`] can leave a
/// truncated stream behind.
pub enum Encoder<W: Write> {
    None(W),
    Gzip(flate2::write::GzEncoder<W>),
    Xz(xz2::write::XzEncoder<W>),
    Zstd(zstd::Encoder<'static, W>),
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W, format: CompressionFormat) -> Result<Self, CompressionError> {
        Ok(match format {
            CompressionFormat::None => Encoder::None(writer),
            CompressionFormat::Gzip => Encoder::Gzip(flate2::write::GzEncoder::new(
                writer,
                flate2::Compression::default(),
            )),
            CompressionFormat::Xz => Encoder::Xz(xz2::write::XzEncoder::new(writer, 6)),
            CompressionFormat::Zstd => Encoder::Zstd(zstd::Encoder::new(writer, 3).map_err(
                |e| CompressionError::EncoderCreation {
                    format: "zstd",
                    source: e,
                },
            )?),
        })
    }

    /// Flush the trailer and hand back the inner writer
    pub fn finish(self) -> io::Result<W> {
        match self {
            Encoder::None(mut w) => {
                w.flush()?;
                Ok(w)
            }
            Encoder::Gzip(e) => e.finish(),
            Encoder::Xz(e) => e.finish(),
            Encoder::Zstd(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Encoder::None(w) => w.write(buf),
            Encoder::Gzip(e) => e.write(buf),
            Encoder::Xz(e) => e.write(buf),
            Encoder::Zstd(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Encoder::None(w) => w.flush(),
            Encoder::Gzip(e) => e.flush(),
            Encoder::Xz(e) => e.flush(),
            Encoder::Zstd(e) => e.flush(),
        }
    }
}

/// Compress a byte slice
pub fn compress(data: &[u8], format: CompressionFormat) -> Result<Vec<u8>, CompressionError> {
    let mut encoder = Encoder::new(Vec::new(), format)?;
    let encode = |e: io::Error| CompressionError::EncoderCreation {
        format: format.name(),
        source: e,
    };
    encoder.write_all(data).map_err(encode)?;
    encoder.finish().map_err(encode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(CompressionFormat::from_extension("a.tar.gz"), CompressionFormat::Gzip);
        assert_eq!(CompressionFormat::from_extension("a.tgz"), CompressionFormat::Gzip);
        assert_eq!(CompressionFormat::from_extension("a.tar.xz"), CompressionFormat::Xz);
        assert_eq!(CompressionFormat::from_extension("a.tar.zstd"), CompressionFormat::Zstd);
        assert_eq!(CompressionFormat::from_extension("a.tar"), CompressionFormat::None);
    }

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0x1f, 0x8b, 0x08, 0x00]),
            CompressionFormat::Gzip
        );
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]),
            CompressionFormat::Xz
        );
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0x28, 0xb5, 0x2f, 0xfd]),
            CompressionFormat::Zstd
        );
        assert_eq!(CompressionFormat::from_magic_bytes(&[0x1f]), CompressionFormat::None);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("zst".parse::<CompressionFormat>().unwrap(), CompressionFormat::Zstd);
        assert_eq!(CompressionFormat::default(), CompressionFormat::Gzip);
        assert!("lz4".parse::<CompressionFormat>().is_err());
    }

    #[test]
    fn test_encoders_are_detected_on_read() {
        let data = b"manifest and blobs".repeat(20);
        for format in [
            CompressionFormat::None,
            CompressionFormat::Gzip,
            CompressionFormat::Xz,
            CompressionFormat::Zstd,
        ] {
            let packed = compress(&data, format).unwrap();
            if format != CompressionFormat::None {
                assert_eq!(CompressionFormat::from_magic_bytes(&packed), format);
            }
            let mut out = Vec::new();
            create_decoder_auto(&packed).unwrap().read_to_end(&mut out).unwrap();
            assert_eq!(out, data, "format {format}");
        }
    }

    #[test]
    fn test_decompress_gzip() {
        // Minimal gzip of "hello"
        let gzip_data: &[u8] = &[
            0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xcb, 0x48, 0xcd, 0xc9,
            0xc9, 0x07, 0x00, 0x86, 0xa6, 0x10, 0x36, 0x05, 0x00, 0x00, 0x00,
        ];
        assert_eq!(decompress(gzip_data, CompressionFormat::Gzip).unwrap(), b"hello");
    }
}
