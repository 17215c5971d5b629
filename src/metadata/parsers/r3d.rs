//! R3D (RED cinema camera) header decoder
//!
//! Fixed-offset binary header, big-endian:
//!
//! | Offset      | Field                                   |
//! |-------------|-----------------------------------------|
//! | 0x04..0x08  | ASCII magic "RED1" or "RED2"            |
//! | 0x4C..0x50  | u32 width                               |
//! | 0x50..0x54  | u32 height                              |
//! | 0x58..0x5C  | u32 frame rate, scaled by 1000 if large |
//! | 0x96        | camera serial, printable ASCII run      |
//! | 0xC2..0xC5  | 3-byte reel number                      |
//! | 0xCA..0xCD  | 3-byte take number                      |

use crate::common::binary::{printable_ascii_at, read_u32_be};
use crate::error::{Error, Result};
use crate::metadata::parser::{HeaderParser, MediaMetadata};

const MIN_HEADER: usize = 512;

pub struct R3dParser;

impl HeaderParser for R3dParser {
    fn name(&self) -> &'static str {
        "R3D"
    }

    fn can_handle(&self, ext: &str) -> bool {
        ext == ".r3d"
    }

    fn parse(&self, header: &[u8]) -> Result<MediaMetadata> {
        if header.len() < MIN_HEADER {
            return Err(Error::InvalidHeader(format!(
                "R3D header too small: {} bytes",
                header.len()
            )));
        }

        let magic = &header[4..8];
        if magic != b"RED1" && magic != b"RED2" {
            return Err(Error::InvalidHeader(format!(
                "invalid R3D magic: {} (expected RED1/RED2 at offset 4)",
                String::from_utf8_lossy(magic)
            )));
        }

        let mut meta = MediaMetadata {
            source: "r3d_header",
            codec: "R3D".to_string(),
            ..MediaMetadata::default()
        };

        // Image dimensions
        if let (Some(width), Some(height)) = (read_u32_be(header, 0x4C), read_u32_be(header, 0x50))
        {
            meta.width = width;
            meta.height = height;
            if width > 0 && height > 0 {
                meta.resolution = format!("{}x{}", width, height);
            }
        }

        // Frame rate, stored as a scaled integer (25000 = 25.000 fps)
        if let Some(fps_scaled) = read_u32_be(header, 0x58) {
            if fps_scaled >= 1000 {
                meta.fps = format!("{:.3}", fps_scaled as f64 / 1000.0);
            } else if fps_scaled > 0 {
                meta.fps = format!("{}", fps_scaled);
            }
        }

        // Camera serial number (e.g. "KMDBK...")
        meta.serial_number = printable_ascii_at(header, 0x96, 16);

        // Reel and take, 3 ASCII digits each
        meta.reel_number = printable_ascii_at(header, 0xC2, 3);
        meta.take_number = printable_ascii_at(header, 0xCA, 3);

        Ok(meta)
    }
}
