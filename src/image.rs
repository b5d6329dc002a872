//! Image value type and magic-number detection.
//!
//! An [`Image`] is an immutable byte buffer paired with its size and detected
//! MIME kind. Detection looks only at the first two bytes of the buffer, so
//! construction is cheap enough to run on every request.

use bytes::Bytes;

use crate::error::ImageError;

/// Magic numbers for the supported image containers, keyed by kind.
const MAGIC_TABLE: &[([u8; 2], ImageKind)] = &[
    ([0xff, 0xd8], ImageKind::Jpeg),
    ([0x89, 0x50], ImageKind::Png),
    ([0x47, 0x49], ImageKind::Gif),
];

/// MIME type reported for buffers whose magic number is not recognized.
pub const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

/// The container format of an image, derived from its magic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
}

impl ImageKind {
    /// Detect the kind from the leading bytes of a buffer.
    ///
    /// Returns `None` for buffers shorter than two bytes or with an
    /// unrecognized magic number.
    pub fn detect(data: &[u8]) -> Option<ImageKind> {
        if data.len() < 2 {
            return None;
        }

        MAGIC_TABLE
            .iter()
            .find(|(magic, _)| data[..2] == magic[..])
            .map(|(_, kind)| *kind)
    }

    /// The MIME type for this kind.
    pub const fn mime(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
        }
    }
}

/// Detect the MIME type of a buffer, falling back to
/// `application/octet-stream` when the magic number is unrecognized.
pub fn content_type_of(data: &[u8]) -> &'static str {
    ImageKind::detect(data).map_or(UNKNOWN_CONTENT_TYPE, |k| k.mime())
}

/// An image buffer with its detected kind.
///
/// Invariant: `size == data.len()`.
#[derive(Debug, Clone)]
pub struct Image {
    /// The image data buffer.
    pub data: Bytes,

    /// The image size, in bytes.
    pub size: u64,

    /// The image container kind.
    pub kind: ImageKind,
}

impl Image {
    /// Create a new image value for the data buffer provided.
    ///
    /// Fails when the buffer is shorter than two bytes or does not carry a
    /// known magic number.
    pub fn new(data: Bytes) -> Result<Image, ImageError> {
        if data.len() < 2 {
            return Err(ImageError::TooShort(data.len()));
        }

        let kind = ImageKind::detect(&data).ok_or(ImageError::UnsupportedType)?;
        let size = data.len() as u64;

        Ok(Image { data, size, kind })
    }
}

// =============================================================================
// Tests
// =============================================================================
