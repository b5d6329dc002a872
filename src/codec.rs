//! Codec facade over the native image library.
//!
//! This module wraps the decode/transform/encode primitives of the underlying
//! codec behind a typed interface. Every transformation consumes its input
//! [`Handle`] and returns a new one, so intermediate rasters are released on
//! every exit path, including errors.
//!
//! The codec imposes a concurrency of one per worker: CPU-bound work is
//! executed on the blocking thread pool behind a semaphore sized by
//! [`CodecSettings::concurrency`]. The HTTP layer stays fully asynchronous
//! while image jobs are serialized through [`Codec::run`].

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, Frame, ImageFormat, ImageReader, Limits};
use tokio::sync::Semaphore;

use crate::error::CodecError;
use crate::image::ImageKind;

/// Default number of concurrent codec workers.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Default decode allocation ceiling: 128MB.
pub const DEFAULT_MAX_ALLOC_BYTES: u64 = 128 * 1024 * 1024;

// =============================================================================
// Settings
// =============================================================================

/// Tuning applied once at process start.
#[derive(Debug, Clone)]
pub struct CodecSettings {
    /// Number of image jobs allowed to run at once.
    pub concurrency: usize,

    /// Maximum bytes a single decode may allocate.
    pub max_alloc_bytes: u64,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_alloc_bytes: DEFAULT_MAX_ALLOC_BYTES,
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// An owned, decoded image held by the codec.
///
/// Handles carry the source buffer they were loaded from so that codecs able
/// to re-read the compressed stream (JPEG shrink-on-load) can do so. The
/// `dirty` flag records whether any transformation has touched the raster;
/// a clean handle means the original bytes are still an exact rendition.
pub struct Handle {
    raster: DynamicImage,
    kind: ImageKind,
    source: Option<Bytes>,
    dirty: bool,
}

impl Handle {
    /// Wrap an already-decoded raster, detached from any source buffer.
    pub fn from_raster(raster: DynamicImage, kind: ImageKind) -> Self {
        Self {
            raster,
            kind,
            source: None,
            dirty: false,
        }
    }

    pub fn width(&self) -> i64 {
        self.raster.width() as i64
    }

    pub fn height(&self) -> i64 {
        self.raster.height() as i64
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    /// Whether any transformation has modified the raster.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The compressed buffer this handle was decoded from, if still attached.
    pub fn source(&self) -> Option<&Bytes> {
        self.source.as_ref()
    }

    /// Consume the handle, returning the raster.
    pub fn into_raster(self) -> DynamicImage {
        self.raster
    }
}

// =============================================================================
// Codec
// =============================================================================

/// The process-wide codec instance.
///
/// Created once at startup via [`Codec::init`] and shared by reference.
pub struct Codec {
    settings: CodecSettings,
    workers: Semaphore,
}

impl Codec {
    /// Initialize the codec with the given settings.
    pub fn init(settings: CodecSettings) -> Arc<Codec> {
        let permits = settings.concurrency.max(1);
        Arc::new(Codec {
            settings,
            workers: Semaphore::new(permits),
        })
    }

    /// Run a CPU-bound codec job on the blocking pool.
    ///
    /// Jobs are serialized behind the worker semaphore; at most
    /// `settings.concurrency` jobs execute at once.
    pub async fn run<T, F>(&self, job: F) -> T
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .workers
            .acquire()
            .await
            .expect("codec worker semaphore closed");

        tokio::task::spawn_blocking(job)
            .await
            .expect("codec worker panicked")
    }

    fn decode(&self, data: &[u8], format: ImageFormat) -> Result<DynamicImage, CodecError> {
        let mut reader = ImageReader::with_format(Cursor::new(data), format);

        let mut limits = Limits::no_limits();
        limits.max_alloc = Some(self.settings.max_alloc_bytes);
        reader.limits(limits);

        reader.decode().map_err(|e| CodecError::Load(e.to_string()))
    }

    /// Decode a buffer of the given kind into a handle.
    pub fn load(&self, data: Bytes, kind: ImageKind) -> Result<Handle, CodecError> {
        let format = match kind {
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Png => ImageFormat::Png,
            ImageKind::Gif => ImageFormat::Gif,
        };

        let raster = self.decode(&data, format)?;

        Ok(Handle {
            raster,
            kind,
            source: Some(data),
            dirty: false,
        })
    }

    /// Decode a JPEG buffer downscaled by `shrink` during decompression.
    ///
    /// `shrink` must be one of 2, 4 or 8. The returned handle keeps the
    /// source buffer attached and is marked dirty.
    pub fn shrink_on_load_jpeg(&self, data: Bytes, shrink: u32) -> Result<Handle, CodecError> {
        debug_assert!(matches!(shrink, 2 | 4 | 8));

        let full = self.decode(&data, ImageFormat::Jpeg)?;
        let w = (full.width() / shrink).max(1);
        let h = (full.height() / shrink).max(1);
        let raster = full.resize_exact(w, h, FilterType::Triangle);

        Ok(Handle {
            raster,
            kind: ImageKind::Jpeg,
            source: Some(data),
            dirty: true,
        })
    }

    /// Resample by integer factors on each axis.
    pub fn shrink(&self, handle: Handle, xf: u32, yf: u32) -> Result<Handle, CodecError> {
        if xf == 0 || yf == 0 {
            return Err(CodecError::process("shrink", "zero shrink factor"));
        }

        let w = (handle.raster.width() / xf).max(1);
        let h = (handle.raster.height() / yf).max(1);
        let raster = handle.raster.resize_exact(w, h, FilterType::Triangle);

        Ok(Handle {
            raster,
            kind: handle.kind,
            source: handle.source,
            dirty: true,
        })
    }

    /// Resample by a sub-integer factor with bilinear interpolation.
    ///
    /// Only axis-aligned scaling is supported: `b` and `c` must be zero.
    pub fn affine_bilinear(
        &self,
        handle: Handle,
        a: f64,
        b: f64,
        c: f64,
        d: f64,
    ) -> Result<Handle, CodecError> {
        if b != 0.0 || c != 0.0 {
            return Err(CodecError::process("affine resize", "shear is not supported"));
        }
        if a <= 0.0 || d <= 0.0 {
            return Err(CodecError::process("affine resize", "non-positive scale"));
        }

        let w = ((handle.raster.width() as f64 * a).round() as u32).max(1);
        let h = ((handle.raster.height() as f64 * d).round() as u32).max(1);
        let raster = handle.raster.resize_exact(w, h, FilterType::Triangle);

        Ok(Handle {
            raster,
            kind: handle.kind,
            source: handle.source,
            dirty: true,
        })
    }

    /// Extract an area from the image.
    pub fn crop(&self, handle: Handle, x: i64, y: i64, w: i64, h: i64) -> Result<Handle, CodecError> {
        let (cur_w, cur_h) = (handle.width(), handle.height());

        if x < 0 || y < 0 || w <= 0 || h <= 0 || x + w > cur_w || y + h > cur_h {
            return Err(CodecError::process(
                "crop",
                format!(
                    "area {}x{}+{}+{} outside image {}x{}",
                    w, h, x, y, cur_w, cur_h
                ),
            ));
        }

        let raster = handle
            .raster
            .crop_imm(x as u32, y as u32, w as u32, h as u32);

        Ok(Handle {
            raster,
            kind: handle.kind,
            source: handle.source,
            dirty: true,
        })
    }

    /// Convert the raster to the sRGB colour space.
    pub fn colourspace_srgb(&self, handle: Handle) -> Result<Handle, CodecError> {
        let raster = if handle.raster.color().has_alpha() {
            DynamicImage::ImageRgba8(handle.raster.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(handle.raster.to_rgb8())
        };

        Ok(Handle {
            raster,
            kind: handle.kind,
            source: handle.source,
            dirty: true,
        })
    }

    /// Decompose an animated GIF buffer into its frames.
    ///
    /// Frame delays are preserved on the returned frames so the animation
    /// can be reassembled after per-frame processing.
    pub fn decompose_gif(&self, data: &[u8]) -> Result<Vec<Frame>, CodecError> {
        let decoder =
            GifDecoder::new(Cursor::new(data)).map_err(|e| CodecError::Load(e.to_string()))?;

        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| CodecError::Load(e.to_string()))?;

        if frames.is_empty() {
            return Err(CodecError::Load("GIF contains no frames".to_string()));
        }

        Ok(frames)
    }

    /// Reassemble processed frames into a GIF buffer.
    pub fn assemble_gif(&self, frames: Vec<Frame>) -> Result<Bytes, CodecError> {
        let mut buf = Vec::new();

        {
            let mut encoder = GifEncoder::new(&mut buf);
            encoder
                .set_repeat(Repeat::Infinite)
                .map_err(|e| CodecError::Save(e.to_string()))?;
            encoder
                .encode_frames(frames)
                .map_err(|e| CodecError::Save(e.to_string()))?;
        }

        Ok(Bytes::from(buf))
    }

    /// Encode the handle into its container format.
    ///
    /// `quality` is the JPEG quality in 1-100; for PNG it is mapped to a
    /// compression level of `min(quality / 10, 9)`.
    pub fn save(&self, handle: Handle, kind: ImageKind, quality: i64) -> Result<Bytes, CodecError> {
        let quality = quality.clamp(1, 100) as u8;
        let mut buf = Vec::new();

        match kind {
            ImageKind::Jpeg => {
                // JPEG carries no alpha channel.
                let raster = handle.raster.to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
                encoder
                    .encode_image(&raster)
                    .map_err(|e| CodecError::Save(e.to_string()))?;
            }
            ImageKind::Png => {
                let compression = match (quality / 10).min(9) {
                    0..=3 => CompressionType::Fast,
                    4..=6 => CompressionType::Default,
                    _ => CompressionType::Best,
                };
                let encoder =
                    PngEncoder::new_with_quality(&mut buf, compression, PngFilterType::Adaptive);
                handle
                    .raster
                    .write_with_encoder(encoder)
                    .map_err(|e| CodecError::Save(e.to_string()))?;
            }
            ImageKind::Gif => {
                // GIF output is assembled from frames, never saved directly.
                return Err(CodecError::Save(
                    "GIF output must be assembled from frames".to_string(),
                ));
            }
        }

        Ok(Bytes::from(buf))
    }
}

// =============================================================================
// Tests
// =============================================================================
