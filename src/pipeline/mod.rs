//! Transformation pipeline: parameter parsing, operation model and driver.
//!
//! A [`Pipeline`] holds an ordered list of operations built from the request
//! parameters. Operation order is fixed by the registration list in this
//! module, not by parameter order in the request. Pipelines are immutable
//! once built.
//!
//! Processing drives an image through load, the operation list, a final sRGB
//! conversion and re-encoding. When no operation touches the raster the
//! original bytes are returned unchanged, so requests that match the source
//! dimensions are served byte-identical.

pub mod params;
mod resize;

pub use params::{CropGravity, Fit, RawParams, TransformParams};
pub use resize::Resize;

use std::sync::Arc;

use image::{DynamicImage, Frame};

use crate::codec::{Codec, Handle};
use crate::error::{CodecError, ParamsError, ProcessError};
use crate::image::{Image, ImageKind};

// =============================================================================
// Operation model
// =============================================================================

/// A single deterministic transformation step.
///
/// Operations consume the image handle and return the transformed one; the
/// result of applying an operation to an image is a pure function of both.
pub trait Operation: Send + Sync {
    fn apply(&self, codec: &Codec, handle: Handle) -> Result<Handle, CodecError>;
}

/// An operation factory inspects parsed parameters and either produces an
/// operation or declines with `None`.
type OperationFactory = fn(&TransformParams) -> Option<Box<dyn Operation>>;

/// The ordered registration list of all possible operations.
const OPERATIONS: &[OperationFactory] = &[resize::factory];

// =============================================================================
// Pipeline
// =============================================================================

/// An ordered sequence of operations applied to an image.
pub struct Pipeline {
    params: TransformParams,
    operations: Arc<Vec<Box<dyn Operation>>>,
    codec: Arc<Codec>,
}

impl Pipeline {
    /// Parse a parameter string and build the pipeline for it.
    ///
    /// Each registered factory is consulted in order; factories that are not
    /// applicable for the parameters are skipped.
    pub fn new(params: &str, codec: Arc<Codec>) -> Result<Pipeline, ParamsError> {
        let raw = RawParams::parse(params)?;
        let params = TransformParams::unpack(&raw)?;

        let mut operations = Vec::new();
        for factory in OPERATIONS {
            if let Some(op) = factory(&params) {
                operations.push(op);
            }
        }

        Ok(Pipeline {
            params,
            operations: Arc::new(operations),
            codec,
        })
    }

    /// The parsed parameters this pipeline was built from.
    pub fn params(&self) -> &TransformParams {
        &self.params
    }

    /// Number of operations in the pipeline.
    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Run the image through the pipeline.
    ///
    /// The codec work is CPU-bound and executes on the codec's worker pool;
    /// this method only suspends while waiting for a worker.
    pub async fn process(&self, image: Image) -> Result<Image, ProcessError> {
        // Nothing will touch the raster: hand the original bytes back.
        if self.operations.is_empty() && !(image.kind == ImageKind::Gif && self.params.frame) {
            return Ok(image);
        }

        let codec = Arc::clone(&self.codec);
        let operations = Arc::clone(&self.operations);
        let params = self.params.clone();

        self.codec
            .run(move || match image.kind {
                ImageKind::Gif => process_gif(&codec, &operations, &params, image),
                _ => process_still(&codec, &operations, &params, image),
            })
            .await
    }
}

/// Drive a JPEG or PNG image through the operation list.
fn process_still(
    codec: &Codec,
    operations: &[Box<dyn Operation>],
    params: &TransformParams,
    image: Image,
) -> Result<Image, ProcessError> {
    let mut handle = codec.load(image.data.clone(), image.kind)?;

    for op in operations {
        handle = op.apply(codec, handle)?;
    }

    if !handle.is_dirty() {
        return Ok(image);
    }

    let handle = codec.colourspace_srgb(handle)?;
    let data = codec.save(handle, image.kind, params.quality)?;

    Ok(Image::new(data)?)
}

/// Drive a GIF through the operation list frame by frame.
///
/// The codec cannot transform animated input directly, so the animation is
/// decomposed, each frame processed independently, and the result
/// reassembled with the original frame delays. With `frame=true` only the
/// first frame is kept.
fn process_gif(
    codec: &Codec,
    operations: &[Box<dyn Operation>],
    params: &TransformParams,
    image: Image,
) -> Result<Image, ProcessError> {
    let mut frames = codec.decompose_gif(&image.data)?;

    let mut changed = false;
    if params.frame && frames.len() > 1 {
        frames.truncate(1);
        changed = true;
    }

    let mut processed = Vec::with_capacity(frames.len());

    for frame in frames {
        let delay = frame.delay();
        let raster = DynamicImage::ImageRgba8(frame.into_buffer());
        let mut handle = Handle::from_raster(raster, ImageKind::Jpeg);

        for op in operations {
            handle = op.apply(codec, handle)?;
        }

        if handle.is_dirty() {
            changed = true;
            handle = codec.colourspace_srgb(handle)?;
        }

        processed.push(Frame::from_parts(handle.into_raster().to_rgba8(), 0, 0, delay));
    }

    if !changed {
        return Ok(image);
    }

    let data = codec.assemble_gif(processed)?;
    Ok(Image::new(data)?)
}

// =============================================================================
// Tests
// =============================================================================
