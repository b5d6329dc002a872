//! Resize operation: clipping, cropping and focusing within images.
//!
//! Resizing runs as a two-stage resample. The image is first shrunk by an
//! integer factor, which is cheap, then resampled by the remaining
//! sub-integer residual with a bilinear interpolator to restore the exact
//! target geometry. JPEG input additionally exploits the codec's
//! shrink-on-load, downscaling by a power of two during decompression before
//! the regular stages run.

use crate::codec::{Codec, Handle};
use crate::error::CodecError;
use crate::image::ImageKind;

use super::params::{CropGravity, Fit, TransformParams};
use super::Operation;

/// Resize operation, configured from the request parameters.
pub struct Resize {
    width: i64,
    height: i64,
    fit: Fit,
    gravity: CropGravity,
    point: (i64, i64),
    focus: [f64; 4],
}

/// Build a resize operation from parsed parameters.
///
/// Width and/or height have to be requested, otherwise the operation is not
/// applicable and is skipped.
pub fn factory(params: &TransformParams) -> Option<Box<dyn Operation>> {
    if params.width == 0 && params.height == 0 {
        return None;
    }

    Some(Box::new(Resize {
        width: params.width,
        height: params.height,
        fit: params.fit,
        gravity: params.crop,
        point: params.crop_point,
        focus: params.focus,
    }))
}

impl Operation for Resize {
    fn apply(&self, codec: &Codec, handle: Handle) -> Result<Handle, CodecError> {
        let (src_w, src_h) = (handle.width(), handle.height());

        // Do not process if the request matches or enlarges the original.
        if (self.width > src_w || self.height > src_h)
            || (self.width == src_w && self.height == src_h)
        {
            return Ok(handle);
        }

        let mut handle = handle;
        let (mut target_w, mut target_h) = (self.width, self.height);

        // Base resize factor; a missing axis is derived from the other.
        let factor = match (target_w > 0, target_h > 0) {
            (true, true) => {
                let xf = src_w as f64 / target_w as f64;
                let yf = src_h as f64 / target_h as f64;

                // The smallest delta when cropping, the largest otherwise.
                match self.fit {
                    Fit::Crop => xf.min(yf),
                    Fit::Clip => xf.max(yf),
                }
            }
            (true, false) => {
                let f = src_w as f64 / target_w as f64;
                target_h = (src_h as f64 / f).floor() as i64;
                f
            }
            (false, true) => {
                let f = src_h as f64 / target_h as f64;
                target_w = (src_w as f64 / f).floor() as i64;
                f
            }
            (false, false) => return Ok(handle),
        };

        let mut factor = factor;
        let mut shrink = factor.floor().max(1.0) as i64;
        let mut residual = shrink as f64 / factor;

        // JPEG supports shrink-on-load, which is much more efficient than
        // decoding the full image and shrinking afterwards.
        if shrink > 1 && handle.kind() == ImageKind::Jpeg {
            if let Some(source) = handle.source().cloned() {
                let load = match shrink {
                    s if s >= 8 => 8,
                    s if s >= 4 => 4,
                    _ => 2,
                };

                factor = (factor / load as f64).max(1.0);
                shrink = factor.floor().max(1.0) as i64;
                residual = shrink as f64 / factor;

                handle = codec.shrink_on_load_jpeg(source, load)?;
            }
        }

        // Shrink by the integer factor, if any remains.
        if shrink > 1 {
            handle = codec.shrink(handle, shrink as u32, shrink as u32)?;

            let rx = target_w as f64 / handle.width() as f64;
            let ry = target_h as f64 / handle.height() as f64;

            residual = match self.fit {
                Fit::Crop => rx.max(ry),
                Fit::Clip => rx.min(ry),
            };
        }

        // Resample by the residual factor to reach exact target geometry.
        if residual != 0.0 {
            handle = codec.affine_bilinear(handle, residual, 0.0, 0.0, residual)?;
        }

        // Crop to the requested box, anchored by gravity.
        if self.fit == Fit::Crop
            && (handle.width() != target_w || handle.height() != target_h)
        {
            let (cur_w, cur_h) = (handle.width(), handle.height());
            let (cx, cy) = self.crop_origin(src_w, src_h, cur_w, cur_h, target_w, target_h);

            let w = target_w.min(cur_w);
            let h = target_h.min(cur_h);

            handle = codec.crop(handle, cx, cy, w, h)?;
        }

        Ok(handle)
    }
}

impl Resize {
    /// Compute the crop window origin for the configured gravity.
    ///
    /// `cur_w`/`cur_h` are the post-resample dimensions, `w`/`h` the crop
    /// targets. Focal inputs are given in source coordinates and rescaled by
    /// the cumulative resize factor before anchoring.
    fn crop_origin(
        &self,
        src_w: i64,
        src_h: i64,
        cur_w: i64,
        cur_h: i64,
        w: i64,
        h: i64,
    ) -> (i64, i64) {
        match self.gravity {
            CropGravity::Center => ((cur_w - w) / 2, (cur_h - h) / 2),
            CropGravity::Top => ((cur_w - w) / 2, cur_h - h),
            CropGravity::Bottom => ((cur_w - w + 1) / 2, 0),
            CropGravity::Left => (cur_w - w, (cur_h - h) / 2),
            CropGravity::Right => (0, (cur_h - h + 1) / 2),
            CropGravity::Point => {
                let factor = cumulative_factor(src_w, src_h, cur_w, cur_h);
                let px = (self.point.0 as f64 / factor).floor() as i64;
                let py = (self.point.1 as f64 / factor).floor() as i64;

                clamp_origin(px - w / 2, py - h / 2, cur_w - w, cur_h - h)
            }
            CropGravity::Focus => {
                let factor = cumulative_factor(src_w, src_h, cur_w, cur_h);
                let [bx, by, bw, bh] = self.focus;

                let cx = ((bx + bw / 2.0) / factor).floor() as i64 - w / 2;
                let cy = ((by + bh / 2.0) / factor).floor() as i64 - h / 2;

                clamp_origin(cx, cy, cur_w - w, cur_h - h)
            }
        }
    }
}

/// Ratio of source to current dimensions, taking the dominant axis.
fn cumulative_factor(src_w: i64, src_h: i64, cur_w: i64, cur_h: i64) -> f64 {
    (src_w as f64 / cur_w as f64).max(src_h as f64 / cur_h as f64)
}

/// Keep a crop origin within the image.
fn clamp_origin(x: i64, y: i64, max_x: i64, max_y: i64) -> (i64, i64) {
    (x.clamp(0, max_x.max(0)), y.clamp(0, max_y.max(0)))
}

// =============================================================================
// Tests
// =============================================================================
