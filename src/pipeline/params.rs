//! Parameter grammar and schema-driven unpacker.
//!
//! Pipeline parameters arrive as a comma-separated list of `key=value`
//! fields. Values may be colon-delimited compounds (`crop=point:120:80`).
//! Parsing produces a [`RawParams`] map; unpacking walks a static schema of
//! [`FieldSpec`] descriptors to build the typed [`TransformParams`] record,
//! validating each field against its declared pattern and bounds.
//!
//! # Schema descriptors
//!
//! Each field declares:
//! - the parameter `key` it reads,
//! - an optional extended-key prefix `(param, prefix)`: the field is only
//!   populated when the raw value of `param` starts with `prefix`,
//! - an optional default, applied when the key is absent or empty,
//! - an index into the colon-split compound value,
//! - an optional validation pattern, applied before type conversion,
//! - optional numeric bounds, enforced after conversion.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ParamsError;

// =============================================================================
// Raw parameter list
// =============================================================================

/// A parsed but untyped parameter list, indexed by parameter name.
#[derive(Debug, Clone, Default)]
pub struct RawParams {
    fields: BTreeMap<String, String>,
}

impl RawParams {
    /// Parse a comma-separated `key=value` list.
    ///
    /// Whitespace around keys and values is trimmed. Fields that are not a
    /// single `key=value` pair are rejected.
    pub fn parse(input: &str) -> Result<RawParams, ParamsError> {
        if input.is_empty() {
            return Err(ParamsError::Empty);
        }

        let mut fields = BTreeMap::new();

        for field in input.split(',') {
            let parts: Vec<&str> = field.split('=').collect();
            if parts.len() != 2 {
                return Err(ParamsError::Malformed(field.to_string()));
            }

            fields.insert(parts[0].trim().to_string(), parts[1].trim().to_string());
        }

        Ok(RawParams { fields })
    }

    /// Look up the raw value for a parameter name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|s| s.as_str())
    }

    /// Iterate over parameter names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|s| s.as_str())
    }
}

// =============================================================================
// Schema
// =============================================================================

/// A single field descriptor in the unpacking schema.
struct FieldSpec {
    name: &'static str,
    key: &'static str,
    prefix: Option<(&'static str, &'static str)>,
    default: Option<&'static str>,
    index: usize,
    valid: Option<&'static str>,
    bounds: Option<(i64, i64)>,
}

const WIDTH: FieldSpec = FieldSpec {
    name: "width",
    key: "width",
    prefix: None,
    default: None,
    index: 0,
    valid: None,
    bounds: Some((0, i64::MAX)),
};

const HEIGHT: FieldSpec = FieldSpec {
    name: "height",
    key: "height",
    prefix: None,
    default: None,
    index: 0,
    valid: None,
    bounds: Some((0, i64::MAX)),
};

const QUALITY: FieldSpec = FieldSpec {
    name: "quality",
    key: "quality",
    prefix: None,
    default: Some("75"),
    index: 0,
    valid: None,
    bounds: Some((1, 100)),
};

const FIT: FieldSpec = FieldSpec {
    name: "fit",
    key: "fit",
    prefix: None,
    default: Some("clip"),
    index: 0,
    valid: Some("^(clip|crop)$"),
    bounds: None,
};

const CROP_GRAVITY: FieldSpec = FieldSpec {
    name: "crop",
    key: "crop",
    prefix: Some(("fit", "crop")),
    default: Some("center"),
    index: 0,
    valid: Some("^(top|bottom|left|right|center|point|focus)$"),
    bounds: None,
};

const CROP_POINT_X: FieldSpec = FieldSpec {
    name: "crop",
    key: "crop",
    prefix: Some(("crop", "point")),
    default: None,
    index: 1,
    valid: None,
    bounds: None,
};

const CROP_POINT_Y: FieldSpec = FieldSpec {
    name: "crop",
    key: "crop",
    prefix: Some(("crop", "point")),
    default: None,
    index: 2,
    valid: None,
    bounds: None,
};

const FOCUS_X: FieldSpec = focus_spec(0);
const FOCUS_Y: FieldSpec = focus_spec(1);
const FOCUS_W: FieldSpec = focus_spec(2);
const FOCUS_H: FieldSpec = focus_spec(3);

const fn focus_spec(index: usize) -> FieldSpec {
    FieldSpec {
        name: "focus",
        key: "focus",
        prefix: None,
        default: None,
        index,
        valid: None,
        bounds: None,
    }
}

const FRAME: FieldSpec = FieldSpec {
    name: "frame",
    key: "frame",
    prefix: None,
    default: Some("false"),
    index: 0,
    valid: Some("^(true|false|1|0)$"),
    bounds: None,
};

/// Parameter names the schema declares; anything else is a validation error.
const DECLARED_KEYS: &[&str] = &["width", "height", "quality", "fit", "crop", "focus", "frame"];

static VALIDATORS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    [
        FIT.valid.unwrap(),
        CROP_GRAVITY.valid.unwrap(),
        FRAME.valid.unwrap(),
    ]
    .iter()
    .map(|p| (*p, Regex::new(p).expect("invalid schema pattern")))
    .collect()
});

// =============================================================================
// Unpacking
// =============================================================================

/// Resolve the raw string value for a field, applying prefix guard, default,
/// compound index and validation pattern.
fn raw_value(params: &RawParams, spec: &FieldSpec) -> Result<Option<String>, ParamsError> {
    // A field guarded by an extended-key prefix is skipped when the
    // referenced parameter's value doesn't start with that prefix.
    if let Some((param, prefix)) = spec.prefix {
        let matches = params.get(param).is_some_and(|v| v.starts_with(prefix));
        if !matches {
            return Ok(None);
        }
    }

    let raw = params.get(spec.key);

    let value = match raw {
        None | Some("") => {
            return Ok(spec.default.map(|d| d.to_string()));
        }
        Some(v) => v,
    };

    let components: Vec<&str> = value.split(':').collect();
    let component = components
        .get(spec.index)
        .copied()
        .ok_or(ParamsError::MissingIndex {
            field: spec.name,
            index: spec.index,
        })?;

    if let Some(pattern) = spec.valid {
        let re = &VALIDATORS[pattern];
        if !re.is_match(component) {
            return Err(ParamsError::InvalidValue {
                field: spec.name,
                value: component.to_string(),
                pattern,
            });
        }
    }

    Ok(Some(component.to_string()))
}

fn unpack_int(params: &RawParams, spec: &FieldSpec) -> Result<Option<i64>, ParamsError> {
    let Some(raw) = raw_value(params, spec)? else {
        return Ok(None);
    };

    let value: i64 = raw.parse().map_err(|e: std::num::ParseIntError| {
        ParamsError::Conversion {
            field: spec.name,
            value: raw.clone(),
            message: e.to_string(),
        }
    })?;

    if let Some((min, max)) = spec.bounds {
        if value < min || value > max {
            return Err(ParamsError::OutOfRange {
                field: spec.name,
                value,
                min,
                max,
            });
        }
    }

    Ok(Some(value))
}

fn unpack_float(params: &RawParams, spec: &FieldSpec) -> Result<Option<f64>, ParamsError> {
    let Some(raw) = raw_value(params, spec)? else {
        return Ok(None);
    };

    let value: f64 = raw.parse().map_err(|e: std::num::ParseFloatError| {
        ParamsError::Conversion {
            field: spec.name,
            value: raw.clone(),
            message: e.to_string(),
        }
    })?;

    Ok(Some(value))
}

fn unpack_str(params: &RawParams, spec: &FieldSpec) -> Result<Option<String>, ParamsError> {
    raw_value(params, spec)
}

fn unpack_bool(params: &RawParams, spec: &FieldSpec) -> Result<Option<bool>, ParamsError> {
    let Some(raw) = raw_value(params, spec)? else {
        return Ok(None);
    };

    Ok(Some(matches!(raw.as_str(), "true" | "1")))
}

// =============================================================================
// Typed parameters
// =============================================================================

/// How the requested dimensions bound the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fit {
    /// Scale to fit within the requested box.
    #[default]
    Clip,

    /// Scale to cover the requested box, then crop.
    Crop,
}

/// Where the crop window anchors within the resized image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropGravity {
    Top,
    Bottom,
    Left,
    Right,
    #[default]
    Center,

    /// Crop around an explicit focal point given in source coordinates.
    Point,

    /// Crop around the center of a legacy focus box.
    Focus,
}

impl CropGravity {
    fn from_name(name: &str) -> CropGravity {
        match name {
            "top" => CropGravity::Top,
            "bottom" => CropGravity::Bottom,
            "left" => CropGravity::Left,
            "right" => CropGravity::Right,
            "point" => CropGravity::Point,
            "focus" => CropGravity::Focus,
            _ => CropGravity::Center,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            CropGravity::Top => "top",
            CropGravity::Bottom => "bottom",
            CropGravity::Left => "left",
            CropGravity::Right => "right",
            CropGravity::Center => "center",
            CropGravity::Point => "point",
            CropGravity::Focus => "focus",
        }
    }
}

/// The fully typed transformation parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformParams {
    /// Target width in pixels; 0 means "derive from height".
    pub width: i64,

    /// Target height in pixels; 0 means "derive from width".
    pub height: i64,

    /// Encoding quality, 1-100.
    pub quality: i64,

    /// Fit mode for the requested dimensions.
    pub fit: Fit,

    /// Crop anchor, only meaningful with `fit=crop`.
    pub crop: CropGravity,

    /// Focal point for `crop=point`, in source coordinates.
    pub crop_point: (i64, i64),

    /// Legacy focus box `(x, y, w, h)` for `crop=focus`.
    pub focus: [f64; 4],

    /// Keep only the first frame of animated input.
    pub frame: bool,
}

impl TransformParams {
    /// Unpack a raw parameter list against the schema.
    ///
    /// Rejects parameter names outside the schema, values failing their
    /// validation pattern, and numbers outside their declared bounds.
    pub fn unpack(params: &RawParams) -> Result<TransformParams, ParamsError> {
        for key in params.keys() {
            if !DECLARED_KEYS.contains(&key) {
                return Err(ParamsError::UnknownKey(key.to_string()));
            }
        }

        let width = unpack_int(params, &WIDTH)?.unwrap_or(0);
        let height = unpack_int(params, &HEIGHT)?.unwrap_or(0);
        let quality = unpack_int(params, &QUALITY)?.unwrap_or(75);

        let fit = match unpack_str(params, &FIT)?.as_deref() {
            Some("crop") => Fit::Crop,
            _ => Fit::Clip,
        };

        let crop = unpack_str(params, &CROP_GRAVITY)?
            .map(|g| CropGravity::from_name(&g))
            .unwrap_or_default();

        let crop_point = (
            unpack_int(params, &CROP_POINT_X)?.unwrap_or(0),
            unpack_int(params, &CROP_POINT_Y)?.unwrap_or(0),
        );

        let focus = [
            unpack_float(params, &FOCUS_X)?.unwrap_or(0.0),
            unpack_float(params, &FOCUS_Y)?.unwrap_or(0.0),
            unpack_float(params, &FOCUS_W)?.unwrap_or(0.0),
            unpack_float(params, &FOCUS_H)?.unwrap_or(0.0),
        ];

        let frame = unpack_bool(params, &FRAME)?.unwrap_or(false);

        Ok(TransformParams {
            width,
            height,
            quality,
            fit,
            crop,
            crop_point,
            focus,
            frame,
        })
    }

    /// Parse and unpack a parameter string in one step.
    pub fn parse(input: &str) -> Result<TransformParams, ParamsError> {
        TransformParams::unpack(&RawParams::parse(input)?)
    }

    /// Serialize to the canonical parameter string, in schema order.
    ///
    /// Fields at their default value are omitted; `parse(canonical())`
    /// reproduces the same record for any schema-valid parameters.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        let mut push = |s: &str| {
            if !out.is_empty() {
                out.push(',');
            }
            out.push_str(s);
        };

        if self.width != 0 {
            push(&format!("width={}", self.width));
        }
        if self.height != 0 {
            push(&format!("height={}", self.height));
        }
        if self.quality != 75 {
            push(&format!("quality={}", self.quality));
        }
        if self.fit == Fit::Crop {
            push("fit=crop");

            match self.crop {
                CropGravity::Center => {}
                CropGravity::Point => {
                    let mut field = String::from("crop=point");
                    let _ = write!(field, ":{}:{}", self.crop_point.0, self.crop_point.1);
                    push(&field);
                }
                gravity => push(&format!("crop={}", gravity.name())),
            }
        }
        if self.focus != [0.0; 4] {
            push(&format!(
                "focus={}:{}:{}:{}",
                self.focus[0], self.focus[1], self.focus[2], self.focus[3]
            ));
        }
        if self.frame {
            push("frame=true");
        }

        out
    }
}

// =============================================================================
// Tests
// =============================================================================
