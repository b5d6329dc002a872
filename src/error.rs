use thiserror::Error;

/// Errors produced while parsing and unpacking pipeline parameters.
#[derive(Debug, Error)]
pub enum ParamsError {
    /// A parameter field was not a single `key=value` pair.
    #[error("malformed parameter '{0}'")]
    Malformed(String),

    /// The parameter list was empty.
    #[error("unable to parse empty parameter list")]
    Empty,

    /// A parameter name outside the declared schema.
    #[error("unknown parameter '{0}'")]
    UnknownKey(String),

    /// A numeric value outside its declared bounds.
    #[error("value for '{field}' is outside the limit '{min} - {max}': {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// A value that failed its schema validation pattern.
    #[error("{field}: value '{value}' does not match '{pattern}'")]
    InvalidValue {
        field: &'static str,
        value: String,
        pattern: &'static str,
    },

    /// A compound value missing the component a field indexes into.
    #[error("{field}: non-existing index '{index}'")]
    MissingIndex { field: &'static str, index: usize },

    /// A value that could not be converted to the field's type.
    #[error("unable to convert '{value}' for '{field}': {message}")]
    Conversion {
        field: &'static str,
        value: String,
        message: String,
    },
}

/// Errors produced when constructing an image value from raw bytes.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The buffer is too short to carry a magic number.
    #[error("cannot use data buffer of length '{0}' as image")]
    TooShort(usize),

    /// The magic number does not match any supported image type.
    #[error("unknown or unhandled file type for data buffer")]
    UnsupportedType,
}

/// Errors surfaced by the codec facade.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The codec could not decode the input buffer.
    #[error("failed to load image: {0}")]
    Load(String),

    /// A transformation step (shrink, affine, crop, colourspace) failed.
    #[error("failed to {operation} image: {message}")]
    Process {
        operation: &'static str,
        message: String,
    },

    /// The codec could not encode the result.
    #[error("failed to save image: {0}")]
    Save(String),
}

impl CodecError {
    /// Shorthand for a failed transformation step.
    pub fn process(operation: &'static str, message: impl Into<String>) -> Self {
        CodecError::Process {
            operation,
            message: message.into(),
        }
    }
}

/// Errors from the object store and source layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object not found in the bucket.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A read (get/list) against the store failed.
    #[error("failed to fetch from source: {0}")]
    Read(String),

    /// A write (put/copy/delete) against the store failed.
    #[error("failed to write to source: {0}")]
    Write(String),

    /// The requested region is not a known S3 region.
    #[error("S3 region by name '{0}' not found")]
    UnknownRegion(String),

    /// Neither the request nor the configuration names a source.
    #[error("no source configured for request")]
    NoSource,

    /// The source's local cache could not be established.
    #[error("failed to initialize source cache: {0}")]
    CacheInit(String),
}

/// Errors from local file cache initialization.
///
/// Runtime cache operations are best-effort and never surface errors; only
/// establishing a cache root can fail.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error for a transformation request.
///
/// Every variant maps to a `400 Bad Request` with a JSON error body.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{0}")]
    Params(#[from] ParamsError),

    #[error("{0}")]
    Image(#[from] ImageError),

    #[error("{0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("image URL is unset or empty")]
    EmptyImagePath,
}
