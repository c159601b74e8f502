//! Error types for the dmarkify crate.

/// Errors that can occur while compositing, packaging or cleaning up watermarked images.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An input image (base or watermark) could not be decoded.
    #[error("failed to decode {name}: {source}")]
    Decode {
        /// Name of the image that failed to decode.
        name: String,
        /// Underlying decoder error.
        #[source]
        source: image::ImageError,
    },

    /// A gradient color specification was malformed.
    #[error("invalid gradient {spec:?}: {reason}")]
    InvalidGradient {
        /// The offending specification, as supplied.
        spec: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A color token could not be resolved to an RGB triple.
    #[error("unrecognized color {0:?}")]
    InvalidColor(String),

    /// An anchor keyword is not one of the supported placements.
    #[error("unknown anchor {0:?} (expected center, top-left, top-right, bottom-left or bottom-right)")]
    UnknownAnchor(String),

    /// A font could not be loaded, and no fallback was available.
    #[error("failed to load font {name}: {reason}")]
    Font {
        /// Requested font name or path.
        name: String,
        /// Why loading failed.
        reason: String,
    },

    /// The retention scheduler was created outside of a Tokio runtime.
    #[error("retention scheduler requires a Tokio runtime")]
    NoRuntime,

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The output image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image encoding.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Writing the bundle archive failed.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The configuration file could not be parsed.
    #[error("failed to parse config: {0}")]
    Config(#[from] toml::de::Error),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
