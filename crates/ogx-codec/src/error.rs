use thiserror::Error;

use ogx_model::ModelError;

/// Errors that terminate an export or import call.
///
/// Per-field and per-element failures are logged and recovered from inside
/// the codec; only stream-level problems (I/O, malformed XML) surface here.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying stream failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed XML in the input
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed attribute syntax
    #[error("malformed attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    /// Invalid entity or character escape in the input
    #[error("bad escape sequence: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),

    /// Input bytes invalid for the document's character encoding
    #[error("encoding error: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    /// Encoding label not recognized by any supported encoding
    #[error("unsupported encoding: {0}")]
    UnknownEncoding(String),

    /// Object model rejected a class, field, or value
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Required attribute absent from an element
    #[error("missing attribute {attribute:?} on <{element}>")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, CodecError>;
