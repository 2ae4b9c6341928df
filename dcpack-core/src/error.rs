//! Error types for the dcpack library.
//!
//! This module provides the error hierarchy shared by every dcpack crate.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the dcpack library.
#[derive(Error, Debug)]
pub enum Error {
    /// A package could not be read (missing entry point, bad dispatch, etc.).
    #[error("Read error: {0}")]
    Read(String),

    /// XML parsing or structure errors.
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    /// MXF file errors.
    #[error("MXF error: {0}")]
    MxfFile(#[from] MxfError),

    /// Certificate or certificate chain errors.
    #[error("Certificate chain error: {0}")]
    CertificateChain(String),

    /// A setter was given a value outside its permitted range.
    #[error("Bad setting: {0}")]
    BadSetting(String),

    /// Two entities were given the same identifier.
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// Operation was cancelled via a progress callback.
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything that does not fit the other categories.
    #[error("{0}")]
    Misc(String),
}

/// XML parsing and structure errors.
#[derive(Error, Debug)]
pub enum XmlError {
    /// The document is not well formed.
    #[error("malformed XML{}: {message}", location(.file, .line))]
    Parse {
        message: String,
        file: Option<PathBuf>,
        line: Option<u64>,
    },

    /// The root element is not the one required for this document type.
    #[error("unexpected root element <{found}>, expected <{expected}>")]
    UnexpectedRoot { expected: String, found: String },

    /// A required child element is absent.
    #[error("missing <{child}> in <{parent}>")]
    MissingChild { parent: String, child: String },

    /// A required attribute is absent.
    #[error("missing attribute {attribute} on <{element}>")]
    MissingAttribute { element: String, attribute: String },

    /// Element content could not be converted to the requested type.
    #[error("bad content in <{element}>: {message}")]
    BadContent { element: String, message: String },

    /// The document uses a namespace this library does not know.
    #[error("unrecognised namespace {0}")]
    UnrecognisedNamespace(String),
}

fn location(file: &Option<PathBuf>, line: &Option<u64>) -> String {
    match (file, line) {
        (Some(f), Some(l)) => format!(" in {}:{}", f.display(), l),
        (Some(f), None) => format!(" in {}", f.display()),
        _ => String::new(),
    }
}

/// MXF file errors.
#[derive(Error, Debug)]
pub enum MxfError {
    /// The file does not start with a partition pack.
    #[error("not an MXF file: {0}")]
    NotMxf(String),

    /// A KLV triplet claims more data than the file holds.
    #[error("truncated KLV: need {needed} bytes, have {available}")]
    InsufficientData { needed: usize, available: usize },

    /// A BER length could not be decoded.
    #[error("invalid BER length at offset {offset}")]
    InvalidLength { offset: u64 },

    /// The header metadata carries no essence descriptor.
    #[error("no essence descriptor in {0}")]
    MissingDescriptor(PathBuf),

    /// The essence container label is not one this library handles.
    #[error("unknown essence container in {0}")]
    UnknownEssence(PathBuf),

    /// A frame index is out of range.
    #[error("frame {frame} out of range (have {frames})")]
    FrameOutOfRange { frame: i64, frames: i64 },

    /// I/O errors while reading or writing essence.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a read error.
    pub fn read(msg: impl Into<String>) -> Self {
        Error::Read(msg.into())
    }

    /// Create a miscellaneous error.
    pub fn misc(msg: impl Into<String>) -> Self {
        Error::Misc(msg.into())
    }

    /// Create a bad-setting error.
    pub fn bad_setting(msg: impl Into<String>) -> Self {
        Error::BadSetting(msg.into())
    }

    /// Check whether this error is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
