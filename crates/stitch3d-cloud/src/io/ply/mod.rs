mod parser;
mod writer;

pub use parser::read_ply;
pub use writer::write_ply;

use std::path::PathBuf;

use crate::CloudError;

/// Error types for the PLY module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PlyError {
    /// The file does not exist
    #[error("PLY file not found: {0}")]
    FileNotFound(PathBuf),

    /// Failed to read or write the PLY file
    #[error("Failed to read PLY file")]
    Io(#[from] std::io::Error),

    /// Malformed PLY header
    #[error("Malformed PLY header: {0}")]
    InvalidHeader(String),

    /// Unsupported PLY storage format
    #[error("Unsupported PLY format: {0}")]
    UnsupportedFormat(String),

    /// Unsupported PLY property
    #[error("Unsupported PLY property: {0}")]
    UnsupportedProperty(String),

    /// The vertex element lacks one of the x, y, z properties
    #[error("PLY vertex element has no x, y and z properties")]
    MissingCoordinates,

    /// A value could not be parsed
    #[error("Invalid value on vertex {vertex}: {token:?}")]
    InvalidValue {
        /// Index of the vertex being read.
        vertex: usize,
        /// Offending token.
        token: String,
    },

    /// The decoded data does not form a valid point cloud
    #[error(transparent)]
    Cloud(#[from] CloudError),
}
