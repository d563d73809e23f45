#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Axis-aligned bounding boxes.
pub mod bbox;

/// Region selection by bounding box.
pub mod crop;

/// I/O utilities for reading and writing point clouds.
pub mod io;

/// Point cloud container.
pub mod pointcloud;

/// Point counting and summary statistics.
pub mod statistics;

/// Point cloud decimation.
pub mod subsample;

/// Rigid transforms.
pub mod transforms;

mod error;
pub use error::CloudError;
