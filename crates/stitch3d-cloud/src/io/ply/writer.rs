use std::io::{BufWriter, Write};
use std::path::Path;

use super::PlyError;
use crate::pointcloud::{is_valid_point, PointCloud};

/// Write the valid points of a cloud to a binary little-endian PLY file.
///
/// Coordinates and normals are stored as doubles, colors as `uchar`.
/// Invalid grid cells are not written.
pub fn write_ply(path: impl AsRef<Path>, cloud: &PointCloud) -> Result<(), PlyError> {
    let path = path.as_ref();
    let indices = cloud.valid_indices().collect::<Vec<_>>();

    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "ply")?;
    writeln!(writer, "format binary_little_endian 1.0")?;
    writeln!(writer, "comment generated by stitch3d")?;
    writeln!(writer, "element vertex {}", indices.len())?;
    for axis in ["x", "y", "z"] {
        writeln!(writer, "property double {axis}")?;
    }
    if cloud.colors().is_some() {
        for channel in ["red", "green", "blue"] {
            writeln!(writer, "property uchar {channel}")?;
        }
    }
    if cloud.normals().is_some() {
        for axis in ["nx", "ny", "nz"] {
            writeln!(writer, "property double {axis}")?;
        }
    }
    writeln!(writer, "end_header")?;

    for &i in &indices {
        debug_assert!(is_valid_point(&cloud.points()[i]));
        for v in cloud.points()[i] {
            writer.write_all(&v.to_le_bytes())?;
        }
        if let Some(colors) = cloud.colors() {
            writer.write_all(&colors[i])?;
        }
        if let Some(normals) = cloud.normals() {
            for v in normals[i] {
                writer.write_all(&v.to_le_bytes())?;
            }
        }
    }
    writer.flush()?;

    log::debug!("wrote {} vertices to {}", indices.len(), path.display());

    Ok(())
}
