use std::io::{BufRead, Read};
use std::path::Path;

use super::PlyError;
use crate::pointcloud::PointCloud;

const MAX_VERTICES: usize = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq)]
enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PlyDataType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl PlyDataType {
    fn size_of(&self) -> usize {
        match self {
            PlyDataType::Int8 | PlyDataType::UInt8 => 1,
            PlyDataType::Int16 | PlyDataType::UInt16 => 2,
            PlyDataType::Int32 | PlyDataType::UInt32 | PlyDataType::Float32 => 4,
            PlyDataType::Float64 => 8,
        }
    }

    /// Decode a little-endian value; `bytes` holds exactly `size_of()` bytes.
    fn decode_le(&self, bytes: &[u8]) -> f64 {
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        match self {
            PlyDataType::Int8 => i8::from_le_bytes([buf[0]]) as f64,
            PlyDataType::UInt8 => buf[0] as f64,
            PlyDataType::Int16 => i16::from_le_bytes([buf[0], buf[1]]) as f64,
            PlyDataType::UInt16 => u16::from_le_bytes([buf[0], buf[1]]) as f64,
            PlyDataType::Int32 => i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64,
            PlyDataType::UInt32 => u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64,
            PlyDataType::Float32 => f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64,
            PlyDataType::Float64 => f64::from_le_bytes(buf),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PlyPropertyDefinition {
    name: String,
    data_type: PlyDataType,
}

#[derive(Debug)]
struct PlyHeader {
    format: PlyFormat,
    vertex_count: usize,
    properties: Vec<PlyPropertyDefinition>,
}

impl PlyHeader {
    fn find(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    fn find_all(&self, names: [&str; 3]) -> Option<[usize; 3]> {
        Some([self.find(names[0])?, self.find(names[1])?, self.find(names[2])?])
    }

    fn row_size(&self) -> usize {
        self.properties.iter().map(|p| p.data_type.size_of()).sum()
    }
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader, PlyError> {
    let mut line = String::new();
    let mut format = None;
    let mut vertex_count = None;
    let mut properties = Vec::new();
    // the element the following property lines belong to
    let mut in_vertex = false;

    reader.read_line(&mut line)?;
    if line.trim() != "ply" {
        return Err(PlyError::InvalidHeader("missing 'ply' magic".to_string()));
    }

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(PlyError::InvalidHeader("missing 'end_header'".to_string()));
        }
        let parts = line.split_whitespace().collect::<Vec<_>>();

        match parts.as_slice() {
            ["end_header"] => break,
            ["comment", ..] | ["obj_info", ..] | [] => {}
            ["format", kind, _version] => {
                format = Some(match *kind {
                    "ascii" => PlyFormat::Ascii,
                    "binary_little_endian" => PlyFormat::BinaryLittleEndian,
                    other => return Err(PlyError::UnsupportedFormat(other.to_string())),
                });
            }
            ["element", name, count] => {
                let count = count
                    .parse::<usize>()
                    .map_err(|_| PlyError::InvalidHeader(format!("invalid count for {name}")))?;
                if *name == "vertex" {
                    vertex_count = Some(count);
                    in_vertex = true;
                } else {
                    // elements stored before the vertices would have to be skipped
                    if vertex_count.is_none() && count > 0 {
                        return Err(PlyError::UnsupportedFormat(format!(
                            "element '{name}' stored before the vertices"
                        )));
                    }
                    in_vertex = false;
                }
            }
            ["property", "list", ..] => {
                if in_vertex {
                    return Err(PlyError::UnsupportedProperty(line.trim().to_string()));
                }
            }
            ["property", data_type, name] => {
                if in_vertex {
                    properties.push(PlyPropertyDefinition {
                        name: name.to_string(),
                        data_type: parse_data_type(data_type)?,
                    });
                }
            }
            _ => {
                return Err(PlyError::InvalidHeader(line.trim().to_string()));
            }
        }
    }

    let format = format.ok_or_else(|| PlyError::InvalidHeader("missing format".to_string()))?;
    let vertex_count =
        vertex_count.ok_or_else(|| PlyError::InvalidHeader("missing vertex element".to_string()))?;
    if vertex_count > MAX_VERTICES {
        return Err(PlyError::InvalidHeader(format!(
            "too many vertices: {vertex_count}"
        )));
    }

    Ok(PlyHeader {
        format,
        vertex_count,
        properties,
    })
}

fn parse_data_type(type_str: &str) -> Result<PlyDataType, PlyError> {
    match type_str {
        "float" | "float32" => Ok(PlyDataType::Float32),
        "double" | "float64" => Ok(PlyDataType::Float64),
        "char" | "int8" => Ok(PlyDataType::Int8),
        "uchar" | "uint8" => Ok(PlyDataType::UInt8),
        "short" | "int16" => Ok(PlyDataType::Int16),
        "ushort" | "uint16" => Ok(PlyDataType::UInt16),
        "int" | "int32" => Ok(PlyDataType::Int32),
        "uint" | "uint32" => Ok(PlyDataType::UInt32),
        other => Err(PlyError::UnsupportedProperty(other.to_string())),
    }
}

/// Read a point cloud from a PLY file.
///
/// Supports `ascii` and `binary_little_endian` files whose first element is
/// `vertex`. The `x y z` properties are required; `red green blue` and
/// `nx ny nz` are loaded when present and every other property is skipped.
///
/// # Arguments
///
/// * `path` - Path to the PLY file.
///
/// # Returns
///
/// An unorganized point cloud.
pub fn read_ply(path: impl AsRef<Path>) -> Result<PointCloud, PlyError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PlyError::FileNotFound(path.to_path_buf()));
    }

    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let header = parse_header(&mut reader)?;

    let xyz = header
        .find_all(["x", "y", "z"])
        .ok_or(PlyError::MissingCoordinates)?;
    let rgb = header.find_all(["red", "green", "blue"]);
    let nxyz = header.find_all(["nx", "ny", "nz"]);

    let mut points = Vec::with_capacity(header.vertex_count);
    let mut colors = rgb.map(|_| Vec::with_capacity(header.vertex_count));
    let mut normals = nxyz.map(|_| Vec::with_capacity(header.vertex_count));

    let mut row = vec![0.0f64; header.properties.len()];
    let mut push_row = |row: &[f64]| {
        points.push(xyz.map(|i| row[i]));
        if let (Some(colors), Some(rgb)) = (colors.as_mut(), rgb) {
            colors.push(rgb.map(|i| row[i].clamp(0.0, 255.0) as u8));
        }
        if let (Some(normals), Some(nxyz)) = (normals.as_mut(), nxyz) {
            normals.push(nxyz.map(|i| row[i]));
        }
    };

    match header.format {
        PlyFormat::BinaryLittleEndian => {
            let mut buffer = vec![0u8; header.row_size()];
            for _ in 0..header.vertex_count {
                reader.read_exact(&mut buffer)?;
                let mut offset = 0;
                for (value, property) in row.iter_mut().zip(header.properties.iter()) {
                    let size = property.data_type.size_of();
                    *value = property.data_type.decode_le(&buffer[offset..offset + size]);
                    offset += size;
                }
                push_row(&row);
            }
        }
        PlyFormat::Ascii => {
            let mut line = String::new();
            for vertex in 0..header.vertex_count {
                line.clear();
                if reader.read_line(&mut line)? == 0 {
                    return Err(PlyError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("expected {} vertices, got {vertex}", header.vertex_count),
                    )));
                }
                let mut tokens = line.split_whitespace();
                for value in row.iter_mut() {
                    let token = tokens.next().unwrap_or_default();
                    *value = token.parse::<f64>().map_err(|_| PlyError::InvalidValue {
                        vertex,
                        token: token.to_string(),
                    })?;
                }
                push_row(&row);
            }
        }
    }

    log::debug!(
        "read {} vertices from {} (colors: {}, normals: {})",
        points.len(),
        path.display(),
        colors.is_some(),
        normals.is_some()
    );

    Ok(PointCloud::new(points, colors, normals)?)
}
