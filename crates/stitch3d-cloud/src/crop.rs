use crate::{
    bbox::BoundingBox,
    pointcloud::{CloudLayout, PointCloud, INVALID_POINT},
};

/// Extract the points of a cloud lying inside (or on) a bounding box.
///
/// Unorganized clouds keep the inside points in their original order.
/// Organized clouds are restricted to the smallest row/column window holding
/// every inside point; samples of that window outside the box are invalidated.
/// When no point is inside, an empty unorganized cloud is returned.
///
/// # Arguments
///
/// * `cloud` - The input point cloud.
/// * `bbox` - The region to keep.
///
/// # Returns
///
/// A new point cloud. The input is never modified.
pub fn crop(cloud: &PointCloud, bbox: &BoundingBox) -> PointCloud {
    match cloud.layout() {
        CloudLayout::Unorganized => {
            let indices = cloud
                .points()
                .iter()
                .enumerate()
                .filter(|(_, p)| bbox.contains(p))
                .map(|(i, _)| i)
                .collect::<Vec<_>>();
            cloud.select(&indices)
        }
        CloudLayout::Organized { width, .. } => crop_organized(cloud, bbox, width),
    }
}

fn crop_organized(cloud: &PointCloud, bbox: &BoundingBox, width: usize) -> PointCloud {
    let inside = cloud
        .points()
        .iter()
        .map(|p| bbox.contains(p))
        .collect::<Vec<_>>();

    // find the row/column window holding every inside sample
    let mut window: Option<(usize, usize, usize, usize)> = None;
    for (idx, _) in inside.iter().enumerate().filter(|&(_, &v)| v) {
        let (row, col) = (idx / width, idx % width);
        window = Some(match window {
            None => (row, row, col, col),
            Some((r0, r1, c0, c1)) => (r0.min(row), r1.max(row), c0.min(col), c1.max(col)),
        });
    }

    let Some((row_min, row_max, col_min, col_max)) = window else {
        return PointCloud::default();
    };

    let new_width = col_max - col_min + 1;
    let new_height = row_max - row_min + 1;
    let capacity = new_width * new_height;

    let mut points = Vec::with_capacity(capacity);
    let mut colors = cloud.colors().map(|_| Vec::with_capacity(capacity));
    let mut normals = cloud.normals().map(|_| Vec::with_capacity(capacity));

    for row in row_min..=row_max {
        for col in col_min..=col_max {
            let idx = row * width + col;
            let keep = inside[idx];
            points.push(if keep { cloud.points()[idx] } else { INVALID_POINT });
            if let (Some(dst), Some(src)) = (colors.as_mut(), cloud.colors()) {
                dst.push(if keep { src[idx] } else { [0, 0, 0] });
            }
            if let (Some(dst), Some(src)) = (normals.as_mut(), cloud.normals()) {
                dst.push(if keep { src[idx] } else { INVALID_POINT });
            }
        }
    }

    PointCloud::from_parts(
        points,
        colors,
        normals,
        CloudLayout::Organized {
            width: new_width,
            height: new_height,
        },
    )
}
