#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use stitch3d_cloud as cloud;

#[doc(inline)]
pub use stitch3d_icp as icp;
