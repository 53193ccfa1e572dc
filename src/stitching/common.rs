//! Common types module
//!
//! Error type, camera map inputs and the block geometry shared by the table builders.

pub mod error;
pub mod camera_map;

pub use error::{StitchError, Result};
pub use camera_map::{
    CameraContributionMap,
    CameraSourceMap,
    SourceCoord,
    BLOCK_WIDTH,
    MAX_CAMERAS,
    camera_mask,
    check_camera_count,
};
