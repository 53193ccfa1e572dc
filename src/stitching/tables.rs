//! Warp and merge lookup tables
//!
//! Both builders share one block classifier so the sizing pass and the fill passes
//! agree on which cameras touch each 8-pixel block.

pub mod types;
pub mod classifier;
pub mod sizing;
pub mod warp_table;
pub mod merge_table;

#[cfg(test)]
mod tests;

pub use types::{
    INVALID_COORD,
    ValidPixelEntry,
    WarpRemapEntry,
    CamIdEntry,
    CamGroupEntry,
};
pub use classifier::{BlockClass, classify_block, classify_map_block};
pub use sizing::{TABLE_SIZE_ALIGNMENT, largest_warp_table_size, smallest_warp_table_size};
pub use warp_table::{
    COORD_SCALE,
    CameraAtlas,
    WarpTables,
    generate_warp_tables,
    fill_warp_tables,
};
pub use merge_table::{
    NO_DEFAULT_CAMERA,
    MergeTables,
    generate_merge_tables,
    generate_default_merge_mask,
    generate_default_merge_mask_strided,
};
