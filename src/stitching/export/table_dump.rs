//! Raw little-endian dumps of the lookup tables
//!
//! Files hold the exact bytes the kernels read, so they can be uploaded as-is by
//! an execution layer or diffed between runs.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::stitching::common::Result;
use crate::stitching::tables::{MergeTables, WarpTables};

pub const VALID_PIX_FILE: &str = "valid_pix.bin";
pub const WARP_REMAP_FILE: &str = "warp_remap.bin";
pub const CAM_ID_FILE: &str = "cam_id.bin";
pub const CAM_GROUP1_FILE: &str = "cam_group1.bin";
pub const CAM_GROUP2_FILE: &str = "cam_group2.bin";

/// Valid-pixel table as little-endian `u32` records.
pub fn valid_table_bytes(tables: &WarpTables) -> Vec<u8> {
    tables.valid.iter().flat_map(|entry| entry.raw().to_le_bytes()).collect()
}

/// Remap table as 16 little-endian `u16` values per entry.
pub fn remap_table_bytes(tables: &WarpTables) -> Vec<u8> {
    tables
        .remap
        .iter()
        .flat_map(|entry| {
            (0..8).flat_map(move |pixel| {
                let (x, y) = entry.coord(pixel);
                let [x0, x1] = x.to_le_bytes();
                let [y0, y1] = y.to_le_bytes();
                [x0, x1, y0, y1]
            })
        })
        .collect()
}

pub fn dump_warp_tables(tables: &WarpTables, dir: &Path) -> Result<Vec<PathBuf>> {
    let files = [
        (VALID_PIX_FILE, valid_table_bytes(tables)),
        (WARP_REMAP_FILE, remap_table_bytes(tables)),
    ];
    write_all(dir, files)
}

/// Writes the three merge planes with a row stride of `stride` bytes.
pub fn dump_merge_tables(tables: &MergeTables, stride: usize, dir: &Path) -> Result<Vec<PathBuf>> {
    let files = [
        (CAM_ID_FILE, tables.cam_id_plane(stride)?),
        (CAM_GROUP1_FILE, tables.group1_plane(stride * 4)?),
        (CAM_GROUP2_FILE, tables.group2_plane(stride * 4)?),
    ];
    write_all(dir, files)
}

fn write_all<const N: usize>(dir: &Path, files: [(&str, Vec<u8>); N]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(N);
    for (name, bytes) in files {
        let path = dir.join(name);
        fs::write(&path, &bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Dumped table");
        written.push(path);
    }
    Ok(written)
}
