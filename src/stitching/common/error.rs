use thiserror::Error;

#[derive(Error, Debug)]
pub enum StitchError {
    #[error("Table capacity exceeded: {required} entries required, capacity is {capacity}")]
    CapacityExceeded { required: usize, capacity: usize },

    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid camera count: {0} (supported range is 1..=31)")]
    InvalidCameraCount(u32),

    #[error("Field {field} out of range: {value} > {max}")]
    FieldOutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("Failed to encode TIFF image: {0}")]
    EncodeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StitchError>;
