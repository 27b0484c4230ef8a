pub mod pcengine;
pub mod registry;

pub use pcengine::PceSystem;

/// ROM image validation errors.
#[derive(Debug)]
pub enum RomError {
    /// The image is empty.
    Empty,
    /// The image exceeds what the board can map.
    TooLarge { size: usize, max: usize },
}

impl std::fmt::Display for RomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty ROM image"),
            Self::TooLarge { size, max } => {
                write!(f, "ROM image is {size} bytes, board maps at most {max}")
            }
        }
    }
}

impl std::error::Error for RomError {}
