pub mod occupancy;
pub mod second_chance;

pub use occupancy::OccupancyBitmap;
pub use second_chance::{Eviction, SecondChanceQueue};
