pub mod face;
pub mod video;
