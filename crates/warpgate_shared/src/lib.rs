pub mod geometry;
pub mod physics;
pub mod placement;
pub mod portal;
pub mod registry;
