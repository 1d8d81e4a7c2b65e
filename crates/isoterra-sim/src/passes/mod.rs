pub mod draw_collection;
pub mod generation;
pub mod meshing;
