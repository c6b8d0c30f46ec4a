pub mod mirror_flip;
pub mod outline_painter;
