pub mod annotation_style;
pub mod face_annotator;
pub mod frame_preprocessor;
pub mod frame_processor;
pub mod region_painter;
