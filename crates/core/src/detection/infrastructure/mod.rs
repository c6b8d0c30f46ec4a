pub mod haar_cascade;
pub mod haar_cascade_detector;
pub mod integral_image;
pub mod rect_grouping;
