pub mod camera_source;
mod ffmpeg_decoder;
pub mod ffmpeg_reader;
pub mod ffmpeg_writer;
pub mod image_file_reader;
pub mod image_file_writer;
pub mod image_sequence_writer;
