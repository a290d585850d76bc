pub mod feed;
pub mod ring_buffer;
pub mod sample_format;
