pub mod flac_format;
pub mod frame;
