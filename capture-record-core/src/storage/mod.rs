pub mod encoder_bridge;
pub mod metadata;
pub mod sink;
