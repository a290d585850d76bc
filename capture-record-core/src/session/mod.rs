pub(crate) mod channel_writer;
pub mod controller;
pub mod shared;
