pub mod confirmation;
pub mod observer;
