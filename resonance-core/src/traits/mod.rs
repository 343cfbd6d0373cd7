pub mod stream_delegate;
pub mod stream_handler;
pub mod wave_driver;
