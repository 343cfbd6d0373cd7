pub mod cancel;
pub mod spectrum;
pub mod stream_engine;
