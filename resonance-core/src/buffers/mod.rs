pub mod audio_buffer;
pub mod buffer_pool;
