pub mod sequential_stream_executor;
pub mod threaded_callback_executor;
