pub mod stream_logs;
