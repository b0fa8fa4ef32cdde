mod job_processor_test;
mod key_fence_test;
mod signal_test;
mod value_stream_test;
