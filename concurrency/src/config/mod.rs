mod job_processor;

pub use job_processor::JobProcessorConfig;
