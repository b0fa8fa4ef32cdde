use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::job::JobProcessor`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JobProcessorConfig {
    /// Maximum number of jobs executing at once. Zero selects the available parallelism.
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
}

impl JobProcessorConfig {
    /// Default number of workers, resolved at construction time.
    pub const DEFAULT_NUM_WORKERS: usize = 0;

    /// Returns the effective worker bound.
    ///
    /// Falls back to a single worker if the available parallelism cannot be determined.
    pub fn resolved_num_workers(&self) -> usize {
        if self.num_workers != 0 {
            return self.num_workers;
        }

        std::thread::available_parallelism()
            .map(|parallelism| parallelism.get())
            .unwrap_or(1)
    }
}

impl Default for JobProcessorConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
        }
    }
}

fn default_num_workers() -> usize {
    JobProcessorConfig::DEFAULT_NUM_WORKERS
}
