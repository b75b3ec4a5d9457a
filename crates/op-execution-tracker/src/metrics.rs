use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

/// Job lifecycle metrics collector
#[derive(Clone)]
pub struct JobMetrics {
    /// Total jobs created
    jobs_created: IntCounter,

    /// Jobs currently running
    active_jobs: IntGauge,

    /// Jobs finished with SUCCESS
    jobs_succeeded: IntCounter,

    /// Jobs finished with FAILED (including cancellations)
    jobs_failed: IntCounter,

    /// Jobs cancelled before finishing
    jobs_cancelled: IntCounter,

    /// Job run duration histogram
    job_duration: Histogram,

    registry: Registry,
}

impl JobMetrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let jobs_created = IntCounter::new("op_jobs_created_total", "Total number of jobs created")?;
        registry.register(Box::new(jobs_created.clone()))?;

        let active_jobs = IntGauge::new("op_jobs_active", "Number of currently running jobs")?;
        registry.register(Box::new(active_jobs.clone()))?;

        let jobs_succeeded = IntCounter::new(
            "op_jobs_succeeded_total",
            "Total number of jobs finished successfully",
        )?;
        registry.register(Box::new(jobs_succeeded.clone()))?;

        let jobs_failed = IntCounter::new("op_jobs_failed_total", "Total number of failed jobs")?;
        registry.register(Box::new(jobs_failed.clone()))?;

        let jobs_cancelled =
            IntCounter::new("op_jobs_cancelled_total", "Total number of cancelled jobs")?;
        registry.register(Box::new(jobs_cancelled.clone()))?;

        let job_duration = Histogram::with_opts(
            HistogramOpts::new("op_job_duration_seconds", "Job run duration in seconds")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(job_duration.clone()))?;

        Ok(Self {
            jobs_created,
            active_jobs,
            jobs_succeeded,
            jobs_failed,
            jobs_cancelled,
            job_duration,
            registry,
        })
    }

    pub fn job_created(&self) {
        self.jobs_created.inc();
    }

    pub fn job_started(&self) {
        self.active_jobs.inc();
    }

    pub fn job_finished(&self, success: bool, duration_ms: u64) {
        if success {
            self.jobs_succeeded.inc();
        } else {
            self.jobs_failed.inc();
        }
        self.job_duration.observe(duration_ms as f64 / 1000.0);
        self.active_jobs.dec();
    }

    /// `was_running` jobs leave the active gauge
    pub fn job_cancelled(&self, was_running: bool) {
        self.jobs_cancelled.inc();
        self.jobs_failed.inc();
        if was_running {
            self.active_jobs.dec();
        }
    }

    pub fn created(&self) -> u64 {
        self.jobs_created.get()
    }

    pub fn active(&self) -> i64 {
        self.active_jobs.get()
    }

    pub fn succeeded(&self) -> u64 {
        self.jobs_succeeded.get()
    }

    pub fn failed(&self) -> u64 {
        self.jobs_failed.get()
    }

    pub fn cancelled(&self) -> u64 {
        self.jobs_cancelled.get()
    }

    /// Render in the Prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = JobMetrics::new().unwrap();
        metrics.job_created();
        metrics.job_created();
        metrics.job_started();
        metrics.job_finished(true, 120);
        metrics.job_cancelled(false);

        assert_eq!(metrics.created(), 2);
        assert_eq!(metrics.succeeded(), 1);
        assert_eq!(metrics.failed(), 1);
        assert_eq!(metrics.cancelled(), 1);
        assert_eq!(metrics.active(), 0);
    }

    #[test]
    fn test_render() {
        let metrics = JobMetrics::new().unwrap();
        metrics.job_created();
        let text = metrics.render().unwrap();
        assert!(text.contains("op_jobs_created_total 1"));
        assert!(text.contains("op_job_duration_seconds"));
    }
}
