use std::time::Duration;

use crossbeam::channel;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::error;

/// A single-threaded executor that owns all mutation of one world.
///
/// Jobs run one at a time in submission order.
pub struct WorldThread {
    name: String,
    pool: ThreadPool,
}

impl WorldThread {
    pub fn new(name: impl Into<String>) -> Result<Self, ThreadPoolBuildError> {
        let name = name.into();
        let thread_name = format!("world-{name}");
        let panic_name = name.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(1)
            .thread_name(move |_| thread_name.clone())
            .panic_handler(move |_| error!("World job panicked on world '{panic_name}'"))
            .build()?;
        Ok(Self { name, pool })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn_fifo(job);
    }

    /// Runs `job` on the world thread and blocks for at most `timeout`.
    ///
    /// Returns `None` when the job did not finish in time or panicked.
    pub fn execute_and_wait<F, R>(&self, job: F, timeout: Duration) -> Option<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = channel::bounded(1);
        self.pool.spawn_fifo(move || {
            let _ = tx.send(job());
        });
        rx.recv_timeout(timeout).ok()
    }

    /// Blocks until every job submitted before this call has finished.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.execute_and_wait(|| (), timeout).is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::WorldThread;

    #[test]
    fn jobs_run_in_submission_order() {
        let thread = WorldThread::new("overworld").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..16 {
            let seen = Arc::clone(&seen);
            thread.execute(move || seen.lock().push(i));
        }

        assert!(thread.flush(Duration::from_secs(5)));
        assert_eq!(*seen.lock(), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn execute_and_wait_returns_result_or_times_out() {
        let thread = WorldThread::new("nether").unwrap();
        assert_eq!(thread.name(), "nether");
        assert_eq!(
            thread.execute_and_wait(|| 7 * 6, Duration::from_secs(5)),
            Some(42)
        );

        let slow = thread.execute_and_wait(
            || std::thread::sleep(Duration::from_millis(200)),
            Duration::from_millis(10),
        );
        assert!(slow.is_none());
    }

    #[test]
    fn panicking_job_leaves_the_world_thread_alive() {
        let thread = WorldThread::new("end").unwrap();
        let result = thread.execute_and_wait(|| -> u32 { panic!("boom") }, Duration::from_secs(5));
        assert!(result.is_none());
        assert_eq!(thread.execute_and_wait(|| 1, Duration::from_secs(5)), Some(1));
    }
}
