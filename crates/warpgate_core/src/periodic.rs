use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, select, Sender};
use parking_lot::Mutex;
use tracing::debug;

/// A repeating job on its own thread.
///
/// Ticks run back to back on that thread, so a tick never overlaps the
/// previous one. Once `stop` returns no further tick will start.
pub struct PeriodicTask {
    name: String,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn spawn<F>(name: impl Into<String>, period: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let ticker = channel::tick(period);

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            tick();
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => tick(),
                }
            }
        })?;

        debug!("Periodic task '{name}' scheduled every {period:?}");
        Ok(Self {
            name,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancels the schedule and waits for an in-flight tick to finish.
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the channel and wakes the select.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                debug!("Periodic task '{}' exited by panic", self.name);
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Holds at most one running `PeriodicTask` and allows restarting it.
#[derive(Default)]
pub struct TaskSlot {
    task: Mutex<Option<PeriodicTask>>,
}

impl TaskSlot {
    /// Spawns a task unless one is already running. Returns whether a new
    /// task was started.
    pub fn start_with<F>(&self, spawn: F) -> io::Result<bool>
    where
        F: FnOnce() -> io::Result<PeriodicTask>,
    {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(PeriodicTask::is_running) {
            return Ok(false);
        }
        *task = Some(spawn()?);
        Ok(true)
    }

    /// Stops the running task, if any, and waits for it to wind down.
    pub fn stop(&self) -> bool {
        let taken = self.task.lock().take();
        match taken {
            Some(mut task) => {
                task.stop();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(PeriodicTask::is_running)
    }
}
