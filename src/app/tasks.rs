use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::app::error::AppError;

pub const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

struct TrackedTask {
    name: String,
    handle: JoinHandle<()>,
}

/// Fire-and-forget background units. Faults are absorbed at the unit
/// boundary and logged; the handle registry only answers "is it done" during
/// the shutdown drain.
pub struct TaskRunner {
    tasks: Mutex<Vec<TrackedTask>>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Schedules `task` on its own thread and returns immediately. An `Err`
    /// or panic inside the unit is reduced to a warning log line.
    pub fn spawn<F>(&self, name: &str, trace_id: &str, task: F) -> Result<(), AppError>
    where
        F: FnOnce() -> Result<(), AppError> + Send + 'static,
    {
        let task_name = name.to_string();
        let body_name = task_name.clone();
        let body_trace = trace_id.to_string();
        let handle = std::thread::Builder::new()
            .name(format!("task-{task_name}"))
            .spawn(move || match catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok(())) => {
                    debug!(trace_id = %body_trace, task = %body_name, "Task finished");
                }
                Ok(Err(err)) => {
                    warn!(
                        trace_id = %body_trace,
                        task = %body_name,
                        error = %err.error,
                        code = %err.code,
                        "Task failed"
                    );
                }
                Err(payload) => {
                    warn!(
                        trace_id = %body_trace,
                        task = %body_name,
                        error = %panic_message(&payload),
                        "Task panicked"
                    );
                }
            })
            .map_err(|err| {
                AppError::system(format!("Failed to spawn task {task_name}: {err}"), trace_id)
            })?;

        let mut guard = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        guard.push(TrackedTask {
            name: task_name,
            handle,
        });
        Ok(())
    }

    pub fn tracked(&self) -> usize {
        self.tasks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Waits up to `per_task_timeout` for each tracked unit. Units still
    /// running past the bound are abandoned, not cancelled; they keep running
    /// detached. Returns the number abandoned.
    pub fn drain(&self, per_task_timeout: Duration, trace_id: &str) -> usize {
        let tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *guard)
        };

        let mut abandoned = 0;
        for task in tasks {
            let start = Instant::now();
            while !task.handle.is_finished() && start.elapsed() < per_task_timeout {
                std::thread::sleep(Duration::from_millis(50));
            }
            if task.handle.is_finished() {
                let _ = task.handle.join();
                debug!(trace_id = %trace_id, task = %task.name, "Task drained");
            } else {
                abandoned += 1;
                warn!(
                    trace_id = %trace_id,
                    task = %task.name,
                    "Abandoning task still running after join timeout"
                );
            }
        }
        abandoned
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn spawned_task_runs_and_drains() {
        let runner = TaskRunner::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let task_counter = Arc::clone(&counter);

        runner
            .spawn("count", "trace-test", move || {
                task_counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .expect("spawn");

        let abandoned = runner.drain(Duration::from_secs(5), "trace-test");
        assert_eq!(abandoned, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(runner.tracked(), 0);
    }

    #[test]
    fn task_error_is_absorbed() {
        let runner = TaskRunner::new();
        runner
            .spawn("fails", "trace-test", || {
                Err(AppError::system("boom", "trace-test"))
            })
            .expect("spawn");
        assert_eq!(runner.drain(Duration::from_secs(5), "trace-test"), 0);
    }

    #[test]
    fn task_panic_is_absorbed() {
        let runner = TaskRunner::new();
        runner
            .spawn("panics", "trace-test", || panic!("deliberate"))
            .expect("spawn");
        assert_eq!(runner.drain(Duration::from_secs(5), "trace-test"), 0);
    }

    #[test]
    fn slow_task_is_abandoned_not_joined() {
        let runner = TaskRunner::new();
        runner
            .spawn("slow", "trace-test", || {
                std::thread::sleep(Duration::from_secs(10));
                Ok(())
            })
            .expect("spawn");

        let start = Instant::now();
        let abandoned = runner.drain(Duration::from_millis(200), "trace-test");
        assert_eq!(abandoned, 1);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn concurrent_spawns_are_all_tracked() {
        let runner = Arc::new(TaskRunner::new());
        let mut threads = Vec::new();
        for i in 0..8 {
            let runner = Arc::clone(&runner);
            threads.push(std::thread::spawn(move || {
                runner
                    .spawn(&format!("unit-{i}"), "trace-test", || Ok(()))
                    .expect("spawn");
            }));
        }
        for thread in threads {
            thread.join().expect("join");
        }
        assert_eq!(runner.tracked(), 8);
        assert_eq!(runner.drain(Duration::from_secs(5), "trace-test"), 0);
    }
}
