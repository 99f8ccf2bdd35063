//! Delayed and periodic task scheduling
//!
//! A thin layer over the tokio timer. Every scheduled task gets a
//! [`TaskHandle`]; the graph keeps the handles of everything its nodes
//! scheduled in a [`TaskRegistry`] so a reload can cancel them in one sweep.
//!
//! Task bodies run on the runtime's worker threads, one body at a time per
//! task. A body that fails or panics is logged; periodic tasks keep running.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{Result, SchedulingError};

/// Handle to a scheduled task
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    abort: AbortHandle,
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop the task; a body already running finishes, no further run starts
    ///
    /// Does not wait for the timer task to wind down.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            log::debug!("Cancelling scheduled task {}", self.id);
        }
        self.abort.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Whether the underlying timer task has ended
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// The set of tasks owned by one live graph
///
/// Once closed, every handle tracked afterwards is cancelled on the spot, so
/// a walk that outlived its graph cannot leave tasks behind.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Vec<TaskHandle>,
    closed: bool,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a handle; finished tasks are pruned on the way
    ///
    /// Returns false, and cancels the task, when the registry is closed.
    pub fn track(&mut self, handle: TaskHandle) -> bool {
        if self.closed {
            log::warn!("Task {} scheduled by a replaced graph, cancelling", handle.id());
            handle.cancel();
            return false;
        }
        self.tasks.retain(|task| !task.is_finished());
        self.tasks.push(handle);
        true
    }

    /// Cancel every tracked task and forget them
    pub fn cancel_all(&mut self) -> usize {
        let count = self.tasks.len();
        for task in self.tasks.drain(..) {
            task.cancel();
        }
        count
    }

    /// Cancel everything and refuse further tasks
    pub fn close(&mut self) -> usize {
        self.closed = true;
        self.cancel_all()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Schedules task bodies on a tokio runtime
#[derive(Debug, Clone)]
pub struct Scheduler {
    handle: Handle,
    next_id: Arc<AtomicU64>,
}

impl Scheduler {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Scheduler on the runtime of the calling context
    pub fn current() -> std::result::Result<Self, SchedulingError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| SchedulingError::NoRuntime)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Run `task` once after `delay`
    pub fn schedule_once<F>(&self, delay: Duration, task: F) -> TaskHandle
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let id = self.next_id();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        log::debug!("Scheduling task {} once after {:?}", id, delay);
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if flag.load(Ordering::Acquire) {
                return;
            }
            run_body(id, task);
        });

        TaskHandle {
            id,
            abort: join.abort_handle(),
            cancelled,
        }
    }

    /// Run `task` every `period`, first after `initial_delay`
    ///
    /// Missed ticks are caught up in a burst, matching a fixed-rate timer.
    pub fn schedule_at_fixed_rate<F>(
        &self,
        initial_delay: Duration,
        period: Duration,
        mut task: F,
    ) -> std::result::Result<TaskHandle, SchedulingError>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        if period.is_zero() {
            return Err(SchedulingError::InvalidPeriod(period));
        }
        // The ticker adds `period` to every deadline and panics past the clock's range
        let start = Instant::now()
            .checked_add(initial_delay)
            .ok_or(SchedulingError::InvalidPeriod(initial_delay))?;
        if start.checked_add(period).is_none() {
            return Err(SchedulingError::InvalidPeriod(period));
        }

        let id = self.next_id();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        log::debug!(
            "Scheduling task {} at fixed rate {:?} (initial delay {:?})",
            id,
            period,
            initial_delay
        );
        let join = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                run_body(id, &mut task);
            }
        });

        Ok(TaskHandle {
            id,
            abort: join.abort_handle(),
            cancelled,
        })
    }

    /// Run `task` repeatedly with `delay` between the end of one run and the
    /// start of the next
    pub fn schedule_with_fixed_delay<F>(
        &self,
        initial_delay: Duration,
        delay: Duration,
        mut task: F,
    ) -> std::result::Result<TaskHandle, SchedulingError>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        if delay.is_zero() {
            return Err(SchedulingError::InvalidPeriod(delay));
        }

        let id = self.next_id();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        log::debug!(
            "Scheduling task {} with fixed delay {:?} (initial delay {:?})",
            id,
            delay,
            initial_delay
        );
        let join = self.handle.spawn(async move {
            tokio::time::sleep(initial_delay).await;
            loop {
                if flag.load(Ordering::Acquire) {
                    break;
                }
                run_body(id, &mut task);
                tokio::time::sleep(delay).await;
            }
        });

        Ok(TaskHandle {
            id,
            abort: join.abort_handle(),
            cancelled,
        })
    }
}

fn run_body<F>(id: u64, task: F)
where
    F: FnOnce() -> Result<()>,
{
    match catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!("Scheduled task {} failed: {}", id, e),
        Err(_) => log::error!("Scheduled task {} panicked", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (count.clone(), count)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_schedule_once_runs_after_delay() {
        let scheduler = Scheduler::current().unwrap();
        let (count, seen) = counter();

        scheduler.schedule_once(Duration::from_millis(20), move || {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(seen.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_before_first_run() {
        let scheduler = Scheduler::current().unwrap();
        let (count, seen) = counter();

        let handle = scheduler.schedule_once(Duration::from_millis(50), move || {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        handle.cancel();
        assert!(handle.is_cancelled());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fixed_rate_repeats_until_cancelled() {
        let scheduler = Scheduler::current().unwrap();
        let (count, seen) = counter();

        let handle = scheduler
            .schedule_at_fixed_rate(Duration::ZERO, Duration::from_millis(20), move || {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.cancel();
        let after_cancel = seen.load(Ordering::SeqCst);
        assert!(after_cancel >= 3, "only {} runs", after_cancel);

        tokio::time::sleep(Duration::from_millis(100)).await;
        // At most one body that was already past the flag check
        assert!(seen.load(Ordering::SeqCst) <= after_cancel + 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fixed_delay_repeats() {
        let scheduler = Scheduler::current().unwrap();
        let (count, seen) = counter();

        let handle = scheduler
            .schedule_with_fixed_delay(Duration::ZERO, Duration::from_millis(20), move || {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.cancel();
        assert!(seen.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_zero_period_rejected() {
        let scheduler = Scheduler::current().unwrap();
        let err = scheduler
            .schedule_at_fixed_rate(Duration::ZERO, Duration::ZERO, || Ok(()))
            .unwrap_err();
        assert_eq!(err, SchedulingError::InvalidPeriod(Duration::ZERO));

        tokio_test::assert_err!(scheduler.schedule_with_fixed_delay(
            Duration::ZERO,
            Duration::ZERO,
            || Ok(())
        ));
    }

    #[tokio::test]
    async fn test_unrepresentable_deadline_rejected() {
        let scheduler = Scheduler::current().unwrap();
        let err = scheduler
            .schedule_at_fixed_rate(Duration::MAX, Duration::from_secs(1), || Ok(()))
            .unwrap_err();
        assert_eq!(err, SchedulingError::InvalidPeriod(Duration::MAX));

        let err = scheduler
            .schedule_at_fixed_rate(Duration::from_secs(1), Duration::MAX, || Ok(()))
            .unwrap_err();
        assert_eq!(err, SchedulingError::InvalidPeriod(Duration::MAX));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failing_body_keeps_periodic_task_alive() {
        let scheduler = Scheduler::current().unwrap();
        let (count, seen) = counter();

        let handle = scheduler
            .schedule_at_fixed_rate(Duration::ZERO, Duration::from_millis(20), move || {
                let run = count.fetch_add(1, Ordering::SeqCst);
                match run {
                    0 => panic!("first run panics"),
                    1 => Err(WorkflowError::failed("second run fails")),
                    _ => Ok(()),
                }
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.cancel();
        assert!(seen.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn test_current_without_runtime() {
        assert_eq!(Scheduler::current().unwrap_err(), SchedulingError::NoRuntime);
    }

    #[tokio::test]
    async fn test_registry_cancel_all() {
        let scheduler = Scheduler::current().unwrap();
        let mut registry = TaskRegistry::new();
        let first = scheduler.schedule_once(Duration::from_secs(60), || Ok(()));
        let second = scheduler.schedule_once(Duration::from_secs(60), || Ok(()));
        registry.track(first.clone());
        registry.track(second.clone());
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.cancel_all(), 2);
        assert!(registry.is_empty());
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn test_closed_registry_cancels_late_tasks() {
        let scheduler = Scheduler::current().unwrap();
        let mut registry = TaskRegistry::new();
        registry.track(scheduler.schedule_once(Duration::from_secs(60), || Ok(())));
        assert_eq!(registry.close(), 1);

        let late = scheduler.schedule_once(Duration::from_secs(60), || Ok(()));
        assert!(!registry.track(late.clone()));
        assert!(late.is_cancelled());
        assert!(registry.is_empty());
    }
}
