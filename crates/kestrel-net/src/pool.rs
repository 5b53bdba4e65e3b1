//! Bounded-concurrency fan-out runner.
//!
//! Runs many independent tasks on a fixed number of scoped worker threads.
//! Workers drain a shared queue, so at most `concurrency` tasks are in flight
//! at any instant. Successful outcomes are appended to a mutex-protected
//! collection together with the completion counter; the caller blocks until
//! every task has been accounted for.
//!
//! A task that fails or panics is simply absent from the success set and
//! never disturbs its siblings.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use kestrel_types::Context;

/// Default number of completions between progress reports.
pub const DEFAULT_PROGRESS_EVERY: usize = 50;

/// Snapshot passed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Tasks that ran to an outcome so far.
    pub completed: usize,
    /// Successful tasks so far.
    pub succeeded: usize,
    /// Total tasks submitted.
    pub total: usize,
}

/// Aggregated result of a fan-out run.
#[derive(Debug)]
pub struct FanOutReport<R> {
    /// Outcomes of successful tasks, in completion order.
    pub successes: Vec<R>,
    /// Tasks that ran (successfully or not).
    pub completed: usize,
    /// Tasks never started because the context was done.
    pub skipped: usize,
    /// Highest number of tasks observed running at once.
    pub peak_in_flight: usize,
}

impl<R> FanOutReport<R> {
    fn empty() -> Self {
        Self {
            successes: Vec::new(),
            completed: 0,
            skipped: 0,
            peak_in_flight: 0,
        }
    }

    /// Tasks accounted for; always equals the number submitted.
    pub fn total(&self) -> usize {
        self.completed + self.skipped
    }
}

/// State shared by workers under one lock.
struct Aggregate<R> {
    successes: Vec<R>,
    completed: usize,
    skipped: usize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fan-out runner configuration.
#[derive(Debug, Clone, Copy)]
pub struct FanOut {
    concurrency: usize,
    progress_every: usize,
}

impl FanOut {
    /// Runner admitting at most `concurrency` tasks at once (minimum 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }

    /// Report progress after every `every` completions (minimum 1).
    pub fn progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    /// Same cadence, different ceiling (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn progress_cadence(&self) -> usize {
        self.progress_every
    }

    /// Run `probe` over every task; `Some` outcomes are collected.
    pub fn run<T, R, F>(&self, ctx: &Context, tasks: Vec<T>, probe: F) -> FanOutReport<R>
    where
        T: Send,
        R: Send,
        F: Fn(&Context, &T) -> Option<R> + Sync,
    {
        self.run_with_progress(ctx, tasks, probe, |_| {})
    }

    /// Like [`FanOut::run`], invoking `on_progress` at the configured cadence.
    ///
    /// The callback runs while the aggregation lock is held, so calls never
    /// overlap and always observe increasing counts.
    pub fn run_with_progress<T, R, F, P>(
        &self,
        ctx: &Context,
        tasks: Vec<T>,
        probe: F,
        on_progress: P,
    ) -> FanOutReport<R>
    where
        T: Send,
        R: Send,
        F: Fn(&Context, &T) -> Option<R> + Sync,
        P: Fn(Progress) + Sync,
    {
        let total = tasks.len();
        if total == 0 {
            return FanOutReport::empty();
        }
        let workers = self.concurrency.min(total);
        log::debug!("fan-out: {total} tasks on {workers} workers");

        let queue = Mutex::new(tasks.into_iter());
        let shared = Mutex::new(Aggregate {
            successes: Vec::new(),
            completed: 0,
            skipped: 0,
        });
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        // Hold the queue lock only long enough to pop.
                        let next = lock(&queue).next();
                        let Some(task) = next else {
                            break;
                        };

                        if ctx.is_done() {
                            lock(&shared).skipped += 1;
                            continue;
                        }

                        let running = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(running, Ordering::SeqCst);
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| probe(ctx, &task)))
                            .unwrap_or_else(|_| {
                                log::warn!("fan-out task panicked; counted as failure");
                                None
                            });
                        in_flight.fetch_sub(1, Ordering::SeqCst);

                        let mut agg = lock(&shared);
                        if let Some(r) = outcome {
                            agg.successes.push(r);
                        }
                        agg.completed += 1;
                        if agg.completed % self.progress_every == 0 || agg.completed == total {
                            let progress = Progress {
                                completed: agg.completed,
                                succeeded: agg.successes.len(),
                                total,
                            };
                            log::info!(
                                "progress: {}/{} done, {} succeeded",
                                progress.completed,
                                progress.total,
                                progress.succeeded
                            );
                            on_progress(progress);
                        }
                    }
                });
            }
        });

        let agg = shared.into_inner().unwrap_or_else(PoisonError::into_inner);
        if agg.skipped > 0 {
            log::debug!("fan-out: {} tasks skipped after cancellation", agg.skipped);
        }
        FanOutReport {
            successes: agg.successes,
            completed: agg.completed,
            skipped: agg.skipped,
            peak_in_flight: peak.load(Ordering::SeqCst),
        }
    }
}

impl Default for FanOut {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::{Duration, Instant};

    #[test]
    fn zero_tasks_returns_immediately() {
        let ctx = Context::background();
        let report = FanOut::new(8).run(&ctx, Vec::<u32>::new(), |_, _| Some(()));
        assert!(report.successes.is_empty());
        assert_eq!(report.total(), 0);
        assert_eq!(report.peak_in_flight, 0);
    }

    #[test]
    fn every_task_observed_exactly_once() {
        let ctx = Context::background();
        let seen = Mutex::new(Vec::new());
        let tasks: Vec<u32> = (0..200).collect();
        let report = FanOut::new(7).run(&ctx, tasks, |_, t| {
            seen.lock().unwrap().push(*t);
            (t % 3 == 0).then_some(*t)
        });
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, (0..200).collect::<Vec<_>>());
        assert_eq!(report.completed, 200);
        assert_eq!(report.skipped, 0);

        let mut ok = report.successes.clone();
        ok.sort_unstable();
        let expected: Vec<u32> = (0..200).filter(|t| t % 3 == 0).collect();
        assert_eq!(ok, expected);
    }

    #[test]
    fn concurrency_ceiling_is_respected() {
        let ctx = Context::background();
        let tasks: Vec<u32> = (0..40).collect();
        let report = FanOut::new(4).run(&ctx, tasks, |_, _| {
            std::thread::sleep(Duration::from_millis(5));
            Some(())
        });
        assert_eq!(report.completed, 40);
        assert!(report.peak_in_flight >= 1);
        assert!(report.peak_in_flight <= 4, "peak {}", report.peak_in_flight);
    }

    #[test]
    fn concurrency_is_clamped_to_task_count() {
        let ctx = Context::background();
        let report = FanOut::new(1000).run(&ctx, vec![1, 2], |_, t| Some(*t));
        assert_eq!(report.completed, 2);
        assert!(report.peak_in_flight <= 2);
    }

    #[test]
    fn single_worker_runs_everything() {
        let ctx = Context::background();
        let report = FanOut::new(1).run(&ctx, (0..25).collect::<Vec<u8>>(), |_, t| Some(*t));
        assert_eq!(report.successes.len(), 25);
        assert_eq!(report.peak_in_flight, 1);
    }

    #[test]
    fn panicking_task_is_isolated() {
        let ctx = Context::background();
        let tasks: Vec<u32> = (0..20).collect();
        let report = FanOut::new(4).run(&ctx, tasks, |_, t| {
            if *t == 7 {
                panic!("probe 7 exploded");
            }
            Some(*t)
        });
        assert_eq!(report.completed, 20);
        let ok: HashSet<u32> = report.successes.into_iter().collect();
        assert_eq!(ok.len(), 19);
        assert!(!ok.contains(&7));
    }

    #[test]
    fn slow_task_does_not_block_siblings() {
        let ctx = Context::background();
        let tasks: Vec<u32> = (0..10).collect();
        let start = Instant::now();
        let report = FanOut::new(3).run(&ctx, tasks, |_, t| {
            if *t == 0 {
                // Simulates a probe that hangs until its own timeout.
                std::thread::sleep(Duration::from_millis(300));
                return None;
            }
            Some(*t)
        });
        assert_eq!(report.completed, 10);
        assert_eq!(report.successes.len(), 9);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn progress_reported_at_cadence() {
        let ctx = Context::background();
        let calls = Mutex::new(Vec::new());
        let tasks: Vec<u32> = (0..120).collect();
        FanOut::new(5).progress_every(50).run_with_progress(
            &ctx,
            tasks,
            |_, t| Some(*t),
            |p| calls.lock().unwrap().push(p.completed),
        );
        let calls = calls.into_inner().unwrap();
        assert_eq!(calls, vec![50, 100, 120]);
    }

    #[test]
    fn cancelled_context_skips_remaining() {
        let ctx = Context::background();
        ctx.cancel();
        let report = FanOut::new(4).run(&ctx, (0..30).collect::<Vec<u32>>(), |_, t| Some(*t));
        assert_eq!(report.completed, 0);
        assert_eq!(report.skipped, 30);
        assert_eq!(report.total(), 30);
    }

    #[test]
    fn cancellation_mid_run_accounts_for_all_tasks() {
        let ctx = Context::background();
        let tasks: Vec<u32> = (0..100).collect();
        let report = FanOut::new(2).run(&ctx, tasks, |ctx, t| {
            if *t == 10 {
                ctx.cancel();
            }
            std::thread::sleep(Duration::from_millis(1));
            Some(*t)
        });
        assert_eq!(report.total(), 100);
        assert!(report.skipped > 0);
        assert_eq!(report.successes.len(), report.completed);
    }
}
