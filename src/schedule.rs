//! When to ask whether the process is still there, and how long to sleep in
//! between.
//!
//! Without a deadline the target is queried every `interval` seconds until it
//! is gone. With one, whole intervals are spent while a full interval still
//! fits before the deadline (the coarse phase). The time left over is then
//! split into `remaining / interval` second steps (the fine phase), so the
//! last query lands on the deadline instead of up to an interval past it.
//!
//! Elapsed time is the sum of the requested sleeps, not a clock reading.

use std::{ops::ControlFlow, thread, time::Duration};

use log::{debug, info};

use crate::{backends::Backend, config::PollConfig};

/// Why a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    ProcessGone,
    DeadlineReached,
}

/// The scheduler's accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PollState {
    /// Seconds of sleep requested so far.
    pub elapsed: f64,
    /// Time left before the deadline once the fine phase started.
    pub remaining: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollOutcome {
    pub reason: TerminationReason,
    pub state: PollState,
    /// Liveness queries performed.
    pub queries: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Unbounded,
    Coarse,
    Fine { step: f64 },
}

/// The delay sequence of one wait, independent of any process or clock.
#[derive(Debug, Clone)]
pub struct PollPlan {
    interval: f64,
    deadline: Option<f64>,
    phase: Phase,
    state: PollState,
}

impl PollPlan {
    /// `interval` must be positive. A `deadline` of `None` waits forever.
    pub fn new(interval: f64, deadline: Option<f64>) -> Self {
        Self {
            interval,
            deadline,
            phase: match deadline {
                Some(_) => Phase::Coarse,
                None => Phase::Unbounded,
            },
            state: PollState::default(),
        }
    }

    #[inline]
    pub fn state(&self) -> PollState {
        self.state
    }

    /// Called after a query found the process alive. Returns how long to
    /// sleep before the next query, or `None` once the deadline is reached.
    pub fn next_delay(&mut self) -> Option<f64> {
        let Some(deadline) = self.deadline else {
            self.state.elapsed += self.interval;
            return Some(self.interval);
        };

        if self.phase == Phase::Coarse {
            if self.state.elapsed + self.interval < deadline {
                self.state.elapsed += self.interval;
                return Some(self.interval);
            }

            let remaining = (deadline - self.state.elapsed).max(0.0);
            self.state.remaining = Some(remaining);
            self.phase = Phase::Fine {
                step: fine_step(remaining, self.interval),
            };
        }

        match self.phase {
            Phase::Fine { step } if self.state.elapsed < deadline => {
                let elapsed = self.state.elapsed;
                if elapsed + step > elapsed {
                    self.state.elapsed += step;
                    Some(step)
                } else {
                    // step fell below half an ulp of elapsed, finish in one go
                    self.state.elapsed = deadline;
                    Some(deadline - elapsed)
                }
            }
            _ => None,
        }
    }
}

/// Length of one fine phase sleep.
///
/// `remaining / interval`, capped at `remaining` so an interval below one
/// second cannot push the last sleep past `deadline + interval`.
pub fn fine_step(remaining: f64, interval: f64) -> f64 {
    (remaining / interval).min(remaining).max(0.0)
}

pub trait Sleep {
    fn sleep(&self, dur: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    #[inline]
    fn sleep(&self, dur: Duration) {
        thread::sleep(dur)
    }
}

#[inline]
fn to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Waits for every process named by a [`PollConfig`] to go away.
#[derive(Debug)]
pub struct Poller<B, S = ThreadSleep> {
    config: PollConfig,
    backend: B,
    sleeper: S,
}

impl<B: Backend> Poller<B> {
    pub fn new(config: PollConfig, backend: B) -> Self {
        Self::with_sleeper(config, backend, ThreadSleep)
    }
}

impl<B: Backend, S> Poller<B, S> {
    pub fn with_sleeper(config: PollConfig, backend: B, sleeper: S) -> Self {
        Self {
            config,
            backend,
            sleeper,
        }
    }

    #[inline]
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    fn start(&self) -> ControlFlow<PollOutcome, PollPlan> {
        if self.config.aborts_immediately() {
            debug!("abort time {:?}s is too short to poll", self.config.abort());
            return ControlFlow::Break(PollOutcome {
                reason: TerminationReason::DeadlineReached,
                state: PollState::default(),
                queries: 0,
            });
        }

        ControlFlow::Continue(PollPlan::new(
            self.config.interval(),
            self.config.deadline(),
        ))
    }

    /// One iteration: query, then either stop or name the next sleep.
    fn step(
        &self,
        plan: &mut PollPlan,
        queries: &mut u64,
    ) -> ControlFlow<PollOutcome, Duration> {
        *queries += 1;
        let name = self.config.process_name();

        let reason = if !self.backend.is_alive(name) {
            TerminationReason::ProcessGone
        } else if let Some(delay) = plan.next_delay() {
            debug!(
                "poll {queries}: {name:?} alive, sleeping {delay:.3}s, elapsed time {:.3}s",
                plan.state().elapsed
            );
            return ControlFlow::Continue(to_duration(delay));
        } else {
            TerminationReason::DeadlineReached
        };

        info!(
            "{name:?}: {reason:?} after {queries} queries, elapsed time {:.3}s",
            plan.state().elapsed
        );
        ControlFlow::Break(PollOutcome {
            reason,
            state: plan.state(),
            queries: *queries,
        })
    }

    /// Like [`Poller::run_with_state`], suspending on the tokio timer.
    #[cfg(feature = "async")]
    pub async fn run_async(&self) -> PollOutcome {
        let mut plan = match self.start() {
            ControlFlow::Break(outcome) => return outcome,
            ControlFlow::Continue(plan) => plan,
        };
        let mut queries = 0;

        loop {
            match self.step(&mut plan, &mut queries) {
                ControlFlow::Break(outcome) => return outcome,
                ControlFlow::Continue(delay) => tokio::time::sleep(delay).await,
            }
        }
    }
}

impl<B: Backend, S: Sleep> Poller<B, S> {
    #[inline]
    pub fn run(&self) -> TerminationReason {
        self.run_with_state().reason
    }

    pub fn run_with_state(&self) -> PollOutcome {
        let mut plan = match self.start() {
            ControlFlow::Break(outcome) => return outcome,
            ControlFlow::Continue(plan) => plan,
        };
        let mut queries = 0;

        loop {
            match self.step(&mut plan, &mut queries) {
                ControlFlow::Break(outcome) => return outcome,
                ControlFlow::Continue(delay) => self.sleeper.sleep(delay),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;

    /// Alive for the first `alive_for` queries, then gone.
    struct Fake {
        alive_for: u64,
        queries: Cell<u64>,
    }

    impl Fake {
        fn alive_for(n: u64) -> Self {
            Self {
                alive_for: n,
                queries: Cell::new(0),
            }
        }

        fn always_alive() -> Self {
            Self::alive_for(u64::MAX)
        }

        fn always_gone() -> Self {
            Self::alive_for(0)
        }
    }

    impl Backend for Fake {
        fn is_alive(&self, name: &str) -> bool {
            assert_eq!(name, "target");
            let n = self.queries.get();
            self.queries.set(n + 1);
            n < self.alive_for
        }
    }

    #[derive(Default)]
    struct Recorder(RefCell<Vec<Duration>>);

    impl Sleep for &Recorder {
        fn sleep(&self, dur: Duration) {
            self.0.borrow_mut().push(dur);
        }
    }

    impl Recorder {
        fn secs(&self) -> Vec<f64> {
            self.0.borrow().iter().map(Duration::as_secs_f64).collect()
        }
    }

    fn config(interval: f64, abort: Option<f64>) -> PollConfig {
        let builder = PollConfig::builder()
            .process_name("target")
            .interval(interval);
        let builder = match abort {
            Some(abort) => builder.abort(abort),
            None => builder,
        };
        builder.build().unwrap()
    }

    fn run(backend: &Fake, interval: f64, abort: Option<f64>) -> (PollOutcome, Vec<f64>) {
        let recorder = Recorder::default();
        let outcome = Poller::with_sleeper(config(interval, abort), backend, &recorder)
            .run_with_state();
        (outcome, recorder.secs())
    }

    #[test]
    fn tiny_deadline_never_queries() {
        for abort in [0.15, 0.2, 1e-9] {
            let backend = Fake::always_alive();
            let (outcome, sleeps) = run(&backend, 1.0, Some(abort));

            assert_eq!(outcome.reason, TerminationReason::DeadlineReached);
            assert_eq!(outcome.queries, 0);
            assert_eq!(backend.queries.get(), 0);
            assert!(sleeps.is_empty());
        }
    }

    #[test]
    fn gone_process_needs_one_query() {
        for interval in [1e-3, 1.0, 1e9] {
            for abort in [None, Some(-1.0), Some(10.0)] {
                let backend = Fake::always_gone();
                let (outcome, sleeps) = run(&backend, interval, abort);

                assert_eq!(outcome.reason, TerminationReason::ProcessGone);
                assert_eq!(backend.queries.get(), 1);
                assert!(sleeps.is_empty());
            }
        }
    }

    #[test]
    fn no_deadline_sleeps_whole_intervals() {
        let backend = Fake::alive_for(4);
        let (outcome, sleeps) = run(&backend, 0.5, Some(-1.0));

        assert_eq!(outcome.reason, TerminationReason::ProcessGone);
        assert_eq!(outcome.queries, 5);
        assert_eq!(sleeps, [0.5; 4]);
        assert_eq!(outcome.state.remaining, None);
    }

    #[test]
    fn coarse_then_fine() {
        let backend = Fake::always_alive();
        let (outcome, sleeps) = run(&backend, 1.0, Some(5.5));

        assert_eq!(outcome.reason, TerminationReason::DeadlineReached);
        assert_eq!(sleeps, [1.0, 1.0, 1.0, 1.0, 1.0, 0.5]);
        assert_eq!(outcome.queries, 7);
        assert_eq!(outcome.state.elapsed, 5.5);
        assert_eq!(outcome.state.remaining, Some(0.5));
    }

    #[test]
    fn fine_step_divides_by_interval() {
        let backend = Fake::always_alive();
        let (outcome, sleeps) = run(&backend, 2.0, Some(5.0));

        // remaining 1s over a 2s interval: two half second steps
        assert_eq!(sleeps, [2.0, 2.0, 0.5, 0.5]);
        assert_eq!(outcome.queries, 5);
        assert_eq!(outcome.state.elapsed, 5.0);
    }

    #[test]
    fn deadline_converges_without_overshoot() {
        let cases = [
            (1.0, 5.0),
            (1.0, 5.5),
            (0.3, 1.0),
            (0.1, 1.05),
            (2.5, 0.5),
            (1.5, 10.0),
            (10.0, 3.0),
            (0.7, 0.21),
        ];

        for (interval, abort) in cases {
            let backend = Fake::always_alive();
            let (outcome, _) = run(&backend, interval, Some(abort));
            let elapsed = outcome.state.elapsed;

            assert_eq!(outcome.reason, TerminationReason::DeadlineReached);
            assert!(
                elapsed >= abort && elapsed < abort + interval,
                "interval {interval}, abort {abort}: elapsed {elapsed}"
            );
        }
    }

    #[test]
    fn zero_deadline_queries_once() {
        let backend = Fake::always_alive();
        let (outcome, sleeps) = run(&backend, 1.0, Some(0.0));

        assert_eq!(outcome.reason, TerminationReason::DeadlineReached);
        assert_eq!(outcome.queries, 1);
        assert_eq!(outcome.state.remaining, Some(0.0));
        assert!(sleeps.is_empty());
    }

    #[test]
    fn gone_during_fine_phase() {
        let backend = Fake::alive_for(3);
        let (outcome, sleeps) = run(&backend, 1.0, Some(2.5));

        assert_eq!(outcome.reason, TerminationReason::ProcessGone);
        assert_eq!(outcome.queries, 4);
        assert_eq!(sleeps, [1.0, 1.0, 0.5]);
    }

    #[test]
    fn stops_at_first_gone_answer() {
        for n in [1, 2, 7] {
            let backend = Fake::alive_for(n);
            let (outcome, sleeps) = run(&backend, 1.0, Some(100.0));

            assert_eq!(outcome.reason, TerminationReason::ProcessGone);
            assert_eq!(backend.queries.get(), n + 1);
            assert_eq!(sleeps.len() as u64, n);
        }
    }

    #[test]
    fn fine_step_shrinks_to_zero() {
        let steps: Vec<f64> = [1.0, 0.1, 1e-6, 0.0]
            .into_iter()
            .map(|remaining| fine_step(remaining, 2.0))
            .collect();

        assert!(steps.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(steps[3], 0.0);
        assert!(steps.iter().all(|s| *s >= 0.0));
    }

    #[test]
    fn fine_step_caps_at_remaining() {
        assert_eq!(fine_step(0.5, 1.0), 0.5);
        assert_eq!(fine_step(0.05, 0.1), 0.05);
        assert_eq!(fine_step(1.0, 4.0), 0.25);
    }

    fn drain(plan: &mut PollPlan) -> usize {
        let mut steps = 0;
        while plan.next_delay().is_some() {
            steps += 1;
            assert!(steps < 1_000_000, "stuck at {:?}", plan.state());
        }
        steps
    }

    #[test]
    fn fine_phase_survives_exponent_change() {
        // elapsed crosses 16.0 where the fixed step drops below half an ulp
        let interval = 16.0 - 2f64.powi(-47);
        let deadline = 16.0 + 3.0 * 2f64.powi(-48);
        let mut plan = PollPlan::new(interval, Some(deadline));

        drain(&mut plan);

        let elapsed = plan.state().elapsed;
        assert!(elapsed >= deadline && elapsed < deadline + interval);
    }

    #[test]
    fn fine_step_below_ulp_jumps_to_deadline() {
        // one coarse step to 2^40, then 2^20 / 2^40 cannot move 2^40
        let interval = 2f64.powi(40);
        let deadline = interval + 2f64.powi(20);
        let mut plan = PollPlan::new(interval, Some(deadline));

        assert_eq!(drain(&mut plan), 2);
        assert_eq!(plan.state().elapsed, deadline);
        assert_eq!(plan.state().remaining, Some(2f64.powi(20)));
    }

    #[test]
    fn plan_reports_deadline_once_spent() {
        let mut plan = PollPlan::new(1.0, Some(0.0));
        assert_eq!(plan.next_delay(), None);
        assert_eq!(plan.next_delay(), None);

        let mut plan = PollPlan::new(1.0, None);
        assert_eq!(plan.next_delay(), Some(1.0));
        assert_eq!(plan.state().elapsed, 1.0);
    }

    #[test]
    fn huge_interval_sleeps_saturate() {
        assert_eq!(to_duration(1e300), Duration::MAX);
        assert_eq!(to_duration(0.25), Duration::from_millis(250));
    }

    #[cfg(feature = "async")]
    #[test]
    fn async_run_matches_sync_accounting() {
        let backend = Fake::alive_for(2);
        let poller = Poller::new(config(0.01, Some(1.0)), &backend);

        let outcome = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(poller.run_async());

        assert_eq!(outcome.reason, TerminationReason::ProcessGone);
        assert_eq!(outcome.queries, 3);
        assert!((outcome.state.elapsed - 0.02).abs() < 1e-12);
    }
}
