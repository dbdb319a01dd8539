//! Run-level controller
//!
//! Up-transitions activate one level at a time. Within a level the
//! descriptors are queued and drained by at most `max_threads` workers; a
//! worker that needs a service another worker is still building parks on
//! that construction instead of starting a second one. Parked workers are
//! not replaced, so a shared dependency is built once per level no matter
//! how many workers wait for it, and a level never starts more than
//! `max_threads` activations at a time.
//!
//! Down-transitions run on the driving thread and destroy levels strictly
//! in descending order.

use super::context::{LevelState, RunLevelContext};
use super::executor::{Executor, ThreadExecutor};
use super::future::RunLevelFuture;
use super::listener::{ErrorAction, LevelErrorInformation, RunLevelListener};
use super::{ThreadingPolicy, level_of};
use crate::config::RunLevelConfig;
use crate::constants::RUN_LEVEL_THREAD_PREFIX;
use locus_application::{ActiveDescriptor, ServiceLocator};
use locus_domain::constants::{INITIAL_RUN_LEVEL, RUN_LEVEL_SCOPE};
use locus_domain::value_objects::Descriptor;
use locus_domain::{Error, ErrorKind, MultiError, MultiResult};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What happened while activating one level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelStatistics {
    /// Level activated
    pub level: i32,
    /// Services activated successfully
    pub activated: usize,
    /// Workers started for the level
    pub workers: usize,
    /// Most workers parked at the same time
    pub peak_blocked: usize,
    /// Wall time spent on the level
    pub elapsed: Duration,
}

struct Settings {
    max_threads: usize,
    policy: ThreadingPolicy,
    executor: Arc<dyn Executor>,
    timeout: Option<Duration>,
}

struct ControllerInner {
    locator: ServiceLocator,
    context: Arc<RunLevelContext>,
    state: Arc<LevelState>,
    settings: Mutex<Settings>,
    listeners: RwLock<Vec<Arc<dyn RunLevelListener>>>,
    in_flight: Mutex<Option<RunLevelFuture>>,
    statistics: Mutex<Vec<LevelStatistics>>,
}

enum LevelOutcome {
    Reached(LevelStatistics),
    Cancelled,
    Failed(MultiError),
}

/// Drives run-level transitions for one service locator
///
/// Clones control the same state.
#[derive(Clone)]
pub struct RunLevelController {
    inner: Arc<ControllerInner>,
}

impl RunLevelController {
    /// Controller with default settings
    ///
    /// Registers the `RunLevel` context with `locator`; fails if one is
    /// already registered.
    pub fn new(locator: &ServiceLocator) -> MultiResult<Self> {
        Self::with_config(locator, &RunLevelConfig::default())
    }

    /// Controller configured from `config`
    pub fn with_config(locator: &ServiceLocator, config: &RunLevelConfig) -> MultiResult<Self> {
        if config.max_threads == 0 {
            return Err(Error::invalid_argument("max_threads must be at least 1").into());
        }
        let state = Arc::new(LevelState::new());
        let context = Arc::new(RunLevelContext::new(
            Arc::clone(&state),
            config.default_mode,
        ));
        let mut dynamic = locator.create_dynamic_configuration();
        dynamic.add_context(context.clone());
        dynamic.commit()?;

        Ok(Self {
            inner: Arc::new(ControllerInner {
                locator: locator.clone(),
                context,
                state,
                settings: Mutex::new(Settings {
                    max_threads: config.max_threads,
                    policy: config.threading_policy,
                    executor: Arc::new(ThreadExecutor::default()),
                    timeout: config.transition_timeout_secs.map(Duration::from_secs),
                }),
                listeners: RwLock::new(Vec::new()),
                in_flight: Mutex::new(None),
                statistics: Mutex::new(Vec::new()),
            }),
        })
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Last level fully reached
    pub fn current_level(&self) -> i32 {
        self.inner.state.current()
    }

    /// Bound on workers per level, applied from the next level on
    pub fn set_maximum_useable_threads(&self, threads: usize) -> MultiResult<()> {
        if threads == 0 {
            return Err(Error::invalid_argument("max_threads must be at least 1").into());
        }
        self.inner.settings.lock().max_threads = threads;
        Ok(())
    }

    pub fn maximum_useable_threads(&self) -> usize {
        self.inner.settings.lock().max_threads
    }

    /// Where level workers run
    pub fn set_executor(&self, executor: Arc<dyn Executor>) {
        self.inner.settings.lock().executor = executor;
    }

    pub fn set_threading_policy(&self, policy: ThreadingPolicy) {
        self.inner.settings.lock().policy = policy;
    }

    pub fn threading_policy(&self) -> ThreadingPolicy {
        self.inner.settings.lock().policy
    }

    pub fn add_listener(&self, listener: Arc<dyn RunLevelListener>) {
        self.inner.listeners.write().push(listener);
    }

    /// The run-level context registered with the locator
    pub fn context(&self) -> &Arc<RunLevelContext> {
        &self.inner.context
    }

    /// Statistics of every level activated by the last up-transition
    pub fn statistics(&self) -> Vec<LevelStatistics> {
        self.inner.statistics.lock().clone()
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Move to `level` on the calling thread
    ///
    /// With a configured transition timeout and the fully threaded policy
    /// the transition runs on a driver thread instead; when the timeout
    /// elapses it is cancelled and a timeout error is returned.
    pub fn proceed_to(&self, level: i32) -> MultiResult<i32> {
        let (policy, timeout) = {
            let settings = self.inner.settings.lock();
            (settings.policy, settings.timeout)
        };
        if let (ThreadingPolicy::FullyThreaded, Some(timeout)) = (policy, timeout) {
            let future = self.proceed_to_async(level)?;
            return future.get_timeout(timeout).inspect_err(|e| {
                if e.has(ErrorKind::Timeout) {
                    future.cancel();
                }
            });
        }
        let future = self.begin(level)?;
        self.drive(&future);
        future.get()
    }

    /// Start moving to `level` and return immediately
    ///
    /// Under [`ThreadingPolicy::UseNoThreads`] the transition completes
    /// before this returns.
    pub fn proceed_to_async(&self, level: i32) -> MultiResult<RunLevelFuture> {
        let future = self.begin(level)?;
        if self.threading_policy() == ThreadingPolicy::UseNoThreads {
            self.drive(&future);
            return Ok(future);
        }
        let controller = self.clone();
        let driven = future.clone();
        let spawned = thread::Builder::new()
            .name(format!("{RUN_LEVEL_THREAD_PREFIX}-driver"))
            .spawn(move || controller.drive(&driven));
        if let Err(e) = spawned {
            warn!(error = %e, "Could not start a driver thread, transitioning inline");
            self.drive(&future);
        }
        Ok(future)
    }

    /// Cancel the transition in progress, if any
    pub fn cancel(&self) -> bool {
        let in_flight = self.inner.in_flight.lock().clone();
        in_flight.is_some_and(|future| future.cancel())
    }

    fn begin(&self, level: i32) -> MultiResult<RunLevelFuture> {
        if level < INITIAL_RUN_LEVEL {
            return Err(Error::invalid_argument(format!(
                "run level {level} is below the initial level {INITIAL_RUN_LEVEL}"
            ))
            .into());
        }
        if self.inner.locator.is_shut_down() {
            return Err(Error::Shutdown {
                locator: self.inner.locator.name().to_string(),
            }
            .into());
        }
        let mut in_flight = self.inner.in_flight.lock();
        if in_flight.as_ref().is_some_and(|future| !future.is_done()) {
            return Err(Error::illegal_state("a run level transition is already in progress").into());
        }
        let future = RunLevelFuture::new(level);
        *in_flight = Some(future.clone());
        Ok(future)
    }

    fn drive(&self, future: &RunLevelFuture) {
        let outcome = self.transition(future);
        {
            let mut in_flight = self.inner.in_flight.lock();
            if in_flight.as_ref().is_some_and(|current| current.same_as(future)) {
                *in_flight = None;
            }
        }
        future.complete(outcome);
    }

    fn transition(&self, future: &RunLevelFuture) -> MultiResult<i32> {
        let target = future.proposed_level();
        let current = self.current_level();
        info!(from = current, to = target, "Run level transition started");
        if target < current {
            self.go_down(future, current, target)
        } else {
            self.go_up(future, current, target)
        }
    }

    fn go_up(&self, future: &RunLevelFuture, from: i32, target: i32) -> MultiResult<i32> {
        self.inner.statistics.lock().clear();
        if future.is_cancelled() {
            return Err(self.cancelled(future, from));
        }
        for level in from + 1..=target {
            self.inner.state.begin_level(level);
            match self.activate_level(future, level) {
                LevelOutcome::Reached(statistics) => {
                    debug!(
                        level,
                        activated = statistics.activated,
                        workers = statistics.workers,
                        peak_blocked = statistics.peak_blocked,
                        "Run level reached"
                    );
                    self.inner.statistics.lock().push(statistics);
                    self.inner.state.settle(level);
                    self.notify(|listener| listener.on_progress(future, level));
                }
                LevelOutcome::Cancelled => {
                    self.abandon(level);
                    return Err(self.cancelled(future, level - 1));
                }
                LevelOutcome::Failed(errors) => {
                    self.abandon(level);
                    error!(level, error = %errors, "Run level activation failed");
                    return Err(errors);
                }
            }
            if future.is_cancelled() {
                return Err(self.cancelled(future, level));
            }
        }
        info!(level = target, "Run level transition finished");
        Ok(target)
    }

    fn go_down(&self, future: &RunLevelFuture, from: i32, target: i32) -> MultiResult<i32> {
        let context = &self.inner.context;
        context.forget_failures_above(target);
        context.destroy_above(from);
        for level in (target + 1..=from).rev() {
            let destroyed = context.destroy_level(level);
            debug!(level, destroyed, "Run level brought down");
            self.inner.state.settle(level - 1);
            self.notify(|listener| listener.on_progress(future, level - 1));
            if future.is_cancelled() && level - 1 > target {
                return Err(self.cancelled(future, level - 1));
            }
        }
        info!(level = target, "Run level transition finished");
        Ok(target)
    }

    /// Tear down a partially activated level and settle below it
    fn abandon(&self, level: i32) {
        let destroyed = self.inner.context.destroy_level(level);
        debug!(level, destroyed, "Partially activated run level torn down");
        self.inner.state.settle(level - 1);
    }

    fn cancelled(&self, future: &RunLevelFuture, level: i32) -> MultiError {
        info!(level, "Run level transition cancelled");
        self.notify(|listener| listener.on_cancelled(future, level));
        Error::Cancelled { level }.into()
    }

    fn notify<F>(&self, call: F)
    where
        F: Fn(&dyn RunLevelListener),
    {
        let listeners = self.inner.listeners.read().clone();
        for listener in &listeners {
            call(listener.as_ref());
        }
    }

    fn level_descriptors(&self, level: i32) -> MultiResult<Vec<Arc<ActiveDescriptor>>> {
        let locator_id = self.inner.locator.id();
        let filter = move |descriptor: &Descriptor| {
            descriptor.scope() == RUN_LEVEL_SCOPE
                && descriptor.locator_id() == Some(locator_id)
                && level_of(descriptor).is_ok_and(|own| own == level)
        };
        self.inner.locator.get_descriptors(&filter)
    }

    fn activate_level(&self, future: &RunLevelFuture, level: i32) -> LevelOutcome {
        let started = Instant::now();
        let descriptors = match self.level_descriptors(level) {
            Ok(descriptors) => descriptors,
            Err(errors) => return LevelOutcome::Failed(errors),
        };
        let (max_threads, policy, executor) = {
            let settings = self.inner.settings.lock();
            (
                settings.max_threads,
                settings.policy,
                Arc::clone(&settings.executor),
            )
        };
        let workers = match policy {
            ThreadingPolicy::UseNoThreads => 1,
            ThreadingPolicy::FullyThreaded => max_threads.min(descriptors.len()).max(1),
        };
        self.inner.context.blocked_workers().reset();

        let run = Arc::new(LevelRun {
            level,
            queue: Mutex::new(descriptors.into_iter().collect()),
            aborted: AtomicBool::new(false),
            reporting: AtomicBool::new(false),
            failures: Mutex::new(MultiError::new()),
            activated: AtomicUsize::new(0),
            running: Mutex::new(workers),
            finished: Condvar::new(),
            future: future.clone(),
            locator: self.inner.locator.clone(),
            listeners: self.inner.listeners.read().clone(),
        });

        if policy == ThreadingPolicy::UseNoThreads {
            run.work();
        } else {
            for _ in 0..workers {
                let worker = Arc::clone(&run);
                if let Err(e) = executor.execute(Box::new(move || worker.work())) {
                    warn!(level, error = %e, "Executor rejected a worker, running it inline");
                    run.work();
                }
            }
        }
        run.wait();

        if run.aborted.load(Ordering::Acquire) {
            return LevelOutcome::Failed(std::mem::take(&mut *run.failures.lock()));
        }
        if !run.queue.lock().is_empty() {
            return LevelOutcome::Cancelled;
        }
        LevelOutcome::Reached(LevelStatistics {
            level,
            activated: run.activated.load(Ordering::Acquire),
            workers,
            peak_blocked: self.inner.context.blocked_workers().peak(),
            elapsed: started.elapsed(),
        })
    }
}

impl fmt::Debug for RunLevelController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLevelController")
            .field("locator", &self.inner.locator.name())
            .field("current", &self.current_level())
            .field("max_threads", &self.maximum_useable_threads())
            .finish_non_exhaustive()
    }
}

/// Shared state of the workers activating one level
struct LevelRun {
    level: i32,
    queue: Mutex<VecDeque<Arc<ActiveDescriptor>>>,
    aborted: AtomicBool,
    /// Held by the failure whose listeners are being notified
    reporting: AtomicBool,
    failures: Mutex<MultiError>,
    activated: AtomicUsize,
    running: Mutex<usize>,
    finished: Condvar,
    future: RunLevelFuture,
    locator: ServiceLocator,
    listeners: Vec<Arc<dyn RunLevelListener>>,
}

impl LevelRun {
    fn work(&self) {
        loop {
            if self.aborted.load(Ordering::Acquire) || self.future.is_cancelled() {
                break;
            }
            let Some(descriptor) = self.queue.lock().pop_front() else {
                break;
            };
            match self.locator.get_service_for(&descriptor) {
                Ok(_) => {
                    self.activated.fetch_add(1, Ordering::AcqRel);
                }
                Err(errors) => self.fail(&descriptor, errors),
            }
        }
        let mut running = self.running.lock();
        *running = running.saturating_sub(1);
        if *running == 0 {
            self.finished.notify_all();
        }
    }

    fn fail(&self, descriptor: &ActiveDescriptor, errors: MultiError) {
        let error: MultiError = Error::RunLevelActivation {
            level: self.level,
            descriptor: descriptor.to_string(),
            source: Arc::new(errors),
        }
        .into();
        if self.aborted.load(Ordering::Acquire) {
            self.failures.lock().absorb(error);
            return;
        }
        if self.reporting.swap(true, Ordering::AcqRel) {
            // another failure of this level is being reported; this one
            // aborts the level without a second notification
            self.failures.lock().absorb(error);
            self.aborted.store(true, Ordering::Release);
            return;
        }
        let mut information =
            LevelErrorInformation::new(self.level, descriptor.descriptor().clone(), error.clone());
        for listener in &self.listeners {
            listener.on_error(&self.future, &mut information);
        }
        match information.action() {
            ErrorAction::Ignore => {
                warn!(level = self.level, descriptor = %descriptor, "Activation failure ignored");
                self.reporting.store(false, Ordering::Release);
            }
            ErrorAction::GoToNextLowerLevelAndStop => {
                self.failures.lock().absorb(error);
                self.aborted.store(true, Ordering::Release);
            }
        }
    }

    fn wait(&self) {
        let mut running = self.running.lock();
        while *running > 0 {
            self.finished.wait(&mut running);
        }
    }
}
