//! Unit tests for the run-level controller
//!
//! Covers ordered activation and teardown, bounded workers, cancellation,
//! error handling and memoization, activation modes, threading policies
//! and the transition future.

use crate::test_utils::{Behaviour, EventLog, Gauge, at_level, bind_levels, name_of, recorded};
use locus_application::ServiceLocator;
use locus_domain::constants::{RUN_LEVEL_MODE_KEY, RUN_LEVEL_MODE_ON_DEMAND};
use locus_domain::ports::ImplementationFn;
use locus_domain::value_objects::{ImplementationModel, Instance};
use locus_domain::{ErrorKind, MultiError};
use locus_infrastructure::config::RunLevelConfig;
use locus_infrastructure::run_level::{
    ErrorAction, LevelErrorInformation, RunLevelController, RunLevelFuture, RunLevelListener,
    RunLevelMode, ThreadExecutor, ThreadingPolicy, rayon_pool,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn controller(locator: &ServiceLocator) -> RunLevelController {
    RunLevelController::new(locator).expect("controller")
}

fn levels(locator: &ServiceLocator, log: &EventLog, top: i32) {
    bind_levels(
        locator,
        (0..=top)
            .map(|level| {
                let name = format!("app::L{level}");
                (
                    at_level(&name, level).build(),
                    recorded(&name, Behaviour::default(), log),
                )
            })
            .collect(),
    );
}

fn expect_err(result: Result<i32, MultiError>) -> MultiError {
    match result {
        Ok(level) => panic!("transition unexpectedly reached level {level}"),
        Err(errors) => errors,
    }
}

/// Records every listener callback
#[derive(Default)]
struct Recorder {
    progress: Mutex<Vec<i32>>,
    cancelled: Mutex<Vec<i32>>,
    errors: Mutex<Vec<(i32, String)>>,
    cancel_at: Option<i32>,
    ignore_errors: bool,
}

impl RunLevelListener for Recorder {
    fn on_progress(&self, transition: &RunLevelFuture, level: i32) {
        self.progress.lock().push(level);
        if self.cancel_at == Some(level) {
            let transition = transition.clone();
            thread::spawn(move || transition.cancel())
                .join()
                .expect("join");
        }
    }

    fn on_cancelled(&self, _transition: &RunLevelFuture, level: i32) {
        self.cancelled.lock().push(level);
    }

    fn on_error(&self, _transition: &RunLevelFuture, information: &mut LevelErrorInformation) {
        self.errors.lock().push((
            information.level(),
            information.descriptor().implementation().to_string(),
        ));
        if self.ignore_errors {
            information.set_action(ErrorAction::Ignore);
        }
    }
}

// =============================================================================
// Ordering
// =============================================================================

/// Test levels come up ascending and go down descending
#[test]
fn test_levels_activate_ascending_and_destroy_descending() {
    let locator = ServiceLocator::new("ordering");
    let log = EventLog::default();
    levels(&locator, &log, 5);
    let controller = controller(&locator);

    assert_eq!(controller.proceed_to(5).expect("up"), 5);
    assert_eq!(controller.current_level(), 5);
    assert_eq!(
        log.events(),
        ["new app::L0", "new app::L1", "new app::L2", "new app::L3", "new app::L4", "new app::L5"]
    );

    log.clear();
    assert_eq!(controller.proceed_to(0).expect("down"), 0);
    assert_eq!(controller.current_level(), 0);
    assert_eq!(
        log.events(),
        [
            "destroy app::L5",
            "destroy app::L4",
            "destroy app::L3",
            "destroy app::L2",
            "destroy app::L1"
        ]
    );
    assert_eq!(controller.context().len(), 1);
}

/// Test listeners see every level on the way up and down
#[test]
fn test_progress_reported_per_level() {
    let locator = ServiceLocator::new("progress");
    let log = EventLog::default();
    levels(&locator, &log, 2);
    let controller = controller(&locator);
    let recorder = Arc::new(Recorder::default());
    controller.add_listener(recorder.clone());

    controller.proceed_to(2).expect("up");
    controller.proceed_to(0).expect("down");

    assert_eq!(*recorder.progress.lock(), [-1, 0, 1, 2, 1, 0]);
}

/// Test a dependency at the same level is built before its dependent
#[test]
fn test_dependencies_within_a_level() {
    let locator = ServiceLocator::new("dependencies");
    let log = EventLog::default();
    bind_levels(
        &locator,
        vec![
            (
                at_level("app::Api", 1).build(),
                recorded("app::Api", Behaviour::default().depends_on(&["app::Db"]), &log),
            ),
            (
                at_level("app::Db", 1).build(),
                recorded("app::Db", Behaviour::default(), &log),
            ),
        ],
    );
    let controller = controller(&locator);

    controller.proceed_to(1).expect("up");
    assert_eq!(log.events(), ["new app::Db", "new app::Api"]);

    let statistics = controller.statistics();
    let last = statistics.last().expect("level 1 statistics");
    assert_eq!(last.level, 1);
    assert_eq!(last.activated, 2);
}

// =============================================================================
// Bounded workers
// =============================================================================

/// Test a level never runs more constructions than the thread bound
#[test]
fn test_worker_bound_and_single_shared_construction() {
    let locator = ServiceLocator::new("bounded");
    let log = EventLog::default();
    let gauge = Gauge::default();
    let shared = Gauge::default();
    let slow = Duration::from_millis(50);
    let mut services = vec![(
        at_level("app::Shared", 1).build(),
        recorded(
            "app::Shared",
            Behaviour::default().sleeping(slow).measured(&shared),
            &log,
        ),
    )];
    for name in ["app::A", "app::B", "app::C"] {
        services.push((
            at_level(name, 1).build(),
            recorded(
                name,
                Behaviour::default()
                    .depends_on(&["app::Shared"])
                    .sleeping(slow)
                    .measured(&gauge),
                &log,
            ),
        ));
    }
    bind_levels(&locator, services);
    let controller = controller(&locator);
    controller
        .set_maximum_useable_threads(2)
        .expect("thread bound");

    controller.proceed_to(1).expect("up");

    assert_eq!(shared.calls(), 1);
    assert_eq!(gauge.calls(), 3);
    assert!(gauge.peak() <= 2, "peak {} exceeds the bound", gauge.peak());
    let statistics = controller.statistics();
    let level = statistics.last().expect("level 1 statistics");
    assert_eq!(level.workers, 2);
    assert_eq!(level.activated, 4);
    assert!(level.peak_blocked <= 1);
}

/// Test a zero thread bound is rejected
#[test]
fn test_zero_threads_rejected() {
    let locator = ServiceLocator::new("zero-threads");
    let controller = controller(&locator);

    let errors = controller
        .set_maximum_useable_threads(0)
        .expect_err("zero threads");
    assert!(errors.has(ErrorKind::InvalidArgument));
    assert_eq!(controller.maximum_useable_threads(), 4);
}

/// Test levels run on a rayon pool
#[test]
fn test_rayon_executor() {
    let locator = ServiceLocator::new("rayon");
    let log = EventLog::default();
    levels(&locator, &log, 3);
    let controller = controller(&locator);
    controller.set_executor(Arc::new(rayon_pool(2).expect("pool")));

    assert_eq!(controller.proceed_to(3).expect("up"), 3);
    assert_eq!(log.events().len(), 4);
}

/// Test a single-service level starts a single worker thread
#[test]
fn test_thread_executor_one_worker_per_small_level() {
    let locator = ServiceLocator::new("threads");
    let log = EventLog::default();
    levels(&locator, &log, 3);
    let controller = controller(&locator);
    let executor = Arc::new(ThreadExecutor::new("levels"));
    controller.set_executor(executor.clone());

    assert_eq!(controller.proceed_to(3).expect("up"), 3);
    assert_eq!(executor.threads_started(), 4);
}

// =============================================================================
// Cancellation
// =============================================================================

/// Test a cancel issued from a listener stops before the next level
#[test]
fn test_cancel_from_listener_observed_before_next_level() {
    let locator = ServiceLocator::new("cancel");
    let log = EventLog::default();
    levels(&locator, &log, 5);
    let controller = controller(&locator);
    let recorder = Arc::new(Recorder {
        cancel_at: Some(2),
        ..Recorder::default()
    });
    controller.add_listener(recorder.clone());

    let errors = expect_err(controller.proceed_to(5));

    assert!(errors.has(ErrorKind::Cancelled));
    assert_eq!(controller.current_level(), 2);
    assert_eq!(*recorder.cancelled.lock(), [2]);
    assert_eq!(
        log.events(),
        ["new app::L0", "new app::L1", "new app::L2"]
    );

    assert_eq!(controller.proceed_to(3).expect("resume"), 3);
}

/// Test the controller cancels the transition in flight
#[test]
fn test_cancel_in_flight_transition() {
    let locator = ServiceLocator::new("cancel-async");
    let log = EventLog::default();
    bind_levels(
        &locator,
        (1..=4)
            .map(|level| {
                let name = format!("app::Slow{level}");
                (
                    at_level(&name, level).build(),
                    recorded(
                        &name,
                        Behaviour::default().sleeping(Duration::from_millis(100)),
                        &log,
                    ),
                )
            })
            .collect(),
    );
    let controller = controller(&locator);

    let future = controller.proceed_to_async(4).expect("start");
    thread::sleep(Duration::from_millis(30));
    assert!(controller.cancel());

    let errors = expect_err(future.get());
    assert!(errors.has(ErrorKind::Cancelled));
    assert!(future.is_cancelled());
    assert!(controller.current_level() < 4);
    assert!(!controller.cancel());
}

/// Test only one transition runs at a time
#[test]
fn test_concurrent_transition_rejected() {
    let locator = ServiceLocator::new("exclusive");
    let log = EventLog::default();
    bind_levels(
        &locator,
        vec![(
            at_level("app::Slow", 1).build(),
            recorded(
                "app::Slow",
                Behaviour::default().sleeping(Duration::from_millis(200)),
                &log,
            ),
        )],
    );
    let controller = controller(&locator);

    let future = controller.proceed_to_async(1).expect("start");
    let errors = expect_err(controller.proceed_to(2));
    assert!(errors.has(ErrorKind::IllegalState));

    assert_eq!(future.get().expect("first transition"), 1);
}

// =============================================================================
// Errors
// =============================================================================

/// Test a failed level is torn down and its failure memoized
#[test]
fn test_failure_stops_below_level_and_is_not_retried() {
    let locator = ServiceLocator::new("failure");
    let log = EventLog::default();
    let attempts = Gauge::default();
    bind_levels(
        &locator,
        vec![
            (
                at_level("app::Base", 0).build(),
                recorded("app::Base", Behaviour::default(), &log),
            ),
            (
                at_level("app::Broken", 1).build(),
                recorded(
                    "app::Broken",
                    Behaviour::default().failing().measured(&attempts),
                    &log,
                ),
            ),
        ],
    );
    let controller = controller(&locator);
    let recorder = Arc::new(Recorder::default());
    controller.add_listener(recorder.clone());

    let errors = expect_err(controller.proceed_to(3));
    assert!(errors.has(ErrorKind::RunLevelActivation));
    assert!(errors.to_string().contains("app::Broken"));
    assert_eq!(controller.current_level(), 0);
    assert_eq!(*recorder.errors.lock(), [(1, "app::Broken".to_string())]);

    let again = expect_err(controller.proceed_to(3));
    assert!(again.has(ErrorKind::RunLevelActivation));
    assert_eq!(attempts.calls(), 1);
    assert_eq!(controller.context().failure_count(), 1);

    controller.proceed_to(-1).expect("down");
    assert_eq!(controller.context().failure_count(), 0);
    expect_err(controller.proceed_to(1));
    assert_eq!(attempts.calls(), 2);
}

/// Test simultaneous failures in one level notify `on_error` once
#[test]
fn test_concurrent_failures_reported_once() {
    for round in 0..10 {
        let locator = ServiceLocator::new(format!("failing-together-{round}"));
        let log = EventLog::default();
        let slow = Duration::from_millis(30);
        bind_levels(
            &locator,
            ["app::BrokenA", "app::BrokenB"]
                .into_iter()
                .map(|name| {
                    (
                        at_level(name, 1).build(),
                        recorded(name, Behaviour::default().sleeping(slow).failing(), &log),
                    )
                })
                .collect(),
        );
        let controller = controller(&locator);
        controller
            .set_maximum_useable_threads(2)
            .expect("two threads");
        let recorder = Arc::new(Recorder::default());
        controller.add_listener(recorder.clone());

        let errors = expect_err(controller.proceed_to(1));
        assert!(errors.has(ErrorKind::RunLevelActivation));
        assert_eq!(recorder.errors.lock().len(), 1, "round {round}");
        assert_eq!(controller.current_level(), 0);
    }
}

/// Test an ignored failure lets the level complete
#[test]
fn test_ignored_failure_continues_level() {
    let locator = ServiceLocator::new("ignore");
    let log = EventLog::default();
    bind_levels(
        &locator,
        vec![
            (
                at_level("app::Broken", 1).build(),
                recorded("app::Broken", Behaviour::default().failing(), &log),
            ),
            (
                at_level("app::Fine", 1).build(),
                recorded("app::Fine", Behaviour::default(), &log),
            ),
        ],
    );
    let controller = controller(&locator);
    controller.add_listener(Arc::new(Recorder {
        ignore_errors: true,
        ..Recorder::default()
    }));

    assert_eq!(controller.proceed_to(1).expect("up"), 1);
    assert_eq!(log.events(), ["new app::Fine"]);
    let statistics = controller.statistics();
    assert_eq!(statistics.last().expect("level 1").activated, 1);
}

/// Test levels below the initial level are rejected
#[test]
fn test_level_below_initial_rejected() {
    let locator = ServiceLocator::new("below-initial");
    let controller = controller(&locator);

    let errors = expect_err(controller.proceed_to(-3));
    assert!(errors.has(ErrorKind::InvalidArgument));
    assert_eq!(controller.current_level(), -2);
}

/// Test one locator accepts a single controller
#[test]
fn test_second_controller_rejected() {
    let locator = ServiceLocator::new("single-controller");
    let _first = controller(&locator);

    let errors = RunLevelController::new(&locator).expect_err("second controller");
    assert!(errors.has(ErrorKind::IllegalState));
}

// =============================================================================
// Activation modes
// =============================================================================

/// Test validating services cannot be created above the active level
#[test]
fn test_validating_lookup_above_active_level_fails() {
    let locator = ServiceLocator::new("validating");
    let log = EventLog::default();
    bind_levels(
        &locator,
        vec![
            (
                at_level("app::Early", 1).build(),
                recorded("app::Early", Behaviour::default(), &log),
            ),
            (
                at_level("app::Late", 3).build(),
                recorded("app::Late", Behaviour::default(), &log),
            ),
        ],
    );
    let controller = controller(&locator);
    controller.proceed_to(1).expect("up");

    let errors = locator
        .get_service("app::Late", &[])
        .expect_err("late lookup");
    assert!(errors.has(ErrorKind::IllegalState));

    controller.proceed_to(3).expect("up");
    let late = locator
        .get_service("app::Late", &[])
        .expect("lookup")
        .expect("some");
    assert_eq!(name_of(&late), "app::Late");
}

/// Test on-demand services are created by lookup and destroyed with their level
#[test]
fn test_on_demand_lookup_before_level() {
    let locator = ServiceLocator::new("on-demand");
    let log = EventLog::default();
    bind_levels(
        &locator,
        vec![(
            at_level("app::Eager", 3)
                .has_metadata(RUN_LEVEL_MODE_KEY, RUN_LEVEL_MODE_ON_DEMAND)
                .build(),
            recorded("app::Eager", Behaviour::default(), &log),
        )],
    );
    let controller = controller(&locator);

    let eager = locator
        .get_service("app::Eager", &[])
        .expect("lookup")
        .expect("some");
    assert_eq!(name_of(&eager), "app::Eager");

    controller.proceed_to(3).expect("up");
    controller.proceed_to(0).expect("down");
    assert_eq!(log.events(), ["new app::Eager", "destroy app::Eager"]);
}

/// Test the configured default mode applies to undeclared descriptors
#[test]
fn test_default_mode_from_config() {
    let locator = ServiceLocator::new("default-mode");
    let log = EventLog::default();
    bind_levels(
        &locator,
        vec![(
            at_level("app::Anytime", 2).build(),
            recorded("app::Anytime", Behaviour::default(), &log),
        )],
    );
    let config = RunLevelConfig {
        default_mode: RunLevelMode::OnDemand,
        ..RunLevelConfig::default()
    };
    let _controller = RunLevelController::with_config(&locator, &config).expect("controller");

    assert!(
        locator
            .get_service("app::Anytime", &[])
            .expect("lookup")
            .is_some()
    );
}

// =============================================================================
// Threading and futures
// =============================================================================

/// Test everything runs on the caller without threads
#[test]
fn test_use_no_threads_runs_inline() {
    let locator = ServiceLocator::new("inline");
    let caller = thread::current().id();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let threads = Arc::clone(&seen);
    bind_levels(
        &locator,
        vec![(
            at_level("app::Local", 1).build(),
            ImplementationFn::new(ImplementationModel::simple("app::Local"), move |_| {
                threads.lock().push(thread::current().id());
                Ok(Instance::new(1_u32))
            })
            .into_arc(),
        )],
    );
    let controller = controller(&locator);
    controller.set_threading_policy(ThreadingPolicy::UseNoThreads);

    let future = controller.proceed_to_async(1).expect("start");

    assert!(future.is_done());
    assert_eq!(future.get().expect("reached"), 1);
    assert_eq!(*seen.lock(), [caller]);
}

/// Test waiting on a transition with a timeout
#[test]
fn test_get_timeout_then_get() {
    let locator = ServiceLocator::new("timeout");
    let log = EventLog::default();
    bind_levels(
        &locator,
        vec![(
            at_level("app::Slow", 1).build(),
            recorded(
                "app::Slow",
                Behaviour::default().sleeping(Duration::from_millis(300)),
                &log,
            ),
        )],
    );
    let controller = controller(&locator);

    let future = controller.proceed_to_async(1).expect("start");
    let errors = expect_err(future.get_timeout(Duration::from_millis(10)));
    assert!(errors.has(ErrorKind::Timeout));
    assert!(!future.is_done());

    assert_eq!(future.get().expect("reached"), 1);
    assert_eq!(future.proposed_level(), 1);
}

/// Test a transition can be awaited from async code
#[tokio::test]
async fn test_async_wait() {
    let locator = ServiceLocator::new("async-wait");
    let log = EventLog::default();
    levels(&locator, &log, 2);
    let controller = controller(&locator);

    let future = controller.proceed_to_async(2).expect("start");
    assert_eq!(future.wait().await.expect("reached"), 2);
    assert_eq!(controller.current_level(), 2);
}
