//! Run-level listener port

use super::future::RunLevelFuture;
use locus_domain::MultiError;
use locus_domain::value_objects::Descriptor;

/// What the controller does after a failed activation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ErrorAction {
    /// Keep activating the rest of the level
    Ignore,
    /// Tear the level down, settle on the level below and end the transition
    #[default]
    GoToNextLowerLevelAndStop,
}

/// A failed activation, handed to [`RunLevelListener::on_error`]
#[derive(Debug)]
pub struct LevelErrorInformation {
    level: i32,
    descriptor: Descriptor,
    error: MultiError,
    action: ErrorAction,
}

impl LevelErrorInformation {
    pub(crate) fn new(level: i32, descriptor: Descriptor, error: MultiError) -> Self {
        Self {
            level,
            descriptor,
            error,
            action: ErrorAction::default(),
        }
    }

    /// Level being activated
    pub fn level(&self) -> i32 {
        self.level
    }

    /// Descriptor that failed
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// The failure
    pub fn error(&self) -> &MultiError {
        &self.error
    }

    /// Action the controller will take
    pub fn action(&self) -> ErrorAction {
        self.action
    }

    /// Choose the action the controller takes
    pub fn set_action(&mut self, action: ErrorAction) {
        self.action = action;
    }
}

/// Observer of run-level transitions
///
/// Callbacks run on the thread driving the transition or, for errors, on
/// the worker that failed. No controller lock is held while they run, so
/// they may call [`RunLevelFuture::cancel`] or the controller freely.
pub trait RunLevelListener: Send + Sync {
    /// `level` has been fully reached
    fn on_progress(&self, _transition: &RunLevelFuture, _level: i32) {}

    /// The transition was cancelled; `level` is the last level reached
    fn on_cancelled(&self, _transition: &RunLevelFuture, _level: i32) {}

    /// A service failed to activate
    fn on_error(&self, _transition: &RunLevelFuture, _information: &mut LevelErrorInformation) {}
}
