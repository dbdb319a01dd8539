//! Error handling types
//!
//! Every public operation of the runtime reports failures through
//! [`MultiError`], an ordered aggregate of one or more [`Error`] causes.
//! Operations that gather several violations (a dynamic configuration
//! commit, a reification pass) push every violation instead of stopping
//! at the first one.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for single-cause operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for public operations that may aggregate causes
pub type MultiResult<T> = std::result::Result<T, MultiError>;

/// Shared, cloneable error source
pub type SharedSource = Arc<dyn std::error::Error + Send + Sync>;

/// Single failure cause
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// An idempotent filter matched a descriptor already in the registry
    #[error("Duplicate service: {descriptor} matches an idempotent filter")]
    DuplicateService {
        /// The existing descriptor that matched
        descriptor: String,
    },

    /// Removal of a descriptor was blocked by an unbind filter
    #[error("Unbind forbidden: {descriptor} is protected by an unbind filter")]
    UnbindForbidden {
        /// The descriptor whose removal was blocked
        descriptor: String,
    },

    /// A validation service rejected an operation
    #[error("Validation failure: {operation} of {descriptor} rejected by {validator}")]
    ValidationFailure {
        /// Operation that was rejected (bind, unbind)
        operation: String,
        /// Descriptor the operation applied to
        descriptor: String,
        /// Name of the rejecting validator
        validator: String,
    },

    /// An implementation has an invalid shape
    #[error("Reification failure for {implementation}: {message}")]
    Reification {
        /// Implementation being analyzed
        implementation: String,
        /// Description of the violated rule
        message: String,
    },

    /// No resolver produced a value for a required injection point
    #[error("Unsatisfied dependency: {injectee}: {message}")]
    UnsatisfiedDependency {
        /// Description of the injection point
        injectee: String,
        /// Why resolution failed
        message: String,
    },

    /// A construction chain revisited a descriptor it is already building
    #[error("Circular dependency detected: {}", participants.join(" -> "))]
    CircularDependency {
        /// Descriptors participating in the cycle, in visiting order
        participants: Vec<String>,
    },

    /// The context for a scope is not registered or not currently active
    #[error("No active context for scope {scope}: {message}")]
    NoActiveContext {
        /// Scope identifier
        scope: String,
        /// Additional detail
        message: String,
    },

    /// A run-level service failed to activate
    #[error("Run level {level} activation failed for {descriptor}: {source}")]
    RunLevelActivation {
        /// Level being activated
        level: i32,
        /// Descriptor that failed
        descriptor: String,
        /// Underlying construction failure
        #[source]
        source: Arc<MultiError>,
    },

    /// An implementation, factory or lifecycle hook failed
    #[error("Service creation failed for {descriptor}: {message}")]
    ServiceCreation {
        /// Descriptor being created
        descriptor: String,
        /// Description of the failure
        message: String,
        /// Optional source error
        #[source]
        source: Option<SharedSource>,
    },

    /// Resource not found error
    #[error("Not found: {resource}")]
    NotFound {
        /// The resource that was not found
        resource: String,
    },

    /// Invalid argument provided to a function
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument
        message: String,
    },

    /// Operation is not valid in the current state
    #[error("Illegal state: {message}")]
    IllegalState {
        /// Description of the state violation
        message: String,
    },

    /// Configuration-related error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
        /// Optional source error
        #[source]
        source: Option<SharedSource>,
    },

    /// I/O operation error
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
        /// Optional source error
        #[source]
        source: Option<SharedSource>,
    },

    /// Malformed descriptor interchange data
    #[error("Parse error at line {line}: {message}")]
    Parse {
        /// One-based line number
        line: usize,
        /// Description of the problem
        message: String,
    },

    /// A run-level transition was cancelled
    #[error("Run level transition cancelled at level {level}")]
    Cancelled {
        /// Last level fully reached
        level: i32,
    },

    /// A wait exceeded its deadline
    #[error("Timed out: {message}")]
    Timeout {
        /// What was being waited for
        message: String,
    },

    /// The owning service locator has been shut down
    #[error("Service locator {locator} has been shut down")]
    Shutdown {
        /// Name of the locator
        locator: String,
    },
}

/// Fieldless discriminant of [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DuplicateService,
    UnbindForbidden,
    ValidationFailure,
    Reification,
    UnsatisfiedDependency,
    CircularDependency,
    NoActiveContext,
    RunLevelActivation,
    ServiceCreation,
    NotFound,
    InvalidArgument,
    IllegalState,
    Configuration,
    Io,
    Parse,
    Cancelled,
    Timeout,
    Shutdown,
}

impl Error {
    /// Discriminant of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateService { .. } => ErrorKind::DuplicateService,
            Self::UnbindForbidden { .. } => ErrorKind::UnbindForbidden,
            Self::ValidationFailure { .. } => ErrorKind::ValidationFailure,
            Self::Reification { .. } => ErrorKind::Reification,
            Self::UnsatisfiedDependency { .. } => ErrorKind::UnsatisfiedDependency,
            Self::CircularDependency { .. } => ErrorKind::CircularDependency,
            Self::NoActiveContext { .. } => ErrorKind::NoActiveContext,
            Self::RunLevelActivation { .. } => ErrorKind::RunLevelActivation,
            Self::ServiceCreation { .. } => ErrorKind::ServiceCreation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::IllegalState { .. } => ErrorKind::IllegalState,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Io { .. } => ErrorKind::Io,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Shutdown { .. } => ErrorKind::Shutdown,
        }
    }
}

// Basic error creation methods
impl Error {
    /// Create a reification error
    pub fn reification<I: Into<String>, M: Into<String>>(implementation: I, message: M) -> Self {
        Self::Reification {
            implementation: implementation.into(),
            message: message.into(),
        }
    }

    /// Create a service creation error without a source
    pub fn creation<D: Into<String>, M: Into<String>>(descriptor: D, message: M) -> Self {
        Self::ServiceCreation {
            descriptor: descriptor.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a service creation error wrapping the failure that caused it
    pub fn creation_with_source<D, E>(descriptor: D, source: E) -> Self
    where
        D: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ServiceCreation {
            descriptor: descriptor.into(),
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an illegal state error
    pub fn illegal_state<S: Into<String>>(message: S) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Create a no-active-context error
    pub fn no_active_context<S: Into<String>, M: Into<String>>(scope: S, message: M) -> Self {
        Self::NoActiveContext {
            scope: scope.into(),
            message: message.into(),
        }
    }
}

// Configuration and I/O error creation methods
impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn configuration_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Configuration {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// Create an I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create an I/O error with source
    pub fn io_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Io {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// Create a parse error for a one-based line number
    pub fn parse<S: Into<String>>(line: usize, message: S) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

// ============================================================================
// Aggregate error
// ============================================================================

/// Ordered aggregate of failure causes
///
/// A `MultiError` is never silently collapsed: every cause pushed into it is
/// kept and reported, in the order it was found.
#[derive(Debug, Clone, Default)]
pub struct MultiError {
    errors: Vec<Error>,
}

impl MultiError {
    /// Create an empty aggregate
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one cause
    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    /// Move every cause of `other` into this aggregate
    pub fn absorb(&mut self, other: MultiError) {
        self.errors.extend(other.errors);
    }

    /// Whether no cause has been recorded
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of causes
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// All causes in insertion order
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Consume into the underlying causes
    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }

    /// First recorded cause
    pub fn first(&self) -> Option<&Error> {
        self.errors.first()
    }

    /// Discriminants of all causes
    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.errors.iter().map(Error::kind).collect()
    }

    /// Whether any cause, including causes nested in run-level failures, has `kind`
    pub fn has(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|error| match error {
            Error::RunLevelActivation { source, .. } => {
                kind == ErrorKind::RunLevelActivation || source.has(kind)
            }
            other => other.kind() == kind,
        })
    }

    /// `Ok(value)` when empty, otherwise `Err(self)`
    pub fn into_result<T>(self, value: T) -> MultiResult<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "no errors"),
            [single] => write!(f, "{single}"),
            many => {
                write!(f, "{} errors occurred:", many.len())?;
                for (index, error) in many.iter().enumerate() {
                    write!(f, "\n  [{}] {}", index + 1, error)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for MultiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|error| error as &(dyn std::error::Error + 'static))
    }
}

impl From<Error> for MultiError {
    fn from(error: Error) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl FromIterator<Error> for MultiError {
    fn from_iter<I: IntoIterator<Item = Error>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl Extend<Error> for MultiError {
    fn extend<I: IntoIterator<Item = Error>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}
