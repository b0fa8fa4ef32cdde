//! Error types and result definitions for coordination primitives.
//!
//! Provides a single error type, [`ConcurrencyError`], that classifies failures by
//! [`ErrorKind`] and carries captured diagnostic metadata. The same type doubles as the
//! payload stored inside an [`crate::signal::ErrorSignal`], so application failures can be
//! wrapped with [`ErrorKind::Application`] and a source error and later returned unchanged.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for coordination operations using [`ConcurrencyError`].
pub type ConcurrencyResult<T> = Result<T, ConcurrencyError>;

/// Specific categories of errors produced by, or flowing through, the primitives.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A [`crate::job::JobProcessor`] rejected a submission after shutdown began.
    AlreadyStopped,
    /// A wait was aborted by its cancellation condition rather than its primary condition.
    Cancelled,
    /// A wait's explicit duration elapsed.
    Timeout,
    /// The receiving side of an output channel was dropped.
    ChannelClosed,
    /// An operation that spawns tasks was invoked outside of a tokio runtime.
    NoRuntime,
    /// An error produced by calling code and carried through a primitive.
    Application,
}

/// Main error type for coordination operations.
///
/// Cloning is cheap: the source error and backtrace are shared.
#[derive(Debug, Clone)]
pub struct ConcurrencyError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

impl ConcurrencyError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> &Backtrace {
        self.backtrace.as_ref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Returns `true` when the error was caused by a cancellation condition.
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// The stored source is preserved across clones and exposed via [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns `true` if both errors are clones of the same original error.
    ///
    /// Used to verify that a payload error is handed back exactly as stored.
    pub fn same_instance(&self, other: &ConcurrencyError) -> bool {
        Arc::ptr_eq(&self.backtrace, &other.backtrace)
    }

    /// Creates a [`ConcurrencyError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
    ) -> Self {
        ConcurrencyError {
            kind,
            description,
            detail,
            source: None,
            location: Location::caller(),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }
}

impl PartialEq for ConcurrencyError {
    fn eq(&self, other: &ConcurrencyError) -> bool {
        self.kind == other.kind && self.description == other.description
    }
}

impl Hash for ConcurrencyError {
    /// Hashes only the kind and static description, matching [`PartialEq`].
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.description.hash(state);
    }
}

impl fmt::Display for ConcurrencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        write_detail(self.detail.as_deref(), f, 1)?;

        if let Some(source) = &self.source {
            write!(f, "\n  Caused by: {source}")?;
        }

        Ok(())
    }
}

impl error::Error for ConcurrencyError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Writes the detail block with indentation.
fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    if let Some(detail) = detail {
        let indent_str = "  ".repeat(indent);
        if detail.trim().is_empty() {
            write!(f, "\n{indent_str}Detail: <empty>")?;
        } else {
            write!(f, "\n{indent_str}Detail:")?;
            for line in detail.lines() {
                write!(f, "\n{indent_str}  {line}")?;
            }
        }
    }

    Ok(())
}

/// Creates a [`ConcurrencyError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for ConcurrencyError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> ConcurrencyError {
        ConcurrencyError::from_components(kind, Cow::Borrowed(desc), None)
    }
}

/// Creates a [`ConcurrencyError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for ConcurrencyError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> ConcurrencyError {
        ConcurrencyError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()))
    }
}

/// Converts an elapsed tokio timeout into [`ErrorKind::Timeout`].
impl From<tokio::time::error::Elapsed> for ConcurrencyError {
    #[track_caller]
    fn from(err: tokio::time::error::Elapsed) -> ConcurrencyError {
        ConcurrencyError::from_components(
            ErrorKind::Timeout,
            Cow::Borrowed("Wait timed out"),
            None,
        )
        .with_source(err)
    }
}
