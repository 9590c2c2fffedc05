//! Lazily evaluated configuration values.
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::error::ResolveError;

type Resolver<T> = Arc<dyn Fn() -> Result<T, ResolveError> + Send + Sync>;

/// A configurable attribute: either a literal or a computation evaluated on
/// every read.
///
/// Results are never cached, so a resolver observing the environment (such as
/// a package lookup) reflects changes between reads.
pub enum Deferred<T> {
    /// Fixed value.
    Literal(T),
    /// Zero-argument resolver, run on each [`Deferred::resolve`].
    Computed(Resolver<T>),
}

impl<T: Clone> Deferred<T> {
    /// Wraps a literal value.
    pub fn literal(value: impl Into<T>) -> Self {
        Self::Literal(value.into())
    }

    /// Wraps an infallible computation.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(move || Ok(f())))
    }

    /// Wraps a fallible computation.
    pub fn try_computed<F>(f: F) -> Self
    where
        F: Fn() -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    /// Evaluates the value.
    pub fn resolve(&self) -> Result<T, ResolveError> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Computed(f) => f(),
        }
    }
}

impl<T: Clone> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Computed(f) => Self::Computed(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl<T> From<T> for Deferred<T> {
    fn from(value: T) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for Deferred<String> {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<&str> for Deferred<PathBuf> {
    fn from(value: &str) -> Self {
        Self::Literal(PathBuf::from(value))
    }
}

impl From<&Path> for Deferred<PathBuf> {
    fn from(value: &Path) -> Self {
        Self::Literal(value.to_path_buf())
    }
}

impl From<Vec<&str>> for Deferred<Vec<String>> {
    fn from(value: Vec<&str>) -> Self {
        Self::Literal(value.into_iter().map(str::to_string).collect())
    }
}

/// Resolves an optional attribute, falling back to `default` when unset.
pub(crate) fn resolve_or<T, F>(value: &Option<Deferred<T>>, default: F) -> Result<T, ResolveError>
where
    T: Clone,
    F: FnOnce() -> Result<T, ResolveError>,
{
    match value {
        Some(value) => value.resolve(),
        None => default(),
    }
}
