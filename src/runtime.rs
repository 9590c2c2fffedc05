//! Process-wide default context and runtime modes.
use std::{
    env,
    path::PathBuf,
    sync::{OnceLock, PoisonError, RwLock},
};

use crate::{
    config::Context,
    constants::{SYSTEM_BASE_DIR, USER_BASE_DIR},
};

/// Where run directories live by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    /// User home dir (~/.local/share/keepup).
    User,
    /// System dir (/opt/var).
    System,
}

impl RuntimeMode {
    /// Base directory for this mode.
    pub fn base_dir(self) -> PathBuf {
        match self {
            Self::User => env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/"))
                .join(USER_BASE_DIR),
            Self::System => PathBuf::from(SYSTEM_BASE_DIR),
        }
    }
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    mode: RuntimeMode,
    context: Context,
}

impl RuntimeContext {
    fn from_mode(mode: RuntimeMode) -> Self {
        Self {
            mode,
            context: Context::with_base_dir(mode.base_dir()),
        }
    }
}

static CONTEXT: OnceLock<RwLock<RuntimeContext>> = OnceLock::new();

fn context_lock() -> &'static RwLock<RuntimeContext> {
    CONTEXT.get_or_init(|| RwLock::new(RuntimeContext::from_mode(RuntimeMode::System)))
}

/// Resets the default context for `mode`. Can be called multiple times.
pub fn init(mode: RuntimeMode) {
    let mut guard = context_lock()
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *guard = RuntimeContext::from_mode(mode);
}

/// Replaces the default context, e.g. with one loaded from a file.
pub fn set_context(context: Context) {
    let mut guard = context_lock()
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    guard.context = context;
}

/// Returns the current runtime mode.
pub fn mode() -> RuntimeMode {
    context_lock()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .mode
}

/// Snapshot of the default context.
pub fn context() -> Context {
    context_lock()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .context
        .clone()
}
