//! Supervisor-wide defaults shared by every daemon definition.
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, LazyLock},
    time::Duration,
};

use crate::{
    constants::{DEFAULT_STOP_DELAY, SYSTEM_BASE_DIR},
    error::DaemonError,
    package::DirectoryPackageLocator,
};

/// Defaults inherited by daemons that do not override them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Context {
    /// Directory under which run directories are derived.
    pub base_dir: PathBuf,
    /// Whether missing run directories are created.
    pub make_run_dir: bool,
    /// Whether daemons are stopped when the supervisor exits.
    pub stop_on_exit: bool,
    /// Time between the termination signal and the forceful kill.
    #[serde(deserialize_with = "deserialize_seconds")]
    pub stop_delay: Duration,
    /// Roots searched for installed packages.
    pub package_dirs: Vec<PathBuf>,
    /// Tracing filter directive for [`crate::logging::init_logging`].
    pub log_level: Option<String>,
}

impl Default for Context {
    fn default() -> Self {
        Self::with_base_dir(PathBuf::from(SYSTEM_BASE_DIR))
    }
}

impl Context {
    /// Default context rooted at `base_dir`.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            make_run_dir: true,
            stop_on_exit: false,
            stop_delay: DEFAULT_STOP_DELAY,
            package_dirs: Vec::new(),
            log_level: None,
        }
    }

    /// Package locator searching this context's package directories.
    pub fn package_locator(&self) -> Arc<DirectoryPackageLocator> {
        Arc::new(DirectoryPackageLocator::new(self.package_dirs.clone()))
    }
}

fn deserialize_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    let seconds = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| D::Error::custom(format!("invalid stop_delay '{seconds}'")))
}

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("valid env var pattern")
});

/// Expands `$VAR` and `${VAR}` references from the environment.
fn expand_env_vars(input: &str) -> Result<String, DaemonError> {
    let mut missing = None;
    let expanded = ENV_VAR.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        env::var(var_name).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| var_name.to_string());
            String::new()
        })
    });

    match missing {
        Some(var_name) => Err(DaemonError::MissingEnvVar(var_name)),
        None => Ok(expanded.into_owned()),
    }
}

fn anchor(path: &mut PathBuf, root: &Path) {
    if path.is_relative() {
        *path = root.join(&*path);
    }
}

/// Loads a [`Context`] from a YAML file, expanding environment variables.
///
/// Relative directories are resolved against the file's parent directory.
pub fn load_context(config_path: &Path) -> Result<Context, DaemonError> {
    let content = fs::read_to_string(config_path).map_err(|e| {
        DaemonError::ConfigReadError(std::io::Error::new(
            e.kind(),
            format!("{} ({})", e, config_path.display()),
        ))
    })?;

    let expanded = expand_env_vars(&content)?;
    let mut context: Context =
        serde_yaml::from_str(&expanded).map_err(DaemonError::ConfigParseError)?;

    let root = config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    anchor(&mut context.base_dir, &root);
    for dir in &mut context.package_dirs {
        anchor(dir, &root);
    }

    Ok(context)
}
