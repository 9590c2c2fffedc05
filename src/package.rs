//! Resolution of installed packages providing default executables.
//!
//! A daemon without an explicit `exe_path` runs `<package root>/init/<init_name>`,
//! where the package root is located through a [`PackageLocator`]. The
//! [`DirectoryPackageLocator`] looks for `<name>-<version>` directories below a
//! list of search roots.
use std::{cmp::Ordering, fs, path::PathBuf};

use tracing::debug;

use crate::{constants::PACKAGE_INIT_DIR, error::ResolveError};

/// An installed package matching a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Package name.
    pub name: String,
    /// Installed version.
    pub version: String,
    /// Root directory of the installation.
    pub root: PathBuf,
}

/// Finds installed packages by name and version requirement.
pub trait PackageLocator: Send + Sync {
    /// Returns the best installed package satisfying `requirement`.
    fn locate(&self, name: &str, requirement: &str) -> Result<PackageSpec, ResolveError>;
}

/// Comparison operator of a [`VersionRequirement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    /// `~> 1.2.3` means `>= 1.2.3, < 1.3`.
    Pessimistic,
}

/// Parsed version requirement, e.g. `>= 0`, `~> 1.1.3` or `2.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRequirement {
    op: Op,
    version: Vec<u64>,
}

fn parse_version(raw: &str) -> Option<Vec<u64>> {
    let parts = raw
        .trim()
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    (!parts.is_empty()).then_some(parts)
}

fn compare_versions(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            a.get(i)
                .copied()
                .unwrap_or(0)
                .cmp(&b.get(i).copied().unwrap_or(0))
        })
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

impl VersionRequirement {
    /// Parses a requirement string.
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self {
                op: Op::Ge,
                version: vec![0],
            });
        }

        let (op, rest) = [
            ("~>", Op::Pessimistic),
            (">=", Op::Ge),
            ("<=", Op::Le),
            (">", Op::Gt),
            ("<", Op::Lt),
            ("=", Op::Eq),
        ]
        .iter()
        .find_map(|(prefix, op)| trimmed.strip_prefix(prefix).map(|rest| (*op, rest)))
        .unwrap_or((Op::Eq, trimmed));

        let version = parse_version(rest)
            .ok_or_else(|| ResolveError::InvalidRequirement(raw.to_string()))?;
        Ok(Self { op, version })
    }

    /// Whether `version` satisfies this requirement. Unparseable versions never do.
    pub fn matches(&self, version: &str) -> bool {
        let Some(candidate) = parse_version(version) else {
            return false;
        };
        let ord = compare_versions(&candidate, &self.version);
        match self.op {
            Op::Eq => ord.is_eq(),
            Op::Gt => ord.is_gt(),
            Op::Ge => ord.is_ge(),
            Op::Lt => ord.is_lt(),
            Op::Le => ord.is_le(),
            Op::Pessimistic => {
                if ord.is_lt() {
                    return false;
                }
                let mut upper = self.version.clone();
                if upper.len() > 1 {
                    upper.pop();
                }
                if let Some(last) = upper.last_mut() {
                    *last += 1;
                }
                compare_versions(&candidate, &upper).is_lt()
            }
        }
    }
}

/// Locates packages installed as `<root>/<name>-<version>` directories.
#[derive(Debug, Clone, Default)]
pub struct DirectoryPackageLocator {
    roots: Vec<PathBuf>,
}

impl DirectoryPackageLocator {
    /// Creates a locator searching `roots` in order.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    fn candidates<'a>(&'a self, name: &'a str) -> impl Iterator<Item = (String, PathBuf)> + 'a {
        let prefix = format!("{name}-");
        self.roots
            .iter()
            .filter_map(|root| fs::read_dir(root).ok())
            .flat_map(|entries| entries.filter_map(Result::ok))
            .filter(|entry| entry.path().is_dir())
            .filter_map(move |entry| {
                let file_name = entry.file_name();
                let version = file_name.to_str()?.strip_prefix(&prefix)?.to_string();
                Some((version, entry.path()))
            })
    }
}

impl PackageLocator for DirectoryPackageLocator {
    fn locate(&self, name: &str, requirement: &str) -> Result<PackageSpec, ResolveError> {
        let req = VersionRequirement::parse(requirement)?;

        let best = self
            .candidates(name)
            .filter(|(version, _)| req.matches(version))
            .filter_map(|(version, root)| {
                parse_version(&version).map(|parsed| (parsed, version, root))
            })
            .max_by(|a, b| compare_versions(&a.0, &b.0));

        match best {
            Some((_, version, root)) => {
                debug!("Resolved package {name} ({requirement}) to {}", root.display());
                Ok(PackageSpec {
                    name: name.to_string(),
                    version,
                    root,
                })
            }
            None => Err(ResolveError::PackageNotFound {
                name: name.to_string(),
                requirement: requirement.to_string(),
            }),
        }
    }
}

/// Path of the init script `init_name` inside an installed package.
pub fn init_script_path(package: &PackageSpec, init_name: &str) -> PathBuf {
    package.root.join(PACKAGE_INIT_DIR).join(init_name)
}
