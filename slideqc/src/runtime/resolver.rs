//! Runtime environment discovery.
//!
//! Stages are Python scripts executed by a bundled interpreter. The resolver
//! locates the installed toolchain by walking an explicit precedence order -
//! override variable, conventional install locations, then relative to the
//! running binary - and accepts the first candidate carrying both required
//! markers. No fuzzy search, no network.

use crate::errors::EnvironmentError;
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

static SHARED_RESOLVER: Lazy<Arc<EnvResolver>> = Lazy::new(|| Arc::new(EnvResolver::new()));

/// Environment variable overriding the toolchain root.
pub const HOME_ENV_VAR: &str = "SLIDEQC_HOME";

/// Interpreter location inside a toolchain root.
#[cfg(unix)]
const INTERPRETER_REL: &str = "venv/bin/python3";
#[cfg(windows)]
const INTERPRETER_REL: &str = "venv\\Scripts\\python.exe";

/// Scripts directory inside a toolchain root.
const SCRIPTS_REL: &str = "scripts";

/// A resolved, validated toolchain installation.
///
/// Resolved once per resolver and treated as immutable afterwards; safe to
/// read from multiple concurrent run attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEnvironment {
    /// The toolchain root directory.
    pub root: PathBuf,
    /// Path to the interpreter binary.
    pub interpreter: PathBuf,
    /// Directory holding the stage scripts.
    pub scripts_dir: PathBuf,
    /// Whether both markers were present at resolution time.
    pub validated: bool,
}

impl RuntimeEnvironment {
    /// Builds an environment from a root, without checking markers.
    ///
    /// Used by callers that already know the layout (tests, embedded setups).
    #[must_use]
    pub fn from_root_unchecked(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            interpreter: root.join(INTERPRETER_REL),
            scripts_dir: root.join(SCRIPTS_REL),
            root,
            validated: false,
        }
    }
}

/// Resolves and caches the runtime environment.
#[derive(Debug)]
pub struct EnvResolver {
    override_root: Option<PathBuf>,
    explicit_candidates: Option<Vec<PathBuf>>,
    cache: OnceCell<RuntimeEnvironment>,
}

impl Default for EnvResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvResolver {
    /// Creates a resolver with the standard candidate list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            override_root: None,
            explicit_candidates: None,
            cache: OnceCell::new(),
        }
    }

    /// The process-wide resolver with the standard candidate list.
    ///
    /// All controllers share it by default, so the environment is resolved
    /// once per process lifetime.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        SHARED_RESOLVER.clone()
    }

    /// Creates a resolver whose first candidate is an explicit root.
    #[must_use]
    pub fn with_override(root: impl Into<PathBuf>) -> Self {
        Self {
            override_root: Some(root.into()),
            explicit_candidates: None,
            cache: OnceCell::new(),
        }
    }

    /// Creates a resolver restricted to exactly the given candidate roots.
    ///
    /// Environment variables and conventional install locations are ignored;
    /// only the listed roots are probed, in order.
    #[must_use]
    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self {
            override_root: None,
            explicit_candidates: Some(candidates),
            cache: OnceCell::new(),
        }
    }

    /// The candidate roots, in precedence order.
    #[must_use]
    pub fn candidates(&self) -> Vec<PathBuf> {
        if let Some(explicit) = &self.explicit_candidates {
            return explicit.clone();
        }

        let mut candidates = Vec::new();

        if let Some(root) = &self.override_root {
            candidates.push(root.clone());
        }
        if let Some(root) = std::env::var_os(HOME_ENV_VAR) {
            candidates.push(PathBuf::from(root));
        }

        #[cfg(unix)]
        {
            candidates.push(PathBuf::from("/opt/slideqc"));
            if let Some(home) = std::env::var_os("HOME") {
                candidates.push(PathBuf::from(home).join(".local/share/slideqc"));
            }
        }
        #[cfg(windows)]
        {
            if let Some(appdata) = std::env::var_os("LOCALAPPDATA") {
                candidates.push(PathBuf::from(appdata).join("slideqc"));
            }
            if let Some(programs) = std::env::var_os("PROGRAMFILES") {
                candidates.push(PathBuf::from(programs).join("slideqc"));
            }
        }

        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                candidates.push(dir.join("runtime"));
            }
        }

        candidates
    }

    /// Resolves the environment, caching the first success.
    ///
    /// Repeated calls return the identical cached value; callers must not
    /// re-resolve per stage.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::NotFound`] listing every candidate tried
    /// when none carries both markers.
    pub fn resolve(&self) -> Result<&RuntimeEnvironment, EnvironmentError> {
        self.cache.get_or_try_init(|| self.resolve_uncached())
    }

    /// Resolves without touching the cache.
    ///
    /// # Errors
    ///
    /// Same as [`EnvResolver::resolve`].
    pub fn resolve_uncached(&self) -> Result<RuntimeEnvironment, EnvironmentError> {
        let candidates = self.candidates();
        for root in &candidates {
            if let Some(env) = validate_root(root) {
                return Ok(env);
            }
        }
        Err(EnvironmentError::NotFound { candidates })
    }
}

/// Accepts a root only when both markers exist.
fn validate_root(root: &Path) -> Option<RuntimeEnvironment> {
    let interpreter = root.join(INTERPRETER_REL);
    let scripts_dir = root.join(SCRIPTS_REL);
    if interpreter.is_file() && scripts_dir.is_dir() {
        Some(RuntimeEnvironment {
            root: root.to_path_buf(),
            interpreter,
            scripts_dir,
            validated: true,
        })
    } else {
        None
    }
}
