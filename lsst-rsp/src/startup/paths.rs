use crate::defaults::{
    ETC_PATH, ETC_PATH_ENV_VAR, FALLBACK_HOME, JUPYTERLAB_CONFIG_DIR, JUPYTERLAB_CONFIG_ENV_VAR,
    RUNTIME_MOUNTS_DIR, RUNTIME_MOUNTS_ENV_VAR, SCRATCH_PATH, SCRATCH_PATH_ENV_VAR, STARTUP_PATH,
    STARTUP_PATH_ENV_VAR,
};
use std::env;
use std::path::PathBuf;

/// Filesystem roots used while starting a Lab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupPaths {
    pub home: PathBuf,
    pub etc: PathBuf,
    pub runtime_mounts: PathBuf,
    pub jupyterlab_config: PathBuf,
    pub scratch: PathBuf,
    pub startup: PathBuf,
}

impl Default for StartupPaths {
    fn default() -> Self {
        Self {
            home: PathBuf::from(FALLBACK_HOME),
            etc: PathBuf::from(ETC_PATH),
            runtime_mounts: PathBuf::from(RUNTIME_MOUNTS_DIR),
            jupyterlab_config: PathBuf::from(JUPYTERLAB_CONFIG_DIR),
            scratch: PathBuf::from(SCRATCH_PATH),
            startup: PathBuf::from(STARTUP_PATH),
        }
    }
}

impl StartupPaths {
    /// Defaults, overridden by the process environment where the corresponding variable is set
    /// and not empty.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            home: env_path("HOME").unwrap_or(default.home),
            etc: env_path(ETC_PATH_ENV_VAR).unwrap_or(default.etc),
            runtime_mounts: env_path(RUNTIME_MOUNTS_ENV_VAR).unwrap_or(default.runtime_mounts),
            jupyterlab_config: env_path(JUPYTERLAB_CONFIG_ENV_VAR)
                .unwrap_or(default.jupyterlab_config),
            scratch: env_path(SCRATCH_PATH_ENV_VAR).unwrap_or(default.scratch),
            startup: env_path(STARTUP_PATH_ENV_VAR).unwrap_or(default.startup),
        }
    }

    /// Every root placed below `base`, handy for tests.
    pub fn rooted_at(base: &std::path::Path) -> Self {
        Self {
            home: base.join("home"),
            etc: base.join("etc"),
            runtime_mounts: base.join("runtime"),
            jupyterlab_config: base.join("jupyterlab"),
            scratch: base.join("scratch"),
            startup: base.join("lab_startup"),
        }
    }

    pub fn with_home(self, home: PathBuf) -> Self {
        Self { home, ..self }
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var(name).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}
