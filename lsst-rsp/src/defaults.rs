pub const APP_NAME: &str = "nublado";
pub const RSP_VERSION: &str = env!("CARGO_PKG_VERSION");

// Paths
pub const ETC_PATH: &str = "/etc";
pub const TOP_DIR_PATH: &str = "/opt/lsst/software";
pub const RUNTIME_MOUNTS_DIR: &str = "/opt/lsst/software/jupyterlab";
pub const JUPYTERLAB_CONFIG_DIR: &str = "/opt/lsst/software/jupyterlab";
pub const DISCOVERY_PATH: &str = "/etc/nublado/discovery/v1.json";
pub const STARTUP_PATH: &str = "/lab_startup";
pub const SCRATCH_PATH: &str = "/scratch";
pub const FALLBACK_HOME: &str = "/tmp";
pub const FALLBACK_BUTLER_CACHE: &str = "/tmp/butler_cache";

// Path overrides
pub const ETC_PATH_ENV_VAR: &str = "RSP_ETC_PATH";
pub const RUNTIME_MOUNTS_ENV_VAR: &str = "RSP_RUNTIME_MOUNTS_DIR";
pub const JUPYTERLAB_CONFIG_ENV_VAR: &str = "JUPYTERLAB_CONFIG_DIR";
pub const DISCOVERY_PATH_ENV_VAR: &str = "RSP_DISCOVERY_PATH";
pub const STARTUP_PATH_ENV_VAR: &str = "RSP_STARTUP_PATH";
pub const SCRATCH_PATH_ENV_VAR: &str = "SCRATCH_PATH";

// Startup files
pub const ENV_FILENAME: &str = "env.json";
pub const ARGS_FILENAME: &str = "args.json";
pub const NONINTERACTIVE_FILENAME: &str = "noninteractive.json";
pub const NONINTERACTIVE_COMMAND_PATH: &str = "noninteractive/command/command.json";
pub const SECRET_TOKEN_PATH: &str = "secrets/token";
pub const LEGACY_TOKEN_PATH: &str = "environment/ACCESS_TOKEN";
pub const INSTANCE_URL_PATH: &str = "environment/EXTERNAL_INSTANCE_URL";

/// sha256 sums of previously shipped versions of `20-logging.py`.
///
/// A user profile matching one of these is out of date and can be replaced. Anything else was
/// modified locally and is left alone.
pub const PREVIOUS_LOGGING_CHECKSUMS: &[&str] =
    &["2997fe99eb12846a1b724f0b82b9e5e6acbd1d4c29ceb9c9ae8f1ef5503892ec"];

/// Maximum number of outputs kept by a notebook cell. Prevents OOM kills on chatty cells.
pub const MAX_NUMBER_OUTPUTS: u64 = 10000;

pub const LOGGING_PROFILE_NAME: &str = "20-logging.py";
pub const DIRCOLORS_NAME: &str = "dircolors.ansi-universal";
pub const ABNORMAL_STARTUP_FILE_PREFIX: &str = "ABNORMAL_STARTUP_";

// Lab
pub const LAB_COMMAND: &str = "jupyterhub-singleuser";
pub const DEFAULT_KERNEL_NAME: &str = "lsst";
pub const DEFAULT_FIREFLY_ROUTE: &str = "/firefly";
pub const DEFAULT_INSTANCE_URL: &str = "https://localhost:8888";
pub const MARKDOWN_VIEWER: &str = "Markdown Preview";
