//! Environment variables the Lab process is started with.
use super::environment::LaunchEnvironment;
use super::error::StartupError;
use super::paths::StartupPaths;
use crate::command::Command;
use crate::defaults::{DEFAULT_FIREFLY_ROUTE, DEFAULT_INSTANCE_URL, FALLBACK_BUTLER_CACHE};
use crate::utils::get_digest;
use ::fs::directory_manager::{DirectoryManager, DirectoryManagerFs};
use nix::unistd::{AccessFlags, User, access, getuid};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const REQUIRED_VARS: [&str; 2] = ["JUPYTERHUB_BASE_URL", "HOME"];

const SUDO_VARS: [&str; 4] = ["SUDO_USER", "SUDO_UID", "SUDO_GID", "SUDO_COMMAND"];

const CPU_VARS: [&str; 10] = [
    "CPU_LIMIT",
    "CPU_COUNT",
    "GOTO_NUM_THREADS",
    "MKL_DOMAIN_NUM_THREADS",
    "MPI_NUM_THREADS",
    "NUMEXPR_NUM_THREADS",
    "NUMEXPR_MAX_THREADS",
    "OMP_NUM_THREADS",
    "OPENBLAS_NUM_THREADS",
    "RAYON_NUM_THREADS",
];

/// Idle and culling defaults, in the units the Lab expects.
pub const TIMEOUT_DEFAULTS: [(&str, &str); 6] = [
    ("NO_ACTIVITY_TIMEOUT", "120000"),
    ("CULL_KERNEL_IDLE_TIMEOUT", "43200"),
    ("CULL_KERNEL_CONNECTED", "True"),
    ("CULL_KERNEL_INTERVAL", "300"),
    ("CULL_TERMINAL_INACTIVE_TIMEOUT", "120000"),
    ("CULL_TERMINAL_INTERVAL", "300"),
];

const CREDENTIAL_FILE_VARS: [&str; 2] = ["AWS_SHARED_CREDENTIALS_FILE", "PGPASSFILE"];

const USER_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Fails with `EBADENV` for the first required variable missing.
pub fn check_required(env: &LaunchEnvironment) -> Result<(), StartupError> {
    match REQUIRED_VARS.iter().find(|var| env.get_non_empty(var).is_none()) {
        Some(var) => Err(StartupError::bad_env(var)),
        None => Ok(()),
    }
}

/// Runs every environment adjustment in order, stopping at the first failure.
pub fn configure_environment(
    env: &mut LaunchEnvironment,
    paths: &StartupPaths,
) -> Result<(), StartupError> {
    debug!("configuring environment for the Lab process");
    set_user(env)?;
    remove_sudo_env(env);
    set_tmpdir_if_scratch_available(env, &paths.scratch);
    set_butler_cache(env, &paths.scratch);
    set_cpu_variables(env);
    set_image_digest(env);
    expand_panda_tilde(env, &paths.home);
    set_timeout_defaults(env);
    set_launch_params(env);
    set_firefly_variables(env);
    env.set("JUPYTER_PREFER_ENV_PATH", "no");
    set_credential_variables(env, &paths.home);
    debug!(env = ?env.as_map(), "Lab process environment");
    Ok(())
}

pub fn set_user(env: &mut LaunchEnvironment) -> Result<(), StartupError> {
    if env.get_non_empty("USER").is_some() {
        return Ok(());
    }
    let user = user_from_uid()
        .or_else(user_from_id_command)
        .ok_or_else(|| StartupError::bad_env("USER"))?;
    debug!(%user, "determined user name");
    env.set("USER", user);
    Ok(())
}

fn user_from_uid() -> Option<String> {
    User::from_uid(getuid())
        .inspect_err(|err| debug!(%err, "uid lookup failed"))
        .ok()
        .flatten()
        .map(|u| u.name)
        .filter(|name| !name.is_empty())
}

fn user_from_id_command() -> Option<String> {
    Command::ignoring_failures()
        .run(&["id", "-u", "-n"], None, None, Some(USER_LOOKUP_TIMEOUT))
        .ok()
        .flatten()
        .map(|result| result.stdout.trim().to_string())
        .filter(|name| !name.is_empty())
}

pub fn remove_sudo_env(env: &mut LaunchEnvironment) {
    SUDO_VARS.iter().for_each(|var| {
        env.remove(var);
    });
}

/// Ensures `<scratch>/<user>/<subdir>` is a writable directory and returns it.
///
/// Sets `SCRATCH_DIR` to the user's scratch directory on success. Missing scratch space is
/// normal, so every failure only gets logged.
pub fn check_user_scratch_subdir<D: DirectoryManager>(
    env: &mut LaunchEnvironment,
    scratch_root: &Path,
    subdir: &str,
    directory_manager: &D,
) -> Option<PathBuf> {
    if !scratch_root.is_dir() {
        debug!(path = %scratch_root.display(), "scratch path is not a directory");
        return None;
    }
    let Some(user) = env.get_non_empty("USER").map(str::to_string) else {
        warn!("could not determine user from environment");
        return None;
    };
    let user_scratch_dir = match (env.get("HOMEDIR_SCHEMA"), user.chars().next()) {
        (Some("initialThenUsername"), Some(initial)) => {
            scratch_root.join(initial.to_string()).join(&user)
        }
        _ => scratch_root.join(&user),
    };
    let path = user_scratch_dir.join(subdir);
    if let Err(err) = directory_manager.create(&path) {
        warn!(path = %path.display(), %err, "could not create scratch directory");
        return None;
    }
    if let Err(err) = access(&path, AccessFlags::W_OK) {
        warn!(path = %path.display(), %err, "scratch directory is not writable");
        return None;
    }
    debug!(path = %path.display(), "using user scratch path");
    env.set("SCRATCH_DIR", user_scratch_dir.display().to_string());
    Some(path)
}

pub fn set_tmpdir_if_scratch_available(env: &mut LaunchEnvironment, scratch_root: &Path) {
    if let Some(tmpdir) = env.get_non_empty("TMPDIR") {
        debug!(%tmpdir, "not setting TMPDIR: already set");
        return;
    }
    match check_user_scratch_subdir(env, scratch_root, "tmp", &DirectoryManagerFs::default()) {
        Some(path) => env.set("TMPDIR", path.display().to_string()),
        None => debug!("did not set TMPDIR"),
    }
}

pub fn set_butler_cache(env: &mut LaunchEnvironment, scratch_root: &Path) {
    const VAR: &str = "DAF_BUTLER_CACHE_DIRECTORY";
    if let Some(dir) = env.get_non_empty(VAR) {
        debug!(%dir, "not setting {VAR}: already set");
        return;
    }
    let cache = check_user_scratch_subdir(
        env,
        scratch_root,
        "butler_cache",
        &DirectoryManagerFs::default(),
    )
    .map(|path| path.display().to_string())
    .unwrap_or_else(|| FALLBACK_BUTLER_CACHE.to_string());
    env.set(VAR, cache);
}

/// Whole number of CPUs from `CPU_LIMIT`, never below 1.
pub fn cpu_limit(value: Option<&str>) -> u64 {
    value
        .unwrap_or("1")
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|limit| limit.is_finite())
        .map(|limit| limit.trunc())
        .filter(|limit| *limit >= 1.0)
        .map(|limit| limit as u64)
        .unwrap_or(1)
}

pub fn set_cpu_variables(env: &mut LaunchEnvironment) {
    let limit = cpu_limit(env.get("CPU_LIMIT")).to_string();
    CPU_VARS.iter().for_each(|var| env.set(*var, limit.clone()));
    debug!(cpu_limit = %limit, "set CPU threading variables");
}

pub fn set_image_digest(env: &mut LaunchEnvironment) {
    let digest = get_digest();
    if digest.is_empty() {
        debug!("could not get image digest");
    } else {
        env.set("IMAGE_DIGEST", digest);
    }
}

/// Replaces a leading `~` or `~<user>` in `PANDA_CONFIG_ROOT` with the home directory.
pub fn expand_panda_tilde(env: &mut LaunchEnvironment, home: &Path) {
    let Some(value) = env.get("PANDA_CONFIG_ROOT").map(str::to_string) else {
        return;
    };
    let user = env.get_or("USER", "");
    let (first, rest) = value.split_once('/').unwrap_or((value.as_str(), ""));
    if first == "~" || (!user.is_empty() && first.strip_prefix('~') == Some(user)) {
        let expanded = rest
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(home.to_path_buf(), |path, part| path.join(part));
        debug!(from = %value, to = %expanded.display(), "expanded PANDA_CONFIG_ROOT");
        env.set("PANDA_CONFIG_ROOT", expanded.display().to_string());
    } else if first.starts_with('~') {
        warn!(path = %value, "cannot expand tilde");
    }
}

pub fn set_timeout_defaults(env: &mut LaunchEnvironment) {
    TIMEOUT_DEFAULTS
        .iter()
        .for_each(|(var, value)| env.set_default(var, value));
}

pub fn set_launch_params(env: &mut LaunchEnvironment) {
    if let Some(base_url) = env.get_non_empty("JUPYTERHUB_BASE_URL") {
        let hub_path = if base_url.ends_with('/') {
            format!("{base_url}hub")
        } else {
            format!("{base_url}/hub")
        };
        env.set("JUPYTERHUB_PATH", hub_path);
    }
    let host = env
        .get_non_empty("EXTERNAL_INSTANCE_URL")
        .and_then(|url| Url::parse(url).ok())
        .and_then(|url| url.host_str().map(str::to_string));
    if let Some(host) = host {
        env.set("EXTERNAL_HOST", host);
    }
}

pub fn set_firefly_variables(env: &mut LaunchEnvironment) {
    let firefly_url = match env.get_non_empty("EXTERNAL_FIREFLY_URL") {
        Some(url) => url.to_string(),
        None => {
            let route = env.get_or("FIREFLY_ROUTE", DEFAULT_FIREFLY_ROUTE);
            let instance = env.get_or("EXTERNAL_INSTANCE_URL", DEFAULT_INSTANCE_URL);
            format!(
                "{}/{}",
                instance.trim_end_matches('/'),
                route.trim_start_matches('/')
            )
        }
    };
    debug!(%firefly_url, "set firefly URL");
    env.set("FIREFLY_URL", firefly_url);
}

/// Points credential files at private copies under `~/.lsst`, keeping the originals as `ORIG_*`.
pub fn set_credential_variables(env: &mut LaunchEnvironment, home: &Path) {
    let cred_dir = home.join(".lsst");
    env.set("USER_CREDENTIALS_DIR", cred_dir.display().to_string());
    for var in CREDENTIAL_FILE_VARS {
        let Some(original) = env.get_non_empty(var).map(str::to_string) else {
            continue;
        };
        let Some(file_name) = Path::new(&original).file_name() else {
            warn!(%var, path = %original, "credential variable does not name a file");
            continue;
        };
        let private = cred_dir.join(file_name).display().to_string();
        debug!(%var, to = %private, "redirected credential file");
        env.set(format!("ORIG_{var}"), original);
        env.set(var, private);
    }
}
