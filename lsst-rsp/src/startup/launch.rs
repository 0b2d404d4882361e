//! What gets executed once the home directory is ready.
use super::config::ConfigError;
use super::environment::LaunchEnvironment;
use crate::defaults::{DEFAULT_KERNEL_NAME, LAB_COMMAND};
use ::fs::file::reader::FileReader;
use serde::Deserialize;
use std::path::Path;

/// Environment variables forwarded to the Lab as command line settings.
const TIMEOUT_FLAGS: [(&str, &str); 6] = [
    ("NO_ACTIVITY_TIMEOUT", "ServerApp.shutdown_no_activity_timeout"),
    ("CULL_KERNEL_IDLE_TIMEOUT", "MappingKernelManager.cull_idle_timeout"),
    ("CULL_KERNEL_CONNECTED", "MappingKernelManager.cull_connected"),
    ("CULL_KERNEL_INTERVAL", "MappingKernelManager.cull_interval"),
    ("CULL_TERMINAL_INACTIVE_TIMEOUT", "TerminalManager.cull_inactive_timeout"),
    ("CULL_TERMINAL_INTERVAL", "TerminalManager.cull_interval"),
];

pub fn timeout_flags(env: &LaunchEnvironment) -> Vec<String> {
    TIMEOUT_FLAGS
        .iter()
        .filter_map(|(var, setting)| {
            env.get_non_empty(var)
                .map(|value| format!("--{setting}={value}"))
        })
        .collect()
}

/// Full command line of the interactive Lab.
pub fn lab_command(env: &LaunchEnvironment, notebook_dir: &Path, debug: bool) -> Vec<String> {
    let log_level = if debug { "DEBUG" } else { "INFO" };
    let mut argv: Vec<String> = vec![
        LAB_COMMAND.to_string(),
        "--ip=0.0.0.0".to_string(),
        "--port=8888".to_string(),
        "--no-browser".to_string(),
        format!("--notebook-dir={}", notebook_dir.display()),
        format!("--log-level={log_level}"),
        "--ContentsManager.allow_hidden=True".to_string(),
        "--FileContentsManager.hide_globs=[]".to_string(),
        "--KernelSpecManager.ensure_native_kernel=False".to_string(),
        "--QtExporter.enabled=False".to_string(),
        "--PDFExporter.enabled=False".to_string(),
        "--WebPDFExporter.allow_chromium_download=True".to_string(),
        format!("--MappingKernelManager.default_kernel_name={DEFAULT_KERNEL_NAME}"),
        "--LabApp.check_for_updates_class=jupyterlab.NeverCheckForUpdate".to_string(),
    ];
    argv.extend(timeout_flags(env));
    argv
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionType {
    Nb,
    Command,
}

/// Work description of a non-interactive Lab pod.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NonInteractiveCommand {
    #[serde(rename = "type")]
    pub kind: ExecutionType,
    pub kernel: String,
    pub command: Vec<String>,
}

impl NonInteractiveCommand {
    pub fn load<R: FileReader>(reader: &R, path: &Path) -> Result<Self, ConfigError> {
        let content = reader.read(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            err,
        })?;
        serde_json::from_str(&content).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            err,
        })
    }

    /// Command line to execute. Only `command` executions can be run.
    pub fn argv(&self) -> Result<&[String], ConfigError> {
        if self.kind != ExecutionType::Command {
            return Err(ConfigError::Unsupported(format!(
                "{:?} execution (kernel {})",
                self.kind, self.kernel
            )));
        }
        if self.command.is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        Ok(&self.command)
    }
}
