//! Dask dashboard configuration.
//!
//! Older Lab images left behind dask configuration that is either empty or points the
//! dashboard at a URL that breaks with per-user domains. Empty files are moved aside, stale
//! links are rewritten, and a dashboard link is injected when no file provides one.
use super::error::{PathContext, StartupError};
use ::fs::file::reader::FileReader;
use ::fs::file::renamer::FileRenamer;
use ::fs::file::writer::FileWriter;
use ::fs::utils::shared_file_permissions;
use chrono::NaiveDate;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const OLD_LINK_TEMPLATE: &str = "{EXTERNAL_INSTANCE_URL}{JUPYTERHUB_SERVICE_PREFIX}";
const NEW_LINK_TEMPLATE: &str = "{JUPYTERHUB_PUBLIC_URL}";
pub const DASHBOARD_LINK: &str = "{JUPYTERHUB_PUBLIC_URL}proxy/{port}/status";
const DASHBOARD_FILE: &str = "dashboard.yaml";

pub struct DaskConfig<'a, F>
where
    F: FileReader + FileWriter + FileRenamer,
{
    files: &'a F,
    dir: PathBuf,
    today: NaiveDate,
}

impl<'a, F> DaskConfig<'a, F>
where
    F: FileReader + FileWriter + FileRenamer,
{
    pub fn new(files: &'a F, home: &Path, today: NaiveDate) -> Self {
        Self {
            files,
            dir: home.join(".config").join("dask"),
            today,
        }
    }

    pub fn setup(&self) -> Result<(), StartupError> {
        debug!("setting up dask dashboard proxy information");
        let good = self.dir.is_dir() && self.tidy_existing_config();
        if !good {
            self.inject_dashboard_link()?;
        }
        Ok(())
    }

    fn backup_path(&self, file: &Path) -> PathBuf {
        PathBuf::from(format!(
            "{}.{}",
            file.display(),
            self.today.format("%Y-%m-%d")
        ))
    }

    /// Returns whether at least one file ends up with a working dashboard link.
    fn tidy_existing_config(&self) -> bool {
        let entries = self
            .files
            .dir_entries(&self.dir)
            .inspect_err(|err| warn!(path = %self.dir.display(), %err, "cannot list dask config"))
            .unwrap_or_default();
        let mut good = false;
        for suffix in ["yaml", "yml"] {
            for file in entries
                .iter()
                .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == suffix))
            {
                let backup = self.backup_path(file);
                let Some(config) = self.clean_empty_config(file, &backup) else {
                    continue;
                };
                good |= self.fix_dashboard(config, file, &backup);
            }
        }
        good
    }

    fn clean_empty_config(&self, file: &Path, backup: &Path) -> Option<Value> {
        let flensed = self
            .files
            .read(file)
            .map_err(|err| err.to_string())
            .and_then(|content| {
                serde_yaml::from_str::<Value>(&content).map_err(|err| err.to_string())
            })
            .inspect_err(|err| error!(path = %file.display(), %err, "cannot load dask config"))
            .ok()
            .filter(Value::is_mapping)
            .and_then(flense);
        if flensed.is_none() {
            warn!(path = %file.display(), backup = %backup.display(), "dask config is empty; moving it aside");
            if let Err(err) = self.files.rename(file, backup) {
                error!(path = %file.display(), %err, "cannot move dask config aside");
            }
        }
        flensed
    }

    fn fix_dashboard(&self, mut config: Value, file: &Path, backup: &Path) -> bool {
        let Some(link) = dashboard_link(&config) else {
            debug!(path = %file.display(), "no distributed.dashboard.link");
            return false;
        };
        let Some(link) = link.as_str().map(str::to_string) else {
            warn!(path = %file.display(), "distributed.dashboard.link is not a string");
            return false;
        };
        if link.contains(NEW_LINK_TEMPLATE) {
            return true;
        }
        if !link.contains(OLD_LINK_TEMPLATE) {
            debug!(%link, "dashboard link does not use the old template");
            return false;
        }
        if let Err(err) = std::fs::copy(file, backup) {
            error!(path = %file.display(), backup = %backup.display(), %err, "cannot back up dask config");
            return false;
        }
        set_dashboard_link(
            &mut config,
            link.replace(OLD_LINK_TEMPLATE, NEW_LINK_TEMPLATE),
        );
        match self.write_yaml(file, &config) {
            Ok(()) => {
                info!(path = %file.display(), "replaced dask dashboard link");
                true
            }
            Err(err) => {
                error!(path = %file.display(), %err, "cannot write dask config");
                false
            }
        }
    }

    fn inject_dashboard_link(&self) -> Result<(), StartupError> {
        std::fs::create_dir_all(&self.dir).with_path(&self.dir)?;
        let target = self.dir.join(DASHBOARD_FILE);
        let mut config = if target.exists() {
            self.files
                .read(&target)
                .ok()
                .and_then(|content| serde_yaml::from_str::<Value>(&content).ok())
                .filter(Value::is_mapping)
                .and_then(flense)
                .unwrap_or_else(|| Value::Mapping(Mapping::new()))
        } else {
            Value::Mapping(Mapping::new())
        };
        if dashboard_link(&config).and_then(Value::as_str) == Some(DASHBOARD_LINK) {
            return Ok(());
        }
        set_dashboard_link(&mut config, DASHBOARD_LINK.to_string());
        self.write_yaml(&target, &config)
    }

    fn write_yaml(&self, path: &Path, config: &Value) -> Result<(), StartupError> {
        let content = serde_yaml::to_string(config).map_err(|err| {
            StartupError::new(
                nix::errno::Errno::EINVAL as i32,
                Some(err.to_string()),
                Some(path.display().to_string()),
            )
        })?;
        self.files
            .write(path, content.as_bytes(), shared_file_permissions())
            .with_path(path)
    }
}

/// Drops null values and the maps left empty by doing so. `None` if nothing is left.
pub fn flense(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Mapping(map) => {
            let flensed: Mapping = map
                .into_iter()
                .filter_map(|(k, v)| flense(v).map(|v| (k, v)))
                .collect();
            (!flensed.is_empty()).then_some(Value::Mapping(flensed))
        }
        other => Some(other),
    }
}

fn dashboard_link(config: &Value) -> Option<&Value> {
    config.get("distributed")?.get("dashboard")?.get("link")
}

fn set_dashboard_link(config: &mut Value, link: String) {
    set_path(config, &["distributed", "dashboard", "link"], Value::from(link));
}

fn set_path(node: &mut Value, keys: &[&str], value: Value) {
    let Some((first, rest)) = keys.split_first() else {
        *node = value;
        return;
    };
    if !node.is_mapping() {
        *node = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(map) = node {
        let child = map.entry(Value::from(*first)).or_insert(Value::Null);
        set_path(child, rest, value);
    }
}
