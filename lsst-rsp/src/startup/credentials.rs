//! Merges container supplied Butler credentials into the user's private copies.
use super::environment::LaunchEnvironment;
use super::error::{PathContext, StartupError};
use ::fs::directory_manager::DirectoryManager;
use ::fs::file::reader::FileReader;
use ::fs::file::writer::FileWriter;
use ::fs::utils::private_file_permissions;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

pub const AWS_CREDENTIALS_VAR: &str = "AWS_SHARED_CREDENTIALS_FILE";
pub const PGPASS_VAR: &str = "PGPASSFILE";

pub struct CredentialMerger<'a, F, D>
where
    F: FileReader + FileWriter,
    D: DirectoryManager,
{
    files: &'a F,
    directory_manager: &'a D,
}

impl<'a, F, D> CredentialMerger<'a, F, D>
where
    F: FileReader + FileWriter,
    D: DirectoryManager,
{
    pub fn new(files: &'a F, directory_manager: &'a D) -> Self {
        Self {
            files,
            directory_manager,
        }
    }

    /// Merges every credential file the environment points at.
    pub fn merge_all(&self, env: &LaunchEnvironment) -> Result<(), StartupError> {
        if env.contains(AWS_CREDENTIALS_VAR) {
            self.merge_aws_credentials(env)?;
        }
        if env.contains(PGPASS_VAR) {
            self.merge_pgpass(env)?;
        }
        Ok(())
    }

    /// Container sections replace the user's sections of the same name; the rest of the
    /// user's file is kept as it is.
    #[instrument(skip_all)]
    pub fn merge_aws_credentials(&self, env: &LaunchEnvironment) -> Result<(), StartupError> {
        let (home_file, container_file) = credential_paths(env, AWS_CREDENTIALS_VAR)?;
        let home = self.read_home_file(&home_file)?;
        let container = self.read_container_file(&container_file);

        let mut merged = IniDocument::parse(&home);
        merged.merge(IniDocument::parse(&container));

        self.files
            .write(&home_file, merged.render().as_bytes(), private_file_permissions())
            .with_path(&home_file)?;
        debug!(path = %home_file.display(), "merged AWS credentials");
        Ok(())
    }

    /// Container entries win for the same connection; the order of first appearance is kept.
    #[instrument(skip_all)]
    pub fn merge_pgpass(&self, env: &LaunchEnvironment) -> Result<(), StartupError> {
        let (home_file, container_file) = credential_paths(env, PGPASS_VAR)?;
        let home = self.read_home_file(&home_file)?;
        let container = self.read_container_file(&container_file);

        let mut entries = parse_pgpass(&home);
        for (connection, password) in parse_pgpass(&container) {
            match entries.iter_mut().find(|(c, _)| *c == connection) {
                Some(entry) => entry.1 = password,
                None => entries.push((connection, password)),
            }
        }
        let rendered: String = entries
            .iter()
            .map(|(connection, password)| format!("{connection}:{password}\n"))
            .collect();

        self.files
            .write(&home_file, rendered.as_bytes(), private_file_permissions())
            .with_path(&home_file)?;
        debug!(path = %home_file.display(), "merged pgpass");
        Ok(())
    }

    fn read_home_file(&self, path: &Path) -> Result<String, StartupError> {
        if let Some(parent) = path.parent() {
            self.directory_manager.create(parent)?;
        }
        if !path.exists() {
            return Ok(String::new());
        }
        self.files.read(path).with_path(path)
    }

    fn read_container_file(&self, path: &Path) -> String {
        self.files
            .read(path)
            .inspect_err(|err| warn!(path = %path.display(), %err, "cannot read container credentials"))
            .unwrap_or_default()
    }
}

fn credential_paths(
    env: &LaunchEnvironment,
    var: &str,
) -> Result<(PathBuf, PathBuf), StartupError> {
    let orig_var = format!("ORIG_{var}");
    let home = env.get(var).ok_or_else(|| StartupError::bad_env(var))?;
    let container = env
        .get(&orig_var)
        .ok_or_else(|| StartupError::bad_env(&orig_var))?;
    Ok((PathBuf::from(home), PathBuf::from(container)))
}

fn parse_pgpass(content: &str) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = Vec::new();
    for (connection, password) in content.lines().filter_map(|line| line.rsplit_once(':')) {
        let password = password.trim_end().to_string();
        match entries.iter_mut().find(|(c, _)| c.as_str() == connection) {
            Some(entry) => entry.1 = password,
            None => entries.push((connection.to_string(), password)),
        }
    }
    entries
}

#[derive(Debug, Default, PartialEq)]
struct IniDocument {
    preamble: Vec<String>,
    sections: Vec<IniSection>,
}

#[derive(Debug, PartialEq)]
struct IniSection {
    name: String,
    body: Vec<String>,
}

impl IniDocument {
    fn parse(content: &str) -> Self {
        let mut doc = Self::default();
        for line in content.lines() {
            let trimmed = line.trim();
            if let Some(name) = trimmed
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
            {
                doc.sections.push(IniSection {
                    name: name.trim().to_string(),
                    body: Vec::new(),
                });
                continue;
            }
            match doc.sections.last_mut() {
                Some(section) => section.body.push(line.trim_end().to_string()),
                None => doc.preamble.push(line.trim_end().to_string()),
            }
        }
        doc
    }

    fn merge(&mut self, other: IniDocument) {
        for section in other.sections {
            match self.sections.iter_mut().find(|s| s.name == section.name) {
                Some(existing) => existing.body = section.body,
                None => self.sections.push(section),
            }
        }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        let preamble = trim_blank_tail(&self.preamble);
        if !preamble.is_empty() {
            preamble.iter().for_each(|l| {
                out.push_str(l);
                out.push('\n');
            });
            out.push('\n');
        }
        for section in &self.sections {
            out.push_str(&format!("[{}]\n", section.name));
            trim_blank_tail(&section.body).iter().for_each(|l| {
                out.push_str(l);
                out.push('\n');
            });
            out.push('\n');
        }
        out
    }
}

fn trim_blank_tail(lines: &[String]) -> &[String] {
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(0, |i| i + 1);
    &lines[..end]
}
