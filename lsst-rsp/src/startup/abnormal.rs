//! Landing page shown when the Lab starts in a degraded state.
use super::environment::{ABNORMAL_STARTUP_ERRORCODE, ABNORMAL_STARTUP_MESSAGE, LaunchEnvironment};
use super::error::{PathContext, StartupError};
use super::settings::set_markdown_viewer;
use crate::defaults::FALLBACK_HOME;
use ::fs::LocalFile;
use ::fs::file::writer::FileWriter;
use ::fs::utils::shared_file_permissions;
use std::path::{Path, PathBuf};
use tracing::error;

/// Home used for a broken Lab: the user's scratch directory if one was set up, else `/tmp`.
pub fn temporary_home(env: &LaunchEnvironment) -> PathBuf {
    PathBuf::from(env.get_non_empty("SCRATCH_DIR").unwrap_or(FALLBACK_HOME))
}

/// Markdown explaining what went wrong, with advice for the errors users can fix themselves.
pub fn landing_markdown(env: &LaunchEnvironment) -> String {
    let home = env
        .get_non_empty("NUBLADO_HOME")
        .or_else(|| env.get_non_empty("HOME"))
        .map(str::to_string)
        .unwrap_or_else(|| format!("/home/{}", env.get_or("USER", "")));
    let message = env.get_or(ABNORMAL_STARTUP_MESSAGE, "<no message>");
    let errorcode = env.get_or(ABNORMAL_STARTUP_ERRORCODE, "EUNKNOWN");

    let mut text = String::from(
        "# Abnormal startup\n\n\
         Your Lab container did not start normally.\n\n\
         Do not trust this lab for work you want to keep.\n\n",
    );
    let advice = match errorcode {
        "EDQUOT" => format!(
            "You have exceeded your quota. Try using the terminal to remove unneeded files in \
             `{home}`. You can use the `quota` command to check your usage.\n\n\
             After that, shut down and restart the lab. If that does not result in a working lab:\n"
        ),
        "ENOSPC" => format!(
            "You have run out of filesystem space. Try using the terminal to remove unneeded \
             files in `{home}`. Since the filesystem is full, this may not be something you can \
             correct.\n\n\
             After you have trimmed whatever possible, shut down and restart the lab.\n\n\
             If that does not result in a working lab:\n"
        ),
        "EROFS" | "EACCES" => "You do not have permission to write. Ask your RSP administrator \
             to check ownership and permissions on your directories.\n"
            .to_string(),
        "EBADENV" => {
            "You are missing environment variables necessary for RSP operation.\n".to_string()
        }
        "EOLDCONTROLLER" => "Your Lab was started by an outdated controller that did not supply \
             the startup configuration. Ask your RSP administrator to upgrade it.\n"
            .to_string(),
        _ => String::new(),
    };
    text.push_str(&advice);
    text.push_str(&format!(
        "\nPlease open an issue with your RSP site administrator with the following \
         information: `{message}`\n"
    ));
    text
}

/// Writes the landing page and the viewer setting that renders it into `temp_home`.
pub fn write_abnormal_environment<W: FileWriter>(
    writer: &W,
    env: &LaunchEnvironment,
    temp_home: &Path,
) -> Result<(), StartupError> {
    let welcome = temp_home.join("notebooks/tutorials/welcome.md");
    if let Some(parent) = welcome.parent() {
        std::fs::create_dir_all(parent).with_path(parent)?;
    }
    writer
        .write(&welcome, landing_markdown(env).as_bytes(), shared_file_permissions())
        .with_path(&welcome)?;
    set_markdown_viewer(&LocalFile, temp_home, b"  ")
}

/// Best effort: a failure here only costs the user the explanation.
pub fn make_abnormal_startup_environment(env: &LaunchEnvironment) -> PathBuf {
    let temp_home = temporary_home(env);
    if let Err(err) = write_abnormal_environment(&LocalFile, env, &temp_home) {
        error!(%err, "writing files to report abnormal startup failed");
    }
    temp_home
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::startup::error::RspErrorCode;
    use crate::startup::settings::docmanager_settings;
    use nix::errno::Errno;
    use rstest::rstest;
    use tempfile::tempdir;

    fn broken_env(err: &StartupError) -> LaunchEnvironment {
        let mut env = LaunchEnvironment::from_iter([("USER", "alice"), ("HOME", "/home/alice")]);
        env.set_abnormal_startup(err);
        env
    }

    #[rstest]
    #[case::quota(StartupError::new(Errno::EDQUOT as i32, None, None), "exceeded your quota")]
    #[case::space(StartupError::new(Errno::ENOSPC as i32, None, None), "run out of filesystem space")]
    #[case::readonly(StartupError::new(Errno::EROFS as i32, None, None), "permission to write")]
    #[case::access(StartupError::new(Errno::EACCES as i32, None, None), "permission to write")]
    #[case::env(StartupError::bad_env("HOME"), "missing environment variables")]
    #[case::controller(StartupError::rsp(RspErrorCode::EOLDCONTROLLER, None), "outdated controller")]
    fn test_advice_per_error(#[case] err: StartupError, #[case] advice: &str) {
        let text = landing_markdown(&broken_env(&err));
        assert!(text.starts_with("# Abnormal startup\n"));
        assert!(text.contains(advice), "{text}");
        assert!(text.contains(&format!("`{err}`")));
    }

    #[test]
    fn test_quota_advice_names_home() {
        let err = StartupError::new(Errno::EDQUOT as i32, None, None);
        assert!(landing_markdown(&broken_env(&err)).contains("`/home/alice`"));
    }

    #[test]
    fn test_generic_error_has_no_advice() {
        let err = StartupError::new(Errno::EIO as i32, None, None);
        let text = landing_markdown(&broken_env(&err));
        assert!(!text.contains("quota"));
        assert!(text.contains("Please open an issue"));
    }

    #[test]
    fn test_files_written_to_scratch_home() {
        let tmp = tempdir().unwrap();
        let mut env = broken_env(&StartupError::new(Errno::EDQUOT as i32, None, None));
        env.set("SCRATCH_DIR", tmp.path().display().to_string());

        let temp_home = make_abnormal_startup_environment(&env);

        assert_eq!(temp_home, tmp.path());
        assert!(
            std::fs::read_to_string(tmp.path().join("notebooks/tutorials/welcome.md"))
                .unwrap()
                .contains("Abnormal startup")
        );
        assert!(
            std::fs::read_to_string(docmanager_settings(tmp.path()))
                .unwrap()
                .contains("Markdown Preview")
        );
    }
}
