use super::environment::LaunchEnvironment;
use crate::command::Command;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const GIT_TIMEOUT: Duration = Duration::from_secs(60);
const LFS_FILTER_SECTION: &str = r#"[filter "lfs"]"#;

/// Whether `~/.gitconfig` already carries the git-lfs filter.
pub fn has_git_lfs(home: &Path) -> bool {
    std::fs::read_to_string(home.join(".gitconfig"))
        .map(|content| content.lines().any(|l| l.trim() == LFS_FILTER_SECTION))
        .unwrap_or(false)
}

/// `git config --global` arguments for the identity found in the environment.
pub fn identity_commands(env: &LaunchEnvironment) -> Vec<Vec<String>> {
    [("GITHUB_EMAIL", "user.email"), ("GITHUB_NAME", "user.name")]
        .into_iter()
        .filter_map(|(var, key)| {
            env.get_non_empty(var).map(|value| {
                ["git", "config", "--global", "--replace-all", key, value]
                    .map(String::from)
                    .to_vec()
            })
        })
        .collect()
}

/// Installs git-lfs and the user's git identity.
///
/// Git failures never block the Lab; they are logged by the command runner and skipped.
pub fn setup_git(env: &LaunchEnvironment, home: &Path) {
    let command = Command::ignoring_failures();
    let mut commands = identity_commands(env);
    if has_git_lfs(home) {
        debug!("git-lfs already installed");
    } else {
        commands.insert(0, ["git", "lfs", "install"].map(String::from).to_vec());
    }
    for argv in commands {
        if let Ok(Some(result)) = command.run(&argv, Some(home), Some(env.as_map()), Some(GIT_TIMEOUT)) {
            debug!(rc = result.rc, args = %argv.join(" "), "git command finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_lfs_detection_needs_exact_section() {
        let tmp = tempdir().unwrap();
        assert!(!has_git_lfs(tmp.path()));

        fs::write(
            tmp.path().join(".gitconfig"),
            "[user]\n\tname = A\n# [filter \"lfs\"] in a comment\n",
        )
        .unwrap();
        assert!(!has_git_lfs(tmp.path()));

        fs::write(
            tmp.path().join(".gitconfig"),
            "[user]\n\tname = A\n[filter \"lfs\"]\n\tclean = git-lfs clean -- %f\n",
        )
        .unwrap();
        assert!(has_git_lfs(tmp.path()));
    }

    #[test]
    fn test_identity_commands() {
        let env = LaunchEnvironment::from_iter([
            ("GITHUB_EMAIL", "alice@example.org"),
            ("GITHUB_NAME", ""),
        ]);

        assert_eq!(
            identity_commands(&env),
            vec![vec![
                "git",
                "config",
                "--global",
                "--replace-all",
                "user.email",
                "alice@example.org"
            ]]
        );
    }

    #[test]
    fn test_missing_git_does_not_fail() {
        let tmp = tempdir().unwrap();
        let env = LaunchEnvironment::from_iter([("PATH", "/nonexistent")]);
        setup_git(&env, tmp.path());
    }
}
