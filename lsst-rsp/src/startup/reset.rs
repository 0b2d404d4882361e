use super::error::{PathContext, StartupError};
use ::fs::directory_manager::DirectoryManager;
use ::fs::file::renamer::FileRenamer;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Hidden home directories moved aside when a user asks for a clean environment.
const RELOCATED_DIRS: [&str; 6] = ["cache", "conda", "config", "eups", "local", "jupyter"];

/// Moves the user's environment into `~/.user_env.<timestamp>`.
///
/// Returns the backup directory, or `None` when there was nothing to move, in which case no
/// backup directory is created.
pub fn relocate_user_environment<R, D>(
    home: &Path,
    now: DateTime<Utc>,
    renamer: &R,
    directory_manager: &D,
) -> Result<Option<PathBuf>, StartupError>
where
    R: FileRenamer,
    D: DirectoryManager,
{
    let reloc = home.join(format!(".user_env.{}", now.format("%Y%m%d%H%M%S")));
    let mut moved = false;

    for name in RELOCATED_DIRS {
        let source = home.join(format!(".{name}"));
        if !source.is_dir() {
            continue;
        }
        if !moved {
            directory_manager.create(&reloc)?;
            moved = true;
        }
        let target = reloc.join(name);
        debug!(from = %source.display(), to = %target.display(), "relocating");
        renamer.rename(&source, &target).with_path(&source)?;
    }

    let user_setups = home.join("notebooks").join(".user_setups");
    if user_setups.is_file() {
        let target = reloc.join("notebooks").join("user_setups");
        directory_manager.create(&reloc.join("notebooks"))?;
        moved = true;
        debug!(from = %user_setups.display(), to = %target.display(), "relocating");
        renamer.rename(&user_setups, &target).with_path(&user_setups)?;
    }

    if moved {
        info!(backup = %reloc.display(), "user environment relocated");
        Ok(Some(reloc))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::fs::LocalFile;
    use ::fs::directory_manager::DirectoryManagerFs;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::tempdir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap()
    }

    #[test]
    fn test_reset_moves_everything_into_a_single_backup() {
        let tmp = tempdir().unwrap();
        let home = tmp.path();
        for name in ["cache", "conda", "config", "eups", "local", "jupyter"] {
            let dir = home.join(format!(".{name}"));
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("file"), format!("{name} contents")).unwrap();
        }
        fs::create_dir_all(home.join("notebooks")).unwrap();
        fs::write(home.join("notebooks/.user_setups"), "setup lsst_distrib").unwrap();

        let reloc =
            relocate_user_environment(home, now(), &LocalFile, &DirectoryManagerFs::default())
                .unwrap()
                .unwrap();

        assert_eq!(reloc, home.join(".user_env.20250314150926"));
        for name in ["cache", "conda", "config", "eups", "local", "jupyter"] {
            assert!(!home.join(format!(".{name}")).exists());
            assert_eq!(
                fs::read_to_string(reloc.join(name).join("file")).unwrap(),
                format!("{name} contents")
            );
        }
        assert!(!home.join("notebooks/.user_setups").exists());
        assert_eq!(
            fs::read_to_string(reloc.join("notebooks/user_setups")).unwrap(),
            "setup lsst_distrib"
        );
        let backups: Vec<_> = fs::read_dir(home)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".user_env."))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn test_reset_with_nothing_to_move() {
        let tmp = tempdir().unwrap();
        // A plain file is not relocated
        fs::write(tmp.path().join(".cache"), "").unwrap();

        let reloc = relocate_user_environment(
            tmp.path(),
            now(),
            &LocalFile,
            &DirectoryManagerFs::default(),
        )
        .unwrap();

        assert!(reloc.is_none());
        assert!(!tmp.path().join(".user_env.20250314150926").exists());
        assert!(tmp.path().join(".cache").is_file());
    }
}
