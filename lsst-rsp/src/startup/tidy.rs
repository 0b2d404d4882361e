//! Home directory housekeeping done before the Lab starts.
use super::environment::LaunchEnvironment;
use super::error::{PathContext, StartupError};
use super::outcome::StepOutcome;
use crate::defaults::ABNORMAL_STARTUP_FILE_PREFIX;
use ::fs::directory_manager::DirectoryManager;
use ::fs::file::reader::FileReader;
use ::fs::file::writer::FileWriter;
use ::fs::file_deleter::FileDeleter;
use ::fs::utils::private_file_permissions;
use std::fs as stdfs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use url::Url;

const SPACE_TEST_CHUNK: &str = "0123456789abcdef";
const SPACE_TEST_REPEAT: usize = 64 * 1024;

fn abnormal_startup_files<R: FileReader>(home: &Path, reader: &R) -> Vec<PathBuf> {
    reader
        .dir_entries(home)
        .inspect_err(|err| debug!(home = %home.display(), %err, "cannot list home directory"))
        .unwrap_or_default()
        .into_iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(ABNORMAL_STARTUP_FILE_PREFIX))
        })
        .collect()
}

/// Picks up errors left behind by the init container.
///
/// The most recent file (they sort by timestamp) is applied to `env`; all of them are removed.
/// Returns the adopted error, if any.
pub fn adopt_abnormal_startup_files<F: FileReader + FileDeleter>(
    env: &mut LaunchEnvironment,
    home: &Path,
    files: &F,
) -> Option<StartupError> {
    let found = abnormal_startup_files(home, files);
    let adopted = found.last().and_then(|latest| {
        files
            .read(latest)
            .map_err(|err| err.to_string())
            .and_then(|content| StartupError::from_json(&content).map_err(|err| err.to_string()))
            .inspect_err(|err| warn!(path = %latest.display(), %err, "ignoring unreadable startup error file"))
            .ok()
    });
    if let Some(err) = &adopted {
        info!(error = %err, "adopting init container error");
        env.set_abnormal_startup(err);
    }
    remove_files(&found, files);
    adopted
}

/// Removes error files written by a previous init container run.
pub fn clear_previous_error_files<F: FileReader + FileDeleter>(home: &Path, files: &F) {
    remove_files(&abnormal_startup_files(home, files), files);
}

fn remove_files<D: FileDeleter>(paths: &[PathBuf], deleter: &D) {
    for path in paths {
        if let Err(err) = deleter.delete(path) {
            warn!(path = %path.display(), %err, "could not remove startup error file");
        }
    }
}

/// Removes astropy download cache entries whose signed URL expired before `now` (unix seconds).
///
/// Only URLs carrying an `Expires` query parameter are considered; every failure is logged and
/// the entry skipped.
pub fn clean_astropy_cache(home: &Path, now: i64) {
    let cache_dir = home.join(".astropy/cache/download/url");
    let Ok(entries) = stdfs::read_dir(&cache_dir) else {
        return;
    };
    for entry in entries.filter_map(Result::ok).map(|e| e.path()) {
        let url_file = entry.join("url");
        if !entry.is_dir() || !url_file.is_file() {
            continue;
        }
        let Some(expires) = read_expiry(&url_file) else {
            continue;
        };
        if now > expires {
            debug!(path = %entry.display(), "removing expired cache entry");
            if let Err(err) = remove_cache_entry(&entry) {
                error!(path = %entry.display(), %err, "failed to remove cache entry");
            }
        }
    }
}

fn read_expiry(url_file: &Path) -> Option<i64> {
    let text = stdfs::read_to_string(url_file)
        .inspect_err(|err| error!(path = %url_file.display(), %err, "could not read cached url"))
        .ok()?;
    let url = Url::parse(text.trim()).ok()?;
    let (_, value) = url
        .query_pairs()
        .find(|(key, _)| key.eq_ignore_ascii_case("expires"))?;
    value
        .parse::<i64>()
        .inspect_err(|err| error!(%value, %err, "could not parse Expires parameter"))
        .ok()
}

fn remove_cache_entry(entry: &Path) -> std::io::Result<()> {
    stdfs::remove_file(entry.join("url"))?;
    stdfs::remove_file(entry.join("contents"))?;
    stdfs::remove_dir(entry)
}

/// Checks that a megabyte can be written to the home directory, freeing caches if it cannot.
pub struct SpaceTester<F, D>
where
    F: FileWriter + FileDeleter,
    D: DirectoryManager,
{
    files: F,
    directory_manager: D,
}

impl<F, D> SpaceTester<F, D>
where
    F: FileWriter + FileDeleter,
    D: DirectoryManager,
{
    pub fn new(files: F, directory_manager: D) -> Self {
        Self {
            files,
            directory_manager,
        }
    }

    /// Writes and removes `~/.cache/1mb.txt`.
    ///
    /// On failure the error is recorded in `env`, the caches are wiped and the write retried
    /// once. A successful retry withdraws that error; an abnormal startup recorded by an
    /// earlier step is kept.
    pub fn test_for_space(&self, env: &mut LaunchEnvironment, home: &Path) -> StepOutcome {
        let cache_file = home.join(".cache").join("1mb.txt");
        let Err(err) = self.write_a_megabyte(&cache_file) else {
            return StepOutcome::Ok;
        };
        warn!(%err, "could not write 1MB of text");
        let previous = env.abnormal_state();
        env.set_abnormal_startup(&err);

        self.emergency_cleanup(home);
        match self.write_a_megabyte(&cache_file) {
            Ok(()) => {
                env.restore_abnormal_state(previous);
                StepOutcome::Ok
            }
            Err(err) => {
                warn!(%err, "still cannot write after cleanup");
                StepOutcome::Degraded(err)
            }
        }
    }

    fn write_a_megabyte(&self, cache_file: &Path) -> Result<(), StartupError> {
        if let Some(parent) = cache_file.parent() {
            self.directory_manager.create(parent)?;
        }
        let mega = SPACE_TEST_CHUNK.repeat(SPACE_TEST_REPEAT);
        self.files
            .write(cache_file, mega.as_bytes(), private_file_permissions())
            .with_path(cache_file)?;
        self.files.delete(cache_file).with_path(cache_file)
    }

    fn emergency_cleanup(&self, home: &Path) {
        warn!("attempting emergency cleanup of .cache and .astropy/cache");
        for dir in [home.join(".cache"), home.join(".astropy").join("cache")] {
            let result = self
                .directory_manager
                .delete(&dir)
                .and_then(|_| self.directory_manager.create(&dir));
            if let Err(err) = result {
                error!(path = %dir.display(), %err, "emergency cleanup failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::startup::environment::{ABNORMAL_STARTUP, ABNORMAL_STARTUP_ERRORCODE};
    use ::fs::LocalFile;
    use ::fs::directory_manager::DirectoryManagerFs;
    use ::fs::directory_manager::mock::MockDirectoryManager;
    use ::fs::file::writer::WriteError;
    use ::fs::mock::MockLocalFile;
    use nix::errno::Errno;
    use std::io;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    const EDQUOT: i32 = Errno::EDQUOT as i32;

    fn permissive_directory_manager() -> MockDirectoryManager {
        let mut directory_manager = MockDirectoryManager::new();
        directory_manager.expect_create().returning(|_| Ok(()));
        directory_manager.expect_delete().returning(|_| Ok(()));
        directory_manager
    }

    #[test]
    fn test_space_available() {
        let tmp = tempdir().unwrap();
        let mut env = LaunchEnvironment::default();
        let tester = SpaceTester::new(LocalFile, DirectoryManagerFs::default());

        let outcome = tester.test_for_space(&mut env, tmp.path());

        assert_eq!(outcome, StepOutcome::Ok);
        assert!(!env.is_broken());
        assert!(tmp.path().join(".cache").is_dir());
        assert!(!tmp.path().join(".cache/1mb.txt").exists());
    }

    #[test]
    #[traced_test]
    fn test_quota_exceeded_stays_degraded() {
        let tmp = tempdir().unwrap();
        let mut env = LaunchEnvironment::default();
        let mut files = MockLocalFile::new();
        files.should_not_write_os_error(2, EDQUOT);
        let tester = SpaceTester::new(files, permissive_directory_manager());

        let outcome = tester.test_for_space(&mut env, tmp.path());

        let StepOutcome::Degraded(err) = outcome else {
            panic!("expected a degraded outcome, got {outcome:?}");
        };
        assert_eq!(err.errorcode, "EDQUOT");
        assert_eq!(env.get(ABNORMAL_STARTUP), Some("TRUE"));
        assert_eq!(env.get(ABNORMAL_STARTUP_ERRORCODE), Some("EDQUOT"));
        assert!(logs_contain("attempting emergency cleanup"));
    }

    #[test]
    fn test_cleanup_frees_enough_space() {
        let tmp = tempdir().unwrap();
        let mut env = LaunchEnvironment::default();
        let mut files = MockLocalFile::new();
        let mut calls = 0;
        files.expect_write().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Err(WriteError::ErrorCreatingFile(io::Error::from_raw_os_error(
                    EDQUOT,
                )))
            } else {
                Ok(())
            }
        });
        files.should_delete_any(1);
        let mut directory_manager = MockDirectoryManager::new();
        directory_manager.expect_create().times(4).returning(|_| Ok(()));
        directory_manager.should_delete(&tmp.path().join(".cache"));
        directory_manager.should_delete(&tmp.path().join(".astropy/cache"));
        let tester = SpaceTester::new(files, directory_manager);

        let outcome = tester.test_for_space(&mut env, tmp.path());

        assert_eq!(outcome, StepOutcome::Ok);
        assert!(!env.is_broken());
        assert!(env.as_map().keys().all(|k| !k.starts_with("ABNORMAL_STARTUP")));
    }

    #[test]
    fn test_cleanup_keeps_earlier_abnormal_startup() {
        let tmp = tempdir().unwrap();
        let mut env = LaunchEnvironment::default();
        let earlier = StartupError::bad_env("JUPYTERHUB_BASE_URL");
        env.set_abnormal_startup(&earlier);
        let before = env.clone();
        let mut files = MockLocalFile::new();
        let mut calls = 0;
        files.expect_write().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Err(WriteError::ErrorCreatingFile(io::Error::from_raw_os_error(
                    EDQUOT,
                )))
            } else {
                Ok(())
            }
        });
        files.should_delete_any(1);
        let tester = SpaceTester::new(files, permissive_directory_manager());

        let outcome = tester.test_for_space(&mut env, tmp.path());

        assert_eq!(outcome, StepOutcome::Ok);
        assert!(env.is_broken());
        assert_eq!(env.get(ABNORMAL_STARTUP_ERRORCODE), Some("EBADENV"));
        assert_eq!(env, before);
    }

    #[test]
    fn test_adopt_latest_error_file() {
        let tmp = tempdir().unwrap();
        let older = StartupError::new(Errno::ENOSPC as i32, None, None);
        let newer = StartupError::new(EDQUOT, None, Some("/home/u".into()));
        stdfs::write(tmp.path().join("ABNORMAL_STARTUP_1700000000"), older.to_json()).unwrap();
        stdfs::write(tmp.path().join("ABNORMAL_STARTUP_1700000100"), newer.to_json()).unwrap();
        stdfs::write(tmp.path().join("notes.txt"), "keep").unwrap();
        let mut env = LaunchEnvironment::default();

        let adopted = adopt_abnormal_startup_files(&mut env, tmp.path(), &LocalFile);

        assert_eq!(adopted, Some(newer));
        assert_eq!(env.get(ABNORMAL_STARTUP_ERRORCODE), Some("EDQUOT"));
        assert!(!tmp.path().join("ABNORMAL_STARTUP_1700000000").exists());
        assert!(!tmp.path().join("ABNORMAL_STARTUP_1700000100").exists());
        assert!(tmp.path().join("notes.txt").exists());
    }

    #[test]
    fn test_garbage_error_file_is_removed_but_ignored() {
        let tmp = tempdir().unwrap();
        stdfs::write(tmp.path().join("ABNORMAL_STARTUP_1700000000"), "not json").unwrap();
        let mut env = LaunchEnvironment::default();

        assert!(adopt_abnormal_startup_files(&mut env, tmp.path(), &LocalFile).is_none());
        assert!(!env.is_broken());
        assert!(!tmp.path().join("ABNORMAL_STARTUP_1700000000").exists());
    }

    #[test]
    fn test_expired_astropy_entries_are_removed() {
        let tmp = tempdir().unwrap();
        let cache = tmp.path().join(".astropy/cache/download/url");
        let entries = [
            ("expired", "https://s3.example.org/x?X-Amz-Expires=1&Expires=1000"),
            ("fresh", "https://s3.example.org/y?expires=3000"),
            ("no_expiry", "https://www.example.org/z"),
            ("bad_expiry", "https://s3.example.org/w?Expires=soon"),
        ];
        for (name, url) in entries {
            let dir = cache.join(name);
            stdfs::create_dir_all(&dir).unwrap();
            stdfs::write(dir.join("url"), url).unwrap();
            stdfs::write(dir.join("contents"), "data").unwrap();
        }

        clean_astropy_cache(tmp.path(), 2000);

        assert!(!cache.join("expired").exists());
        assert!(cache.join("fresh/contents").exists());
        assert!(cache.join("no_expiry/contents").exists());
        assert!(cache.join("bad_expiry/contents").exists());
    }

    #[test]
    fn test_missing_astropy_cache_is_fine() {
        let tmp = tempdir().unwrap();
        clean_astropy_cache(tmp.path(), 2000);
    }
}
