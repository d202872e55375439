use crate::Result;
use fs4::fs_std::FileExt;
use ohno::IntoAppError;
use std::fs::{File, OpenOptions};
use std::path::Path;

const LOG_TARGET: &str = "     store";

/// Holds the store's advisory lock; released on drop.
#[derive(Debug)]
pub struct StoreLockGuard(File);

impl Drop for StoreLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.unlock() {
            log::warn!(target: LOG_TARGET, "Could not unlock snapshot store: {e:#}");
        }
    }
}

/// Take the exclusive advisory lock on a snapshot store directory.
///
/// Two miners pointed at the same store would otherwise race on the same keys;
/// the second one waits here until the first exits.
pub async fn lock_store(store_dir: &Path) -> Result<StoreLockGuard> {
    let lock_path = store_dir.join("cache.lock");

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .into_app_err_with(|| format!("opening store lock file at '{}'", lock_path.display()))?;

    // May block until another miner exits, so keep it off the async workers.
    let file = tokio::task::spawn_blocking(move || {
        file.lock_exclusive()
            .into_app_err_with(|| format!("acquiring exclusive lock on store at '{}'", lock_path.display()))?;
        log::debug!(target: LOG_TARGET, "Acquired store lock at '{}'", lock_path.display());
        Ok::<_, ohno::AppError>(file)
    })
    .await
    .into_app_err("lock task panicked")??;

    Ok(StoreLockGuard(file))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call mkdtemp")]
    async fn test_lock_creates_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let guard = lock_store(dir.path()).await.unwrap();
        assert!(dir.path().join("cache.lock").exists());
        drop(guard);
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call mkdtemp")]
    async fn test_lock_can_be_retaken_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        drop(lock_store(dir.path()).await.unwrap());
        drop(lock_store(dir.path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_in_missing_directory_fails() {
        let _ = lock_store(Path::new("no_such_store_directory_31337")).await.unwrap_err();
    }
}
