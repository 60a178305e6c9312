//! Filesystem helpers for per-worker download areas

use crate::error::{HarvestError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

/// Make a string safe to use as a single path component
///
/// County and municipality names can carry slashes, dots and other
/// separator characters; they all become underscores.
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '.' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Remove a directory tree (if present) and recreate it empty
pub async fn reset_dir(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

/// Wait until a file with `extension` in `dir` stops growing
///
/// Polls every `poll_interval`; a file whose size is unchanged and non-zero
/// across two consecutive polls counts as stable. Exceeding `timeout`
/// surfaces [`HarvestError::ExportTimeout`] — fatal for the task in flight,
/// never for the worker.
pub async fn wait_for_stable_file(
    dir: &Path,
    extension: &str,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<PathBuf> {
    let deadline = Instant::now() + timeout;
    let mut previous: Option<(PathBuf, u64)> = None;

    loop {
        if let Some((path, size)) = newest_file_with_extension(dir, extension).await? {
            if size > 0
                && previous
                    .as_ref()
                    .is_some_and(|(prev_path, prev_size)| *prev_path == path && *prev_size == size)
            {
                return Ok(path);
            }
            previous = Some((path, size));
        }

        if Instant::now() >= deadline {
            return Err(HarvestError::ExportTimeout {
                dir: dir.to_path_buf(),
                waited: timeout,
            }
            .into());
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Most recently modified file in `dir` carrying `extension`
async fn newest_file_with_extension(
    dir: &Path,
    extension: &str,
) -> Result<Option<(PathBuf, u64)>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut newest: Option<(PathBuf, u64, std::time::SystemTime)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if !matches {
            continue;
        }

        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);

        let newer = newest
            .as_ref()
            .is_none_or(|(_, _, current)| modified >= *current);
        if newer {
            newest = Some((path, metadata.len(), modified));
        }
    }

    Ok(newest.map(|(path, size, _)| (path, size)))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn sanitize_replaces_separator_characters() {
        assert_eq!(
            sanitize_component("St. Marys City/Borough"),
            "St_ Marys City_Borough"
        );
        assert_eq!(sanitize_component("a<b>c:d\"e|f?g*h"), "a_b_c_d_e_f_g_h");
        assert_eq!(sanitize_component("McKean"), "McKean");
    }

    #[tokio::test]
    async fn reset_dir_clears_existing_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("scratch");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("leftover.xlsx"), b"stale")
            .await
            .unwrap();

        reset_dir(&dir).await.unwrap();

        let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_dir_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("never/existed");
        reset_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn stable_file_is_returned_once_size_stops_changing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let target = dir.join("report.xlsx");

        let writer = tokio::spawn({
            let target = target.clone();
            async move {
                tokio::fs::write(&target, b"part").await.unwrap();
                tokio::time::sleep(Duration::from_millis(30)).await;
                tokio::fs::write(&target, b"partial-then-done").await.unwrap();
            }
        });

        let found = wait_for_stable_file(
            &dir,
            "xlsx",
            Duration::from_millis(25),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        writer.await.unwrap();
        assert_eq!(found, target);
        let size = tokio::fs::metadata(&found).await.unwrap().len();
        assert_eq!(size, b"partial-then-done".len() as u64);
    }

    #[tokio::test]
    async fn missing_file_times_out_with_export_timeout() {
        let tmp = tempfile::tempdir().unwrap();

        let result = wait_for_stable_file(
            tmp.path(),
            "xlsx",
            Duration::from_millis(10),
            Duration::from_millis(60),
        )
        .await;

        assert!(matches!(
            result,
            Err(Error::Harvest(HarvestError::ExportTimeout { .. }))
        ));
    }

    #[tokio::test]
    async fn files_with_other_extensions_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(tmp.path().join("notes.txt"), b"not a report")
            .await
            .unwrap();

        let result = wait_for_stable_file(
            tmp.path(),
            "xlsx",
            Duration::from_millis(10),
            Duration::from_millis(60),
        )
        .await;

        assert!(result.is_err());
    }
}
