use std::sync::atomic::{AtomicU64, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;

use crate::PROMPTSYNC_REDB_FILENAME;

static QUARANTINED: AtomicU64 = AtomicU64::new(0);

/// `<file>.corrupt.<timestamp>.<pid>.<n>`, unique within and across processes.
fn quarantine_name(file_name: &str) -> String {
    format!(
        "{file_name}.corrupt.{}.{}.{}",
        Utc::now().format("%Y%m%dT%H%M%S%.f"),
        std::process::id(),
        QUARANTINED.fetch_add(1, Ordering::Relaxed)
    )
}

/// Move an unreadable database aside so a fresh one can be created.
/// Returns the new location, or `None` when there was nothing to move.
pub fn quarantine_corrupt_file(path: &Utf8Path) -> std::io::Result<Option<Utf8PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let target =
        path.with_file_name(quarantine_name(path.file_name().unwrap_or(PROMPTSYNC_REDB_FILENAME)));
    std::fs::rename(path, &target)?;
    tracing::warn!("local store {} is corrupt, moved to {}", path, target);
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_never_repeat() {
        let a = quarantine_name("promptsync.redb");
        let b = quarantine_name("promptsync.redb");
        assert!(a.starts_with("promptsync.redb.corrupt."));
        assert_ne!(a, b);
    }

    #[test]
    fn missing_file_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("absent.redb")).unwrap();
        assert_eq!(quarantine_corrupt_file(&path).unwrap(), None);
    }
}
