//! Atomic file persistence.
//!
//! Both durable stores write through this helper: serialize to a `.tmp`
//! sibling, sync it, then rename over the target. An interrupted write
//! leaves the previous valid file untouched, which is the crash-safety
//! substrate the resumability guarantee rests on.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{HostPrepError, Result};

/// Write `contents` to `path` atomically via tmp-file-then-rename.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            HostPrepError::persistence(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }

    let tmp_path = path.with_extension("tmp");
    {
        let mut tmp = File::create(&tmp_path).map_err(|e| {
            HostPrepError::persistence(format!("cannot create {}: {}", tmp_path.display(), e))
        })?;
        tmp.write_all(contents.as_bytes()).map_err(|e| {
            HostPrepError::persistence(format!("cannot write {}: {}", tmp_path.display(), e))
        })?;
        tmp.sync_all().map_err(|e| {
            HostPrepError::persistence(format!("cannot sync {}: {}", tmp_path.display(), e))
        })?;
    }

    std::fs::rename(&tmp_path, path).map_err(|e| {
        HostPrepError::persistence(format!(
            "cannot rename {} to {}: {}",
            tmp_path.display(),
            path.display(),
            e
        ))
    })
}
