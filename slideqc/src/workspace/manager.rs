//! Run-scoped workspace preparation.
//!
//! Each run gets an isolated directory tree under the output root. The input
//! slide is staged into `slides_in` with a copy-then-rename so a
//! partially-written file is never visible under its final name.

use crate::errors::WorkspaceError;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;

/// Subdirectory of the run directory where the slide is staged.
pub const SLIDES_IN_DIR: &str = "slides_in";

/// The directory layout of one prepared run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    /// The run's output directory. Immutable once created.
    pub run_dir: PathBuf,
    /// Directory holding the staged input slide.
    pub slides_in: PathBuf,
    /// Final path of the staged slide.
    pub staged_slide: PathBuf,
}

/// Creates run directories and stages slides.
#[derive(Debug)]
pub struct WorkspaceManager {
    output_root: PathBuf,
    run_counter: AtomicU64,
}

impl WorkspaceManager {
    /// Creates a manager rooted at `output_root`.
    #[must_use]
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            run_counter: AtomicU64::new(0),
        }
    }

    /// The root under which run directories are created.
    #[must_use]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Returns a run ID unique within this process.
    ///
    /// Wall-clock timestamp plus a process-monotonic counter; two concurrent
    /// runs can never share an ID, so no two runs target the same directory.
    pub fn next_run_id(&self) -> String {
        let counter = self.run_counter.fetch_add(1, Ordering::SeqCst);
        format!("run_{}_{counter}", Utc::now().format("%Y%m%d_%H%M%S"))
    }

    /// Creates the run directory tree and stages the slide into it.
    ///
    /// The run directory must not already exist. The slide is copied to a
    /// temporary name, flushed, and only then renamed to its final name; on
    /// failure the temporary file is removed and nothing appears at the final
    /// path.
    ///
    /// # Errors
    ///
    /// [`WorkspaceError::SourceNotFound`] if the slide is missing,
    /// [`WorkspaceError::DestinationExists`] if the run directory exists, or
    /// [`WorkspaceError::Io`] for underlying IO failures.
    pub async fn prepare(
        &self,
        run_id: &str,
        slide_source: &Path,
    ) -> Result<WorkspacePaths, WorkspaceError> {
        let source_meta = tokio::fs::metadata(slide_source)
            .await
            .map_err(|_| WorkspaceError::SourceNotFound(slide_source.to_path_buf()))?;
        if !source_meta.is_file() {
            return Err(WorkspaceError::SourceNotFound(slide_source.to_path_buf()));
        }

        let file_name = slide_source
            .file_name()
            .ok_or_else(|| WorkspaceError::SourceNotFound(slide_source.to_path_buf()))?
            .to_owned();

        let run_dir = self.output_root.join(run_id);
        if tokio::fs::metadata(&run_dir).await.is_ok() {
            return Err(WorkspaceError::DestinationExists(run_dir));
        }

        let slides_in = run_dir.join(SLIDES_IN_DIR);
        tokio::fs::create_dir_all(&slides_in).await?;

        let staged_slide = slides_in.join(&file_name);
        let temp_path = slides_in.join(format!(".{}.partial", file_name.to_string_lossy()));

        if let Err(err) = stage_copy(slide_source, &temp_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(err.into());
        }
        if let Err(err) = tokio::fs::rename(&temp_path, &staged_slide).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(err.into());
        }

        Ok(WorkspacePaths {
            run_dir,
            slides_in,
            staged_slide,
        })
    }
}

/// Copies `source` to `dest`, flushing file contents to disk before returning.
async fn stage_copy(source: &Path, dest: &Path) -> std::io::Result<()> {
    let mut reader = tokio::fs::File::open(source).await?;
    let mut writer = tokio::fs::File::create(dest).await?;
    tokio::io::copy(&mut reader, &mut writer).await?;
    writer.flush().await?;
    writer.sync_all().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_slide(dir: &Path) -> PathBuf {
        let slide = dir.join("sample.svs");
        std::fs::write(&slide, b"fake slide bytes").unwrap();
        slide
    }

    #[tokio::test]
    async fn test_prepare_stages_slide() {
        let dir = tempfile::tempdir().unwrap();
        let slide = make_slide(dir.path());
        let manager = WorkspaceManager::new(dir.path().join("out"));

        let ws = manager.prepare("run_1", &slide).await.unwrap();

        assert_eq!(ws.slides_in, ws.run_dir.join(SLIDES_IN_DIR));
        assert_eq!(
            std::fs::read(&ws.staged_slide).unwrap(),
            b"fake slide bytes"
        );
        // No temporary file left behind
        let leftovers: Vec<_> = std::fs::read_dir(&ws.slides_in)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("sample.svs")]);
    }

    #[tokio::test]
    async fn test_prepare_rejects_existing_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let slide = make_slide(dir.path());
        let manager = WorkspaceManager::new(dir.path().join("out"));

        manager.prepare("run_1", &slide).await.unwrap();
        let err = manager.prepare("run_1", &slide).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::DestinationExists(_)));
    }

    #[tokio::test]
    async fn test_prepare_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(dir.path().join("out"));

        let err = manager
            .prepare("run_1", &dir.path().join("ghost.svs"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::SourceNotFound(_)));

        // Nothing appears at the final path after a failed prepare
        let staged = dir.path().join("out/run_1").join(SLIDES_IN_DIR).join("ghost.svs");
        assert!(!staged.exists());
    }

    /// Reads from `/proc/self/mem` at offset 0 fail with EIO, so the copy
    /// aborts after the temporary file has been created.
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_interrupted_copy_leaves_nothing_at_final_path() {
        let dir = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(dir.path().join("out"));

        let err = manager
            .prepare("run_1", Path::new("/proc/self/mem"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Io(_)));

        let slides_in = dir.path().join("out/run_1").join(SLIDES_IN_DIR);
        assert!(!slides_in.join("mem").exists());
        // The temporary file was cleaned up as well
        let leftovers: Vec<_> = std::fs::read_dir(&slides_in)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_run_ids_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(dir.path());

        let ids: std::collections::HashSet<String> =
            (0..50).map(|_| manager.next_run_id()).collect();
        assert_eq!(ids.len(), 50);
    }
}
