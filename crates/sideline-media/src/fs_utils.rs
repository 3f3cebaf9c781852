//! Delivering finished files out of a job workspace.

use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::MediaResult;

/// Move `src` to `dst`, creating the destination directory if needed.
///
/// Workspaces usually sit under the system temp directory, which is often a
/// different filesystem from the caller's output path. When `rename` fails
/// with EXDEV the file is copied next to `dst` and renamed into place, so a
/// reader never sees a half-written output.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(
                "Cross-device move, copying instead: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_then_remove(src, dst).await
        }
        Err(e) => Err(e.into()),
    }
}

/// EXDEV on Linux and macOS.
fn is_cross_device(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_then_remove(src: &Path, dst: &Path) -> MediaResult<()> {
    let staging = dst.with_extension("partial");

    if let Err(e) = fs::copy(src, &staging).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&staging, dst).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        warn!("Moved {} but could not remove the source: {}", src.display(), e);
    }

    Ok(())
}
