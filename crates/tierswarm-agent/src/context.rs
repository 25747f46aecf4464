// ABOUTME: Loads context files from disk into task attachments.
// ABOUTME: Unreadable files are skipped with a warning; duplicates are dropped and long files truncated.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tierswarm_core::Attachment;
use tierswarm_tools::tool::truncate_chars;

/// Longest attachment kept, in characters.
pub const MAX_ATTACHMENT_CHARS: usize = 30_000;

/// Read each path into an Attachment named after its file name, preserving
/// order. Failures are logged and omitted rather than aborting the task.
pub async fn load_attachments<P: AsRef<Path>>(paths: &[P]) -> Vec<Attachment> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut attachments = Vec::with_capacity(paths.len());

    for path in paths {
        let path = path.as_ref();
        let key = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf());
        if !seen.insert(key) {
            tracing::debug!(path = %path.display(), "skipping duplicate attachment");
            continue;
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read attachment, skipping");
                continue;
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        let (content, truncated) = truncate_chars(&text, MAX_ATTACHMENT_CHARS);
        if truncated {
            tracing::info!(path = %path.display(), "attachment truncated");
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        attachments.push(Attachment::new(name, content));
    }

    attachments
}
