use crate::error::Result;
use crate::tree::WorkflowResult;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            parent
        }
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Serialize `result` as pretty JSON and write it atomically to `path`.
///
/// Returns the number of bytes written.
pub fn save_result(path: &Path, result: &WorkflowResult) -> Result<usize> {
    let mut json = serde_json::to_string_pretty(result)?;
    json.push('\n');
    atomic_write(path, json.as_bytes())?;
    tracing::info!(
        path = %path.display(),
        bytes = json.len(),
        actions = result.processed_actions.len(),
        parents = result.action_tree.len(),
        "result saved"
    );
    Ok(json.len())
}
