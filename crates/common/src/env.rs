//! Environment/runtime helpers
//!
//! Sanity checks run once at startup, before the server binds.

use std::path::Path;

use tracing::warn;

/// Ensure the offload directory exists and warn when status files are missing.
pub async fn ensure_env(offload_dir: &str, status_files: &[&str]) -> anyhow::Result<()> {
    for f in status_files {
        if tokio::fs::metadata(f).await.is_err() {
            warn!(file = %f, "status file not found; /status will report \"unknown\"");
        }
    }
    tokio::fs::create_dir_all(offload_dir)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {offload_dir}: {e}"))?;
    Ok(())
}

/// Read a small text file and trim it; `"unknown"` if it cannot be read.
pub async fn read_trimmed_or_unknown(path: impl AsRef<Path>) -> String {
    match tokio::fs::read_to_string(path.as_ref()).await {
        Ok(s) => s.trim().to_string(),
        Err(_) => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_trimmed_strips_whitespace() -> anyhow::Result<()> {
        let tmp = std::env::temp_dir().join(format!("ukv_version_{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, "  1.4.0\n").await?;
        assert_eq!(read_trimmed_or_unknown(&tmp).await, "1.4.0");
        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_reads_unknown() {
        let path = std::env::temp_dir().join("definitely-missing-ukv-build-file");
        assert_eq!(read_trimmed_or_unknown(path).await, "unknown");
    }

    #[tokio::test]
    async fn ensure_env_creates_offload_dir() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join(format!("ukv_offload_{}", uuid::Uuid::new_v4()));
        let dir_s = dir.to_string_lossy().to_string();
        ensure_env(&dir_s, &[]).await?;
        assert!(tokio::fs::metadata(&dir).await?.is_dir());
        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }
}
