use std::path::{Component, Path, PathBuf};

use baseseva_shared::upload::{extension_for, validate_certificate};
use chrono::{DateTime, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// Verify that a resolved path stays within the storage root.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(base)
        .unwrap_or(target)
        .components()
    {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::ParentDir => {
                return Err(ServerError::BadRequest("Path traversal detected".to_string()));
            }
            _ => {}
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::BadRequest("Path traversal detected".to_string()));
    }
    Ok(resolved)
}

/// File names are generated by [`CertificateStore::store`]; anything else
/// reaching a lookup is rejected before touching the filesystem.
fn check_file_name(file_name: &str) -> Result<(), ServerError> {
    let valid = !file_name.is_empty()
        && file_name.len() <= 128
        && !file_name.starts_with('.')
        && file_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid && !file_name.contains("..") {
        Ok(())
    } else {
        Err(ServerError::BadRequest(format!("Invalid file name: {file_name}")))
    }
}

const CREATE_ATTEMPTS: usize = 4;

/// Certificate images on local disk, one file per upload.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    base_path: PathBuf,
}

impl CertificateStore {
    pub async fn new(base_path: PathBuf) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::Storage(format!(
                "Failed to create certificate directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Certificate store initialized");

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Validate and write a certificate, returning the generated file name
    /// `{wallet}_{millis}_{suffix}.{ext}`. Nothing is written if validation
    /// fails, and an existing file is never overwritten.
    pub async fn store(
        &self,
        wallet_address: &str,
        content_type: &str,
        data: &[u8],
        now: DateTime<Utc>,
    ) -> Result<String, ServerError> {
        validate_certificate(content_type, data.len())?;

        for _ in 0..CREATE_ATTEMPTS {
            let file_name = format!(
                "{}_{}_{}.{}",
                wallet_address,
                now.timestamp_millis(),
                &Uuid::new_v4().simple().to_string()[..8],
                extension_for(content_type)
            );
            let path = self.safe_path(&file_name)?;

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!(file = %file_name, "Certificate name taken, retrying");
                    continue;
                }
                Err(e) => {
                    return Err(ServerError::Storage(format!(
                        "Failed to create certificate {file_name}: {e}"
                    )))
                }
            };

            let written = async {
                file.write_all(data).await?;
                file.flush().await
            }
            .await;
            if let Err(e) = written {
                // The file is ours; do not leave a partial write behind.
                let _ = fs::remove_file(&path).await;
                return Err(ServerError::Storage(format!(
                    "Failed to write certificate {file_name}: {e}"
                )));
            }

            debug!(file = %file_name, size = data.len(), "Stored certificate");
            return Ok(file_name);
        }

        Err(ServerError::Storage(
            "Failed to allocate a unique certificate name".to_string(),
        ))
    }

    pub async fn read(&self, file_name: &str) -> Result<Vec<u8>, ServerError> {
        let path = self.safe_path(file_name)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ServerError::NotFound(format!("File {file_name}")));
        }

        let data = fs::read(&path).await.map_err(|e| {
            ServerError::Storage(format!("Failed to read certificate {file_name}: {e}"))
        })?;

        debug!(file = %file_name, size = data.len(), "Read certificate");
        Ok(data)
    }

    /// Returns `false` if there was no such file.
    pub async fn delete(&self, file_name: &str) -> Result<bool, ServerError> {
        let path = self.safe_path(file_name)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(file = %file_name, "Deleted certificate");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ServerError::Storage(format!(
                "Failed to delete certificate {file_name}: {e}"
            ))),
        }
    }

    fn safe_path(&self, file_name: &str) -> Result<PathBuf, ServerError> {
        check_file_name(file_name)?;
        ensure_within(&self.base_path, &self.base_path.join(file_name))
    }
}
