//! Reference image upload and server-path resolution

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::client::SignalingApi;
use crate::error::Result;

/// Uploads reference images and caches their server-side paths
///
/// The pipeline consumes server-side asset paths, not raw bytes, so a local
/// image must be uploaded once and addressed by its stored path afterwards.
/// The listing endpoint is authoritative for paths; the upload response is
/// used as a fallback when the listing fails.
pub struct AssetStore {
    api: Arc<dyn SignalingApi>,
    paths: Mutex<HashMap<String, String>>,
}

impl AssetStore {
    pub fn new(api: Arc<dyn SignalingApi>) -> Self {
        Self {
            api,
            paths: Mutex::new(HashMap::new()),
        }
    }

    /// Upload the given local images, returning how many uploads succeeded
    ///
    /// Per-file failures are logged and skipped so one unreadable image does
    /// not block the rest.
    pub async fn upload_reference_images(&self, files: &[PathBuf]) -> Result<usize> {
        let mut uploaded = 0;

        for file in files {
            let filename = match file.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => {
                    warn!(path = %file.display(), "skipping reference image with unusable name");
                    continue;
                }
            };

            let bytes = match tokio::fs::read(file).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %file.display(), "could not read reference image: {}", e);
                    continue;
                }
            };

            match self.api.upload_asset(&filename, bytes).await {
                Ok(response) => {
                    debug!(name = %filename, path = %response.path, "uploaded reference image");
                    self.paths.lock().insert(filename, response.path);
                    uploaded += 1;
                }
                Err(e) => {
                    warn!(name = %filename, "failed to upload reference image: {}", e);
                }
            }
        }

        if let Err(e) = self.refresh_paths().await {
            warn!("failed to refresh asset paths: {}", e);
        }

        info!(uploaded, total = files.len(), "reference image upload finished");
        Ok(uploaded)
    }

    /// Refresh the name-to-path cache from the server's asset listing
    pub async fn refresh_paths(&self) -> Result<()> {
        let assets = self.api.list_assets().await?;
        let mut paths = self.paths.lock();
        for asset in assets {
            paths.insert(asset.name, asset.path);
        }
        Ok(())
    }

    /// Resolve the server-side path of a previously uploaded asset
    pub fn resolve(&self, name: &str) -> Option<String> {
        self.paths.lock().get(name).cloned()
    }

    /// Resolve several names, skipping (with a warning) any unknown one
    pub fn resolve_all(&self, names: &[&str]) -> Vec<String> {
        let paths = self.paths.lock();
        names
            .iter()
            .filter_map(|name| match paths.get(*name) {
                Some(path) => Some(path.clone()),
                None => {
                    warn!(name, "no uploaded asset with this name");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signaling::mock::MockSignaling;
    use std::io::Write;

    #[tokio::test]
    async fn uploads_and_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("orb.png");
        let mut f = std::fs::File::create(&image).unwrap();
        f.write_all(b"png-bytes").unwrap();

        let api = Arc::new(MockSignaling::default());
        let store = AssetStore::new(api.clone());

        let uploaded = store
            .upload_reference_images(&[image, dir.path().join("missing.png")])
            .await
            .unwrap();
        assert_eq!(uploaded, 1);

        // Upload response path is cached; listing (empty in the mock) does not
        // clobber it.
        assert_eq!(store.resolve("orb.png").as_deref(), Some("/assets/orb.png"));
        assert!(store.resolve("missing.png").is_none());

        let calls = api.calls.lock().unwrap();
        assert!(calls.iter().any(|c| c == "upload_asset[orb.png]"));
        assert!(calls.iter().any(|c| c == "list_assets"));
    }

    #[tokio::test]
    async fn listing_path_wins_over_upload_response() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("orb.png");
        std::fs::write(&image, b"png-bytes").unwrap();

        let api = Arc::new(MockSignaling::default());
        api.set_assets(vec![("orb.png", "/srv/assets/orb.png")]);
        let store = AssetStore::new(api);

        // The refresh at the end of the upload overwrites the upload
        // response path with the listing's.
        store.upload_reference_images(&[image]).await.unwrap();
        assert_eq!(
            store.resolve("orb.png").as_deref(),
            Some("/srv/assets/orb.png")
        );
        assert_eq!(
            store.resolve_all(&["orb.png", "unknown.png"]),
            vec!["/srv/assets/orb.png".to_string()]
        );
    }
}
