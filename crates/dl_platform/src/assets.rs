use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::traits::{AssetLoader, PlatformError};

/// Loads assets from the file system, relative to an optional root.
#[derive(Debug, Clone, Default)]
pub struct FsAssetLoader {
    root: Option<PathBuf>,
}

impl FsAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        // Page-relative paths like "../../resources/apitest/bridge.jpg" keep working under a root.
        let relative = Path::new(path);
        match &self.root {
            Some(root) if relative.is_relative() => root.join(relative),
            _ => relative.to_path_buf(),
        }
    }
}

impl AssetLoader for FsAssetLoader {
    fn load(&self, path: &str) -> Result<Vec<u8>, PlatformError> {
        if path.trim().is_empty() {
            return Err(PlatformError::NotFound(path.to_string()));
        }
        let full_path = self.resolve_path(path);
        std::fs::read(&full_path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PlatformError::NotFound(full_path.display().to_string())
            } else {
                PlatformError::Io {
                    path: full_path.display().to_string(),
                    source,
                }
            }
        })
    }
}

/// In-memory asset table.
#[derive(Debug, Default)]
pub struct MemoryAssets {
    assets: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.assets.write().insert(path.into(), bytes);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.assets.read().contains_key(path)
    }
}

impl AssetLoader for MemoryAssets {
    fn load(&self, path: &str) -> Result<Vec<u8>, PlatformError> {
        self.assets
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_loader_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), b"bytes").unwrap();

        let loader = FsAssetLoader::with_root(dir.path());

        assert_eq!(loader.load("logo.png").unwrap(), b"bytes".to_vec());
        assert!(matches!(
            loader.load("missing.png"),
            Err(PlatformError::NotFound(_))
        ));
        assert!(matches!(loader.load(""), Err(PlatformError::NotFound(_))));
    }

    #[test]
    fn memory_assets_lookup() {
        let assets = MemoryAssets::new();
        assets.insert("font.ttf", vec![1, 2, 3]);

        assert!(assets.contains("font.ttf"));
        assert_eq!(assets.load("font.ttf").unwrap(), vec![1, 2, 3]);
        assert!(assets.load("other.ttf").is_err());
    }
}
