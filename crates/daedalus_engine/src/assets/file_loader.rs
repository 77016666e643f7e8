//! Whole-file byte loading for shader bytecode

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use super::AssetError;

/// Reads complete files into memory.
pub trait FileLoader {
    /// Read every byte of the file at `path`.
    fn read_all_bytes(&self, path: &Path) -> Result<Vec<u8>, AssetError>;
}

/// Loads files from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsFileLoader;

impl FileLoader for FsFileLoader {
    fn read_all_bytes(&self, path: &Path) -> Result<Vec<u8>, AssetError> {
        let display = path.display().to_string();

        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AssetError::FileNotFound { path: display.clone() },
            _ => AssetError::Io { path: display.clone(), source: e },
        })?;

        log::debug!("Loaded {} ({} bytes)", display, bytes.len());
        Ok(bytes)
    }
}

/// Serves files from an in-memory table keyed by path.
#[derive(Debug, Default, Clone)]
pub struct MemoryFileLoader {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryFileLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register file contents under `path`
    pub fn with_file(mut self, path: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.files.insert(path.into(), bytes);
        self
    }
}

impl FileLoader for MemoryFileLoader {
    fn read_all_bytes(&self, path: &Path) -> Result<Vec<u8>, AssetError> {
        let key = path.display().to_string();
        self.files
            .get(&key)
            .cloned()
            .ok_or(AssetError::FileNotFound { path: key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_loader_missing_file() {
        let path = std::env::temp_dir().join("daedalus_missing_shader_file.spv");
        let _ = std::fs::remove_file(&path);

        let result = FsFileLoader.read_all_bytes(&path);
        assert!(matches!(result, Err(AssetError::FileNotFound { .. })));
    }

    #[test]
    fn test_fs_loader_reads_all_bytes() {
        let path = std::env::temp_dir().join(format!("daedalus_loader_{}.bin", std::process::id()));
        std::fs::write(&path, [1u8, 2, 3, 4, 5]).unwrap();

        let bytes = FsFileLoader.read_all_bytes(&path).unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4, 5]);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_memory_loader_lookup() {
        let loader = MemoryFileLoader::new().with_file("data/vertex.spv", vec![7, 7]);

        assert_eq!(loader.read_all_bytes(Path::new("data/vertex.spv")).unwrap(), vec![7, 7]);
        assert!(matches!(
            loader.read_all_bytes(Path::new("data/fragment.spv")),
            Err(AssetError::FileNotFound { .. })
        ));
    }
}
