use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "lawsarthi.yaml";
pub const DATA_DIR_NAME: &str = ".lawsarthi";
pub const DB_FILE_NAME: &str = "articles.db";

/// Well-known locations relative to a project root.
pub struct AppPaths {
    pub root: PathBuf,
    pub config: PathBuf,
    pub data: PathBuf,
    pub db: PathBuf,
}

impl AppPaths {
    pub fn from_current_dir() -> std::io::Result<Self> {
        Ok(Self::from_root(std::env::current_dir()?))
    }

    pub fn from_root(root: PathBuf) -> Self {
        let data = root.join(DATA_DIR_NAME);
        Self {
            config: root.join(CONFIG_FILE_NAME),
            db: data.join(DB_FILE_NAME),
            data,
            root,
        }
    }

    /// Resolve a configured path against the root unless it is already absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
