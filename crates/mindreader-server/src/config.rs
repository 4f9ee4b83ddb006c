use std::path::{Path, PathBuf};

/// Server configuration, loaded from environment variables.
pub struct Config {
    pub port: u16,
    /// Directory files are served from.
    pub web_root: PathBuf,
}

impl Config {
    /// Load `PORT` and `MINDREADER_WEB_ROOT`, preferring a built `dist/` under the root.
    pub fn from_env() -> Self {
        let root = std::env::var("MINDREADER_WEB_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("frontend"));

        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            web_root: prefer_dist(&root),
        }
    }
}

fn prefer_dist(root: &Path) -> PathBuf {
    let dist = root.join("dist");
    if dist.is_dir() {
        dist
    } else {
        root.to_path_buf()
    }
}
