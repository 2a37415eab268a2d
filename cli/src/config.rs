use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        // CALIPER_DB overrides the platform data directory (tests, containers)
        if let Ok(path) = std::env::var("CALIPER_DB") {
            let db_path = PathBuf::from(path);
            let data_dir = db_path
                .parent()
                .map_or_else(|| PathBuf::from("."), std::path::Path::to_path_buf);
            std::fs::create_dir_all(&data_dir).with_context(|| {
                format!("Failed to create data directory: {}", data_dir.display())
            })?;
            return Ok(Config { db_path, data_dir });
        }

        let proj_dirs =
            ProjectDirs::from("", "", "caliper").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("caliper.db");

        Ok(Config { db_path, data_dir })
    }
}
