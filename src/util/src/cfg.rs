use anyhow::Context;
use std::path::{Path, PathBuf};

pub const DATA_DIR_VAR: &str = "HOJ_DATA";
pub const CONFIG_VAR: &str = "HOJ_CONFIG";

#[derive(Debug)]
pub struct CfgData {
    pub data_dir: PathBuf,
}

impl CfgData {
    /// `$HOJ_CONFIG` if set, otherwise `<data dir>/etc/<name>.yaml`
    pub fn config_path(&self, name: &str) -> PathBuf {
        match std::env::var_os(CONFIG_VAR) {
            Some(path) => PathBuf::from(path),
            None => config_in(&self.data_dir, name),
        }
    }
}

fn config_in(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join("etc").join(format!("{}.yaml", name))
}

fn find_data_dir() -> anyhow::Result<PathBuf> {
    match std::env::var_os(DATA_DIR_VAR) {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => Err(anyhow::anyhow!("{} env var is missing", DATA_DIR_VAR)),
    }
}

pub fn load_cfg_data() -> anyhow::Result<CfgData> {
    let data_dir = find_data_dir().context("failed to find data dir")?;
    Ok(CfgData { data_dir })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_lives_in_etc() {
        assert_eq!(
            config_in(Path::new("/var/hoj"), "invoker"),
            PathBuf::from("/var/hoj/etc/invoker.yaml")
        );
    }
}
