//! Local settings for the CLI

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Resolve the kubeconfig used by `remctl run`
pub fn kubeconfig_path(override_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(PathBuf::from(path));
    }

    if let Ok(path) = std::env::var("KUBECONFIG") {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let home = dirs_next::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".kube").join("config"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = kubeconfig_path(Some("/etc/rancher/k3s/k3s.yaml")).unwrap();
        assert_eq!(path, PathBuf::from("/etc/rancher/k3s/k3s.yaml"));
    }
}
