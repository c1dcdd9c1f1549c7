// src/pipeline/validate.rs

use std::path::Path;

use crate::error::Result;
use crate::models::Config;
use crate::utils::log as console;

/// Load and check a configuration file, reporting the effective settings.
pub fn run_validate(path: &Path) -> Result<Config> {
    console::header("Validate configuration");

    let config = if path.exists() {
        Config::load(path)?
    } else {
        log::warn!("{} not found, checking defaults", path.display());
        Config::default()
    };

    match config.validate() {
        Ok(()) => {
            console::success("Config OK");
            console::sub_item(&format!("Cache dir: {}", config.cache.dir.display()));
            console::sub_item(&format!("User agent: {}", config.fetch.user_agent));
            console::sub_item(&format!(
                "Rate: {} requests/s, {} pages in flight",
                config.fetch.requests_per_second, config.fetch.max_concurrent
            ));
            console::sub_item(&format!(
                "Retry budget: {}",
                config
                    .fetch
                    .retry_budget()
                    .map_or_else(|| "unbounded".to_string(), |n| n.to_string())
            ));
            console::sub_item(&format!("Hosts: {}", config.forum.hosts.join(", ")));
            Ok(config)
        }
        Err(e) => {
            log::error!("Config validation failed: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_checks_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = run_validate(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.fetch.user_agent, "SVQuestValet");
    }

    #[test]
    fn test_bad_values_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("votetally.toml");
        std::fs::write(&path, "[fetch]\nmax_concurrent = 0\n").unwrap();
        assert!(run_validate(&path).is_err());
    }
}
