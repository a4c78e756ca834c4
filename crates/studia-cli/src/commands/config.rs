use anyhow::{Context, Result, bail};
use studia_core::config::RootConfig;
use studia_infrastructure::ConfigService;

/// Prints the configuration as loaded (defaults filled in) in TOML.
pub fn show(service: &ConfigService) -> Result<()> {
    let config = service
        .try_load()
        .context("Failed to load configuration")?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub fn path(service: &ConfigService) -> Result<()> {
    println!("{}", service.config_path()?.display());
    Ok(())
}

/// Writes the default configuration. Refuses to overwrite an existing file.
pub fn init(service: &ConfigService) -> Result<()> {
    let path = service.config_path()?;
    if path.exists() {
        bail!("{} already exists", path.display());
    }

    service
        .save(&RootConfig::default())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_defaults_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        let service = ConfigService::with_path(path.clone());

        init(&service).unwrap();
        assert!(path.exists());
        assert_eq!(service.try_load().unwrap(), RootConfig::default());

        assert!(init(&service).is_err());
    }
}
