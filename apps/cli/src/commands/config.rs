//! `multigrade config`: show the effective configuration.

use multigrade_core::MultigradeConfig;

pub fn execute(config: &MultigradeConfig, paths: bool) -> anyhow::Result<()> {
    if paths {
        for path in [MultigradeConfig::default_global_path(), MultigradeConfig::default_local_path()] {
            let marker = if path.exists() { "found" } else { "missing" };
            println!("{} ({marker})", path.display());
        }
        return Ok(());
    }
    print!("{}", config.to_toml_string()?);
    Ok(())
}
