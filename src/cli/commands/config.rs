//! `commitcv config` - inspect and initialize configuration

use console::style;

use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged effective configuration.
pub fn show(as_json: bool) -> Result<()> {
    ConfigLoader::show_config(as_json)
}

/// Show configuration file paths.
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Initialize the project configuration directory.
pub fn init(force: bool) -> Result<()> {
    let dir = ConfigLoader::init_project(force)?;
    println!(
        "{} initialized {}",
        style("✓").green(),
        style(dir.display()).bold()
    );
    println!("Edit {} to configure the run.", dir.join("config.toml").display());
    Ok(())
}
