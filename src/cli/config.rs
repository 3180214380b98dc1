//! Config command handler.

use color_eyre::Result;

use crate::config::Config;

use super::App;

impl App {
    /// Print the configuration after all layers are merged.
    pub fn run_config(&self) -> Result<()> {
        let config = Config::load()?;
        println!("{}", serde_json::to_string_pretty(&config)?);
        Ok(())
    }
}
