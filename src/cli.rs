use clap::Parser;
use eyre::{Context, Result};

use crate::config::{self, Configuration, load_configuration, lookup_config_path};

#[derive(Debug, Parser)]
#[command(
    version,
    about,
    long_about = r#"A terminal chat client for a ReAct-style agent server

Replies stream in live with their Thought / Action / Observation trace
coloured as it arrives.

Default configuration file location looks up in the following order:
    * $XDG_CONFIG_HOME/tracechat/config.toml
    * $HOME/.config/tracechat/config.toml
    * $HOME/.tracechat.toml
"#,
    disable_version_flag = true
)]
pub struct Command {
    /// Configuration file path
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Agent server endpoint, overrides the configuration
    #[arg(short, long, value_name = "URL")]
    endpoint: Option<String>,

    /// Print start-up progress to stderr
    #[arg(long)]
    verbose: bool,

    /// Show the version
    #[arg(short, long)]
    version: bool,
}

impl Command {
    pub fn new() -> Command {
        Self::parse()
    }

    pub fn get_config(&self) -> Result<Configuration> {
        let config_path = self
            .config
            .clone()
            .unwrap_or_else(|| lookup_config_path().unwrap_or_default());

        let mut config = if config_path.is_empty() {
            // No config file, run on defaults
            Configuration::default()
        } else {
            load_configuration(config_path.as_str()).wrap_err("loading configuration")?
        };

        if let Some(endpoint) = &self.endpoint {
            config.backend.endpoint = endpoint.clone();
        }
        if self.verbose {
            config.general.verbose = true;
        }
        Ok(config)
    }

    pub fn version(&self) -> bool {
        self.version
    }

    pub fn print_version(&self) {
        println!("{}", config::version())
    }
}

impl Default for Command {
    fn default() -> Self {
        Self::new()
    }
}
