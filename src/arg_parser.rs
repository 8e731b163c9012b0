use std::{
    env,
    path::{Path, PathBuf},
};

use argparse::{ArgumentParser, Print, Store};

// Environment variable overriding the default configuration path
const CONFIG_ENV: &str = "ECFAN_CONFIG";
const SYSTEM_CONFIG: &str = "/etc/ecfan/config.json";
const LOCAL_CONFIG: &str = "config.json";

pub struct ArgsOptions {
    pub config_file_path: PathBuf,
}

impl ArgsOptions {
    pub fn parse() -> Self {
        let mut options = ArgsOptions::default();

        {
            let mut parser = ArgumentParser::new();
            parser.set_description(
                "Drive the embedded controller fan from the CPU temperature",
            );

            // Configuration file path
            parser.refer(&mut options.config_file_path).add_option(
                &["-c", "--config"],
                Store,
                "The configuration file path, defaults to $ECFAN_CONFIG, \
                 then /etc/ecfan/config.json if present, then ./config.json",
            );

            // Show daemon version
            parser.add_option(
                &["-V", "--version"],
                Print(env!("CARGO_PKG_VERSION").to_string()),
                "Show the daemon version",
            );

            parser.parse_args_or_exit();
        }

        options
    }
}

impl Default for ArgsOptions {
    fn default() -> Self {
        Self {
            config_file_path: default_config_path(
                env::var_os(CONFIG_ENV).map(PathBuf::from),
                Path::new(SYSTEM_CONFIG),
            ),
        }
    }
}

// An explicit environment path wins, then the system wide file,
// finally the file in the working directory
fn default_config_path(from_env: Option<PathBuf>, system: &Path) -> PathBuf {
    from_env
        .filter(|path| !path.as_os_str().is_empty())
        .or_else(|| system.exists().then(|| system.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG))
}
