use std::path::Path;
use std::str::FromStr;

use appimg::Layout;
use log::LevelFilter;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
    pub layout: Layout,
}

impl Config {
    pub fn open<P: AsRef<Path>>(config_dir: P) -> Result<Self, Error> {
        match fs_err::read_to_string(config_dir.as_ref().join("config.toml")) {
            Ok(s) => Ok(toml::from_str(&s)?),
            Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Default::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn log_level(&self) -> Result<LevelFilter, Error> {
        LevelFilter::from_str(&self.log_level).map_err(|_| Error::LogLevel(self.log_level.clone()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "warn".into(),
            layout: Default::default(),
        }
    }
}
