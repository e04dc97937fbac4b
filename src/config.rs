use crate::collectors::{SamplerSettings, MIN_CPU_INTERVAL};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    #[serde(
        default = "default_cpu_sample_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub cpu_sample_interval: Duration,
    #[serde(default = "default_top_processes")]
    pub top_processes: usize,
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            report_path: default_report_path(),
            log_path: default_log_path(),
            cpu_sample_interval: default_cpu_sample_interval(),
            top_processes: default_top_processes(),
            refresh_secs: default_refresh_secs(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не удалось прочитать файл конфигурации {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать YAML в {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("ошибка валидации конфигурации: {0}")]
    Validation(String),
    #[error("не удалось создать каталог {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::Validation(
                "поле listen обязательно".to_string(),
            ));
        }
        if SocketAddr::from_str(&self.listen).is_err() {
            return Err(ConfigError::Validation(
                "поле listen должно быть корректным адресом host:port".to_string(),
            ));
        }
        if self.cpu_sample_interval < MIN_CPU_INTERVAL {
            return Err(ConfigError::Validation(
                "cpu_sample_interval должно быть >= 1s".to_string(),
            ));
        }
        if self.top_processes < 1 {
            return Err(ConfigError::Validation(
                "top_processes должно быть >= 1".to_string(),
            ));
        }
        if self.refresh_secs < 1 {
            return Err(ConfigError::Validation(
                "refresh_secs должно быть >= 1".to_string(),
            ));
        }
        validate_file_path("report_path", &self.report_path)?;
        validate_file_path("log_path", &self.log_path)?;
        if self.report_path == self.log_path {
            return Err(ConfigError::Validation(
                "report_path и log_path должны различаться".to_string(),
            ));
        }

        Ok(())
    }

    /// Creates the parent directories of the report and log files.
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for file in [&self.report_path, &self.log_path] {
            let Some(dir) = file.parent().filter(|d| !d.as_os_str().is_empty()) else {
                continue;
            };
            fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn sampler_settings(&self) -> SamplerSettings {
        SamplerSettings {
            cpu_interval: self.cpu_sample_interval,
            top_processes: self.top_processes,
        }
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_file_path(field: &str, path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() || path.file_name().is_none() {
        return Err(ConfigError::Validation(format!(
            "{field} должен указывать на файл"
        )));
    }
    Ok(())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn default_listen() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_report_path() -> PathBuf {
    PathBuf::from("report").join("system_report.txt")
}

fn default_log_path() -> PathBuf {
    PathBuf::from("log").join("system_report.log")
}

const fn default_cpu_sample_interval() -> Duration {
    MIN_CPU_INTERVAL
}

const fn default_top_processes() -> usize {
    5
}

const fn default_refresh_secs() -> u64 {
    15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().expect("конфигурация по умолчанию должна быть валидной");
        assert_eq!(cfg.report_path, Path::new("report/system_report.txt"));
        assert_eq!(cfg.log_path, Path::new("log/system_report.log"));
        assert_eq!(cfg.sampler_settings(), SamplerSettings::default());
    }

    #[test]
    fn example_yaml_parses_to_defaults() {
        let cfg: Config = serde_yaml::from_str(Config::example_yaml()).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg: Config =
            serde_yaml::from_str("listen: \"0.0.0.0:8080\"\ncpu_sample_interval: 2s\n").unwrap();
        assert_eq!(cfg.listen, "0.0.0.0:8080");
        assert_eq!(cfg.cpu_sample_interval, Duration::from_secs(2));
        assert_eq!(cfg.top_processes, 5);
        cfg.validate().unwrap();
    }

    #[test]
    fn sub_second_interval_is_rejected() {
        let cfg = Config {
            cpu_sample_interval: Duration::from_millis(500),
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn bad_listen_is_rejected() {
        let cfg = Config {
            listen: "localhost".to_string(),
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn same_report_and_log_path_is_rejected() {
        let cfg = Config {
            log_path: PathBuf::from("report/system_report.txt"),
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn ensure_dirs_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            report_path: dir.path().join("report").join("system_report.txt"),
            log_path: dir.path().join("log").join("system_report.log"),
            ..Config::default()
        };
        cfg.ensure_dirs().unwrap();
        assert!(dir.path().join("report").is_dir());
        assert!(dir.path().join("log").is_dir());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Config::load_from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }
}
