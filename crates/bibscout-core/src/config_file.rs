use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Config;
use crate::fetch::SessionConfig;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub backends: Option<BackendsConfig>,
    pub limits: Option<LimitsConfig>,
    pub session: Option<SessionFileConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendsConfig {
    pub primary_url: Option<String>,
    pub websearch_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub primary_tries: Option<u32>,
    pub fallback_tries: Option<u32>,
    pub accept_ratio: Option<f64>,
    pub window_step: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFileConfig {
    pub cookie_file: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

/// Platform config directory path: `<config_dir>/bibscout/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bibscout").join("config.toml"))
}

/// Load config by cascading CWD `.bibscout.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(&PathBuf::from(".bibscout.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &PathBuf) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    fn pick<T: Clone>(over: Option<T>, base: Option<T>) -> Option<T> {
        over.or(base)
    }

    let (bb, ob) = (base.backends.unwrap_or_default(), overlay.backends.unwrap_or_default());
    let (bl, ol) = (base.limits.unwrap_or_default(), overlay.limits.unwrap_or_default());
    let (bs, os) = (base.session.unwrap_or_default(), overlay.session.unwrap_or_default());

    ConfigFile {
        backends: Some(BackendsConfig {
            primary_url: pick(ob.primary_url, bb.primary_url),
            websearch_url: pick(ob.websearch_url, bb.websearch_url),
        }),
        limits: Some(LimitsConfig {
            primary_tries: pick(ol.primary_tries, bl.primary_tries),
            fallback_tries: pick(ol.fallback_tries, bl.fallback_tries),
            accept_ratio: pick(ol.accept_ratio, bl.accept_ratio),
            window_step: pick(ol.window_step, bl.window_step),
            timeout_secs: pick(ol.timeout_secs, bl.timeout_secs),
        }),
        session: Some(SessionFileConfig {
            cookie_file: pick(os.cookie_file, bs.cookie_file),
            user_agent: pick(os.user_agent, bs.user_agent),
            referer: pick(os.referer, bs.referer),
        }),
    }
}

impl ConfigFile {
    /// Materialize runtime settings, filling gaps with defaults.
    pub fn into_parts(self) -> (Config, SessionConfig) {
        let defaults = Config::default();
        let backends = self.backends.unwrap_or_default();
        let limits = self.limits.unwrap_or_default();
        let session_file = self.session.unwrap_or_default();

        let config = Config {
            primary_url: backends.primary_url.unwrap_or(defaults.primary_url),
            websearch_url: backends.websearch_url.unwrap_or(defaults.websearch_url),
            primary_tries: limits.primary_tries.unwrap_or(defaults.primary_tries),
            fallback_tries: limits.fallback_tries.unwrap_or(defaults.fallback_tries),
            accept_ratio: limits.accept_ratio.unwrap_or(defaults.accept_ratio),
            window_step: limits.window_step.unwrap_or(defaults.window_step),
            timeout_secs: limits.timeout_secs.unwrap_or(defaults.timeout_secs),
        };

        let session_defaults = SessionConfig::default();
        let session = SessionConfig {
            user_agent: session_file.user_agent.unwrap_or(session_defaults.user_agent),
            referer: session_file.referer.unwrap_or(session_defaults.referer),
            cookie_file: session_file.cookie_file.map(PathBuf::from),
        };

        (config, session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_toml() {
        let config = ConfigFile {
            limits: Some(LimitsConfig {
                primary_tries: Some(5),
                ..Default::default()
            }),
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.limits.unwrap().primary_tries, Some(5));
    }

    #[test]
    fn partial_file_parses() {
        let toml_str = "[backends]\nprimary_url = \"https://scholar.example.com/scholar\"\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        assert!(parsed.limits.is_none());
        assert_eq!(
            parsed.backends.unwrap().primary_url.as_deref(),
            Some("https://scholar.example.com/scholar")
        );
    }

    #[test]
    fn merge_overlay_wins() {
        let base = ConfigFile {
            limits: Some(LimitsConfig {
                primary_tries: Some(3),
                fallback_tries: Some(2),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            limits: Some(LimitsConfig {
                primary_tries: Some(6),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        let limits = merged.limits.unwrap();
        assert_eq!(limits.primary_tries, Some(6));
        assert_eq!(limits.fallback_tries, Some(2));
    }

    #[test]
    fn into_parts_fills_defaults() {
        let (config, session) = ConfigFile::default().into_parts();
        assert_eq!(config.primary_tries, 3);
        assert_eq!(config.fallback_tries, 2);
        assert!((config.accept_ratio - 0.1).abs() < f64::EPSILON);
        assert!(session.cookie_file.is_none());
    }
}
