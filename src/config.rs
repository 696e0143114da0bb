use std::path::PathBuf;
use std::time::Duration;

/// Daemon settings, read from `CAMPUSD_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// JSON seed file. `None` loads the built-in demo campus.
    pub seed: Option<PathBuf>,
    pub metrics_port: Option<u16>,
    /// How often the vacancy gauges are recomputed.
    pub refresh: Duration,
}

const DEFAULT_REFRESH_SECS: u64 = 60;

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: None,
            metrics_port: None,
            refresh: Duration::from_secs(DEFAULT_REFRESH_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable values fall back to their defaults. A refresh of zero
    /// seconds is treated as one.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let seed = lookup("CAMPUSD_SEED")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let metrics_port = lookup("CAMPUSD_METRICS_PORT").and_then(|s| s.trim().parse().ok());
        let refresh_secs: u64 = lookup("CAMPUSD_REFRESH_SECS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_REFRESH_SECS);

        Self {
            seed,
            metrics_port,
            refresh: Duration::from_secs(refresh_secs.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(from_pairs(&[]), Config::default());
    }

    #[test]
    fn reads_all_variables() {
        let config = from_pairs(&[
            ("CAMPUSD_SEED", "/srv/campus.json"),
            ("CAMPUSD_METRICS_PORT", "9100"),
            ("CAMPUSD_REFRESH_SECS", "5"),
        ]);
        assert_eq!(config.seed, Some(PathBuf::from("/srv/campus.json")));
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.refresh, Duration::from_secs(5));
    }

    #[test]
    fn garbage_falls_back() {
        let config = from_pairs(&[
            ("CAMPUSD_SEED", "  "),
            ("CAMPUSD_METRICS_PORT", "not-a-port"),
            ("CAMPUSD_REFRESH_SECS", "0"),
        ]);
        assert_eq!(config.seed, None);
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.refresh, Duration::from_secs(1));
    }
}
