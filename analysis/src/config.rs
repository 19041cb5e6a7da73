//! Analysis settings.
//!
//! Each value comes from its environment variable when set and parseable,
//! otherwise from the built-in default:
//!
//! - `CHESS_ENGINE_PATH`: engine binary (searched for when unset)
//! - `CHESS_LIVE_DEPTH`, `CHESS_MAX_LIVE_DEPTH`, `CHESS_LIVE_LINES`
//! - `CHESS_SWEEP_DEPTH`
//! - `CHESS_ENGINE_THREADS`, `CHESS_ENGINE_HASH_MB`

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use engine::SessionConfig;

use crate::live::LiveOptions;

pub const DEFAULT_LIVE_DEPTH: u32 = 20;
pub const DEFAULT_MAX_LIVE_DEPTH: u32 = 30;
pub const DEFAULT_LIVE_LINES: u8 = 3;
pub const DEFAULT_SWEEP_DEPTH: u32 = 18;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub engine_path: Option<PathBuf>,
    pub live_depth: u32,
    /// Upper bound applied to every live request.
    pub max_live_depth: u32,
    pub live_lines: u8,
    pub sweep_depth: u32,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
    pub restart_backoff: Duration,
    pub handshake_timeout: Duration,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            engine_path: None,
            live_depth: DEFAULT_LIVE_DEPTH,
            max_live_depth: DEFAULT_MAX_LIVE_DEPTH,
            live_lines: DEFAULT_LIVE_LINES,
            sweep_depth: DEFAULT_SWEEP_DEPTH,
            threads: None,
            hash_mb: None,
            restart_backoff: Duration::from_secs(1),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl AnalysisSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_live_depth =
            parse_var(&lookup, "CHESS_MAX_LIVE_DEPTH").unwrap_or(defaults.max_live_depth);
        let live_depth = parse_var(&lookup, "CHESS_LIVE_DEPTH").unwrap_or(defaults.live_depth);

        Self {
            engine_path: lookup("CHESS_ENGINE_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            live_depth: live_depth.clamp(1, max_live_depth.max(1)),
            max_live_depth: max_live_depth.max(1),
            live_lines: parse_var(&lookup, "CHESS_LIVE_LINES")
                .unwrap_or(defaults.live_lines)
                .max(1),
            sweep_depth: parse_var(&lookup, "CHESS_SWEEP_DEPTH")
                .unwrap_or(defaults.sweep_depth)
                .max(1),
            threads: parse_var(&lookup, "CHESS_ENGINE_THREADS"),
            hash_mb: parse_var(&lookup, "CHESS_ENGINE_HASH_MB"),
            ..defaults
        }
    }

    pub fn live_options(&self) -> LiveOptions {
        LiveOptions {
            depth: self.live_depth,
            line_count: self.live_lines,
        }
    }

    pub fn live_session_config(&self) -> SessionConfig {
        SessionConfig {
            multipv: self.live_lines,
            ..self.session_config("live")
        }
    }

    pub fn sweep_session_config(&self) -> SessionConfig {
        self.session_config("sweep")
    }

    fn session_config(&self, label: &str) -> SessionConfig {
        SessionConfig {
            threads: self.threads,
            hash_mb: self.hash_mb,
            restart_backoff: self.restart_backoff,
            handshake_timeout: self.handshake_timeout,
            ..SessionConfig::labeled(label)
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring malformed setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> AnalysisSettings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AnalysisSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]);
        assert_eq!(s, AnalysisSettings::default());
        assert_eq!(s.live_depth, 20);
        assert_eq!(s.max_live_depth, 30);
        assert_eq!(s.live_lines, 3);
        assert_eq!(s.sweep_depth, 18);
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("CHESS_ENGINE_PATH", "/opt/sf"),
            ("CHESS_LIVE_DEPTH", "24"),
            ("CHESS_LIVE_LINES", "5"),
            ("CHESS_SWEEP_DEPTH", "12"),
            ("CHESS_ENGINE_THREADS", "4"),
            ("CHESS_ENGINE_HASH_MB", "256"),
        ]);
        assert_eq!(s.engine_path, Some(PathBuf::from("/opt/sf")));
        assert_eq!(s.live_depth, 24);
        assert_eq!(s.live_lines, 5);
        assert_eq!(s.sweep_depth, 12);
        assert_eq!(s.threads, Some(4));
        assert_eq!(s.hash_mb, Some(256));
    }

    #[test]
    fn test_malformed_values_ignored() {
        let s = settings(&[("CHESS_LIVE_DEPTH", "deep"), ("CHESS_ENGINE_THREADS", "-2")]);
        assert_eq!(s.live_depth, DEFAULT_LIVE_DEPTH);
        assert_eq!(s.threads, None);
    }

    #[test]
    fn test_live_depth_clamped_to_max() {
        let s = settings(&[("CHESS_LIVE_DEPTH", "45"), ("CHESS_MAX_LIVE_DEPTH", "25")]);
        assert_eq!(s.live_depth, 25);
    }

    #[test]
    fn test_session_configs() {
        let s = settings(&[("CHESS_ENGINE_THREADS", "2")]);
        let live = s.live_session_config();
        assert_eq!(live.label, "live");
        assert_eq!(live.multipv, 3);
        assert_eq!(live.threads, Some(2));

        let sweep = s.sweep_session_config();
        assert_eq!(sweep.label, "sweep");
        assert_eq!(sweep.multipv, 1);
    }
}
