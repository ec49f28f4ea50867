use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::gesture::{Action, GestureSettings, Technique};
use crate::net::SessionConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub retry_delay_ms: u64,
    pub handshake_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "192.168.0.10".to_string(),
            port: 8000,
            retry_delay_ms: 1000,
            handshake_timeout_ms: 5000,
        }
    }
}

/// Literal tokens of the line protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub delimiter: String,
    pub hello: String,
    pub confirm: String,
    pub press: String,
    pub release: String,
    pub click: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            delimiter: "_".to_string(),
            hello: "MOOSE".to_string(),
            confirm: "CONFIRM".to_string(),
            press: "PRESS".to_string(),
            release: "RELEASE".to_string(),
            click: "CLICK".to_string(),
        }
    }
}

impl ProtocolConfig {
    /// Outbound line for an action
    pub fn token(&self, action: Action) -> &str {
        match action {
            Action::Press => &self.press,
            Action::Release => &self.release,
            Action::Click => &self.click,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub swipe_dy_min: f32,
    pub tap_duration_max_ms: i64,
    pub vibrate: bool,
    pub vibrate_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technique: Option<Technique>,
}

impl Default for GestureConfig {
    fn default() -> Self {
        let settings = GestureSettings::default();
        Self {
            swipe_dy_min: settings.swipe_dy_min,
            tap_duration_max_ms: settings.tap_duration_max_ms,
            vibrate: settings.vibrate,
            vibrate_ms: settings.vibrate_ms,
            technique: None,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let protocol = &self.protocol;

        if self.server.host.trim().is_empty() {
            anyhow::bail!("server.host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("server.port must not be 0");
        }
        if protocol.delimiter.is_empty() || protocol.delimiter.contains('\n') {
            anyhow::bail!("protocol.delimiter must be non-empty and single-line");
        }

        for (name, token) in [
            ("hello", &protocol.hello),
            ("confirm", &protocol.confirm),
            ("press", &protocol.press),
            ("release", &protocol.release),
            ("click", &protocol.click),
        ] {
            if token.is_empty() {
                anyhow::bail!("protocol.{name} must not be empty");
            }
            if token.contains('\n') || token.contains('\r') {
                anyhow::bail!("protocol.{name} must be a single line");
            }
            if token.contains(protocol.delimiter.as_str()) {
                anyhow::bail!(
                    "protocol.{name} '{token}' contains the delimiter '{}'",
                    protocol.delimiter
                );
            }
        }

        if self.gesture.swipe_dy_min.is_nan() || self.gesture.swipe_dy_min <= 0.0 {
            anyhow::bail!("gesture.swipe_dy_min must be positive");
        }
        if self.gesture.tap_duration_max_ms <= 0 {
            anyhow::bail!("gesture.tap_duration_max_ms must be positive");
        }

        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            addr: self.addr(),
            hello: self.protocol.hello.clone(),
            confirm: self.protocol.confirm.clone(),
            retry_delay: Duration::from_millis(self.server.retry_delay_ms),
            handshake_timeout: Duration::from_millis(self.server.handshake_timeout_ms),
        }
    }

    pub fn gesture_settings(&self) -> GestureSettings {
        GestureSettings {
            swipe_dy_min: self.gesture.swipe_dy_min,
            tap_duration_max_ms: self.gesture.tap_duration_max_ms,
            vibrate: self.gesture.vibrate,
            vibrate_ms: self.gesture.vibrate_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.retry_delay_ms, 1000);
        assert_eq!(config.protocol.delimiter, "_");
        assert_eq!(config.gesture.swipe_dy_min, 50.0);
        assert_eq!(config.gesture.tap_duration_max_ms, 300);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[server]
host = "127.0.0.1"
port = 9000

[gesture]
swipe_dy_min = 80.0
technique = "TAP"
"#
        )
        .unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.addr(), "127.0.0.1:9000");
        assert_eq!(config.server.retry_delay_ms, 1000);
        assert_eq!(config.gesture.swipe_dy_min, 80.0);
        assert_eq!(config.gesture.tap_duration_max_ms, 300);
        assert_eq!(config.gesture.technique, Some(Technique::Tap));
        assert_eq!(config.protocol.hello, "MOOSE");
    }

    #[test]
    fn save_then_load_preserves_values() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.server.port = 7001;
        config.protocol.click = "LCLICK".to_string();
        config.gesture.vibrate = true;

        config.save(temp_file.path()).unwrap();
        let loaded = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_token_with_delimiter() {
        let mut config = Config::default();
        config.protocol.press = "PRESS_PRI".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("protocol.press"));
    }

    #[test]
    fn validate_rejects_empty_delimiter() {
        let mut config = Config::default();
        config.protocol.delimiter = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_thresholds() {
        let mut config = Config::default();
        config.gesture.swipe_dy_min = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.gesture.tap_duration_max_ms = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn session_config_maps_durations() {
        let config = Config::default();
        let session = config.session_config();
        assert_eq!(session.addr, "192.168.0.10:8000");
        assert_eq!(session.retry_delay, Duration::from_millis(1000));
        assert_eq!(session.handshake_timeout, Duration::from_secs(5));
        assert_eq!(session.hello, "MOOSE");
        assert_eq!(session.confirm, "CONFIRM");
    }

    #[test]
    fn tokens_follow_protocol_config() {
        let protocol = ProtocolConfig::default();
        assert_eq!(protocol.token(Action::Press), "PRESS");
        assert_eq!(protocol.token(Action::Release), "RELEASE");
        assert_eq!(protocol.token(Action::Click), "CLICK");
    }
}
