//! Application-level configuration loading: room defaults and round timings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::{dto::ws::RoomSettingsInput, state::quiz::RoomSettings};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_ARENA_CONFIG_PATH";

const MAX_PLAYERS_BOUNDS: (usize, usize) = (2, 50);
const TIME_PER_QUESTION_BOUNDS: (u64, u64) = (5, 300);
const QUESTION_COUNT_BOUNDS: (usize, usize) = (1, 100);

/// Settings applied when `create_room` omits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomDefaults {
    /// Default room capacity.
    pub max_players: usize,
    /// Default answer window.
    pub time_per_question: Duration,
    /// Default number of questions played.
    pub question_count: usize,
}

impl Default for RoomDefaults {
    fn default() -> Self {
        Self {
            max_players: 8,
            time_per_question: Duration::from_secs(30),
            question_count: 10,
        }
    }
}

/// Delays driving the round flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTimings {
    /// Pause between the last answer of a round and its results.
    pub all_answered_grace: Duration,
    /// How long results stay on screen before the next question.
    pub results_display: Duration,
    /// How long a finished room stays registered.
    pub cleanup_delay: Duration,
}

impl Default for RoundTimings {
    fn default() -> Self {
        Self {
            all_answered_grace: Duration::from_millis(1000),
            results_display: Duration::from_millis(4000),
            cleanup_delay: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    room_defaults: RoomDefaults,
    timings: RoundTimings,
}

impl AppConfig {
    /// Build a configuration from explicit values.
    pub fn new(room_defaults: RoomDefaults, timings: RoundTimings) -> Self {
        Self {
            room_defaults,
            timings,
        }
    }

    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        defaults = ?app_config.room_defaults,
                        timings = ?app_config.timings,
                        "loaded room configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Room setting defaults.
    pub fn room_defaults(&self) -> RoomDefaults {
        self.room_defaults
    }

    /// Round flow delays.
    pub fn timings(&self) -> RoundTimings {
        self.timings
    }

    /// Merge client supplied settings with the defaults.
    pub fn resolve_settings(&self, input: &RoomSettingsInput) -> RoomSettings {
        let defaults = self.room_defaults;
        RoomSettings {
            max_players: input
                .max_players
                .map(|value| value as usize)
                .unwrap_or(defaults.max_players),
            time_per_question: input
                .time_per_question
                .map(|secs| Duration::from_secs(u64::from(secs)))
                .unwrap_or(defaults.time_per_question),
            question_count: input
                .question_count
                .map(|value| value as usize)
                .unwrap_or(defaults.question_count),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    room_defaults: RawRoomDefaults,
    #[serde(default)]
    timings: RawTimings,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRoomDefaults {
    max_players: Option<usize>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    time_per_question: Option<Duration>,
    question_count: Option<usize>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTimings {
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    all_answered_grace_ms: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    results_display_ms: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    cleanup_delay_secs: Option<Duration>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = RoomDefaults::default();
        let timings = RoundTimings::default();
        let room = value.room_defaults;
        let raw_timings = value.timings;

        let time_per_question = room
            .time_per_question
            .unwrap_or(defaults.time_per_question)
            .as_secs()
            .clamp(TIME_PER_QUESTION_BOUNDS.0, TIME_PER_QUESTION_BOUNDS.1);

        Self {
            room_defaults: RoomDefaults {
                max_players: room
                    .max_players
                    .unwrap_or(defaults.max_players)
                    .clamp(MAX_PLAYERS_BOUNDS.0, MAX_PLAYERS_BOUNDS.1),
                time_per_question: Duration::from_secs(time_per_question),
                question_count: room
                    .question_count
                    .unwrap_or(defaults.question_count)
                    .clamp(QUESTION_COUNT_BOUNDS.0, QUESTION_COUNT_BOUNDS.1),
            },
            timings: RoundTimings {
                all_answered_grace: raw_timings
                    .all_answered_grace_ms
                    .unwrap_or(timings.all_answered_grace),
                results_display: raw_timings
                    .results_display_ms
                    .unwrap_or(timings.results_display),
                cleanup_delay: raw_timings
                    .cleanup_delay_secs
                    .unwrap_or(timings.cleanup_delay),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"roomDefaults":{"timePerQuestion":20},"timings":{"resultsDisplayMs":2500}}"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(
            config.room_defaults().time_per_question,
            Duration::from_secs(20)
        );
        assert_eq!(config.room_defaults().max_players, 8);
        assert_eq!(
            config.timings().results_display,
            Duration::from_millis(2500)
        );
        assert_eq!(config.timings().cleanup_delay, Duration::from_secs(300));
    }

    #[test]
    fn out_of_bounds_defaults_are_clamped() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"roomDefaults":{"maxPlayers":500,"timePerQuestion":1}}"#)
                .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.room_defaults().max_players, 50);
        assert_eq!(
            config.room_defaults().time_per_question,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn client_settings_override_defaults() {
        let config = AppConfig::default();
        let settings = config.resolve_settings(&RoomSettingsInput {
            max_players: Some(4),
            time_per_question: None,
            question_count: Some(3),
        });
        assert_eq!(settings.max_players, 4);
        assert_eq!(settings.time_per_question, Duration::from_secs(30));
        assert_eq!(settings.question_count, 3);
    }
}
