use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CHECKPOINTS: [u32; 7] = [5, 6, 11, 12, 14, 18, 20];

/// Games shorter than this never had a laning phase (remakes, early surrenders).
pub const DEFAULT_MIN_DURATION_SECS: i64 = 15 * 60;

/// How damage to champions is read at a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageEstimate {
    /// `end-of-game damage / game minutes * t`. An estimate, not a reading.
    #[default]
    Interpolated,
    /// The frame's cumulative `damageStats`, interpolating when a frame lacks them.
    Cumulative,
}

/// What to do when two players on one team report the same position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleConflictPolicy {
    /// The participant listed last keeps the role.
    #[default]
    LastSeen,
    /// The role is dropped for that team; everyone in the matchup is excluded.
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub checkpoints: Vec<u32>,
    pub min_duration_secs: i64,
    pub damage: DamageEstimate,
    pub role_conflicts: RoleConflictPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            checkpoints: DEFAULT_CHECKPOINTS.to_vec(),
            min_duration_secs: DEFAULT_MIN_DURATION_SECS,
            damage: DamageEstimate::default(),
            role_conflicts: RoleConflictPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Broad ladder sampling: several early checkpoints.
    pub fn ladder() -> Self {
        Self {
            checkpoints: vec![5, 11, 12, 14, 20],
            ..Self::default()
        }
    }

    /// Tracked-player collection: only the 14 minute mark.
    pub fn tracked_players() -> Self {
        Self {
            checkpoints: vec![14],
            ..Self::default()
        }
    }

    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        match name.to_lowercase().as_str() {
            "default" => Ok(Self::default()),
            "ladder" => Ok(Self::ladder()),
            "tracked" => Ok(Self::tracked_players()),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&contents)?;
        config.validated()
    }

    /// Sorts and dedups the checkpoints and rejects unusable settings.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.checkpoints.sort_unstable();
        self.checkpoints.dedup();

        if self.checkpoints.is_empty() {
            return Err(ConfigError::NoCheckpoints);
        }

        if self.min_duration_secs < 0 {
            return Err(ConfigError::NegativeDuration {
                secs: self.min_duration_secs,
            });
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn presets() {
        assert_eq!(EngineConfig::ladder().checkpoints, vec![5, 11, 12, 14, 20]);
        assert_eq!(EngineConfig::preset("TRACKED").unwrap().checkpoints, vec![14]);
        assert!(matches!(
            EngineConfig::preset("nope"),
            Err(ConfigError::UnknownPreset(_))
        ));
    }

    #[test]
    fn validation_sorts_and_rejects() {
        let config = EngineConfig {
            checkpoints: vec![14, 5, 14],
            ..EngineConfig::default()
        }
        .validated()
        .unwrap();
        assert_eq!(config.checkpoints, vec![5, 14]);

        let empty = EngineConfig {
            checkpoints: vec![],
            ..EngineConfig::default()
        };
        assert!(matches!(empty.validated(), Err(ConfigError::NoCheckpoints)));

        let negative = EngineConfig {
            min_duration_secs: -1,
            ..EngineConfig::default()
        };
        assert!(matches!(
            negative.validated(),
            Err(ConfigError::NegativeDuration { secs: -1 })
        ));
    }

    #[test]
    fn loads_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"checkpoints": [20, 10], "damage": "cumulative", "role_conflicts": "exclude"}}"#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.checkpoints, vec![10, 20]);
        assert_eq!(config.min_duration_secs, DEFAULT_MIN_DURATION_SECS);
        assert_eq!(config.damage, DamageEstimate::Cumulative);
        assert_eq!(config.role_conflicts, RoleConflictPolicy::Exclude);
    }
}
