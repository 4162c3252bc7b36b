use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tablefill_generate::FillOptions;

use super::atomic::write_bytes_atomic;
use super::{WorkspaceError, WorkspacePaths, WorkspaceResult};

/// Contents of `tablefill.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillSettings {
    pub seed: u32,
    pub batch_size: usize,
    pub null_probability: f64,
    pub max_unique_attempts: u32,
    pub base_date: NaiveDate,
    pub run_dir: PathBuf,
    /// Reject foreign-key cycles instead of breaking them.
    pub strict: bool,
}

impl Default for FillSettings {
    fn default() -> Self {
        let options = FillOptions::default();
        Self {
            seed: options.seed,
            batch_size: options.batch_size,
            null_probability: options.null_probability,
            max_unique_attempts: options.max_unique_attempts,
            base_date: options.base_date,
            run_dir: PathBuf::from("runs"),
            strict: false,
        }
    }
}

impl FillSettings {
    /// Apply command-line values on top of the file.
    pub fn with_overrides(
        mut self,
        seed: Option<u32>,
        batch_size: Option<usize>,
        strict: bool,
    ) -> Self {
        if let Some(seed) = seed {
            self.seed = seed;
        }
        if let Some(batch_size) = batch_size {
            self.batch_size = batch_size;
        }
        self.strict |= strict;
        self
    }

    pub fn validate(&self) -> WorkspaceResult<()> {
        if self.batch_size == 0 {
            return Err(WorkspaceError::Invalid("batch_size must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.null_probability) {
            return Err(WorkspaceError::Invalid(format!(
                "null_probability {} is outside [0, 1]",
                self.null_probability
            )));
        }
        if self.max_unique_attempts == 0 {
            return Err(WorkspaceError::Invalid(
                "max_unique_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fill_options(&self, reset: bool) -> FillOptions {
        FillOptions {
            seed: self.seed,
            batch_size: self.batch_size,
            null_probability: self.null_probability,
            max_unique_attempts: self.max_unique_attempts,
            base_date: self.base_date,
            reset,
        }
    }
}

pub fn load_or_create_settings(paths: &WorkspacePaths) -> WorkspaceResult<FillSettings> {
    let path = paths.settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        let settings: FillSettings = toml::from_str(&content)?;
        return Ok(settings);
    }

    let settings = FillSettings::default();
    save_settings(paths, &settings)?;
    Ok(settings)
}

pub fn save_settings(paths: &WorkspacePaths, settings: &FillSettings) -> WorkspaceResult<()> {
    let path = paths.settings_path();
    let encoded = toml::to_string_pretty(settings)?;
    write_bytes_atomic(&path, encoded.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_paths(name: &str) -> WorkspacePaths {
        WorkspacePaths::new(
            std::env::temp_dir().join(format!("tablefill-settings-{name}-{}", std::process::id())),
        )
    }

    #[test]
    fn creates_defaults_then_reads_them_back() {
        let paths = temp_paths("defaults");
        let created = load_or_create_settings(&paths).expect("create");
        assert_eq!(created, FillSettings::default());
        assert!(paths.settings_path().exists());

        let loaded = load_or_create_settings(&paths).expect("load");
        assert_eq!(loaded, created);
        std::fs::remove_dir_all(&paths.root).ok();
    }

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let settings: FillSettings =
            toml::from_str("seed = 7\nbase_date = \"2020-02-29\"\n").expect("parse");
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.batch_size, 500);
        assert_eq!(
            settings.base_date,
            NaiveDate::from_ymd_opt(2020, 2, 29).expect("date")
        );
    }

    #[test]
    fn command_line_wins() {
        let settings = FillSettings::default().with_overrides(Some(9), Some(50), true);
        assert_eq!(settings.seed, 9);
        assert_eq!(settings.batch_size, 50);
        assert!(settings.strict);

        let options = settings.fill_options(true);
        assert_eq!(options.seed, 9);
        assert!(options.reset);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let settings = FillSettings {
            null_probability: 1.5,
            ..FillSettings::default()
        };
        assert!(settings.validate().is_err());
        assert!(FillSettings::default().validate().is_ok());
    }
}
