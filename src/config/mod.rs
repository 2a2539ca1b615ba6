//! Profile loading: global settings plus the ordered set of sections.
pub mod ini;
pub mod section;
pub mod validation;

use std::fmt;
use std::path::Path;

use crate::error::ConfigError;
use crate::exec::RetryPolicy;
use ini::ConfigSource;
use section::{OutputFormat, SectionSpec, non_negative, normalize_field};

/// Name of the section holding global settings.
pub const GLOBAL_SECTION: &str = "sweeper";

/// How a sweep pass folds per-item return codes into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepAggregate {
    /// Code of the last item processed.
    #[default]
    Last,
    /// First non-zero code seen, or 0.
    Worst,
}

impl SweepAggregate {
    /// Parse a profile value (`last` or `worst`, case-insensitive).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "last" => Some(Self::Last),
            "worst" => Some(Self::Worst),
            _ => None,
        }
    }

    /// Fold `code` into the running aggregate `acc`.
    #[must_use]
    pub const fn fold(self, acc: i32, code: i32) -> i32 {
        match self {
            Self::Last => code,
            Self::Worst if acc != 0 => acc,
            Self::Worst => code,
        }
    }
}

impl fmt::Display for SweepAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Last => f.write_str("last"),
            Self::Worst => f.write_str("worst"),
        }
    }
}

/// Global settings from the `[sweeper]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Filter applied to root listings unless a section or the caller overrides it.
    pub common_filter: Option<String>,
    /// Output format for sections that do not declare one.
    pub default_output_format: OutputFormat,
    /// JSON field to match for sections that do not declare one.
    pub default_filter_field: Option<String>,
    /// Default sweep retry policy.
    pub retry: RetryPolicy,
    /// Reserved; parsed but never used.
    pub concurrency: usize,
    /// Default `protected_run` for sections.
    pub default_protected_run: bool,
    /// Run sections in name order instead of file order.
    pub presort_sections: bool,
    /// Printed once after the profile loads.
    pub banner: Option<String>,
    /// Aggregation of per-item sweep return codes.
    pub sweep_result: SweepAggregate,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            common_filter: None,
            default_output_format: OutputFormat::Raw,
            default_filter_field: None,
            retry: RetryPolicy::default(),
            concurrency: 1,
            default_protected_run: false,
            presort_sections: false,
            banner: None,
            sweep_result: SweepAggregate::Last,
        }
    }
}

impl Settings {
    /// Read the global section from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSection`] if `[sweeper]` is absent, or
    /// [`ConfigError::InvalidValue`] if a value cannot be coerced.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let s = GLOBAL_SECTION;
        if !source.has_section(s) {
            return Err(ConfigError::MissingSection(s.to_string()));
        }
        let defaults = Self::default();

        let default_output_format = match source.get_string(s, "default_format_parser") {
            None => defaults.default_output_format,
            Some(raw) => OutputFormat::parse(raw)
                .ok_or_else(|| invalid(s, "default_format_parser", raw, "'raw' or 'json'"))?,
        };

        let sweep_result = match source.get_string(s, "sweep_result") {
            None => defaults.sweep_result,
            Some(raw) => SweepAggregate::parse(raw)
                .ok_or_else(|| invalid(s, "sweep_result", raw, "'last' or 'worst'"))?,
        };

        let concurrency = source.get_int(s, "concurrency", 1)?;
        let concurrency = usize::try_from(concurrency)
            .ok()
            .filter(|c| *c > 0)
            .ok_or_else(|| invalid(s, "concurrency", &concurrency.to_string(), "a positive integer"))?;

        Ok(Self {
            common_filter: source
                .get_string(s, "common_filter")
                .filter(|v| !v.is_empty())
                .map(String::from),
            default_output_format,
            default_filter_field: source
                .get_string(s, "default_filter_field")
                .and_then(normalize_field),
            retry: RetryPolicy::from_millis(
                non_negative(source, s, "retry", 0)?,
                source.get_float(s, "timeout", 0.0)?,
            ),
            concurrency,
            default_protected_run: source.get_bool(s, "default_protected_run", false)?,
            presort_sections: source.get_bool(s, "presort_sections", false)?,
            banner: source
                .get_string(s, "banner")
                .filter(|v| !v.is_empty())
                .map(String::from),
            sweep_result,
        })
    }
}

fn invalid(section: &str, key: &str, value: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        expected,
    }
}

/// A fully loaded profile. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Profile {
    settings: Settings,
    sections: Vec<SectionSpec>,
}

impl Profile {
    /// Load a profile from an INI file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if any
    /// section is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let document = ini::parse_document(path)?;
        Self::from_source(&document)
    }

    /// Build a profile from any [`ConfigSource`].
    ///
    /// Every section other than `[sweeper]` becomes a [`SectionSpec`], in
    /// source order.
    ///
    /// # Errors
    ///
    /// Returns an error if the global section is missing or any section
    /// cannot be resolved.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let settings = Settings::from_source(source)?;
        let sections = source
            .sections()
            .into_iter()
            .filter(|name| *name != GLOBAL_SECTION)
            .map(|name| SectionSpec::load(source, name, &settings))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { settings, sections })
    }

    /// Global settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Section names in execution order: file order, or sorted by name when
    /// `presort_sections` is set.
    #[must_use]
    pub fn section_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sections.iter().map(|s| s.name.as_str()).collect();
        if self.settings.presort_sections {
            names.sort_unstable();
        }
        names
    }

    /// Look up a section by name.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&SectionSpec> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Whether `name` is declared in the profile.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    /// All sections in file order.
    #[must_use]
    pub fn sections(&self) -> &[SectionSpec] {
        &self.sections
    }
}
