//! Non-fatal checks for suspicious profiles.
use super::Profile;
use super::section::{SectionNode, SectionSpec};

/// Placeholder for the item key in `sweep_action`.
const SLOT: &str = "{}";

/// A validation warning detected after profile loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// Section that triggered the warning.
    pub section: String,
    /// Node or key within the section.
    pub item: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    /// Create a warning for `item` in `section`.
    #[must_use]
    pub fn new(
        section: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.section, self.item, self.message)
    }
}

/// A single profile check.
pub trait ProfileValidator {
    /// Inspect `profile` and return any warnings found.
    fn validate(&self, profile: &Profile) -> Vec<ValidationWarning>;

    /// Short name of the check, for diagnostics.
    fn name(&self) -> &'static str;
}

/// Every node should have exactly one `{}` slot in its sweep action.
#[derive(Debug)]
pub struct SweepSlotValidator;

impl ProfileValidator for SweepSlotValidator {
    fn validate(&self, profile: &Profile) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        for section in profile.sections() {
            for node in section.nodes() {
                match node.sweep_action.matches(SLOT).count() {
                    0 => warnings.push(ValidationWarning::new(
                        &section.name,
                        &node.name,
                        format!(
                            "sweep_action '{}' has no {SLOT} slot; it will run verbatim for every item",
                            node.sweep_action
                        ),
                    )),
                    1 => {}
                    n => warnings.push(ValidationWarning::new(
                        &section.name,
                        &node.name,
                        format!(
                            "sweep_action '{}' has {n} {SLOT} slots; only the first receives the item key",
                            node.sweep_action
                        ),
                    )),
                }
            }
        }
        warnings
    }

    fn name(&self) -> &'static str {
        "sweep-slot"
    }
}

/// Child options may only reference labels written by an ancestor.
#[derive(Debug)]
pub struct ChildOptionsValidator;

impl ChildOptionsValidator {
    fn check_section(section: &SectionSpec, warnings: &mut Vec<ValidationWarning>) {
        let nodes = section.nodes();
        for (depth, node) in nodes.iter().enumerate() {
            let Some(spec) = node.child_options.as_deref() else {
                continue;
            };
            let ancestors: Vec<&SectionNode> = nodes.iter().take(depth).copied().collect();
            if ancestors.is_empty() {
                warnings.push(ValidationWarning::new(
                    &section.name,
                    &node.name,
                    "as_child_options is set on a root node and is never used",
                ));
                continue;
            }
            let Some((_, keys)) = spec.rsplit_once(':') else {
                continue;
            };
            for key in keys.split(',').map(str::trim).filter(|k| !k.is_empty()) {
                let known = ancestors.iter().any(|a| {
                    key.strip_prefix("item.")
                        .and_then(|rest| rest.split('.').next())
                        .is_some_and(|label| label == a.label)
                });
                if !known {
                    warnings.push(ValidationWarning::new(
                        &section.name,
                        &node.name,
                        format!("as_child_options references '{key}', which no parent level writes"),
                    ));
                }
            }
        }
    }
}

impl ProfileValidator for ChildOptionsValidator {
    fn validate(&self, profile: &Profile) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        for section in profile.sections() {
            Self::check_section(section, &mut warnings);
        }
        warnings
    }

    fn name(&self) -> &'static str {
        "child-options"
    }
}

/// Only the root level is filtered, so a `filter_field` below it is unused.
#[derive(Debug)]
pub struct ChildFilterFieldValidator;

impl ProfileValidator for ChildFilterFieldValidator {
    fn validate(&self, profile: &Profile) -> Vec<ValidationWarning> {
        profile
            .sections()
            .iter()
            .flat_map(|section| {
                section
                    .nodes()
                    .into_iter()
                    .skip(1)
                    .filter_map(|node| {
                        node.filter_field.as_ref().map(|field| {
                            ValidationWarning::new(
                                &section.name,
                                &node.name,
                                format!(
                                    "filter_field '{field}' is ignored; only the first level of an action map is filtered"
                                ),
                            )
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "child-filter-field"
    }
}

/// `concurrency` is reserved; anything above 1 has no effect.
#[derive(Debug)]
pub struct ConcurrencyValidator;

impl ProfileValidator for ConcurrencyValidator {
    fn validate(&self, profile: &Profile) -> Vec<ValidationWarning> {
        let concurrency = profile.settings().concurrency;
        if concurrency > 1 {
            vec![ValidationWarning::new(
                super::GLOBAL_SECTION,
                "concurrency",
                format!("concurrency = {concurrency} is reserved; sections run one at a time"),
            )]
        } else {
            Vec::new()
        }
    }

    fn name(&self) -> &'static str {
        "concurrency"
    }
}

/// Run every check against `profile`.
#[must_use]
pub fn validate(profile: &Profile) -> Vec<ValidationWarning> {
    let validators: Vec<Box<dyn ProfileValidator>> = vec![
        Box::new(SweepSlotValidator),
        Box::new(ChildOptionsValidator),
        Box::new(ChildFilterFieldValidator),
        Box::new(ConcurrencyValidator),
    ];

    validators
        .iter()
        .flat_map(|v| v.validate(profile))
        .collect()
}
