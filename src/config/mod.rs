// src/config/mod.rs
//! Rule files: which markers exist, what they become, and how the
//! document is converted.
//!
//! ```yaml
//! meta:
//!   database: build/records.json
//! converter:
//!   program: pandoc
//!   args: ["--from=latex", "--to=markdown"]
//! sections:
//!   - { name: chapter, syntax: chapter, level: 1 }
//! collectors:
//!   - { name: keypoint, syntax: keypoint }
//! removals:
//!   - name: solution
//!     syntax: { start: beginsolution, end: endsolution }
//! ```

// --- Imports ---
use crate::markers::{BoundaryRole, Match, MarkerRegistry, MarkerTemplate, TemplateKind};
use crate::pipeline::ranges;
use crate::pipeline::{CommandConverter, Converter, ParsedDocument, Passthrough};
use crate::utils::error::{ConfigError, RangeError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

static SYNTAX_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("Failed to compile SYNTAX_TOKEN_RE")
});

// --- Data Structures ---
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub converter: Option<ConverterRule>,
    #[serde(default)]
    pub sections: Vec<SectionRule>,
    #[serde(default)]
    pub collectors: Vec<CollectorRule>,
    #[serde(default)]
    pub removals: Vec<RemovalRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Record store location; nothing is stored when absent.
    #[serde(default)]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterRule {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRule {
    pub name: String,
    pub syntax: String,
    #[serde(default = "default_level")]
    pub level: usize,
}

fn default_level() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorRule {
    pub name: String,
    pub syntax: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalRule {
    pub name: String,
    pub syntax: RemovalSyntax,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalSyntax {
    pub start: String,
    pub end: String,
}

/// `%%\syntax{payload}`, payload in group 1.
fn braced_pattern(syntax: &str) -> String {
    format!(r"%%\\{}\{{(.*?)\}}", regex::escape(syntax))
}

/// `%%\syntax` on its own, token in group 1.
///
/// The token must be followed by a character outside the token alphabet, so
/// `sol` matches neither `%%\sols` nor `%%\sol-end`.
fn bare_pattern(syntax: &str) -> String {
    format!(r"%%\\({})(?:[^A-Za-z0-9_-]|$)", regex::escape(syntax))
}

fn unique<'a>(names: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    names.filter(|name| seen.insert(*name)).collect()
}

impl RuleSet {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let rules: RuleSet = serde_yaml::from_str(yaml)?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::info!("Loading rules from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let check = |name: &str, syntax: &str| {
            if SYNTAX_TOKEN_RE.is_match(syntax) {
                Ok(())
            } else {
                Err(ConfigError::InvalidSyntax {
                    name: name.to_string(),
                    syntax: syntax.to_string(),
                })
            }
        };

        for rule in &self.sections {
            check(&rule.name, &rule.syntax)?;
            if rule.level == 0 {
                return Err(ConfigError::InvalidLevel {
                    name: rule.name.clone(),
                });
            }
        }
        for rule in &self.collectors {
            check(&rule.name, &rule.syntax)?;
        }
        for rule in &self.removals {
            check(&rule.name, &rule.syntax.start)?;
            check(&rule.name, &rule.syntax.end)?;
            if rule.syntax.start == rule.syntax.end {
                return Err(ConfigError::SameBoundaries {
                    name: rule.name.clone(),
                    syntax: rule.syntax.start.clone(),
                });
            }
        }

        let braced: Vec<&str> = self
            .sections
            .iter()
            .map(|r| r.syntax.as_str())
            .chain(self.collectors.iter().map(|r| r.syntax.as_str()))
            .collect();
        if unique(braced.iter().copied()).len() != braced.len() {
            tracing::warn!("Rule set reuses a marker syntax; the first registered rule wins");
        }

        Ok(())
    }

    /// Registers sections, then collectors, then removals (start before end).
    pub fn build_registry(&self, strict: bool) -> Result<MarkerRegistry, ConfigError> {
        let mut registry = MarkerRegistry::new().with_strict(strict);

        let compile = |name: &str, pattern: String| {
            Regex::new(&pattern).map_err(|source| ConfigError::InvalidRegex {
                name: name.to_string(),
                source,
            })
        };

        for rule in &self.sections {
            registry.register_template(MarkerTemplate {
                pattern: compile(&rule.name, braced_pattern(&rule.syntax))?,
                capture: 1,
                identity: Some(rule.name.clone()),
                kind: TemplateKind::Section { level: rule.level },
            });
        }

        for rule in &self.collectors {
            registry.register_template(MarkerTemplate {
                pattern: compile(&rule.name, braced_pattern(&rule.syntax))?,
                capture: 1,
                identity: Some(rule.name.clone()),
                kind: TemplateKind::Collector,
            });
        }

        for rule in &self.removals {
            let boundaries = [
                (&rule.syntax.start, BoundaryRole::Start),
                (&rule.syntax.end, BoundaryRole::End),
            ];
            for (syntax, role) in boundaries {
                registry.register_template(MarkerTemplate {
                    pattern: compile(&rule.name, bare_pattern(syntax))?,
                    capture: 1,
                    identity: Some(rule.name.clone()),
                    kind: TemplateKind::Removal { role },
                });
            }
        }

        tracing::info!("Built marker registry with {} patterns", registry.len());
        Ok(registry)
    }

    /// The configured converter, or pass-through when none is set.
    pub fn converter(&self) -> Box<dyn Converter> {
        match &self.converter {
            Some(rule) if rule.program == "pandoc" => Box::new(CommandConverter::pandoc(rule.args.clone())),
            Some(rule) => Box::new(CommandConverter::new(rule.program.clone(), rule.args.clone())),
            None => Box::new(Passthrough),
        }
    }

    /// Runs every range pass for every configured identity.
    ///
    /// A failing identity is recorded and skipped; the others still run.
    pub fn postprocess(&self, doc: &mut ParsedDocument) -> PostprocessReport {
        let mut report = PostprocessReport::default();

        for name in unique(self.sections.iter().map(|r| r.name.as_str())) {
            ranges::assign_section_ranges(doc, Some(name));
            if let Err(error) = ranges::assign_section_bodies(doc, Some(name)) {
                report.record(name, error);
            }
        }

        for name in unique(self.collectors.iter().map(|r| r.name.as_str())) {
            ranges::assign_collector_positions(doc, Some(name));
        }

        for name in unique(self.removals.iter().map(|r| r.name.as_str())) {
            if let Err(error) = ranges::assign_removal_regions(doc, Some(name)) {
                report.record(name, error);
            }
        }

        tracing::info!(
            "Postprocessing finished with {} failed identit(y/ies)",
            report.failures.len()
        );
        report
    }
}

#[derive(Debug)]
pub struct IdentityFailure {
    pub identity: String,
    pub error: RangeError,
}

#[derive(Debug, Default)]
pub struct PostprocessReport {
    pub failures: Vec<IdentityFailure>,
}

impl PostprocessReport {
    fn record(&mut self, identity: &str, error: RangeError) {
        tracing::error!("Postprocessing failed for '{}': {}", identity, error);
        self.failures.push(IdentityFailure {
            identity: identity.to_string(),
            error,
        });
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed(&self, identity: Option<&str>) -> bool {
        identity.is_some_and(|id| self.failures.iter().any(|f| f.identity == id))
    }

    /// Matches whose identity went through postprocessing cleanly.
    pub fn persistable<'a>(&'a self, doc: &'a ParsedDocument) -> impl Iterator<Item = &'a Match> + 'a {
        doc.matches
            .values()
            .filter(move |m| !self.failed(m.identity.as_deref()))
    }
}
