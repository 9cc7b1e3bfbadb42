// src/markers/matches.rs

// --- Imports ---
use crate::utils::error::MarkerError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Data Structures ---

/// Which end of a removal region a boundary marker closes off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryRole {
    Start,
    End,
}

/// Variant-specific state of a [`Match`].
///
/// The `Option` fields stay `None` until range assignment fills them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchKind {
    Section {
        level: usize,
        start_line: Option<usize>,
        end_line: Option<usize>,
        body_text: Option<String>,
    },
    Collector {
        line_number: Option<usize>,
    },
    Removal {
        role: BoundaryRole,
        start_line: Option<usize>,
        end_line: Option<usize>,
        region_text: Option<String>,
    },
}

/// The fixed configuration a marker line is parsed with.
///
/// Registry constructors own one of these each, so no two constructors
/// ever share configuration.
#[derive(Debug, Clone)]
pub struct MarkerTemplate {
    pub pattern: Regex,
    pub capture: usize,
    pub identity: Option<String>,
    pub kind: TemplateKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Section { level: usize },
    Collector,
    Removal { role: BoundaryRole },
}

/// One marker found in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub source_text: String,  // The original marker line
    pub line: Option<usize>,  // Line index at extraction time
    pub pattern: String,      // Source of the regex that produced this match
    pub capture: usize,       // Capture group holding the payload (0 = whole match)
    pub identity: Option<String>,
    pub uid: String,
    pub captured_text: String,
    pub placeholder: String,  // Stand-in line carried through the converter
    pub final_text: String,   // Replaces the placeholder in the finished text
    pub kind: MatchKind,
}

impl TemplateKind {
    fn empty_state(self) -> MatchKind {
        match self {
            TemplateKind::Section { level } => MatchKind::Section {
                level,
                start_line: None,
                end_line: None,
                body_text: None,
            },
            TemplateKind::Collector => MatchKind::Collector { line_number: None },
            TemplateKind::Removal { role } => MatchKind::Removal {
                role,
                start_line: None,
                end_line: None,
                region_text: None,
            },
        }
    }
}

impl Match {
    /// Parses a marker line with the given template.
    ///
    /// Generates a fresh uid; the placeholder is the same uuid in its
    /// hyphen-free form so converters treat it as a plain word.
    pub fn parse(source_text: &str, template: &MarkerTemplate) -> Result<Self, MarkerError> {
        let pattern = template.pattern.as_str().to_string();

        let captures = template
            .pattern
            .captures(source_text)
            .ok_or_else(|| MarkerError::PatternMismatch {
                pattern: pattern.clone(),
                line: source_text.to_string(),
            })?;

        let captured_text = captures
            .get(template.capture)
            .ok_or_else(|| MarkerError::MissingCapture {
                pattern: pattern.clone(),
                group: template.capture,
                line: source_text.to_string(),
            })?
            .as_str()
            .to_string();

        let id = Uuid::new_v4();
        let uid = id.hyphenated().to_string();
        let placeholder = id.simple().to_string();

        let final_text = match template.kind {
            TemplateKind::Section { level } => format!("{} {}", "#".repeat(level), captured_text),
            TemplateKind::Collector => format!("<!-- Collector {} -->", uid),
            TemplateKind::Removal { role } => {
                removal_token(role, template.identity.as_deref(), &uid)
            }
        };

        tracing::trace!("Parsed marker {} from line '{}'", uid, source_text);

        Ok(Self {
            source_text: source_text.to_string(),
            line: None,
            pattern,
            capture: template.capture,
            identity: template.identity.clone(),
            uid,
            captured_text,
            placeholder,
            final_text,
            kind: template.kind.empty_state(),
        })
    }

    pub fn is_section(&self) -> bool {
        matches!(self.kind, MatchKind::Section { .. })
    }

    pub fn is_collector(&self) -> bool {
        matches!(self.kind, MatchKind::Collector { .. })
    }

    pub fn is_removal(&self) -> bool {
        matches!(self.kind, MatchKind::Removal { .. })
    }

    /// Short name of the variant, used in logs and store queries.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            MatchKind::Section { .. } => "section",
            MatchKind::Collector { .. } => "collector",
            MatchKind::Removal { .. } => "removal",
        }
    }

    pub fn has_identity(&self, identity: Option<&str>) -> bool {
        self.identity.as_deref() == identity
    }

    /// `[start, end)` for a ranged section, `[start, end]` for a paired removal.
    pub fn range(&self) -> Option<(usize, usize)> {
        match &self.kind {
            MatchKind::Section {
                start_line: Some(start),
                end_line: Some(end),
                ..
            }
            | MatchKind::Removal {
                start_line: Some(start),
                end_line: Some(end),
                ..
            } => Some((*start, *end)),
            _ => None,
        }
    }

    /// Body of a section or region of a removal, once assigned.
    pub fn assigned_text(&self) -> Option<&str> {
        match &self.kind {
            MatchKind::Section { body_text, .. } => body_text.as_deref(),
            MatchKind::Removal { region_text, .. } => region_text.as_deref(),
            MatchKind::Collector { .. } => None,
        }
    }

    /// Flattens the match into its persisted record.
    pub fn pack(&self) -> MatchRecord {
        let m = self.clone();
        match m.kind {
            MatchKind::Section {
                level,
                start_line,
                end_line,
                body_text,
            } => MatchRecord::Section(SectionRecord {
                source_text: m.source_text,
                line: m.line,
                level,
                capture: m.capture,
                pattern: m.pattern,
                uid: m.uid,
                captured_text: m.captured_text,
                placeholder: m.placeholder,
                final_text: m.final_text,
                start_line,
                end_line,
                body_text,
                identity: m.identity,
            }),
            MatchKind::Collector { line_number } => MatchRecord::Collector(CollectorRecord {
                source_text: m.source_text,
                line: m.line,
                capture: m.capture,
                pattern: m.pattern,
                uid: m.uid,
                captured_text: m.captured_text,
                placeholder: m.placeholder,
                final_text: m.final_text,
                line_number,
                identity: m.identity,
            }),
            MatchKind::Removal {
                role,
                start_line,
                end_line,
                region_text,
            } => MatchRecord::Removal(RemovalRecord {
                source_text: m.source_text,
                line: m.line,
                role,
                capture: m.capture,
                pattern: m.pattern,
                uid: m.uid,
                captured_text: m.captured_text,
                placeholder: m.placeholder,
                final_text: m.final_text,
                start_line,
                end_line,
                region_text,
                identity: m.identity,
            }),
        }
    }

    /// Rebuilds a match from its record exactly; nothing is re-parsed.
    pub fn reconstruct(record: MatchRecord) -> Self {
        match record {
            MatchRecord::Section(r) => Self {
                source_text: r.source_text,
                line: r.line,
                pattern: r.pattern,
                capture: r.capture,
                identity: r.identity,
                uid: r.uid,
                captured_text: r.captured_text,
                placeholder: r.placeholder,
                final_text: r.final_text,
                kind: MatchKind::Section {
                    level: r.level,
                    start_line: r.start_line,
                    end_line: r.end_line,
                    body_text: r.body_text,
                },
            },
            MatchRecord::Collector(r) => Self {
                source_text: r.source_text,
                line: r.line,
                pattern: r.pattern,
                capture: r.capture,
                identity: r.identity,
                uid: r.uid,
                captured_text: r.captured_text,
                placeholder: r.placeholder,
                final_text: r.final_text,
                kind: MatchKind::Collector {
                    line_number: r.line_number,
                },
            },
            MatchRecord::Removal(r) => Self {
                source_text: r.source_text,
                line: r.line,
                pattern: r.pattern,
                capture: r.capture,
                identity: r.identity,
                uid: r.uid,
                captured_text: r.captured_text,
                placeholder: r.placeholder,
                final_text: r.final_text,
                kind: MatchKind::Removal {
                    role: r.role,
                    start_line: r.start_line,
                    end_line: r.end_line,
                    region_text: r.region_text,
                },
            },
        }
    }
}

/// Opening/closing tokens a renderer uses to hide a removal region.
fn removal_token(role: BoundaryRole, identity: Option<&str>, uid: &str) -> String {
    let name = identity.unwrap_or("removal");
    match role {
        BoundaryRole::Start => format!("<!-- BeginRemoval {} {} -->", name, uid),
        BoundaryRole::End => format!("<!-- EndRemoval {} {} -->", name, uid),
    }
}

// --- Persisted Records ---
// Field order is the storage layout; keep it stable.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MatchRecord {
    Section(SectionRecord),
    Collector(CollectorRecord),
    Removal(RemovalRecord),
}

impl MatchRecord {
    pub fn uid(&self) -> &str {
        match self {
            MatchRecord::Section(r) => &r.uid,
            MatchRecord::Collector(r) => &r.uid,
            MatchRecord::Removal(r) => &r.uid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub source_text: String,
    pub line: Option<usize>,
    pub level: usize,
    pub capture: usize,
    pub pattern: String,
    pub uid: String,
    pub captured_text: String,
    pub placeholder: String,
    pub final_text: String,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub body_text: Option<String>,
    pub identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorRecord {
    pub source_text: String,
    pub line: Option<usize>,
    pub capture: usize,
    pub pattern: String,
    pub uid: String,
    pub captured_text: String,
    pub placeholder: String,
    pub final_text: String,
    pub line_number: Option<usize>,
    pub identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalRecord {
    pub source_text: String,
    pub line: Option<usize>,
    pub role: BoundaryRole,
    pub capture: usize,
    pub pattern: String,
    pub uid: String,
    pub captured_text: String,
    pub placeholder: String,
    pub final_text: String,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub region_text: Option<String>,
    pub identity: Option<String>,
}
