// src/markers/registry.rs

// --- Imports ---
use crate::markers::matches::{Match, MarkerTemplate};
use crate::utils::error::MarkerError;
use regex::Regex;

/// Builds a parsed [`Match`] from one line of text.
pub type Constructor = Box<dyn Fn(&str) -> Result<Match, MarkerError>>;

/// Wraps a template into a constructor that owns it outright.
///
/// Taking the template by value is what keeps constructors built in a loop
/// from sharing configuration.
pub fn template_constructor(template: MarkerTemplate) -> Constructor {
    Box::new(move |line: &str| Match::parse(line, &template))
}

pub struct RegistryEntry {
    pattern: Regex,
    construct: Constructor,
}

impl RegistryEntry {
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn construct(&self, line: &str) -> Result<Match, MarkerError> {
        (self.construct)(line)
    }
}

/// Ordered pattern → constructor table.
///
/// The first registered pattern that matches a line wins. In strict mode a
/// line matched by two patterns is an error instead.
#[derive(Default)]
pub struct MarkerRegistry {
    entries: Vec<RegistryEntry>,
    strict: bool,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn register(&mut self, pattern: Regex, construct: Constructor) {
        tracing::debug!("Registered marker pattern #{}: {}", self.entries.len(), pattern.as_str());
        self.entries.push(RegistryEntry { pattern, construct });
    }

    /// Registers a template under its own pattern.
    pub fn register_template(&mut self, template: MarkerTemplate) {
        let pattern = template.pattern.clone();
        self.register(pattern, template_constructor(template));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.pattern.as_str())
    }

    /// Finds the entry responsible for `line`, if any.
    pub fn lookup(&self, line: &str) -> Result<Option<&RegistryEntry>, MarkerError> {
        let mut hits = self.entries.iter().filter(|e| e.pattern.is_match(line));

        let Some(first) = hits.next() else {
            return Ok(None);
        };

        if self.strict {
            if let Some(second) = hits.next() {
                return Err(MarkerError::AmbiguousRegistry {
                    line: line.to_string(),
                    first: first.pattern.as_str().to_string(),
                    second: second.pattern.as_str().to_string(),
                });
            }
        }

        Ok(Some(first))
    }

    /// Parses `line` with the first matching entry.
    pub fn construct(&self, line: &str) -> Result<Option<Match>, MarkerError> {
        match self.lookup(line)? {
            Some(entry) => entry.construct(line).map(Some),
            None => Ok(None),
        }
    }
}
