// src/markers/mod.rs
pub mod matches;
pub mod registry;

// Re-export key marker types for convenience
pub use matches::{
    BoundaryRole,
    Match,
    MatchKind,
    MatchRecord,
    MarkerTemplate,
    TemplateKind,
};
pub use registry::{template_constructor, Constructor, MarkerRegistry};
