//! Message templates.
//!
//! This module provides:
//! - Template declarations ([`TemplateDef`]) and the builder used to write them
//! - The template mini-language parser
//! - The renderer, which never fails the caller
//! - The registry with its key and sign indexes, and the hot-swappable catalog
//! - The catalog directory loader
//!
//! # Example
//!
//! ```ignore
//! let catalog = TemplateCatalog::new();
//! catalog.register(
//!     CatalogSource::from_templates(vec![
//!         TemplateDef::builder("kit_given", "Given you {0}x {1}.")
//!             .slot(SlotSpec::typed("int"))
//!             .arg()
//!             .flags(TemplateFlags::empty())
//!             .build(),
//!     ]),
//!     &LanguageCode::new("en-us"),
//! );
//! ```

mod loader;
mod parser;
mod plural;
mod registry;
mod render;
mod types;

pub use loader::{load_catalog, load_palette, ArgDecl, LoaderError, TemplateDecl, Tokens};
pub use parser::{ParseError, ParsedText, Segment};
pub use plural::Pluralizer;
pub use registry::{
    CatalogSource, LanguageCoverage, RegistryReport, RegistryWarning, TemplateCatalog,
    TemplateRegistry, Translations,
};
pub use render::{degraded, RecipientContext, RenderError, Renderer};
pub use types::{
    SlotSpec, SlotSummary, Template, TemplateDef, TemplateDefBuilder, TemplateFlags, TemplateId,
    TemplateSummary,
};
