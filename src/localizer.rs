//! The localization facade owning registries, palette resolver and pools

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;

use crate::audience::{Grouping, LanguageBucket, LanguageGrouper, Recipient};
use crate::color::{ColorResolver, Palette};
use crate::format::{Arg, FormatterRegistry};
use crate::language::{LanguageResolver, LanguageSet, Resolution};
use crate::metrics::CatalogMetrics;
use crate::template::{
    load_catalog, load_palette, CatalogSource, LoaderError, RecipientContext, RegistryReport,
    Renderer, Template, TemplateCatalog, TemplateDef, TemplateId, TemplateRegistry,
};

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("No catalog directory configured")]
    NoCatalogDir,

    #[error(transparent)]
    Loader(#[from] LoaderError),
}

/// Summary for the stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct LocalizerStats {
    pub generation: u64,
    pub templates: usize,
    pub signs: usize,
    pub languages: Vec<String>,
    pub default_language: String,
    pub formatters: usize,
    pub palette_colors: Option<usize>,
    pub unknown_color_keys: usize,
}

/// Owns everything needed to render and group; share it behind an `Arc`
pub struct Localizer {
    catalog: TemplateCatalog,
    languages: LanguageSet,
    formatters: FormatterRegistry,
    colors: ColorResolver,
    grouper: LanguageGrouper,
    catalog_dir: Option<PathBuf>,
    palette: Option<Arc<Palette>>,
    /// One reload at a time, so registry and palette come from the same read
    reload_lock: Mutex<()>,
}

impl Localizer {
    pub fn new(languages: LanguageSet, colors: ColorResolver) -> Self {
        Self {
            catalog: TemplateCatalog::new(),
            languages,
            formatters: FormatterRegistry::with_builtins(),
            colors,
            grouper: LanguageGrouper::new(),
            catalog_dir: None,
            palette: None,
            reload_lock: Mutex::new(()),
        }
    }

    /// Replace the formatter registry (to add host formatters)
    pub fn with_formatters(mut self, formatters: FormatterRegistry) -> Self {
        self.formatters = formatters;
        self
    }

    /// Read templates from `dir` on [`Localizer::reload`]; its `palette.json`
    /// goes into `palette`
    pub fn with_catalog_dir(mut self, dir: impl Into<PathBuf>, palette: Arc<Palette>) -> Self {
        self.catalog_dir = Some(dir.into());
        self.palette = Some(palette);
        self
    }

    pub fn catalog_dir(&self) -> Option<&Path> {
        self.catalog_dir.as_deref()
    }

    /// Register templates declared in code, replacing the current set
    pub fn register(&self, defs: Vec<TemplateDef>) -> RegistryReport {
        self.register_source(CatalogSource::from_templates(defs))
    }

    pub fn register_source(&self, source: CatalogSource) -> RegistryReport {
        self.catalog.register(source, self.languages.default_code())
    }

    /// Re-read the catalog directory and swap in the new registry and palette.
    ///
    /// Both files are read before anything is swapped; on failure the current
    /// registry and palette stay in place. The registry is installed first and
    /// the palette right after, so a render in between may pair new templates
    /// with old colors, which only changes the hex of an envelope.
    pub fn reload(&self) -> Result<RegistryReport, ReloadError> {
        let dir = self.catalog_dir.as_deref().ok_or(ReloadError::NoCatalogDir)?;
        let _reloading = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let loaded = load_catalog(dir).and_then(|source| Ok((source, load_palette(dir)?)));
        let (source, palette) = match loaded {
            Ok(loaded) => loaded,
            Err(err) => {
                CatalogMetrics::record_reload_failed();
                tracing::error!(dir = %dir.display(), error = %err, "Catalog reload failed");
                return Err(err.into());
            }
        };

        let report = self.register_source(source);
        if let (Some(target), Some(colors)) = (&self.palette, palette) {
            target.replace(colors);
        }
        self.colors.reset_warnings();
        self.formatters.reset_warnings();

        Ok(report)
    }

    /// Current registry snapshot
    pub fn templates(&self) -> Arc<TemplateRegistry> {
        self.catalog.snapshot()
    }

    pub fn languages(&self) -> &LanguageSet {
        &self.languages
    }

    pub fn resolver(&self) -> LanguageResolver<'_> {
        LanguageResolver::new(&self.languages)
    }

    pub fn colors(&self) -> &ColorResolver {
        &self.colors
    }

    pub fn formatters(&self) -> &FormatterRegistry {
        &self.formatters
    }

    /// Renderer bound to one registry snapshot
    pub fn renderer<'a>(&'a self, registry: &'a TemplateRegistry) -> Renderer<'a> {
        Renderer {
            formatters: &self.formatters,
            colors: &self.colors,
            languages: &self.languages,
            pluralizer: registry.pluralizer(),
        }
    }

    /// Render `template` for a reader who prefers `preference`
    pub fn render(
        &self,
        template: &Template,
        preference: Option<&str>,
        args: &[Arg],
        recipient: &RecipientContext,
    ) -> String {
        self.render_in(&self.templates(), template, preference, args, recipient)
    }

    fn render_in(
        &self,
        registry: &TemplateRegistry,
        template: &Template,
        preference: Option<&str>,
        args: &[Arg],
        recipient: &RecipientContext,
    ) -> String {
        let resolution = self.resolver().resolve(preference, template);
        self.renderer(registry).render(template, &resolution, args, recipient)
    }

    /// Render for one recipient, using its language and team
    pub fn render_for<R: Recipient + ?Sized>(
        &self,
        id: TemplateId,
        recipient: &R,
        args: &[Arg],
    ) -> Option<String> {
        let registry = self.templates();
        let template = registry.by_id(id)?;
        let resolution = self.resolver().resolve(recipient.language(), template);
        let context = RecipientContext::new(recipient.id(), recipient.team());
        Some(
            self.renderer(&registry)
                .render(template, &resolution, args, &context),
        )
    }

    /// Render by template key; `None` for unknown keys
    pub fn render_key(&self, key: &str, preference: Option<&str>, args: &[Arg]) -> Option<String> {
        let registry = self.templates();
        let template = registry.by_key(key)?;
        Some(self.render_in(&registry, template, preference, args, &RecipientContext::default()))
    }

    /// Render the template bound to a sign; signs use the default language
    pub fn render_sign(&self, sign_key: &str, args: &[Arg]) -> Option<String> {
        let registry = self.templates();
        let template = registry.by_sign_key(sign_key)?;
        Some(self.render_in(&registry, template, None, args, &RecipientContext::default()))
    }

    /// Partition recipients by resolved language, and by team for per-team templates
    pub fn group<I, R>(&self, template: &Template, recipients: I) -> Grouping<'_>
    where
        I: IntoIterator<Item = R>,
        R: Recipient,
    {
        let resolver = self.resolver();
        if template.is_per_team() {
            self.grouper
                .group(&resolver, template, recipients, |r: &R| r.team())
        } else {
            self.grouper.group(&resolver, template, recipients, |_: &R| None)
        }
    }

    /// Render once for every member of a bucket
    pub fn render_bucket(
        &self,
        registry: &TemplateRegistry,
        template: &Template,
        bucket: &LanguageBucket,
        args: &[Arg],
    ) -> String {
        self.renderer(registry).render(
            template,
            &bucket.resolution,
            args,
            &RecipientContext::team(bucket.team),
        )
    }

    /// Resolution of `template` for a reader preferring `preference`
    pub fn resolve(&self, preference: Option<&str>, template: &Template) -> Resolution {
        self.resolver().resolve(preference, template)
    }

    pub fn stats(&self) -> LocalizerStats {
        let registry = self.templates();
        LocalizerStats {
            generation: registry.generation(),
            templates: registry.len(),
            signs: registry.signs(),
            languages: self.languages.iter().map(|l| l.code.to_string()).collect(),
            default_language: self.languages.default_code().to_string(),
            formatters: self.formatters.len(),
            palette_colors: self.palette.as_ref().map(|p| p.len()),
            unknown_color_keys: self.colors.unknown_key_count(),
        }
    }
}
