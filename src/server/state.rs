use std::sync::Arc;
use std::time::Instant;

use crate::audience::Roster;
use crate::broadcast::{Broadcaster, Outbox};
use crate::color::{ColorResolver, Palette};
use crate::config::Settings;
use crate::localizer::{Localizer, ReloadError};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub localizer: Arc<Localizer>,
    pub roster: Arc<Roster>,
    pub outbox: Arc<Outbox>,
    pub broadcaster: Arc<Broadcaster>,
    pub start_time: Instant,
}

impl AppState {
    /// Build the localizer from settings and load the catalog directory, if any
    pub fn new(settings: Settings) -> Result<Self, ReloadError> {
        let localization = &settings.localization;
        let palette = Arc::new(Palette::default());
        let colors = ColorResolver::new(palette.clone(), localization.default_color);

        let mut localizer = Localizer::new(localization.language_set(), colors);
        if let Some(dir) = &localization.catalog_dir {
            localizer = localizer.with_catalog_dir(dir.clone(), palette);
            localizer.reload()?;
        } else {
            tracing::warn!("No catalog directory configured, starting with an empty registry");
        }

        Ok(Self::with_localizer(settings, Arc::new(localizer)))
    }

    /// State around an existing localizer
    pub fn with_localizer(settings: Settings, localizer: Arc<Localizer>) -> Self {
        let outbox = Arc::new(Outbox::new(settings.localization.outbox_capacity));
        let broadcaster = Arc::new(Broadcaster::new(localizer.clone(), outbox.clone()));

        Self {
            settings: Arc::new(settings),
            localizer,
            roster: Arc::new(Roster::new()),
            outbox,
            broadcaster,
            start_time: Instant::now(),
        }
    }
}
