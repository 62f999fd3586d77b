//! Audience partitioning by resolved language.
//!
//! One linear pass over the recipients; each recipient's resolution is
//! compared against the existing buckets by linear scan. The number of
//! buckets is bounded by the number of active languages (times teams for
//! per-team templates), so this beats hashing for the usual one or two
//! languages and keeps buckets in first-seen order.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::language::{LanguageResolver, Resolution};
use crate::metrics::BroadcastMetrics;
use crate::template::Template;

use super::{Recipient, RecipientId, TeamTag};

/// Upper bound on recycled recipient vectors kept between groupings
const MAX_SPARE: usize = 32;

/// Recipients sharing one resolution (and team, for per-team templates)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageBucket {
    pub resolution: Resolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamTag>,
    /// In audience order
    pub recipients: Vec<RecipientId>,
}

#[derive(Default)]
struct Scratch {
    buckets: Vec<LanguageBucket>,
    spare: Vec<Vec<RecipientId>>,
}

/// Groups audiences, reusing bucket storage across calls.
///
/// The scratch storage is guarded by an in-use flag: while a [`Grouping`]
/// is alive, a nested or concurrent call gets freshly allocated storage
/// instead of waiting.
#[derive(Default)]
pub struct LanguageGrouper {
    in_use: AtomicBool,
    scratch: Mutex<Scratch>,
}

impl LanguageGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition `recipients` for `template`.
    ///
    /// `key_fn` supplies the secondary key; recipients only share a bucket
    /// when both the resolution and the secondary key match.
    pub fn group<I, R, K>(
        &self,
        resolver: &LanguageResolver<'_>,
        template: &Template,
        recipients: I,
        key_fn: K,
    ) -> Grouping<'_>
    where
        I: IntoIterator<Item = R>,
        R: Recipient,
        K: Fn(&R) -> Option<TeamTag>,
    {
        let mut grouping = self.acquire();

        for recipient in recipients {
            let resolution = resolver.resolve(recipient.language(), template);
            let team = key_fn(&recipient);
            let id = recipient.id();

            match grouping
                .buckets
                .iter_mut()
                .find(|bucket| bucket.team == team && bucket.resolution == resolution)
            {
                Some(bucket) => bucket.recipients.push(id),
                None => {
                    let mut members = grouping.spare.pop().unwrap_or_default();
                    members.push(id);
                    grouping.buckets.push(LanguageBucket {
                        resolution,
                        team,
                        recipients: members,
                    });
                }
            }
        }

        grouping
    }

    fn acquire(&self) -> Grouping<'_> {
        if self
            .in_use
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            let mut scratch = self.scratch.lock().unwrap_or_else(PoisonError::into_inner);
            let Scratch { buckets, spare } = std::mem::take(&mut *scratch);
            return Grouping {
                buckets,
                spare,
                pool: Some(self),
            };
        }

        BroadcastMetrics::record_fresh_grouping();
        tracing::debug!("Grouping scratch in use, allocating fresh buckets");
        Grouping {
            buckets: Vec::new(),
            spare: Vec::new(),
            pool: None,
        }
    }

    fn release(&self, mut buckets: Vec<LanguageBucket>, mut spare: Vec<Vec<RecipientId>>) {
        for bucket in buckets.drain(..) {
            if spare.len() >= MAX_SPARE {
                break;
            }
            let mut members = bucket.recipients;
            members.clear();
            spare.push(members);
        }

        let mut scratch = self.scratch.lock().unwrap_or_else(PoisonError::into_inner);
        *scratch = Scratch { buckets, spare };
        drop(scratch);
        self.in_use.store(false, Ordering::Release);
    }
}

/// Result of one grouping pass; storage returns to the pool on drop
pub struct Grouping<'a> {
    buckets: Vec<LanguageBucket>,
    spare: Vec<Vec<RecipientId>>,
    pool: Option<&'a LanguageGrouper>,
}

impl Grouping<'_> {
    /// Whether this grouping uses the pooled scratch storage
    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }

    pub fn total_recipients(&self) -> usize {
        self.buckets.iter().map(|b| b.recipients.len()).sum()
    }

    /// Take the buckets out, giving up their storage
    pub fn into_buckets(mut self) -> Vec<LanguageBucket> {
        std::mem::take(&mut self.buckets)
    }
}

impl Deref for Grouping<'_> {
    type Target = [LanguageBucket];

    fn deref(&self) -> &[LanguageBucket] {
        &self.buckets
    }
}

impl Drop for Grouping<'_> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.release(
                std::mem::take(&mut self.buckets),
                std::mem::take(&mut self.spare),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{LanguageInfo, LanguageSet};
    use crate::template::{CatalogSource, TemplateCatalog, TemplateDef, TemplateFlags, TemplateRegistry};
    use std::collections::HashSet;
    use std::sync::Arc;

    struct Player {
        id: u64,
        language: Option<&'static str>,
        team: u8,
    }

    impl Recipient for Player {
        fn id(&self) -> RecipientId {
            RecipientId(self.id)
        }

        fn language(&self) -> Option<&str> {
            self.language
        }

        fn team(&self) -> Option<TeamTag> {
            Some(TeamTag(self.team))
        }
    }

    fn player(id: u64, language: Option<&'static str>, team: u8) -> Player {
        Player { id, language, team }
    }

    fn setup() -> (LanguageSet, Arc<TemplateRegistry>) {
        let languages = LanguageSet::new(
            "en-us",
            vec![LanguageInfo::new("de-de").with_alias("german"), LanguageInfo::new("ru-ru")],
        );
        let catalog = TemplateCatalog::new();
        catalog.register(
            CatalogSource::from_templates(vec![TemplateDef::builder("hello", "Hello")
                .flags(TemplateFlags::empty())
                .translation("de-de", "Hallo")
                .build()]),
            languages.default_code(),
        );
        (languages, catalog.snapshot())
    }

    #[test]
    fn test_partition_in_first_seen_order() {
        let (languages, registry) = setup();
        let template = registry.by_key("hello").unwrap();
        let resolver = LanguageResolver::new(&languages);
        let grouper = LanguageGrouper::new();

        let players = vec![
            player(1, Some("de-de"), 1),
            player(2, None, 1),
            player(3, Some("German"), 2),
            // ru-ru has no translation, falls back to the default
            player(4, Some("ru-ru"), 2),
            player(5, Some("klingon"), 1),
        ];

        let grouping = grouper.group(&resolver, template, &players, |_| None);
        assert_eq!(grouping.len(), 2);
        assert_eq!(grouping[0].resolution.language().unwrap().as_str(), "de-de");
        assert_eq!(grouping[0].recipients, vec![RecipientId(1), RecipientId(3)]);
        assert_eq!(grouping[1].resolution.language().unwrap().as_str(), "en-us");
        assert_eq!(
            grouping[1].recipients,
            vec![RecipientId(2), RecipientId(4), RecipientId(5)]
        );
        assert_eq!(grouping.total_recipients(), players.len());

        let seen: HashSet<RecipientId> = grouping.iter().flat_map(|b| b.recipients.clone()).collect();
        assert_eq!(seen.len(), players.len());
    }

    #[test]
    fn test_secondary_key_splits_buckets() {
        let (languages, registry) = setup();
        let template = registry.by_key("hello").unwrap();
        let resolver = LanguageResolver::new(&languages);
        let grouper = LanguageGrouper::new();

        let players = vec![
            player(1, None, 1),
            player(2, None, 2),
            player(3, None, 1),
            player(4, Some("de-de"), 2),
        ];

        let grouping = grouper.group(&resolver, template, &players, |p| p.team());
        let shape: Vec<(Option<u8>, usize)> = grouping
            .iter()
            .map(|b| (b.team.map(|t| t.0), b.recipients.len()))
            .collect();
        assert_eq!(shape, vec![(Some(1), 2), (Some(2), 1), (Some(2), 1)]);
    }

    #[test]
    fn test_nested_grouping_allocates_fresh() {
        let (languages, registry) = setup();
        let template = registry.by_key("hello").unwrap();
        let resolver = LanguageResolver::new(&languages);
        let grouper = LanguageGrouper::new();
        let players = vec![player(1, None, 1)];

        let outer = grouper.group(&resolver, template, &players, |_| None);
        assert!(outer.is_pooled());

        let inner = grouper.group(&resolver, template, &players, |_| None);
        assert!(!inner.is_pooled());
        assert_eq!(inner.total_recipients(), 1);
        drop(inner);
        assert_eq!(outer.total_recipients(), 1);
        drop(outer);

        let again = grouper.group(&resolver, template, &players, |_| None);
        assert!(again.is_pooled());
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn test_pooled_storage_is_cleared_between_calls() {
        let (languages, registry) = setup();
        let template = registry.by_key("hello").unwrap();
        let resolver = LanguageResolver::new(&languages);
        let grouper = LanguageGrouper::new();

        let first = vec![player(1, Some("de-de"), 1), player(2, None, 1)];
        drop(grouper.group(&resolver, template, &first, |_| None));

        let second = vec![player(9, None, 1)];
        let grouping = grouper.group(&resolver, template, &second, |_| None);
        assert_eq!(grouping.len(), 1);
        assert_eq!(grouping[0].recipients, vec![RecipientId(9)]);

        let buckets = grouping.into_buckets();
        assert_eq!(buckets.len(), 1);
    }

    #[test]
    fn test_empty_audience() {
        let (languages, registry) = setup();
        let template = registry.by_key("hello").unwrap();
        let resolver = LanguageResolver::new(&languages);
        let grouper = LanguageGrouper::new();

        let grouping = grouper.group(&resolver, template, Vec::<Player>::new(), |_| None);
        assert!(grouping.is_empty());
    }
}
