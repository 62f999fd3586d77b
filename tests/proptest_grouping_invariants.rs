//! Property tests for grouping, render cost, fallback and case tokens

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;

use battlecast_l10n::args;
use battlecast_l10n::audience::{OnlinePlayer, RecipientId};
use battlecast_l10n::broadcast::{Broadcaster, MessageSink};
use battlecast_l10n::color::{Color, ColorResolver, Palette};
use battlecast_l10n::language::{LanguageInfo, LanguageSet};
use battlecast_l10n::template::{SlotSpec, TemplateDef, TemplateFlags};
use battlecast_l10n::Localizer;

const PREFERENCES: &[&str] = &["en-us", "de-de", "german", "ru-ru", "fr-fr", "klingon", ""];

fn localizer() -> Localizer {
    let localizer = Localizer::new(
        LanguageSet::new(
            "en-us",
            vec![
                LanguageInfo::new("de-de").with_alias("german"),
                LanguageInfo::new("ru-ru"),
                LanguageInfo::new("fr-fr"),
            ],
        ),
        ColorResolver::new(Arc::new(Palette::default()), Color::WHITE),
    );
    localizer.register(vec![
        TemplateDef::builder("shared", "Hello {0}")
            .arg()
            .flags(TemplateFlags::empty())
            .translation("de-de", "Hallo {0}")
            .translation("ru-ru", "Привет {0}")
            .build(),
        TemplateDef::builder("per_team", "Team {0}")
            .arg()
            .flags(TemplateFlags::PER_TEAM)
            .translation("fr-fr", "Équipe {0}")
            .build(),
        TemplateDef::builder("russian_only", "")
            .arg()
            .flags(TemplateFlags::empty())
            .translation("ru-ru", "Только {0}")
            .build(),
        TemplateDef::builder("upper", "{0}")
            .slot(SlotSpec::any().format("upper"))
            .flags(TemplateFlags::empty())
            .build(),
        TemplateDef::builder("lower", "{0}")
            .slot(SlotSpec::any().format("lower"))
            .flags(TemplateFlags::empty())
            .build(),
        TemplateDef::builder("proper", "{0}")
            .slot(SlotSpec::any().format("proper"))
            .flags(TemplateFlags::empty())
            .build(),
    ]);
    localizer
}

/// (preference index or none, team)
fn audience() -> impl Strategy<Value = Vec<(Option<usize>, Option<u8>)>> {
    prop::collection::vec(
        (
            prop::option::of(0..PREFERENCES.len()),
            prop::option::of(1u8..4),
        ),
        0..64,
    )
}

fn players(spec: &[(Option<usize>, Option<u8>)]) -> Vec<OnlinePlayer> {
    spec.iter()
        .enumerate()
        .map(|(id, (language, team))| {
            let mut player = OnlinePlayer::new(id as u64, format!("p{}", id));
            if let Some(index) = language {
                player = player.with_language(PREFERENCES[*index]);
            }
            if let Some(team) = team {
                player = player.with_team(*team);
            }
            player
        })
        .collect()
}

#[derive(Default)]
struct CountingSink {
    calls: AtomicUsize,
}

impl MessageSink for CountingSink {
    fn deliver(&self, recipients: &[RecipientId], _text: &str) -> usize {
        self.calls.fetch_add(1, Ordering::Relaxed);
        recipients.len()
    }
}

proptest! {
    #[test]
    fn grouping_partitions_the_audience(spec in audience(), per_team in any::<bool>()) {
        let localizer = localizer();
        let registry = localizer.templates();
        let template = registry.by_key(if per_team { "per_team" } else { "shared" }).unwrap();
        let players = players(&spec);

        let grouping = localizer.group(template, &players);

        let mut seen = HashSet::new();
        for bucket in grouping.iter() {
            prop_assert!(!bucket.recipients.is_empty());
            for id in &bucket.recipients {
                prop_assert!(seen.insert(*id), "recipient {} in two buckets", id);
            }
        }
        let expected: HashSet<RecipientId> = players.iter().map(|p| p.id).collect();
        prop_assert_eq!(seen, expected);

        // Buckets are keyed by (resolution, team) and never repeat a key
        let unique: HashSet<_> = grouping
            .iter()
            .map(|b| (b.resolution.language().cloned(), b.team))
            .collect();
        prop_assert_eq!(unique.len(), grouping.len());
        if !per_team {
            prop_assert!(grouping.iter().all(|b| b.team.is_none()));
        }
    }

    #[test]
    fn render_cost_equals_distinct_resolutions(spec in audience()) {
        let localizer = Arc::new(localizer());
        let registry = localizer.templates();
        let template = registry.by_key("shared").unwrap();
        let players = players(&spec);

        let distinct: BTreeSet<String> = players
            .iter()
            .filter_map(|p| {
                localizer
                    .resolve(p.language.as_deref(), template)
                    .language()
                    .map(|code| code.to_string())
            })
            .collect();

        let sink = Arc::new(CountingSink::default());
        let broadcaster = Broadcaster::new(localizer.clone(), sink.clone());
        let result = broadcaster.broadcast_to(&players, template.id, &args!["x"]);

        prop_assert_eq!(result.renders, distinct.len());
        prop_assert_eq!(sink.calls.load(Ordering::Relaxed), distinct.len());
        prop_assert_eq!(result.recipients, players.len());
    }

    #[test]
    fn fallback_always_produces_text(preference in prop::option::of("[a-zA-Z_-]{0,12}"), arg in "[a-z]{1,8}") {
        let localizer = localizer();
        for key in ["shared", "per_team", "russian_only"] {
            let text = localizer.render_key(key, preference.as_deref(), &args![arg.as_str()]).unwrap();
            prop_assert!(!text.is_empty());
            prop_assert!(text.contains(arg.as_str()));
        }
    }

    #[test]
    fn case_tokens_are_idempotent(text in "[a-zA-Z0-9 _'-]{0,24}") {
        let localizer = localizer();
        for key in ["upper", "lower", "proper"] {
            let once = localizer.render_key(key, None, &args![text.as_str()]).unwrap();
            let twice = localizer.render_key(key, None, &args![once.as_str()]).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
