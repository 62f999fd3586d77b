//! Recipients, audiences and per-language grouping.
//!
//! The engine never owns recipients. The host exposes them through the
//! [`Recipient`] trait and answers audience selections through
//! [`RecipientSource`]; [`Roster`] is an in-memory implementation.

mod grouping;
mod roster;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use grouping::{Grouping, LanguageBucket, LanguageGrouper};
pub use roster::{OnlinePlayer, Roster, RosterStats};

/// Stable recipient identity (a platform account id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(pub u64);

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Team a recipient plays on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamTag(pub u8);

impl fmt::Display for TeamTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Squad identifier, unique across teams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SquadId(pub u32);

/// Permission tiers, ordered from least to most privileged
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PermissionTier {
    #[default]
    Player,
    Helper,
    Moderator,
    Admin,
}

/// Anything that can receive a rendered message
pub trait Recipient {
    fn id(&self) -> RecipientId;

    /// Language the recipient asked for (code or alias), if any
    fn language(&self) -> Option<&str>;

    fn team(&self) -> Option<TeamTag> {
        None
    }

    fn squad(&self) -> Option<SquadId> {
        None
    }

    fn tier(&self) -> PermissionTier {
        PermissionTier::default()
    }
}

impl<T: Recipient + ?Sized> Recipient for &T {
    fn id(&self) -> RecipientId {
        (**self).id()
    }

    fn language(&self) -> Option<&str> {
        (**self).language()
    }

    fn team(&self) -> Option<TeamTag> {
        (**self).team()
    }

    fn squad(&self) -> Option<SquadId> {
        (**self).squad()
    }

    fn tier(&self) -> PermissionTier {
        (**self).tier()
    }
}

impl<T: Recipient + ?Sized> Recipient for Arc<T> {
    fn id(&self) -> RecipientId {
        (**self).id()
    }

    fn language(&self) -> Option<&str> {
        (**self).language()
    }

    fn team(&self) -> Option<TeamTag> {
        (**self).team()
    }

    fn squad(&self) -> Option<SquadId> {
        (**self).squad()
    }

    fn tier(&self) -> PermissionTier {
        (**self).tier()
    }
}

/// Predicate used by [`Audience::Filter`]
pub type AudienceFilter = Arc<dyn Fn(&dyn Recipient) -> bool + Send + Sync>;

/// Which recipients a message is meant for
#[derive(Clone)]
pub enum Audience {
    /// Everyone online
    All,
    /// Recipients on one team
    Team(TeamTag),
    /// Recipients in one squad
    Squad(SquadId),
    /// Recipients at or above a permission tier
    Tier(PermissionTier),
    /// An explicit list of recipients
    Recipients(Vec<RecipientId>),
    /// Arbitrary predicate
    Filter(AudienceFilter),
}

impl Audience {
    pub fn filter<F>(predicate: F) -> Self
    where
        F: Fn(&dyn Recipient) -> bool + Send + Sync + 'static,
    {
        Audience::Filter(Arc::new(predicate))
    }

    pub fn matches(&self, recipient: &dyn Recipient) -> bool {
        match self {
            Audience::All => true,
            Audience::Team(team) => recipient.team() == Some(*team),
            Audience::Squad(squad) => recipient.squad() == Some(*squad),
            Audience::Tier(tier) => recipient.tier() >= *tier,
            Audience::Recipients(ids) => ids.contains(&recipient.id()),
            Audience::Filter(predicate) => predicate(recipient),
        }
    }

    /// Metric/log label
    pub fn kind(&self) -> &'static str {
        match self {
            Audience::All => "all",
            Audience::Team(_) => "team",
            Audience::Squad(_) => "squad",
            Audience::Tier(_) => "tier",
            Audience::Recipients(_) => "recipients",
            Audience::Filter(_) => "filter",
        }
    }
}

impl fmt::Debug for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::All => f.write_str("All"),
            Audience::Team(team) => f.debug_tuple("Team").field(team).finish(),
            Audience::Squad(squad) => f.debug_tuple("Squad").field(squad).finish(),
            Audience::Tier(tier) => f.debug_tuple("Tier").field(tier).finish(),
            Audience::Recipients(ids) => f.debug_tuple("Recipients").field(ids).finish(),
            Audience::Filter(_) => f.write_str("Filter(..)"),
        }
    }
}

/// Host boundary: enumerate the recipients an [`Audience`] selects
pub trait RecipientSource {
    type Item: Recipient;

    fn select(&self, audience: &Audience) -> Vec<Self::Item>;
}
