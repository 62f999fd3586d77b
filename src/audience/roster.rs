use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::metrics::BroadcastMetrics;

use super::{
    Audience, PermissionTier, Recipient, RecipientId, RecipientSource, SquadId, TeamTag,
};

/// Snapshot of one online player. Updates replace the whole value.
#[derive(Debug, Clone, Serialize)]
pub struct OnlinePlayer {
    pub id: RecipientId,
    pub name: String,
    pub language: Option<String>,
    pub team: Option<TeamTag>,
    pub squad: Option<SquadId>,
    pub tier: PermissionTier,
    pub joined_at: DateTime<Utc>,
}

impl OnlinePlayer {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: RecipientId(id),
            name: name.into(),
            language: None,
            team: None,
            squad: None,
            tier: PermissionTier::default(),
            joined_at: Utc::now(),
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn with_team(mut self, team: u8) -> Self {
        self.team = Some(TeamTag(team));
        self
    }

    pub fn with_squad(mut self, squad: u32) -> Self {
        self.squad = Some(SquadId(squad));
        self
    }

    pub fn with_tier(mut self, tier: PermissionTier) -> Self {
        self.tier = tier;
        self
    }
}

impl Recipient for OnlinePlayer {
    fn id(&self) -> RecipientId {
        self.id
    }

    fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    fn team(&self) -> Option<TeamTag> {
        self.team
    }

    fn squad(&self) -> Option<SquadId> {
        self.squad
    }

    fn tier(&self) -> PermissionTier {
        self.tier
    }
}

/// Roster statistics
#[derive(Debug, Clone, Serialize)]
pub struct RosterStats {
    pub online: usize,
    /// Players per team; players without a team are not listed
    pub teams: BTreeMap<u8, usize>,
    /// Players per requested language; `"unset"` for players without a preference
    pub languages: BTreeMap<String, usize>,
}

/// In-memory directory of online players, indexed by team
#[derive(Default)]
pub struct Roster {
    /// player id -> player
    players: DashMap<RecipientId, Arc<OnlinePlayer>>,
    /// team -> set of player ids
    team_index: DashMap<TeamTag, HashSet<RecipientId>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player, replacing any previous entry with the same id
    pub fn join(&self, player: OnlinePlayer) -> Arc<OnlinePlayer> {
        let player = Arc::new(player);
        if let Some(previous) = self.players.insert(player.id, player.clone()) {
            self.unindex(&previous);
        }
        self.index(&player);
        BroadcastMetrics::set_players_online(self.players.len());

        tracing::info!(
            player_id = %player.id,
            name = %player.name,
            language = player.language.as_deref().unwrap_or("unset"),
            "Player joined"
        );
        player
    }

    pub fn leave(&self, id: RecipientId) -> Option<Arc<OnlinePlayer>> {
        let (_, player) = self.players.remove(&id)?;
        self.unindex(&player);
        BroadcastMetrics::set_players_online(self.players.len());
        tracing::info!(player_id = %id, "Player left");
        Some(player)
    }

    /// Change a player's language preference; false if the player is offline
    pub fn set_language(&self, id: RecipientId, language: Option<&str>) -> bool {
        self.update(id, |player| player.language = language.map(str::to_string))
            .is_some()
    }

    /// Move a player to another team; false if the player is offline
    pub fn set_team(&self, id: RecipientId, team: Option<TeamTag>) -> bool {
        match self.update(id, |player| player.team = team) {
            Some((previous, current)) => {
                self.unindex(&previous);
                self.index(&current);
                true
            }
            None => false,
        }
    }

    pub fn set_squad(&self, id: RecipientId, squad: Option<SquadId>) -> bool {
        self.update(id, |player| player.squad = squad).is_some()
    }

    pub fn get(&self, id: RecipientId) -> Option<Arc<OnlinePlayer>> {
        self.players.get(&id).map(|p| p.clone())
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn stats(&self) -> RosterStats {
        let mut languages = BTreeMap::new();
        for entry in self.players.iter() {
            let language = entry
                .value()
                .language
                .as_deref()
                .map(str::to_ascii_lowercase)
                .unwrap_or_else(|| "unset".to_string());
            *languages.entry(language).or_insert(0) += 1;
        }

        RosterStats {
            online: self.players.len(),
            teams: self
                .team_index
                .iter()
                .map(|entry| (entry.key().0, entry.value().len()))
                .collect(),
            languages,
        }
    }

    fn update<F>(&self, id: RecipientId, apply: F) -> Option<(Arc<OnlinePlayer>, Arc<OnlinePlayer>)>
    where
        F: FnOnce(&mut OnlinePlayer),
    {
        let mut entry = self.players.get_mut(&id)?;
        let previous = entry.clone();
        let mut updated = (*previous).clone();
        apply(&mut updated);
        let current = Arc::new(updated);
        *entry = current.clone();
        Some((previous, current))
    }

    fn index(&self, player: &OnlinePlayer) {
        if let Some(team) = player.team {
            self.team_index.entry(team).or_default().insert(player.id);
        }
    }

    fn unindex(&self, player: &OnlinePlayer) {
        let Some(team) = player.team else {
            return;
        };
        if let Some(mut members) = self.team_index.get_mut(&team) {
            members.remove(&player.id);
            if members.is_empty() {
                drop(members);
                self.team_index.remove_if(&team, |_, members| members.is_empty());
            }
        }
    }
}

impl RecipientSource for Roster {
    type Item = Arc<OnlinePlayer>;

    /// Matching players ordered by id
    fn select(&self, audience: &Audience) -> Vec<Arc<OnlinePlayer>> {
        let mut selected: Vec<Arc<OnlinePlayer>> = match audience {
            Audience::Team(team) => self
                .team_index
                .get(team)
                .map(|ids| ids.iter().filter_map(|id| self.get(*id)).collect())
                .unwrap_or_default(),
            Audience::Recipients(ids) => {
                let mut seen = HashSet::with_capacity(ids.len());
                ids.iter()
                    .filter(|id| seen.insert(**id))
                    .filter_map(|id| self.get(*id))
                    .collect()
            }
            _ => self
                .players
                .iter()
                .filter(|entry| audience.matches(entry.value().as_ref()))
                .map(|entry| entry.value().clone())
                .collect(),
        };
        selected.sort_by_key(|player| player.id);
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        let roster = Roster::new();
        roster.join(OnlinePlayer::new(3, "charlie").with_team(2).with_language("ru-ru"));
        roster.join(OnlinePlayer::new(1, "alpha").with_team(1).with_squad(7));
        roster.join(
            OnlinePlayer::new(2, "bravo")
                .with_team(1)
                .with_tier(PermissionTier::Moderator)
                .with_language("de-de"),
        );
        roster
    }

    fn ids(players: &[Arc<OnlinePlayer>]) -> Vec<u64> {
        players.iter().map(|p| p.id.0).collect()
    }

    #[test]
    fn test_select_audiences() {
        let roster = roster();
        assert_eq!(ids(&roster.select(&Audience::All)), vec![1, 2, 3]);
        assert_eq!(ids(&roster.select(&Audience::Team(TeamTag(1)))), vec![1, 2]);
        assert_eq!(ids(&roster.select(&Audience::Squad(SquadId(7)))), vec![1]);
        assert_eq!(
            ids(&roster.select(&Audience::Tier(PermissionTier::Helper))),
            vec![2]
        );
        assert_eq!(
            ids(&roster.select(&Audience::Recipients(vec![
                RecipientId(3),
                RecipientId(3),
                RecipientId(99)
            ]))),
            vec![3]
        );
        assert!(roster.select(&Audience::Team(TeamTag(9))).is_empty());
    }

    #[test]
    fn test_team_moves_are_reindexed() {
        let roster = roster();
        assert!(roster.set_team(RecipientId(1), Some(TeamTag(2))));
        assert_eq!(ids(&roster.select(&Audience::Team(TeamTag(2)))), vec![1, 3]);
        assert_eq!(ids(&roster.select(&Audience::Team(TeamTag(1)))), vec![2]);

        assert!(roster.set_team(RecipientId(2), None));
        assert!(roster.select(&Audience::Team(TeamTag(1))).is_empty());
        assert_eq!(roster.stats().teams, BTreeMap::from([(2, 2)]));
        assert!(!roster.set_team(RecipientId(42), None));
    }

    #[test]
    fn test_updates_replace_snapshot() {
        let roster = roster();
        let before = roster.get(RecipientId(1)).unwrap();
        assert!(roster.set_language(RecipientId(1), Some("de-de")));

        assert_eq!(before.language, None);
        assert_eq!(roster.get(RecipientId(1)).unwrap().language.as_deref(), Some("de-de"));
        assert!(!roster.set_language(RecipientId(42), None));
    }

    #[test]
    fn test_join_leave_and_stats() {
        let roster = roster();
        roster.join(OnlinePlayer::new(1, "alpha-again").with_team(2));
        assert_eq!(roster.len(), 3);
        assert_eq!(ids(&roster.select(&Audience::Team(TeamTag(1)))), vec![2]);

        let stats = roster.stats();
        assert_eq!(stats.online, 3);
        assert_eq!(stats.languages.get("unset"), Some(&1));
        assert_eq!(stats.languages.get("de-de"), Some(&1));

        assert!(roster.leave(RecipientId(2)).is_some());
        assert!(roster.leave(RecipientId(2)).is_none());
        assert_eq!(roster.stats().teams, BTreeMap::from([(2, 2)]));
    }
}
