//! Chat access lists and the chat-access predicate.

use super::{ChatId, GroupId, PlayerId, World, WorldError};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// One entry of a chat's access list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessEntry {
    Player(PlayerId),
    Group(GroupId),
}

impl AccessEntry {
    /// Whether this entry lets the given player in.
    pub fn admits(&self, player: &PlayerId, groups: &HashSet<GroupId>) -> bool {
        match self {
            AccessEntry::Player(id) => id == player,
            AccessEntry::Group(group) => group.is_any() || groups.contains(group),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid access entry '{entry}': {reason}")]
pub struct ParseAccessEntryError {
    pub entry: String,
    pub reason: String,
}

/// Parses `any`, `group:<name>` or `player:<uuid>`.
impl FromStr for AccessEntry {
    type Err = ParseAccessEntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| ParseAccessEntryError {
            entry: s.to_string(),
            reason: reason.to_string(),
        };

        if s == GroupId::ANY {
            return Ok(AccessEntry::Group(GroupId::any()));
        }

        match s.split_once(':') {
            Some(("group", name)) if !name.is_empty() => Ok(AccessEntry::Group(GroupId::new(name))),
            Some(("group", _)) => Err(fail("group name is empty")),
            Some(("player", id)) => Uuid::parse_str(id)
                .map(|uuid| AccessEntry::Player(PlayerId(uuid)))
                .map_err(|e| fail(&e.to_string())),
            _ => Err(fail("expected 'any', 'group:<name>' or 'player:<uuid>'")),
        }
    }
}

impl fmt::Display for AccessEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessEntry::Group(group) if group.is_any() => f.write_str(GroupId::ANY),
            AccessEntry::Group(group) => write!(f, "group:{group}"),
            AccessEntry::Player(id) => write!(f, "player:{id}"),
        }
    }
}

impl World {
    /// Whether `player` may post into `chat`.
    ///
    /// True iff any access entry names the player, is the wildcard group, or
    /// names a group the player belongs to. `Ok(false)` when both exist but
    /// access is not granted.
    ///
    /// # Errors
    ///
    /// [`WorldError::PlayerNotFound`] or [`WorldError::ChatNotFound`] when
    /// either side is unknown.
    pub fn can_chat(&self, player: &PlayerId, chat: &ChatId) -> Result<bool, WorldError> {
        let player = self
            .players
            .get(player)
            .ok_or(WorldError::PlayerNotFound(*player))?;
        let chat = self
            .chats
            .get(chat)
            .ok_or_else(|| WorldError::ChatNotFound(chat.clone()))?;

        Ok(chat
            .access
            .iter()
            .any(|entry| entry.admits(&player.id, &player.groups)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with(chat: &str, access: Vec<AccessEntry>) -> (World, PlayerId) {
        let mut world = World::new();
        world.add_chat(ChatId::from(chat), access).unwrap();
        let id = PlayerId::new();
        world.add_player(id, "alice").unwrap();
        (world, id)
    }

    #[test]
    fn test_wildcard_admits_everyone() {
        let (world, alice) = world_with("general", vec![AccessEntry::Group(GroupId::any())]);
        assert_eq!(world.can_chat(&alice, &ChatId::from("general")), Ok(true));
    }

    #[test]
    fn test_player_entry() {
        let mut world = World::new();
        let alice = PlayerId::new();
        let bob = PlayerId::new();
        world.add_player(alice, "alice").unwrap();
        world.add_player(bob, "bob").unwrap();
        world
            .add_chat(ChatId::from("dm"), vec![AccessEntry::Player(alice)])
            .unwrap();

        assert_eq!(world.can_chat(&alice, &ChatId::from("dm")), Ok(true));
        assert_eq!(world.can_chat(&bob, &ChatId::from("dm")), Ok(false));
    }

    #[test]
    fn test_joining_group_grants_access() {
        let staff = GroupId::new("staff");
        let (mut world, alice) = world_with("staff", vec![AccessEntry::Group(staff.clone())]);
        let chat = ChatId::from("staff");

        assert_eq!(world.can_chat(&alice, &chat), Ok(false));
        world.add_to_group(alice, staff.clone()).unwrap();
        assert_eq!(world.can_chat(&alice, &chat), Ok(true));
        // Re-adding never takes access away
        world.add_to_group(alice, staff).unwrap();
        assert_eq!(world.can_chat(&alice, &chat), Ok(true));
    }

    #[test]
    fn test_empty_acl_denies() {
        let (world, alice) = world_with("closed", Vec::new());
        assert_eq!(world.can_chat(&alice, &ChatId::from("closed")), Ok(false));
    }

    #[test]
    fn test_lookup_failures() {
        let (world, alice) = world_with("general", vec![AccessEntry::Group(GroupId::any())]);
        let stranger = PlayerId::new();

        assert_eq!(
            world.can_chat(&stranger, &ChatId::from("general")),
            Err(WorldError::PlayerNotFound(stranger))
        );
        assert_eq!(
            world.can_chat(&alice, &ChatId::from("nowhere")),
            Err(WorldError::ChatNotFound(ChatId::from("nowhere")))
        );
    }

    #[test]
    fn test_parse_access_entries() {
        assert_eq!("any".parse::<AccessEntry>(), Ok(AccessEntry::Group(GroupId::any())));
        assert_eq!(
            "group:staff".parse::<AccessEntry>(),
            Ok(AccessEntry::Group(GroupId::new("staff")))
        );

        let id = PlayerId::new();
        let entry: AccessEntry = format!("player:{id}").parse().unwrap();
        assert_eq!(entry, AccessEntry::Player(id));
        assert_eq!(entry.to_string(), format!("player:{id}"));

        assert!("group:".parse::<AccessEntry>().is_err());
        assert!("player:not-a-uuid".parse::<AccessEntry>().is_err());
        assert!("staff".parse::<AccessEntry>().is_err());
    }
}
