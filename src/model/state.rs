use crate::framework::LoadTestError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A simulated user the entities log in as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub username: String,
    /// Session token used by the REST client and the event socket.
    #[serde(default)]
    pub auth_token: String,
}

/// A channel entities may post to or read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Snapshot of the target service prepared before the load test: who can log in and
/// where they can act. Shared read-only by every entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerState {
    pub users: Vec<UserIdentity>,
    #[serde(default)]
    pub channels: Vec<ChannelRef>,
}

impl ServerState {
    /// Reads a server state JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadTestError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, LoadTestError> {
        let state: Self = serde_json::from_str(raw)?;
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> Result<(), LoadTestError> {
        if self.users.is_empty() {
            return Err(LoadTestError::NoUsers);
        }
        Ok(())
    }

    /// Identity for entity `entity_num`.
    ///
    /// Wraps around when there are more entities than users, so several entities may
    /// share one identity (and its session token). Returns `None` only when there are
    /// no users at all.
    pub fn user_for(&self, entity_num: usize) -> Option<&UserIdentity> {
        if self.users.is_empty() {
            return None;
        }
        self.users.get(entity_num % self.users.len())
    }

    /// Channel for the `n`-th action of an entity, round-robin.
    pub fn channel_for(&self, n: usize) -> Option<&ChannelRef> {
        if self.channels.is_empty() {
            return None;
        }
        self.channels.get(n % self.channels.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_users(n: usize) -> ServerState {
        ServerState {
            users: (0..n)
                .map(|i| UserIdentity {
                    id: format!("u{}", i),
                    username: format!("user{}", i),
                    auth_token: String::new(),
                })
                .collect(),
            channels: Vec::new(),
        }
    }

    #[test]
    fn test_user_assignment_wraps_around() {
        for users in 1..5 {
            let state = state_with_users(users);
            for entity in 0..20 {
                let assigned = state.user_for(entity).unwrap();
                assert_eq!(assigned.id, format!("u{}", entity % users));
            }
        }
    }

    #[test]
    fn test_no_users_is_rejected() {
        let state = ServerState::default();
        assert!(state.user_for(0).is_none());
        assert!(matches!(state.validate(), Err(LoadTestError::NoUsers)));
        assert!(matches!(
            ServerState::from_json(r#"{"users": []}"#),
            Err(LoadTestError::NoUsers)
        ));
    }

    #[test]
    fn test_from_json() {
        let state = ServerState::from_json(
            r#"{
                "users": [{"id": "abc", "username": "alice", "auth_token": "tok"}],
                "channels": [{"id": "c1", "name": "town-square"}, {"id": "c2"}]
            }"#,
        )
        .unwrap();

        assert_eq!(state.users[0].username, "alice");
        assert_eq!(state.channel_for(3).unwrap().id, "c2");
        assert_eq!(state.channels[1].name, "");
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ServerState::from_json("{users"),
            Err(LoadTestError::State(_))
        ));
    }
}
