//! Participant identities
//!
//! An identity is a short display name. It prefixes outgoing chat text and is
//! the only input to channel naming, so it must stay usable inside a queue name.

use std::fmt;
use std::str::FromStr;

use crate::config::{DEFAULT_MAX_BACKLOG, FIXED_ROLE_MAX_MSG_SIZE, NAMED_MAX_MSG_SIZE};
use crate::errors::{ChatError, ChatResult};
use crate::queue::QueueAttributes;

/// Identities longer than this are truncated
pub const MAX_IDENTITY_LEN: usize = 32;

// ----------------------------------------------------------------------------
// Identity
// ----------------------------------------------------------------------------

/// Validated participant name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Build an identity from user input.
    ///
    /// Surrounding whitespace is trimmed and the name is truncated to
    /// [`MAX_IDENTITY_LEN`] characters.
    pub fn new(raw: &str) -> ChatResult<Self> {
        let name: String = raw.trim().chars().take(MAX_IDENTITY_LEN).collect();

        if name.is_empty() {
            return Err(invalid(raw, "identity must not be empty"));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| matches!(c, '/' | '[' | ']') || c.is_whitespace() || c.is_control())
        {
            return Err(invalid(raw, &format!("character {bad:?} is not allowed")));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-folded form used in shared peer channel names
    pub fn channel_key(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identity {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

fn invalid(raw: &str, reason: &str) -> ChatError {
    ChatError::InvalidIdentity {
        identity: raw.to_string(),
        reason: reason.to_string(),
    }
}

// ----------------------------------------------------------------------------
// Roles and Participants
// ----------------------------------------------------------------------------

/// Fixed role of the A/B pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    A,
    B,
}

impl Role {
    pub fn peer(self) -> Self {
        match self {
            Role::A => Role::B,
            Role::B => Role::A,
        }
    }

    fn identity(self) -> Identity {
        match self {
            Role::A => Identity("A".to_string()),
            Role::B => Identity("B".to_string()),
        }
    }
}

impl FromStr for Role {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Role::A),
            "B" | "b" => Ok(Role::B),
            other => Err(invalid(other, "role must be A or B")),
        }
    }
}

/// Which pairing convention is in use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// `program <self> <peer>`
    Named,
    /// `program <A|B>`
    FixedRole,
}

/// The two sides of a chat, as seen from the local process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participants {
    local: Identity,
    peer: Identity,
    mode: ChatMode,
}

impl Participants {
    /// Two-party named pairing
    pub fn named(local: Identity, peer: Identity) -> ChatResult<Self> {
        if local.channel_key() == peer.channel_key() {
            return Err(invalid(
                peer.as_str(),
                "peer identity must differ from the local identity",
            ));
        }
        Ok(Self {
            local,
            peer,
            mode: ChatMode::Named,
        })
    }

    /// Fixed A/B pairing
    pub fn fixed_role(role: Role) -> Self {
        Self {
            local: role.identity(),
            peer: role.peer().identity(),
            mode: ChatMode::FixedRole,
        }
    }

    pub fn local(&self) -> &Identity {
        &self.local
    }

    pub fn peer(&self) -> &Identity {
        &self.peer
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    /// Whether this side destroys the shared peer channels at shutdown.
    ///
    /// The identity whose channel key sorts first owns them, which makes `A`
    /// the owner of the fixed pairing.
    pub fn owns_peer_channels(&self) -> bool {
        self.local.channel_key() < self.peer.channel_key()
    }

    /// Queue geometry both sides must agree on
    pub fn queue_attributes(&self) -> QueueAttributes {
        let max_msg_size = match self.mode {
            ChatMode::Named => NAMED_MAX_MSG_SIZE,
            ChatMode::FixedRole => FIXED_ROLE_MAX_MSG_SIZE,
        };
        QueueAttributes::new(DEFAULT_MAX_BACKLOG, max_msg_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_trimmed_and_truncated() {
        let long = "x".repeat(MAX_IDENTITY_LEN + 10);
        let id = Identity::new(&format!("  {long}  ")).unwrap();
        assert_eq!(id.as_str().chars().count(), MAX_IDENTITY_LEN);

        assert_eq!(Identity::new(" alice ").unwrap().as_str(), "alice");
    }

    #[test]
    fn identity_rejects_unusable_names() {
        assert!(Identity::new("").is_err());
        assert!(Identity::new("   ").is_err());
        assert!(Identity::new("a/b").is_err());
        assert!(Identity::new("[bob]").is_err());
        assert!(Identity::new("bob smith").is_err());
    }

    #[test]
    fn role_parsing() {
        assert_eq!("A".parse::<Role>().unwrap(), Role::A);
        assert_eq!("b".parse::<Role>().unwrap(), Role::B);
        assert!("C".parse::<Role>().is_err());
        assert_eq!(Role::A.peer(), Role::B);
    }

    #[test]
    fn exactly_one_side_owns_peer_channels() {
        let alice = Identity::new("alice").unwrap();
        let bob = Identity::new("bob").unwrap();

        let a = Participants::named(alice.clone(), bob.clone()).unwrap();
        let b = Participants::named(bob, alice).unwrap();
        assert!(a.owns_peer_channels());
        assert!(!b.owns_peer_channels());

        assert!(Participants::fixed_role(Role::A).owns_peer_channels());
        assert!(!Participants::fixed_role(Role::B).owns_peer_channels());
    }

    #[test]
    fn named_pairing_rejects_self_chat() {
        let alice = Identity::new("alice").unwrap();
        let shouty = Identity::new("ALICE").unwrap();
        assert!(Participants::named(alice, shouty).is_err());
    }

    #[test]
    fn geometry_depends_on_mode() {
        let fixed = Participants::fixed_role(Role::B);
        assert_eq!(fixed.queue_attributes().max_msg_size, FIXED_ROLE_MAX_MSG_SIZE);

        let named = Participants::named(
            Identity::new("alice").unwrap(),
            Identity::new("bob").unwrap(),
        )
        .unwrap();
        assert_eq!(named.queue_attributes().max_msg_size, NAMED_MAX_MSG_SIZE);
        assert_eq!(named.queue_attributes().max_backlog, DEFAULT_MAX_BACKLOG);
    }
}
