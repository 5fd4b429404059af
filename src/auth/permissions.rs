//! Permission levels for forum operations

use serde::{Deserialize, Serialize};
use std::fmt;

/// Permission levels for forum operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
#[derive(Default)]
pub enum PermissionLevel {
    /// No authentication - read-only browsing
    #[default]
    Public = 0,
    /// Registered member - ask, answer, vote
    Authenticated = 1,
    /// Moderator/administrator - user management and bulk moderation
    Admin = 2,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionLevel::Public => write!(f, "PUBLIC"),
            PermissionLevel::Authenticated => write!(f, "AUTHENTICATED"),
            PermissionLevel::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Forum actions gated by permission level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForumAction {
    Browse,
    Ask,
    Answer,
    Vote,
    ReadNotifications,
    ModerateUsers,
    BulkModerate,
}

/// Get the permission level required for an action
pub fn required_permission(action: ForumAction) -> PermissionLevel {
    match action {
        ForumAction::Browse => PermissionLevel::Public,
        ForumAction::Ask
        | ForumAction::Answer
        | ForumAction::Vote
        | ForumAction::ReadNotifications => PermissionLevel::Authenticated,
        ForumAction::ModerateUsers | ForumAction::BulkModerate => PermissionLevel::Admin,
    }
}

/// Check if an action is allowed for the given permission level
pub fn is_action_allowed(action: ForumAction, level: PermissionLevel) -> bool {
    level >= required_permission(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_can_only_browse() {
        assert!(is_action_allowed(ForumAction::Browse, PermissionLevel::Public));
        assert!(!is_action_allowed(ForumAction::Vote, PermissionLevel::Public));
        assert!(!is_action_allowed(ForumAction::Ask, PermissionLevel::Public));
    }

    #[test]
    fn test_members_cannot_moderate() {
        assert!(is_action_allowed(
            ForumAction::Vote,
            PermissionLevel::Authenticated
        ));
        assert!(!is_action_allowed(
            ForumAction::BulkModerate,
            PermissionLevel::Authenticated
        ));
        assert!(is_action_allowed(ForumAction::BulkModerate, PermissionLevel::Admin));
    }

    #[test]
    fn test_permission_ordering() {
        assert!(PermissionLevel::Admin > PermissionLevel::Authenticated);
        assert!(PermissionLevel::Authenticated > PermissionLevel::Public);
    }
}
