use std::sync::Arc;

use indoc::formatdoc;
use serenity::all::{ChannelId, Http, Member, Mentionable, RoleId, User};
use tracing::{debug, warn};

use crate::config::ChannelConfig;

/// Posts membership lifecycle notices to the fixed channels.
///
/// Every send is best-effort: a failure (missing channel, permission problem,
/// transport error) is logged as a warning and the notice is skipped.
pub struct Notifier {
    http: Arc<Http>,
    channels: ChannelConfig,
}

impl Notifier {
    pub fn new(http: Arc<Http>, channels: ChannelConfig) -> Self {
        Self { http, channels }
    }

    pub async fn member_joined(&self, member: &Member, invited_by: &str) {
        let message = formatdoc! {"
            Welcome {mention}! 👋
            Invited by: **{invited_by}**
            ",
            mention = member.mention(),
        };
        self.send(self.channels.welcome, message).await;
    }

    pub async fn member_left(&self, user: &User) {
        self.send(
            self.channels.staff_log,
            format!("**{}** left the server.", user.tag()),
        )
        .await;
    }

    pub async fn member_banned(&self, user: &User) {
        self.send(
            self.channels.staff_log,
            format!("🔨 **{}** was banned.", user.tag()),
        )
        .await;
    }

    pub async fn member_unbanned(&self, user: &User) {
        self.send(
            self.channels.staff_log,
            format!("**{}** was unbanned.", user.tag()),
        )
        .await;
    }

    pub async fn roles_changed(&self, user: &User, diff: &RoleDiff) {
        if diff.is_empty() {
            debug!("No role changes for {}, nothing to post", user.tag());
            return;
        }

        let mut lines = vec![format!("Roles updated for **{}**", user.tag())];
        if !diff.added.is_empty() {
            lines.push(format!("Added: {}", mention_list(&diff.added)));
        }
        if !diff.removed.is_empty() {
            lines.push(format!("Removed: {}", mention_list(&diff.removed)));
        }

        self.send(self.channels.staff_log, lines.join("\n")).await;
    }

    async fn send(&self, channel: ChannelId, message: String) {
        if let Err(e) = channel.say(&self.http, message).await {
            warn!("Failed to send notification to channel {channel}: {e:?}");
        }
    }
}

/// Added/removed roles between two membership states.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RoleDiff {
    pub added: Vec<RoleId>,
    pub removed: Vec<RoleId>,
}

impl RoleDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Diff two role lists, preserving the newer list's order for additions.
pub fn role_diff(old: &[RoleId], new: &[RoleId]) -> RoleDiff {
    RoleDiff {
        added: new.iter().filter(|r| !old.contains(r)).copied().collect(),
        removed: old.iter().filter(|r| !new.contains(r)).copied().collect(),
    }
}

fn mention_list(roles: &[RoleId]) -> String {
    roles
        .iter()
        .map(|r| r.mention().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(ids: &[u64]) -> Vec<RoleId> {
        ids.iter().map(|&id| RoleId::new(id)).collect()
    }

    #[test]
    fn diff_reports_added_and_removed_roles() {
        let diff = role_diff(&roles(&[1, 2, 3]), &roles(&[2, 3, 4, 5]));
        assert_eq!(diff.added, roles(&[4, 5]));
        assert_eq!(diff.removed, roles(&[1]));
    }

    #[test]
    fn identical_role_lists_produce_an_empty_diff() {
        let diff = role_diff(&roles(&[1, 2]), &roles(&[1, 2]));
        assert!(diff.is_empty());
    }

    #[test]
    fn diff_from_nothing_reports_all_roles_added() {
        let diff = role_diff(&[], &roles(&[7]));
        assert_eq!(diff.added, roles(&[7]));
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn mention_list_uses_role_mention_markup() {
        assert_eq!(mention_list(&roles(&[7, 8])), "<@&7>, <@&8>");
    }
}
