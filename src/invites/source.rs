use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serenity::all::{GuildId, Http};
use serenity::async_trait;
use tokio::time::timeout;

use super::cache::{InviteEntry, InviterRef};

/// Upper bound on one invite-list fetch, so a lazy refresh can't stall a join
/// notification indefinitely.
const FETCH_TIMEOUT: Duration = Duration::from_secs(8);

/// Where invite lists come from: the gateway client in production, a fake in tests.
#[async_trait]
pub trait InviteSource: Send + Sync {
    async fn fetch_invites(&self, guild_id: GuildId) -> Result<Vec<InviteEntry>>;
}

pub struct HttpInviteSource {
    http: Arc<Http>,
}

impl HttpInviteSource {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl InviteSource for HttpInviteSource {
    async fn fetch_invites(&self, guild_id: GuildId) -> Result<Vec<InviteEntry>> {
        let invites = timeout(FETCH_TIMEOUT, guild_id.invites(&self.http))
            .await
            .context("invite fetch timed out")?
            .context("invite fetch failed")?;

        Ok(invites
            .into_iter()
            .map(|invite| InviteEntry {
                code: invite.code,
                inviter: invite.inviter.map(|user| InviterRef {
                    id: user.id,
                    tag: user.tag(),
                }),
                uses: invite.uses,
            })
            .collect())
    }
}
