use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serenity::all::{GuildId, UserId};
use tracing::{debug, warn};

use super::source::InviteSource;

/// Sentinel returned when no inviter can be guessed.
pub const UNKNOWN_INVITER: &str = "Unknown";

/// One invite link as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteEntry {
    pub code: String,
    pub inviter: Option<InviterRef>,
    /// Cumulative redemption count at fetch time, not a delta.
    pub uses: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviterRef {
    pub id: UserId,
    pub tag: String,
}

/// Point-in-time copy of one guild's invite list.
#[derive(Debug, Clone)]
struct InviteSnapshot {
    entries: Vec<InviteEntry>,
    fetched_at: DateTime<Utc>,
}

#[derive(Default)]
struct CacheState {
    /// No entry for a guild means "never successfully fetched", which is
    /// distinct from a fetched-but-empty snapshot.
    snapshots: HashMap<GuildId, InviteSnapshot>,
    known_guilds: HashSet<GuildId>,
}

/// Best-effort "who invited this member" cache.
///
/// The gateway does not report which invite a join redeemed, so this keeps a
/// per-guild snapshot of the invite list and guesses from it: the first invite
/// in stored order that has been used at all and names an inviter. The guess
/// cannot tell apart several actively-used invites, nor simultaneous joins via
/// different links. It is only stable for guilds with at most one active
/// invite link at a time, and is accepted as such.
#[derive(Clone)]
pub struct InviteCache {
    state: Arc<Mutex<CacheState>>,
    source: Arc<dyn InviteSource>,
    self_only: bool,
}

impl InviteCache {
    pub fn new(source: Arc<dyn InviteSource>, self_only: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            source,
            self_only,
        }
    }

    /// Mark a guild as known so the periodic refresher covers it.
    pub fn register_guild(&self, guild_id: GuildId) {
        self.state.lock().unwrap().known_guilds.insert(guild_id);
    }

    pub fn known_guilds(&self) -> Vec<GuildId> {
        self.state
            .lock()
            .unwrap()
            .known_guilds
            .iter()
            .copied()
            .collect()
    }

    /// Replace the guild's snapshot with a freshly fetched invite list.
    ///
    /// The fetch runs outside the lock; a failure is logged and leaves any
    /// previous snapshot untouched, so callers never see an error.
    pub async fn refresh(&self, guild_id: GuildId) {
        match self.source.fetch_invites(guild_id).await {
            Ok(entries) => {
                let mut state = self.state.lock().unwrap();
                state.known_guilds.insert(guild_id);
                state.snapshots.insert(
                    guild_id,
                    InviteSnapshot {
                        entries,
                        fetched_at: Utc::now(),
                    },
                );
                debug!("Refreshed invite snapshot for guild {guild_id}");
            }
            Err(e) => {
                warn!("Failed to refresh invites for guild {guild_id}: {e:?}");
            }
        }
    }

    /// Guess which member invited `joined_user`, returning their tag or the
    /// [`UNKNOWN_INVITER`] sentinel.
    ///
    /// If the guild has never been fetched this performs one refresh first.
    pub async fn attribute(&self, guild_id: GuildId, joined_user: UserId) -> String {
        let missing = !self
            .state
            .lock()
            .unwrap()
            .snapshots
            .contains_key(&guild_id);
        if missing {
            self.refresh(guild_id).await;
        }

        let state = self.state.lock().unwrap();
        let Some(snapshot) = state.snapshots.get(&guild_id) else {
            return UNKNOWN_INVITER.to_string();
        };

        debug!(
            "Attributing join to guild {guild_id} from snapshot fetched at {}",
            snapshot.fetched_at
        );

        first_active_inviter(&snapshot.entries, self.self_only.then_some(joined_user))
            .map(|inviter| inviter.tag.clone())
            .unwrap_or_else(|| UNKNOWN_INVITER.to_string())
    }
}

/// First invite in stored order that has been used at all and names an
/// inviter, optionally restricted to a required inviter id.
fn first_active_inviter(
    entries: &[InviteEntry],
    required_inviter: Option<UserId>,
) -> Option<&InviterRef> {
    entries.iter().find_map(|entry| {
        let inviter = entry.inviter.as_ref()?;
        if entry.uses == 0 {
            return None;
        }
        if required_inviter.is_some_and(|required| inviter.id != required) {
            return None;
        }
        Some(inviter)
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;
    use serenity::async_trait;

    use super::*;

    struct FakeSource {
        responses: Mutex<VecDeque<anyhow::Result<Vec<InviteEntry>>>>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(responses: Vec<anyhow::Result<Vec<InviteEntry>>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InviteSource for FakeSource {
        async fn fetch_invites(&self, _guild_id: GuildId) -> anyhow::Result<Vec<InviteEntry>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("no response queued")))
        }
    }

    fn entry(code: &str, inviter: Option<(u64, &str)>, uses: u64) -> InviteEntry {
        InviteEntry {
            code: code.to_string(),
            inviter: inviter.map(|(id, tag)| InviterRef {
                id: UserId::new(id),
                tag: tag.to_string(),
            }),
            uses,
        }
    }

    fn guild() -> GuildId {
        GuildId::new(99)
    }

    #[tokio::test]
    async fn attribute_lazily_refreshes_exactly_once() {
        let source = FakeSource::new(vec![Ok(vec![entry("a", Some((1, "Alice#0001")), 2)])]);
        let cache = InviteCache::new(source.clone(), false);

        assert_eq!(cache.attribute(guild(), UserId::new(7)).await, "Alice#0001");
        assert_eq!(source.calls(), 1);

        // Snapshot is cached now, a second query must not fetch again.
        assert_eq!(cache.attribute(guild(), UserId::new(7)).await, "Alice#0001");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn attribute_picks_first_used_invite_in_stored_order() {
        // Use counts deliberately favor later entries; stored order must win.
        let source = FakeSource::new(vec![Ok(vec![
            entry("a", Some((1, "Alice#0001")), 0),
            entry("b", Some((2, "Bob#0002")), 3),
            entry("c", Some((3, "Carol#0003")), 9),
        ])]);
        let cache = InviteCache::new(source, false);

        assert_eq!(cache.attribute(guild(), UserId::new(7)).await, "Bob#0002");
    }

    #[tokio::test]
    async fn attribute_skips_used_invites_without_an_inviter() {
        let source = FakeSource::new(vec![Ok(vec![
            entry("a", None, 5),
            entry("b", Some((2, "Bob#0002")), 3),
        ])]);
        let cache = InviteCache::new(source, false);

        assert_eq!(cache.attribute(guild(), UserId::new(7)).await, "Bob#0002");
    }

    #[tokio::test]
    async fn attribute_is_unknown_when_every_invite_is_unused() {
        let source = FakeSource::new(vec![Ok(vec![
            entry("a", Some((1, "Alice#0001")), 0),
            entry("b", Some((2, "Bob#0002")), 0),
        ])]);
        let cache = InviteCache::new(source, false);

        assert_eq!(
            cache.attribute(guild(), UserId::new(7)).await,
            UNKNOWN_INVITER
        );
    }

    #[tokio::test]
    async fn attribute_is_unknown_for_an_empty_snapshot() {
        let source = FakeSource::new(vec![Ok(Vec::new())]);
        let cache = InviteCache::new(source, false);

        assert_eq!(
            cache.attribute(guild(), UserId::new(7)).await,
            UNKNOWN_INVITER
        );
    }

    #[tokio::test]
    async fn attribute_is_unknown_when_no_snapshot_is_obtainable() {
        let source = FakeSource::new(vec![Err(anyhow!("missing permission"))]);
        let cache = InviteCache::new(source.clone(), false);

        assert_eq!(
            cache.attribute(guild(), UserId::new(7)).await,
            UNKNOWN_INVITER
        );
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_previous_snapshot() {
        let source = FakeSource::new(vec![
            Ok(vec![entry("b", Some((2, "Bob#0002")), 3)]),
            Err(anyhow!("gateway hiccup")),
        ]);
        let cache = InviteCache::new(source.clone(), false);

        cache.refresh(guild()).await;
        cache.refresh(guild()).await;
        assert_eq!(source.calls(), 2);

        // Behavior is identical to the state after the first refresh alone.
        assert_eq!(cache.attribute(guild(), UserId::new(7)).await, "Bob#0002");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn self_only_option_restricts_the_match_to_the_joining_member() {
        let entries = vec![
            entry("a", Some((1, "Alice#0001")), 4),
            entry("b", Some((2, "Bob#0002")), 2),
        ];
        let source = FakeSource::new(vec![Ok(entries.clone()), Ok(entries)]);
        let cache = InviteCache::new(source, true);

        assert_eq!(cache.attribute(guild(), UserId::new(2)).await, "Bob#0002");
        assert_eq!(
            cache.attribute(guild(), UserId::new(3)).await,
            UNKNOWN_INVITER
        );
    }

    #[tokio::test]
    async fn refresh_registers_the_guild_as_known() {
        let source = FakeSource::new(vec![Ok(Vec::new())]);
        let cache = InviteCache::new(source, false);

        assert!(cache.known_guilds().is_empty());
        cache.refresh(guild()).await;
        assert_eq!(cache.known_guilds(), vec![guild()]);
    }
}
