use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use super::InviteCache;

const REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Spawn the periodic invite-snapshot refresher.
pub fn spawn_refresher(cache: InviteCache) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_refresher(cache).await;
    })
}

async fn run_refresher(cache: InviteCache) {
    let mut interval = interval(REFRESH_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Invite refresher started (interval: {REFRESH_INTERVAL:?})");

    loop {
        interval.tick().await;

        let guilds = cache.known_guilds();
        if guilds.is_empty() {
            debug!("No known guilds, skipping refresh tick");
            continue;
        }

        debug!("Refreshing invite snapshots for {} guild(s)", guilds.len());
        for guild_id in guilds {
            cache.refresh(guild_id).await;
        }
    }
}
