use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use indoc::formatdoc;
use serenity::all::{ChannelId, Http};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, info, warn};

use super::client::{FreeGamesClient, Giveaway};

const POLL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const ANNOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Spawn the daily free-games announcer.
pub fn spawn_worker(
    http: Arc<Http>,
    client: FreeGamesClient,
    channel: ChannelId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_worker(http, client, channel).await;
    })
}

async fn run_worker(http: Arc<Http>, client: FreeGamesClient, channel: ChannelId) {
    let mut interval = interval(POLL_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Announced once per process lifetime; the feed repeats entries day to day.
    let mut seen: HashSet<String> = HashSet::new();

    info!("Free-games worker started (interval: {POLL_INTERVAL:?})");

    loop {
        interval.tick().await;

        let giveaways = match client.fetch_current().await {
            Ok(giveaways) => giveaways,
            Err(e) => {
                warn!("Free-games poll failed: {e}");
                continue;
            }
        };

        let fresh = filter_unseen(giveaways, &seen);
        if fresh.is_empty() {
            debug!("No new giveaways this poll");
            continue;
        }

        info!("Announcing {} new giveaway(s)", fresh.len());

        for giveaway in fresh {
            let message = formatdoc! {"
                🎁 **Free game:** {title}
                {url}
                ",
                title = giveaway.title,
                url = giveaway.url,
            };

            if let Err(e) = channel.say(&http, message).await {
                // Left out of the seen set, so the next poll retries it.
                warn!("Failed to announce giveaway in channel {channel}: {e:?}");
            } else {
                seen.insert(giveaway.url);
            }

            sleep(ANNOUNCE_DELAY).await;
        }
    }
}

/// Drop giveaways already announced this process lifetime.
fn filter_unseen(giveaways: Vec<Giveaway>, seen: &HashSet<String>) -> Vec<Giveaway> {
    giveaways
        .into_iter()
        .filter(|g| !seen.contains(&g.url))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn giveaway(title: &str, url: &str) -> Giveaway {
        Giveaway {
            title: title.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn already_announced_giveaways_are_filtered_out() {
        let seen: HashSet<String> = ["https://example.com/old".to_string()].into();
        let fresh = filter_unseen(
            vec![
                giveaway("Old", "https://example.com/old"),
                giveaway("New", "https://example.com/new"),
            ],
            &seen,
        );

        assert_eq!(fresh, vec![giveaway("New", "https://example.com/new")]);
    }

    #[test]
    fn nothing_is_filtered_on_the_first_poll() {
        let fresh = filter_unseen(
            vec![giveaway("A", "https://example.com/a")],
            &HashSet::new(),
        );
        assert_eq!(fresh.len(), 1);
    }
}
