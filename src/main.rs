use std::sync::Arc;

use anyhow::{Context, Result};
use serenity::{Client, all::GatewayIntents};
use tracing::{error, info};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::chat::ChatClient;
use crate::config::Config;
use crate::dispatch::{Dispatcher, EventForwarder};
use crate::freegames::FreeGamesClient;
use crate::invites::{HttpInviteSource, InviteCache};
use crate::notify::Notifier;

mod chat;
mod commands;
mod config;
mod dispatch;
mod freegames;
mod invites;
mod notify;

#[tokio::main]
async fn main() -> Result<()> {
    let tracing_registry = tracing_subscriber::registry();

    match tracing_journald::layer() {
        Ok(journald_layer) => tracing_registry.with(journald_layer).init(),
        Err(_) => tracing_registry
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .with(tracing_subscriber::fmt::layer().with_span_events(FmtSpan::NEW | FmtSpan::CLOSE))
            .init(),
    };

    #[cfg(debug_assertions)]
    dotenvy::dotenv()?;

    let config = Config::from_env()?;

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MODERATION
        | GatewayIntents::GUILD_INVITES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(EventForwarder::new(tx))
        .await
        .context("Error creating client")?;

    let http = Arc::clone(&client.http);

    let invites = InviteCache::new(
        Arc::new(HttpInviteSource::new(Arc::clone(&http))),
        config.attribution_self_only,
    );
    let notifier = Notifier::new(Arc::clone(&http), config.channels.clone());
    let chat = ChatClient::new(&config.llm_host, config.llm_port, config.llm_model.clone());

    invites::spawn_refresher(invites.clone());
    freegames::spawn_worker(
        Arc::clone(&http),
        FreeGamesClient::new(config.free_games_feed_url.clone())?,
        config.channels.free_games,
    );

    let dispatcher = Dispatcher::new(http, invites, notifier, chat);
    tokio::spawn(dispatcher.run(rx));

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    if let Err(why) = client.start().await {
        error!("Client error: {why:?}");
    }

    Ok(())
}
