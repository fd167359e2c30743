use std::env;

use anyhow::{Context, Result};
use serenity::all::ChannelId;

/// Fixed destination channels, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub welcome: ChannelId,
    pub staff_log: ChannelId,
    pub free_games: ChannelId,
}

#[derive(Debug)]
pub struct Config {
    pub discord_token: String,
    pub channels: ChannelConfig,
    pub free_games_feed_url: String,
    pub llm_host: String,
    pub llm_port: u16,
    pub llm_model: String,
    /// Restrict invite attribution to invites created by the joining member.
    pub attribution_self_only: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            discord_token: env::var("DISCORD_TOKEN")
                .context("Expected DISCORD_TOKEN in environment")?,
            channels: ChannelConfig {
                welcome: channel_from_env("WELCOME_CHANNEL_ID")?,
                staff_log: channel_from_env("STAFF_LOG_CHANNEL_ID")?,
                free_games: channel_from_env("FREE_GAMES_CHANNEL_ID")?,
            },
            free_games_feed_url: env::var("FREE_GAMES_FEED_URL")
                .context("Expected FREE_GAMES_FEED_URL in environment")?,
            llm_host: env::var("LLM_HOST").context("Expected LLM_HOST in environment")?,
            llm_port: env::var("LLM_PORT")
                .context("Expected LLM_PORT in environment")?
                .parse()
                .context("LLM_PORT must be a port number")?,
            llm_model: env::var("LLM_MODEL").context("Expected LLM_MODEL in environment")?,
            attribution_self_only: env::var("ATTRIBUTION_SELF_ONLY")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

fn channel_from_env(name: &str) -> Result<ChannelId> {
    let raw = env::var(name).with_context(|| format!("Expected {name} in environment"))?;
    let id: u64 = raw
        .parse()
        .with_context(|| format!("{name} must be a numeric channel id"))?;
    Ok(ChannelId::new(id))
}
