mod client;
mod worker;

pub use client::{FeedError, FreeGamesClient, Giveaway};
pub use worker::spawn_worker;
