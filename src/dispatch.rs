use std::sync::Arc;

use rand::Rng;
use serenity::all::{
    Context, EventHandler, Guild, GuildId, GuildMemberUpdateEvent, Http, Member, Message, Ready,
    User, UserId,
};
use serenity::async_trait;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::chat::{ChatClient, FALLBACK_REPLY};
use crate::commands::{self, Command};
use crate::invites::InviteCache;
use crate::notify::{self, Notifier};

/// One inbound gateway event, decoupled from the callback that produced it.
pub enum BotEvent {
    Ready {
        bot_user: UserId,
        guild_ids: Vec<GuildId>,
    },
    GuildAvailable {
        guild_id: GuildId,
    },
    MemberJoined {
        member: Member,
    },
    MemberLeft {
        guild_id: GuildId,
        user: User,
    },
    MemberBanned {
        guild_id: GuildId,
        user: User,
    },
    MemberUnbanned {
        guild_id: GuildId,
        user: User,
    },
    MemberUpdated {
        old: Option<Member>,
        event: GuildMemberUpdateEvent,
    },
    MessageReceived {
        message: Message,
    },
}

/// Gateway-facing half: converts serenity callbacks into [`BotEvent`]s and
/// hands them to the dispatcher, which owns all the actual handling.
pub struct EventForwarder {
    tx: UnboundedSender<BotEvent>,
}

impl EventForwarder {
    pub fn new(tx: UnboundedSender<BotEvent>) -> Self {
        Self { tx }
    }

    fn forward(&self, event: BotEvent) {
        if self.tx.send(event).is_err() {
            error!("Event dispatcher is gone, dropping event");
        }
    }
}

#[async_trait]
impl EventHandler for EventForwarder {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
        self.forward(BotEvent::Ready {
            bot_user: ready.user.id,
            guild_ids: ready.guilds.iter().map(|g| g.id).collect(),
        });
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, _is_new: Option<bool>) {
        self.forward(BotEvent::GuildAvailable { guild_id: guild.id });
    }

    async fn guild_member_addition(&self, _ctx: Context, new_member: Member) {
        self.forward(BotEvent::MemberJoined { member: new_member });
    }

    async fn guild_member_removal(
        &self,
        _ctx: Context,
        guild_id: GuildId,
        user: User,
        _member: Option<Member>,
    ) {
        self.forward(BotEvent::MemberLeft { guild_id, user });
    }

    async fn guild_ban_addition(&self, _ctx: Context, guild_id: GuildId, banned_user: User) {
        self.forward(BotEvent::MemberBanned {
            guild_id,
            user: banned_user,
        });
    }

    async fn guild_ban_removal(&self, _ctx: Context, guild_id: GuildId, unbanned_user: User) {
        self.forward(BotEvent::MemberUnbanned {
            guild_id,
            user: unbanned_user,
        });
    }

    async fn guild_member_update(
        &self,
        _ctx: Context,
        old_if_available: Option<Member>,
        _new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        self.forward(BotEvent::MemberUpdated {
            old: old_if_available,
            event,
        });
    }

    async fn message(&self, _ctx: Context, message: Message) {
        // Ignore bot messages to prevent loops
        if message.author.bot {
            return;
        }
        self.forward(BotEvent::MessageReceived { message });
    }
}

/// Consumes gateway events in arrival order and invokes the matching handler.
/// Handler failures are logged and swallowed, the loop never dies.
pub struct Dispatcher {
    http: Arc<Http>,
    invites: InviteCache,
    notifier: Notifier,
    chat: ChatClient,
    bot_user: Option<UserId>,
}

impl Dispatcher {
    pub fn new(http: Arc<Http>, invites: InviteCache, notifier: Notifier, chat: ChatClient) -> Self {
        Self {
            http,
            invites,
            notifier,
            chat,
            bot_user: None,
        }
    }

    pub async fn run(mut self, mut rx: UnboundedReceiver<BotEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
        info!("Event channel closed, dispatcher stopping");
    }

    async fn handle(&mut self, event: BotEvent) {
        match event {
            BotEvent::Ready {
                bot_user,
                guild_ids,
            } => {
                self.bot_user = Some(bot_user);
                for guild_id in guild_ids {
                    self.invites.register_guild(guild_id);
                }
            }
            BotEvent::GuildAvailable { guild_id } => self.invites.register_guild(guild_id),
            BotEvent::MemberJoined { member } => self.member_joined(member).await,
            BotEvent::MemberLeft { guild_id, user } => {
                info!("{} left guild {guild_id}", user.tag());
                self.notifier.member_left(&user).await;
            }
            BotEvent::MemberBanned { guild_id, user } => {
                info!("{} was banned from guild {guild_id}", user.tag());
                self.notifier.member_banned(&user).await;
            }
            BotEvent::MemberUnbanned { guild_id, user } => {
                info!("{} was unbanned from guild {guild_id}", user.tag());
                self.notifier.member_unbanned(&user).await;
            }
            BotEvent::MemberUpdated { old, event } => self.member_updated(old, event).await,
            BotEvent::MessageReceived { message } => self.message_received(message).await,
        }
    }

    async fn member_joined(&self, member: Member) {
        self.invites.register_guild(member.guild_id);
        let invited_by = self.invites.attribute(member.guild_id, member.user.id).await;
        info!(
            "{} joined guild {} (invited by {invited_by})",
            member.user.tag(),
            member.guild_id
        );
        self.notifier.member_joined(&member, &invited_by).await;
    }

    async fn member_updated(&self, old: Option<Member>, event: GuildMemberUpdateEvent) {
        let Some(old) = old else {
            debug!(
                "No cached member state for {}, skipping role diff",
                event.user.tag()
            );
            return;
        };

        let diff = notify::role_diff(&old.roles, &event.roles);
        self.notifier.roles_changed(&event.user, &diff).await;
    }

    async fn message_received(&self, message: Message) {
        if let Some(command) = commands::parse(&message.content) {
            self.run_command(command, &message).await;
            return;
        }

        if let Some(bot_user) = self.bot_user {
            if message.mentions_user_id(bot_user) {
                let prompt = commands::strip_mention(&message.content, bot_user);
                if !prompt.is_empty() {
                    self.chat_reply(&message, &prompt).await;
                }
            }
        }
    }

    async fn run_command(&self, command: Command, message: &Message) {
        match command {
            Command::Ping => self.reply(message, "Pong!".to_string()).await,
            Command::Ask(prompt) => self.chat_reply(message, &prompt).await,
            Command::Roll(size) => {
                let rolled = rand::rng().random_range(1..=size);
                self.reply(
                    message,
                    format!(
                        "🎲 {} rolled **{rolled}** (1-{size})",
                        message.author.display_name()
                    ),
                )
                .await;
            }
        }
    }

    async fn chat_reply(&self, message: &Message, prompt: &str) {
        let reply = match self
            .chat
            .reply(message.author.display_name(), prompt)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!("Chat completion failed: {e:?}");
                FALLBACK_REPLY.to_string()
            }
        };
        self.reply(message, reply).await;
    }

    async fn reply(&self, message: &Message, content: String) {
        if let Err(e) = message.channel_id.say(&self.http, content).await {
            warn!("Failed to reply in channel {}: {e:?}", message.channel_id);
        }
    }
}
