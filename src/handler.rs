use std::{collections::HashMap, sync::Arc};

use anyhow::Context as _;
use serenity::{
    all::{
        CreateEmbed, CreateMessage, Guild, ResumedEvent, ShardStageUpdateEvent, Timestamp,
        UnavailableGuild,
    },
    async_trait,
    cache::Cache,
    client::{Context, EventHandler},
    model::{
        channel::Message,
        gateway::Ready,
        id::{ChannelId, GuildId, MessageId},
        voice::VoiceState,
    },
};
use tracing::{debug, warn};

use crate::{
    command::{Command, IncomingMessage},
    core::{
        dispatch, notification_channel, Action, Event, GuildDirectory, OutgoingMessage, RichEmbed,
    },
    notify::{MemberInfo, VoiceChannel, VoiceUpdate},
    web::{BotStatus, ConnectionStatus},
    NotificationChannels,
};

/// Resolves channels against the serenity cache.
pub struct CacheDirectory<'a>(pub &'a Cache);

impl GuildDirectory for CacheDirectory<'_> {
    fn has_channel(&self, guild_id: GuildId, channel_id: ChannelId) -> bool {
        self.0.guild(guild_id).is_some_and(|guild| {
            contains_channel(
                &guild.channels,
                guild.threads.iter().map(|thread| thread.id),
                channel_id,
            )
        })
    }
}

/// Active threads are cached apart from the guild's regular channels.
fn contains_channel<C>(
    channels: &HashMap<ChannelId, C>,
    mut thread_ids: impl Iterator<Item = ChannelId>,
    channel_id: ChannelId,
) -> bool {
    channels.contains_key(&channel_id) || thread_ids.any(|id| id == channel_id)
}

pub struct Handler;

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        if let Ok(status) = bot_status(&ctx).await {
            status.set_guilds(ready.guilds.len());
            status.set_connection(ConnectionStatus::Connected);
        }
        let event = Event::Ready {
            user_name: ready.user.tag(),
            guild_count: ready.guilds.len(),
        };
        if let Err(e) = handle_event(&ctx, event).await {
            warn!("Error while processing ready: {e:?}");
        }
    }

    async fn cache_ready(&self, ctx: Context, _guilds: Vec<GuildId>) {
        update_guild_count(&ctx).await;
    }

    async fn resume(&self, ctx: Context, _: ResumedEvent) {
        if let Ok(status) = bot_status(&ctx).await {
            status.set_connection(ConnectionStatus::Connected);
        }
    }

    async fn shard_stage_update(&self, ctx: Context, event: ShardStageUpdateEvent) {
        let connection = ConnectionStatus::from(event.new);
        debug!(shard_id = ?event.shard_id, "Shard stage changed to {connection}");
        if let Ok(status) = bot_status(&ctx).await {
            status.set_connection(connection);
        }
    }

    async fn guild_create(&self, ctx: Context, _guild: Guild, _is_new: Option<bool>) {
        update_guild_count(&ctx).await;
    }

    async fn guild_delete(&self, ctx: Context, _incomplete: UnavailableGuild, _full: Option<Guild>) {
        update_guild_count(&ctx).await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let event = Event::Message(incoming_message(&ctx, &msg).await);
        if let Err(e) = handle_event(&ctx, event).await {
            warn!("Error while processing a message: {e:?}");
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        // Skip name and member lookups for guilds nobody is notified about.
        match notification_channels(&ctx).await {
            Ok(channels) => {
                let directory = CacheDirectory(&ctx.cache);
                if notification_channel(guild_id, &channels, &directory).is_none() {
                    return;
                }
            }
            Err(e) => {
                warn!("Error while processing a voice state update: {e:?}");
                return;
            }
        }
        let update = match voice_update(&ctx, guild_id, old.as_ref(), &new).await {
            Ok(update) => update,
            Err(e) => {
                warn!("Error while reading a voice state: {e:?}");
                return;
            }
        };
        if let Err(e) = handle_event(&ctx, Event::VoiceStateUpdate(update)).await {
            warn!("Error while processing a voice state update: {e:?}");
        }
    }
}

async fn bot_status(ctx: &Context) -> anyhow::Result<Arc<BotStatus>> {
    ctx.data
        .read()
        .await
        .get::<BotStatus>()
        .cloned()
        .context("Could not get BotStatus")
}

async fn notification_channels(ctx: &Context) -> anyhow::Result<Arc<NotificationChannels>> {
    ctx.data
        .read()
        .await
        .get::<NotificationChannels>()
        .cloned()
        .context("Could not get NotificationChannels")
}

async fn update_guild_count(ctx: &Context) {
    if let Ok(status) = bot_status(ctx).await {
        status.set_guilds(ctx.cache.guild_count());
    }
}

#[tracing::instrument(skip(ctx))]
async fn handle_event(ctx: &Context, event: Event) -> anyhow::Result<()> {
    let channels = notification_channels(ctx).await?;

    let actions = dispatch(&event, &channels, &CacheDirectory(&ctx.cache));
    for action in actions {
        // Failed sends are logged and dropped.
        if let Err(e) = perform(ctx, action).await {
            warn!("Error while sending a message: {e:?}");
        }
    }
    Ok(())
}

#[tracing::instrument(skip(ctx))]
pub async fn perform(ctx: &Context, action: Action) -> anyhow::Result<()> {
    match action {
        Action::Send {
            channel_id,
            message,
        } => {
            channel_id
                .send_message(&ctx.http, build_message(message))
                .await
                .with_context(|| format!("Failed to send to {channel_id}"))?;
        }
        Action::Reply {
            channel_id,
            message_id,
            message,
        } => {
            channel_id
                .send_message(&ctx.http, build_reply(channel_id, message_id, message))
                .await
                .with_context(|| format!("Failed to reply in {channel_id}"))?;
        }
    }
    Ok(())
}

fn build_message(message: OutgoingMessage) -> CreateMessage {
    let mut builder = CreateMessage::new();
    if let Some(content) = message.content {
        builder = builder.content(content);
    }
    if let Some(embed) = message.embed {
        builder = builder.embed(build_embed(embed));
    }
    builder
}

fn build_reply(
    channel_id: ChannelId,
    message_id: MessageId,
    message: OutgoingMessage,
) -> CreateMessage {
    build_message(message).reference_message((channel_id, message_id))
}

fn build_embed(embed: RichEmbed) -> CreateEmbed {
    let mut builder = CreateEmbed::new()
        .title(embed.title)
        .description(embed.description)
        .colour(embed.colour);
    for (name, value) in embed.fields {
        builder = builder.field(name, value, false);
    }
    if let Some(thumbnail) = embed.thumbnail {
        builder = builder.thumbnail(thumbnail);
    }
    if embed.timestamped {
        builder = builder.timestamp(Timestamp::now());
    }
    builder
}

async fn incoming_message(ctx: &Context, msg: &Message) -> IncomingMessage {
    let author_is_admin = match (Command::parse(&msg.content), msg.guild_id) {
        (Some(command), Some(guild_id))
            if command.requires_administrator() && !msg.author.bot =>
        {
            administrator_or_denied(is_administrator(ctx, guild_id, msg).await)
        }
        _ => false,
    };

    IncomingMessage {
        message_id: msg.id,
        channel_id: msg.channel_id,
        guild_id: msg.guild_id,
        author_is_bot: msg.author.bot,
        author_is_admin,
        content: msg.content.clone(),
    }
}

/// An unverifiable author is treated as a non-administrator.
fn administrator_or_denied(checked: anyhow::Result<bool>) -> bool {
    checked.unwrap_or_else(|e| {
        warn!("Error while checking administrator permission: {e:?}");
        false
    })
}

async fn is_administrator(ctx: &Context, guild_id: GuildId, msg: &Message) -> anyhow::Result<bool> {
    let member = guild_id
        .member(ctx, msg.author.id)
        .await
        .context("Failed to get the author's member")?;
    let guild = ctx
        .cache
        .guild(guild_id)
        .context("Guild was not found")?;
    Ok(guild.member_permissions(&member).administrator())
}

async fn voice_update(
    ctx: &Context,
    guild_id: GuildId,
    old: Option<&VoiceState>,
    new: &VoiceState,
) -> anyhow::Result<VoiceUpdate> {
    let (old, new_channel, cached_member) = {
        let guild = ctx.cache.guild(guild_id);
        let channel = |channel_id: Option<ChannelId>| {
            channel_id.map(|id| {
                let name = guild
                    .as_ref()
                    .and_then(|g| g.channels.get(&id).map(|c| c.name.clone()))
                    .unwrap_or_else(|| id.to_string());
                VoiceChannel::new(id, name)
            })
        };
        let cached_member = guild
            .as_ref()
            .and_then(|g| g.members.get(&new.user_id).cloned());
        (
            channel(old.and_then(|s| s.channel_id)),
            channel(new.channel_id),
            cached_member,
        )
    };

    let member = match new.member.clone().or(cached_member) {
        Some(member) => MemberInfo {
            user_id: member.user.id,
            display_name: member.display_name().to_owned(),
            avatar_url: Some(member.face()),
        },
        None => {
            let user = new
                .user_id
                .to_user(ctx)
                .await
                .context("Failed to get the user")?;
            MemberInfo {
                user_id: user.id,
                display_name: user.display_name().to_owned(),
                avatar_url: Some(user.face()),
            }
        }
    };

    Ok(VoiceUpdate {
        guild_id,
        member,
        old,
        new: new_channel,
    })
}

#[cfg(test)]
mod test {
    use serenity::model::Colour;

    use super::*;

    fn embed(fields: Vec<(String, String)>, timestamped: bool) -> RichEmbed {
        RichEmbed {
            title: "title".to_string(),
            description: "description".to_string(),
            colour: Colour::new(0x0099FF),
            thumbnail: Some("https://cdn.example/avatar.png".to_string()),
            fields,
            timestamped,
        }
    }

    #[test]
    fn test_contains_channel() {
        let channels: HashMap<ChannelId, ()> = HashMap::from([(ChannelId::new(1), ())]);
        let threads = || [ChannelId::new(2)].into_iter();

        assert!(contains_channel(&channels, threads(), ChannelId::new(1)));
        assert!(contains_channel(&channels, threads(), ChannelId::new(2)));
        assert!(!contains_channel(&channels, threads(), ChannelId::new(3)));
        assert!(!contains_channel(
            &HashMap::<ChannelId, ()>::new(),
            std::iter::empty(),
            ChannelId::new(2)
        ));
    }

    #[test]
    fn test_build_message() {
        let message = OutgoingMessage {
            content: Some("hello".to_string()),
            embed: Some(embed(Vec::new(), true)),
        };
        let j = serde_json::to_value(build_message(message)).unwrap();
        assert_eq!(j["content"], "hello");
        assert_eq!(j["embeds"][0]["title"], "title");
        assert_eq!(j["embeds"][0]["description"], "description");
        assert_eq!(
            j["embeds"][0]["thumbnail"]["url"],
            "https://cdn.example/avatar.png"
        );
        assert!(j["embeds"][0]["timestamp"].is_string());
        assert!(j["message_reference"].is_null());
    }

    #[test]
    fn test_build_reply() {
        let fields = vec![("!help".to_string(), "Show this help message".to_string())];
        let message = OutgoingMessage {
            content: None,
            embed: Some(embed(fields, false)),
        };
        let j = serde_json::to_value(build_reply(
            ChannelId::new(100),
            MessageId::new(42),
            message,
        ))
        .unwrap();
        assert!(!j["message_reference"].is_null());
        assert_eq!(j["embeds"][0]["fields"][0]["name"], "!help");
        assert_eq!(j["embeds"][0]["fields"][0]["inline"], false);
        assert!(j["embeds"][0]["timestamp"].is_null());
    }

    #[test]
    fn test_administrator_or_denied() {
        assert!(administrator_or_denied(Ok(true)));
        assert!(!administrator_or_denied(Ok(false)));
        assert!(!administrator_or_denied(Err(anyhow::anyhow!(
            "Guild was not found"
        ))));
    }
}
