use serenity::model::{
    id::{ChannelId, GuildId, MessageId},
    Colour,
};
use tracing::{debug, info};

use crate::{
    command::{process_command, IncomingMessage},
    notify::VoiceUpdate,
    NotificationChannels,
};

/// Answers questions about guilds that only the gateway cache knows.
pub trait GuildDirectory {
    fn has_channel(&self, guild_id: GuildId, channel_id: ChannelId) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichEmbed {
    pub title: String,
    pub description: String,
    pub colour: Colour,
    pub thumbnail: Option<String>,
    /// (name, value) pairs, shown in order.
    pub fields: Vec<(String, String)>,
    /// Stamp the embed with the time it is sent.
    pub timestamped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub content: Option<String>,
    pub embed: Option<RichEmbed>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send {
        channel_id: ChannelId,
        message: OutgoingMessage,
    },
    Reply {
        channel_id: ChannelId,
        message_id: MessageId,
        message: OutgoingMessage,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Ready {
        user_name: String,
        guild_count: usize,
    },
    VoiceStateUpdate(VoiceUpdate),
    Message(IncomingMessage),
}

/// Decides what to send in response to one gateway event.
///
/// The only side effect is the registry write done by `!setchannel`; actually
/// sending the returned actions is up to the caller.
#[tracing::instrument(skip_all)]
pub fn dispatch(
    event: &Event,
    channels: &NotificationChannels,
    directory: &impl GuildDirectory,
) -> Vec<Action> {
    match event {
        Event::Ready {
            user_name,
            guild_count,
        } => {
            info!("{user_name} has connected to Discord!");
            info!("Bot is in {guild_count} guild(s)");
            Vec::new()
        }
        Event::VoiceStateUpdate(update) => process_voice_update(update, channels, directory)
            .into_iter()
            .collect(),
        Event::Message(msg) => process_command(msg, channels, directory),
    }
}

/// The channel voice notifications for `guild_id` go to, if it still exists.
pub fn notification_channel(
    guild_id: GuildId,
    channels: &NotificationChannels,
    directory: &impl GuildDirectory,
) -> Option<ChannelId> {
    let channel_id = channels.get(&guild_id)?;
    if !directory.has_channel(guild_id, channel_id) {
        debug!(%guild_id, %channel_id, "Notification channel not found");
        return None;
    }
    Some(channel_id)
}

fn process_voice_update(
    update: &VoiceUpdate,
    channels: &NotificationChannels,
    directory: &impl GuildDirectory,
) -> Option<Action> {
    let channel_id = notification_channel(update.guild_id, channels, directory)?;
    let message = update.notification()?;
    Some(Action::Send {
        channel_id,
        message,
    })
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use serenity::model::id::UserId;

    use super::*;
    use crate::notify::{MemberInfo, VoiceChannel};

    struct Channels(HashSet<(GuildId, ChannelId)>);

    impl GuildDirectory for Channels {
        fn has_channel(&self, guild_id: GuildId, channel_id: ChannelId) -> bool {
            self.0.contains(&(guild_id, channel_id))
        }
    }

    fn voice_event(old: Option<VoiceChannel>, new: Option<VoiceChannel>) -> Event {
        Event::VoiceStateUpdate(VoiceUpdate {
            guild_id: GuildId::new(1),
            member: MemberInfo {
                user_id: UserId::new(5),
                display_name: "M".to_string(),
                avatar_url: None,
            },
            old,
            new,
        })
    }

    fn general() -> Option<VoiceChannel> {
        Some(VoiceChannel::new(ChannelId::new(10), "General"))
    }

    fn gaming() -> Option<VoiceChannel> {
        Some(VoiceChannel::new(ChannelId::new(20), "Gaming"))
    }

    fn sent_content(actions: &[Action]) -> Vec<&str> {
        actions
            .iter()
            .map(|action| match action {
                Action::Send {
                    channel_id,
                    message,
                } => {
                    assert_eq!(*channel_id, ChannelId::new(100));
                    message.content.as_deref().unwrap()
                }
                Action::Reply { .. } => panic!("unexpected reply"),
            })
            .collect()
    }

    #[test]
    fn test_voice_notifications() {
        let channels = NotificationChannels::in_memory();
        channels.set(GuildId::new(1), ChannelId::new(100));
        let directory = Channels(HashSet::from([(GuildId::new(1), ChannelId::new(100))]));

        let actions = dispatch(&voice_event(None, general()), &channels, &directory);
        assert_eq!(sent_content(&actions), ["🔊 M joined \"General\""]);

        let actions = dispatch(&voice_event(general(), None), &channels, &directory);
        assert_eq!(sent_content(&actions), ["🔇 M left \"General\""]);

        let actions = dispatch(&voice_event(general(), gaming()), &channels, &directory);
        assert_eq!(
            sent_content(&actions),
            ["🔄 M moved from \"General\" to \"Gaming\""]
        );

        let actions = dispatch(&voice_event(general(), general()), &channels, &directory);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_voice_without_channel() {
        let channels = NotificationChannels::in_memory();
        let directory = Channels(HashSet::from([(GuildId::new(1), ChannelId::new(100))]));

        assert!(dispatch(&voice_event(None, general()), &channels, &directory).is_empty());
    }

    #[test]
    fn test_voice_with_stale_channel() {
        let channels = NotificationChannels::in_memory();
        channels.set(GuildId::new(1), ChannelId::new(100));
        let directory = Channels(HashSet::new());

        assert!(dispatch(&voice_event(None, general()), &channels, &directory).is_empty());
        assert_eq!(channels.get(&GuildId::new(1)), Some(ChannelId::new(100)));
    }

    #[test]
    fn test_notification_channel() {
        let channels = NotificationChannels::in_memory();
        let directory = Channels(HashSet::from([(GuildId::new(1), ChannelId::new(100))]));
        assert_eq!(
            notification_channel(GuildId::new(1), &channels, &directory),
            None
        );

        channels.set(GuildId::new(1), ChannelId::new(100));
        channels.set(GuildId::new(2), ChannelId::new(200));
        assert_eq!(
            notification_channel(GuildId::new(1), &channels, &directory),
            Some(ChannelId::new(100))
        );
        assert_eq!(
            notification_channel(GuildId::new(2), &channels, &directory),
            None
        );
    }

    #[test]
    fn test_ready() {
        let channels = NotificationChannels::in_memory();
        let directory = Channels(HashSet::new());
        let event = Event::Ready {
            user_name: "bot".to_string(),
            guild_count: 3,
        };
        assert!(dispatch(&event, &channels, &directory).is_empty());
    }

    #[test]
    fn test_message_goes_through_commands() {
        let channels = NotificationChannels::in_memory();
        let directory = Channels(HashSet::new());
        let event = Event::Message(IncomingMessage {
            message_id: MessageId::new(1),
            channel_id: ChannelId::new(100),
            guild_id: Some(GuildId::new(1)),
            author_is_bot: false,
            author_is_admin: true,
            content: "!setchannel".to_string(),
        });

        let actions = dispatch(&event, &channels, &directory);
        assert_eq!(actions.len(), 1);
        assert_eq!(channels.get(&GuildId::new(1)), Some(ChannelId::new(100)));
    }
}
