use serenity::model::{
    id::{ChannelId, GuildId, MessageId},
    mention::Mentionable,
};
use tracing::info;

use crate::{
    core::{Action, GuildDirectory, OutgoingMessage, RichEmbed},
    notify::MOVE_COLOUR,
    NotificationChannels,
};

pub const TEST_NOTIFICATION: &str = "✅ Test notification - Bot is working!";

const HELP: [(&str, &str); 3] = [
    (
        "!setchannel",
        "Set current channel for notifications (Admin only)",
    ),
    ("!testnotif", "Send a test notification"),
    ("!help", "Show this help message"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetChannel,
    TestNotif,
    Help,
}

impl Command {
    /// Matches the whole message literally; arguments are not accepted.
    pub fn parse(content: &str) -> Option<Self> {
        match content {
            "!setchannel" => Some(Self::SetChannel),
            "!testnotif" => Some(Self::TestNotif),
            "!help" => Some(Self::Help),
            _ => None,
        }
    }

    pub const fn requires_administrator(self) -> bool {
        matches!(self, Self::SetChannel)
    }
}

/// A guild text message that may carry a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    /// `None` for direct messages.
    pub guild_id: Option<GuildId>,
    pub author_is_bot: bool,
    /// Only meaningful for commands that require it.
    pub author_is_admin: bool,
    pub content: String,
}

impl IncomingMessage {
    fn reply(&self, message: OutgoingMessage) -> Action {
        Action::Reply {
            channel_id: self.channel_id,
            message_id: self.message_id,
            message,
        }
    }
}

pub fn process_command(
    msg: &IncomingMessage,
    channels: &NotificationChannels,
    directory: &impl GuildDirectory,
) -> Vec<Action> {
    if msg.author_is_bot {
        return Vec::new();
    }
    let Some(guild_id) = msg.guild_id else {
        return Vec::new();
    };
    let Some(command) = Command::parse(&msg.content) else {
        return Vec::new();
    };

    match command {
        Command::SetChannel => set_channel(msg, guild_id, channels),
        Command::TestNotif => test_notif(msg, guild_id, channels, directory),
        Command::Help => vec![msg.reply(help_message())],
    }
}

fn set_channel(
    msg: &IncomingMessage,
    guild_id: GuildId,
    channels: &NotificationChannels,
) -> Vec<Action> {
    if !msg.author_is_admin {
        return vec![msg.reply(OutgoingMessage::text(
            "❌ You need Administrator permission to use this command.",
        ))];
    }

    channels.set(guild_id, msg.channel_id);
    info!(%guild_id, channel_id = %msg.channel_id, "Notification channel set");

    let reply = if channels.is_persistent() {
        format!(
            "✅ Notification channel set to {} and saved!",
            msg.channel_id.mention()
        )
    } else {
        format!("✅ Notification channel set to {}!", msg.channel_id.mention())
    };
    vec![msg.reply(OutgoingMessage::text(reply))]
}

fn test_notif(
    msg: &IncomingMessage,
    guild_id: GuildId,
    channels: &NotificationChannels,
    directory: &impl GuildDirectory,
) -> Vec<Action> {
    let Some(channel_id) = channels.get(&guild_id) else {
        return vec![msg.reply(OutgoingMessage::text(
            "❌ No notification channel set. Use !setchannel first.",
        ))];
    };

    if !directory.has_channel(guild_id, channel_id) {
        return vec![msg.reply(OutgoingMessage::text(
            "❌ Could not find notification channel.",
        ))];
    }

    vec![
        Action::Send {
            channel_id,
            message: OutgoingMessage::text(TEST_NOTIFICATION),
        },
        msg.reply(OutgoingMessage::text("Test notification sent!")),
    ]
}

fn help_message() -> OutgoingMessage {
    OutgoingMessage {
        content: None,
        embed: Some(RichEmbed {
            title: "Voice Channel Bot Commands".to_owned(),
            description: "Monitor voice channel activity".to_owned(),
            colour: MOVE_COLOUR,
            thumbnail: None,
            fields: HELP
                .iter()
                .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
                .collect(),
            timestamped: false,
        }),
    }
}
