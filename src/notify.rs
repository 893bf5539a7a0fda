use serenity::model::{
    id::{ChannelId, GuildId, UserId},
    Colour,
};

use crate::core::{OutgoingMessage, RichEmbed};

pub const JOIN_COLOUR: Colour = Colour::new(0x00FF00);
pub const LEAVE_COLOUR: Colour = Colour::new(0xFF0000);
pub const MOVE_COLOUR: Colour = Colour::new(0x0099FF);

/// A voice channel as seen in one voice state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceChannel {
    pub id: ChannelId,
    pub name: String,
}

impl VoiceChannel {
    pub fn new(id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// One voice-state update, reduced to what a notification needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceUpdate {
    pub guild_id: GuildId,
    pub member: MemberInfo,
    pub old: Option<VoiceChannel>,
    pub new: Option<VoiceChannel>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceTransition<'a> {
    Join { to: &'a VoiceChannel },
    Leave { from: &'a VoiceChannel },
    Move {
        from: &'a VoiceChannel,
        to: &'a VoiceChannel,
    },
}

impl<'a> VoiceTransition<'a> {
    /// Returns `None` when the channel did not change, e.g. on mute or deafen.
    pub fn classify(old: Option<&'a VoiceChannel>, new: Option<&'a VoiceChannel>) -> Option<Self> {
        match (old, new) {
            (None, Some(to)) => Some(Self::Join { to }),
            (Some(from), None) => Some(Self::Leave { from }),
            (Some(from), Some(to)) if from.id != to.id => Some(Self::Move { from, to }),
            _ => None,
        }
    }

    const fn tag(&self) -> &'static str {
        match self {
            Self::Join { .. } => "🔊",
            Self::Leave { .. } => "🔇",
            Self::Move { .. } => "🔄",
        }
    }

    const fn title(&self) -> &'static str {
        match self {
            Self::Join { .. } => "🔊 Voice Channel Join",
            Self::Leave { .. } => "🔇 Voice Channel Leave",
            Self::Move { .. } => "🔄 Voice Channel Move",
        }
    }

    pub const fn colour(&self) -> Colour {
        match self {
            Self::Join { .. } => JOIN_COLOUR,
            Self::Leave { .. } => LEAVE_COLOUR,
            Self::Move { .. } => MOVE_COLOUR,
        }
    }

    fn describe(&self, display_name: &str) -> String {
        match self {
            Self::Join { to } => format!("{display_name} joined \"{}\"", to.name),
            Self::Leave { from } => format!("{display_name} left \"{}\"", from.name),
            Self::Move { from, to } => {
                format!(
                    "{display_name} moved from \"{}\" to \"{}\"",
                    from.name, to.name
                )
            }
        }
    }

    pub fn render(&self, member: &MemberInfo) -> OutgoingMessage {
        let description = self.describe(&member.display_name);
        OutgoingMessage {
            content: Some(format!("{} {description}", self.tag())),
            embed: Some(RichEmbed {
                title: self.title().to_owned(),
                description,
                colour: self.colour(),
                thumbnail: member.avatar_url.clone(),
                fields: Vec::new(),
                timestamped: true,
            }),
        }
    }
}

impl VoiceUpdate {
    pub fn transition(&self) -> Option<VoiceTransition<'_>> {
        VoiceTransition::classify(self.old.as_ref(), self.new.as_ref())
    }

    /// The notification for this update, if the member changed channels.
    pub fn notification(&self) -> Option<OutgoingMessage> {
        self.transition().map(|t| t.render(&self.member))
    }
}
