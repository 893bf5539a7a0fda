pub mod command;
pub mod config;
pub mod core;
pub mod handler;
pub mod notify;
pub mod web;

pub use crate::{
    command::{Command, IncomingMessage},
    config::NotificationChannels,
    core::{
        dispatch, notification_channel, Action, Event, GuildDirectory, OutgoingMessage, RichEmbed,
    },
    handler::Handler,
    notify::{MemberInfo, VoiceChannel, VoiceTransition, VoiceUpdate},
    web::{serve_health, BotStatus, ConnectionStatus},
};
