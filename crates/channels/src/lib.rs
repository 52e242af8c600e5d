//! Channel plugin system.
//!
//! Each messaging platform (Feishu/Lark today) implements the ChannelPlugin
//! trait with sub-traits for outbound delivery and status probes. Inbound
//! messages flow to the host through a [`ChannelEventSink`].

pub mod error;
pub mod plugin;

pub use {
    error::{Error, Result},
    plugin::{
        ChannelEvent, ChannelEventSink, ChannelHealthSnapshot, ChannelMessageMeta, ChannelOutbound,
        ChannelPlugin, ChannelReplyTarget, ChannelStatus,
    },
};
