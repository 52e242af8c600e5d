//! Feishu/Lark channel plugin for aviary.
//!
//! Implements `ChannelPlugin` against the open platform HTTP API: chunked
//! reply delivery with post/card/plain rendering, typing emulation via
//! message reactions, and tool status localization.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod doc;
pub mod error;
pub mod inbound;
pub mod localize;
pub mod mention;
pub mod plugin;
pub mod post;
pub mod render;
pub mod send;
pub mod state;
pub mod text;
pub mod typing;

pub use {config::FeishuAccountConfig, error::{Error, Result}, plugin::FeishuPlugin};
