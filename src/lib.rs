//! talker - a multi-user text chat server
//!
//! This crate provides the whole talker, including:
//! - Raw TCP and WebSocket transports
//! - The login handshake and the command set
//! - Color markup rendering
//!
//! # Architecture
//!
//! Every accepted connection gets its own task running
//! [`server::handle_connection`]. Sessions that finish logging in join the
//! [`registry::Registry`], which is how commands reach other users.

pub mod color;
pub mod commands;
pub mod config;
pub mod login;
pub mod motd;
pub mod registry;
pub mod server;
pub mod session;
pub mod store;
pub mod template;
pub mod transport;
