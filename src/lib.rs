//! # Peerlink Community Bot
//!
//! A Telegram bot that registers community members through a multi-step
//! dialog, saves abandoned registrations after a period of inactivity and
//! lets registered members browse their peers by role and level.

pub mod bot;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod localization;
pub mod registration;
pub mod search;
pub mod store;
