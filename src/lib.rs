//! # WhatsApp Gallery Bot
//!
//! A webhook-driven WhatsApp bot that walks users through a five-step
//! conversation (language, title, description, before photo, after photo)
//! and publishes the two photos to a GitHub-hosted gallery.

pub mod bot;
pub mod config;
pub mod conversation;
pub mod localization;
pub mod publisher;
pub mod store;
pub mod web;
pub mod whatsapp;
