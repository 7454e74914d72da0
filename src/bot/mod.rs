//! Bot module for driving the gallery upload conversation
//!
//! - `message_handler`: walks a sender through the five-step upload flow
//!   and triggers the publish of both photos at the end.

pub mod message_handler;

pub use message_handler::MessageHandler;
