//! Roundtable: moderated multi-agent meetings driven by a language model.
//!
//! A meeting moves through introductions, discussion rounds and a closing
//! summary. Every transition is streamed to observers and the finished
//! transcript can be exported.

pub mod agents;
pub mod api;
pub mod app;
pub mod cli;
pub mod completion;
pub mod config;
pub mod events;
pub mod export;
pub mod global;
pub mod meeting;
pub mod prompt;
