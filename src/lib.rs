//! # agent-cli-session
//!
//! A Rust library for supervising a long-running Claude Code process over its
//! stream-json duplex channel and fanning every message out to listeners.
//!
//! ## Features
//!
//! - One process per [`Agent`], newline-delimited JSON in both directions
//! - Ordered, thread-safe event history shared with every listener
//! - General, typed (`type`, `type_subtype`, nested content type) and named
//!   processor-backed listeners
//! - Interrupts correlated by request id, with deferred exit and follow-up ask
//!
//! ## Example
//!
//! ```no_run
//! use agent_cli_session::{Agent, AgentConfig};
//!
//! let agent = Agent::builder(AgentConfig::new().with_name("News-Agent"))
//!     .on_typed("text", |event, _history| {
//!         println!("{:?}", event.pointer("/message/content"));
//!     })
//!     .build();
//!
//! let history = agent
//!     .connect_with(|agent| {
//!         agent.ask("Hello, world!")?;
//!         agent.exit();
//!         Ok(())
//!     })
//!     .unwrap();
//! println!("{} events", history.len());
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]

mod agent;
mod callbacks;
mod command;
mod config;
mod error;
mod event;
mod event_log;
mod interrupt;
pub mod message;
mod process;
mod prompt;
mod response;
mod stream;

pub use agent::{Agent, AgentBuilder};
pub use callbacks::{
    is_present, CallbackRegistry, Delivery, ErrorListener, EventListener, Processor, Registration,
};
pub use command::LaunchCommand;
pub use config::AgentConfig;
pub use error::{Error, Result};
pub use event::{Event, EventSource};
pub use event_log::EventLog;
pub use interrupt::{Acknowledgement, InterruptController};
pub use message::UserMessage;
pub use process::{ProcessHandle, ProcessInput};
pub use prompt::{ensure_resolved, render_system_prompt};
pub use response::{assistant_text, final_text_processor, Response};
pub use stream::EventReader;
