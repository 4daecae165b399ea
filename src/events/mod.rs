//! Events fired by login resolution, account linking and mapping
//! administration. Without registered listeners they are dropped.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use storegraph::register_event_listeners;
//! use storegraph::events::listeners::LoggingListener;
//!
//! register_event_listeners(|registry| {
//!     registry.listen(LoggingListener::with_level(log::Level::Debug));
//! });
//! ```
//!
//! # Custom Listeners
//!
//!
//! ```rust,ignore
//! use storegraph::events::{StoreEvent, Listener};
//! use async_trait::async_trait;
//!
//! struct LoginMetrics;
//!
//! #[async_trait]
//! impl Listener for LoginMetrics {
//!     async fn handle(&self, event: &StoreEvent) {
//!         match event {
//!             StoreEvent::LoginSucceeded { resolution, .. } => {
//!                 // count logins per resolution
//!             }
//!             StoreEvent::LoginFailed { .. } => {
//!                 // count failures
//!             }
//!             _ => {}
//!         }
//!     }
//! }
//! ```

mod event;
mod listener;
mod registry;

pub mod listeners;

pub use event::StoreEvent;
pub use listener::Listener;
pub use registry::{dispatch, register_event_listeners};
