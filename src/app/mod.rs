//! Session layer between a front end and the search engine.
//!
//! A front end owns an `Arc<Mutex<Session>>`, starts work through [`tasks`]
//! and listens for [`events::SessionEvent`]s on an [`proxy::EventProxy`].

pub mod events;
pub mod proxy;
pub mod state;
pub mod tasks;
