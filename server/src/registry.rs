//! Maps logical player identity (the name) to a live connection's outbound
//! queue. Owned by the dispatcher, so registration and teardown are
//! serialized with every other world mutation; a torn-down entry can never
//! linger as a ghost recipient.

use log::{debug, info};
use shared::{ChatMessage, StateFrame};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// One outbound frame, serialized to JSON by the connection's writer task.
#[derive(Debug, Clone)]
pub enum Outbound {
    State(StateFrame),
    Chat(ChatMessage),
}

pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<String, OutboundSender>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    /// Binds a name to a connection. A reconnect replaces the old entry, and
    /// the dropped sender ends the stale writer task.
    pub fn register(&mut self, name: String, sender: OutboundSender) {
        if self.connections.insert(name.clone(), sender).is_some() {
            info!("{name} reconnected, replacing old connection");
        }
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.connections.remove(name).is_some()
    }

    pub fn send_state(&self, name: &str, frame: StateFrame) {
        if let Some(sender) = self.connections.get(name) {
            if sender.send(Outbound::State(frame)).is_err() {
                debug!("state frame for {name} hit a closed connection");
            }
        }
    }

    pub fn send_chat(&self, name: &str, chat: &ChatMessage) {
        if let Some(sender) = self.connections.get(name) {
            if sender.send(Outbound::Chat(chat.clone())).is_err() {
                debug!("chat for {name} hit a closed connection");
            }
        }
    }

    pub fn broadcast_chat(&self, chat: &ChatMessage) {
        for (name, sender) in &self.connections {
            if sender.send(Outbound::Chat(chat.clone())).is_err() {
                debug!("chat for {name} hit a closed connection");
            }
        }
    }
}
