//! The single ordered mutation path. Every connection task is a producer
//! into one unbounded queue; this dispatcher is the only consumer and the
//! only code that writes the world. Intents are applied strictly in arrival
//! order during a drain, one drain per tick, and the broadcast that follows
//! always sees fully-settled state.
//!
//! Movement cadence is modeled as a deferred completion: a key press answers
//! instantly (facing + walk animation) and schedules a commit intent that
//! re-derives legality when it comes due, so one player's movement delay
//! never stalls anyone else's intents.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    CharAction, ChatMessage, ChatScope, ChatSubtype, ClientIntent, ItemVerb, KeyCode, KeyEdge,
    Position, StateFrame, Tile, BASE_PLAYER_SPEED, BOOST_MULTIPLIER,
};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use crate::combat::{self, CombatEvent};
use crate::movement;
use crate::npc;
use crate::player;
use crate::registry::{OutboundSender, Registry};
use crate::world::World;

/// Everything that can enter the queue: client traffic, connection lifecycle,
/// deferred move completions, the NPC pulse, and editor-collaborator calls.
#[derive(Debug)]
pub enum Intent {
    Connect {
        username: String,
        sender: OutboundSender,
    },
    Disconnect {
        username: String,
    },
    Client {
        username: String,
        intent: ClientIntent,
    },
    CommitMove {
        username: String,
        proposed: Position,
    },
    NpcTick,
    Editor(EditorOp),
}

/// The seams the HTTP/editor layer reaches the simulation through. Routed
/// over the queue like everything else so the single-writer rule holds.
#[derive(Debug)]
pub enum EditorOp {
    AddPlayerOnMap { name: String },
    RemovePlayerFromMap { name: String },
    DisconnectPlayer { name: String },
    ChangeSprite { name: String, sprite: u32 },
    SaveMap { map_id: String, tiles: Vec<Vec<Tile>> },
}

pub type IntentSender = mpsc::UnboundedSender<Intent>;

pub struct Dispatcher {
    world: World,
    registry: Registry,
    queue_tx: IntentSender,
    queue_rx: mpsc::UnboundedReceiver<Intent>,
    /// Players currently holding Shift, so the boost applies exactly once
    /// however often the key autorepeats.
    boosted: HashSet<String>,
    /// Guards against a tick firing while the previous drain is still going;
    /// such a tick is skipped whole and the queue catches up next tick.
    draining: bool,
    max_connections: usize,
    rng: StdRng,
}

impl Dispatcher {
    pub fn new(world: World, max_connections: usize) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            world,
            registry: Registry::new(),
            queue_tx,
            queue_rx,
            boosted: HashSet::new(),
            draining: false,
            max_connections,
            rng: StdRng::from_entropy(),
        }
    }

    /// A producer handle. Clone freely; enqueueing never blocks.
    pub fn handle(&self) -> IntentSender {
        self.queue_tx.clone()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Runs the tick loops forever: the NPC pulse re-enters through the queue
    /// so it is serialized with everything else, and the broadcast follows
    /// each completed drain.
    pub async fn run(mut self, tick: Duration, npc_tick: Duration) {
        let npc_pulse = self.queue_tx.clone();
        tokio::spawn(async move {
            let mut timer = interval(npc_tick);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            timer.tick().await;
            loop {
                timer.tick().await;
                if npc_pulse.send(Intent::NpcTick).is_err() {
                    break;
                }
            }
        });

        let mut timer = interval(tick);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("dispatcher running, action tick {tick:?}, npc tick {npc_tick:?}");
        loop {
            timer.tick().await;
            if self.drain_once().is_some() {
                self.broadcast();
            }
        }
    }

    /// Applies every currently queued intent in FIFO order. Returns `None`
    /// without touching the queue when a drain is already in progress.
    pub fn drain_once(&mut self) -> Option<usize> {
        if self.draining {
            debug!("tick fired mid-drain, skipping");
            return None;
        }
        self.draining = true;
        let mut applied = 0;
        while let Ok(intent) = self.queue_rx.try_recv() {
            self.apply(intent);
            applied += 1;
        }
        self.draining = false;
        Some(applied)
    }

    /// One intent, applied in isolation: a failure here aborts this intent
    /// only, never the rest of the drain.
    fn apply(&mut self, intent: Intent) {
        match intent {
            Intent::Connect { username, sender } => self.on_connect(username, sender),
            Intent::Disconnect { username } => self.on_disconnect(&username),
            Intent::Client { username, intent } => match intent {
                ClientIntent::Keyboard {
                    key,
                    action: KeyEdge::Press,
                } => self.on_key_press(&username, key),
                ClientIntent::Keyboard {
                    key,
                    action: KeyEdge::Release,
                } => self.on_key_release(&username, key),
                ClientIntent::Item { item, action } => self.on_item(&username, item, action),
                ClientIntent::Chat { scope, message } => self.on_chat(&username, scope, message),
            },
            Intent::CommitMove { username, proposed } => self.on_commit_move(&username, proposed),
            Intent::NpcTick => {
                let events = npc::run_npc_tick(&mut self.world, &mut self.rng);
                self.announce(events);
            }
            Intent::Editor(op) => self.on_editor(op),
        }
    }

    fn on_connect(&mut self, username: String, sender: OutboundSender) {
        if self.registry.len() >= self.max_connections {
            warn!("rejecting {username}: server full");
            return;
        }
        self.world.login(&username);
        self.registry.register(username.clone(), sender);
        info!("{username} entered the world");
    }

    fn on_disconnect(&mut self, username: &str) {
        self.registry.unregister(username);
        self.world.disconnect_player(username);
        // The record outlives the connection; a boost must not.
        if self.boosted.remove(username) {
            if let Some(player) = self.world.player_mut(username) {
                player.speed = BASE_PLAYER_SPEED;
            }
        }
        info!("{username} left the world");
    }

    fn on_key_press(&mut self, username: &str, key: KeyCode) {
        let Some(player) = self.world.player_mut(username) else {
            warn!("key press for unknown player {username}");
            return;
        };
        match key {
            KeyCode::Shift => {
                if self.boosted.insert(username.to_string()) {
                    player.speed *= BOOST_MULTIPLIER;
                }
            }
            KeyCode::Control => {
                player.core.action = CharAction::Attack;
                let events = combat::resolve_player_attack(&mut self.world, username, &mut self.rng);
                self.announce(events);
            }
            key => {
                let Some(direction) = key.direction() else {
                    return;
                };
                // Facing and animation answer instantly; the position change
                // comes due after the cadence delay and is validated then.
                player.core.direction = direction;
                player.core.action = CharAction::Walk;
                let (dx, dy) = direction.step();
                let proposed = player.core.position.offset(dx, dy);
                let delay = Duration::from_millis(
                    (BASE_PLAYER_SPEED * BOOST_MULTIPLIER / player.speed) as u64,
                );
                self.schedule_commit(username.to_string(), proposed, delay);
            }
        }
    }

    fn schedule_commit(&self, username: String, proposed: Position, delay: Duration) {
        let queue = self.queue_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = queue.send(Intent::CommitMove { username, proposed });
        });
    }

    fn on_commit_move(&mut self, username: &str, proposed: Position) {
        let Some(player) = self.world.player(username) else {
            warn!("move commit for unknown player {username}");
            return;
        };
        let core = player.core.clone();
        if movement::has_collision(&self.world, &core, proposed) {
            debug!("{username} move rejected");
            return;
        }
        // A warp on the landing tile redirects the commit; either way the
        // roster re-home happens in this same step.
        let (map_id, position) = match movement::find_warp(&self.world, &core, proposed) {
            Some(warp) => (warp.to, warp.position),
            None => (core.map_id.clone(), proposed),
        };
        self.world.move_player(username, &map_id, position);
        player::pick_up_items(&mut self.world, username);
    }

    fn on_key_release(&mut self, username: &str, key: KeyCode) {
        let Some(player) = self.world.player_mut(username) else {
            warn!("key release for unknown player {username}");
            return;
        };
        match key {
            KeyCode::Shift => {
                self.boosted.remove(username);
                player.speed = BASE_PLAYER_SPEED;
            }
            _ => player.core.action = CharAction::Idle,
        }
    }

    fn on_item(&mut self, username: &str, item_id: u32, verb: ItemVerb) {
        match verb {
            ItemVerb::Use => {
                player::use_item(&mut self.world, username, item_id);
            }
            ItemVerb::Drop => {
                player::drop_item(&mut self.world, username, item_id);
            }
        }
    }

    /// Chat bypasses snapshot batching: it goes out the moment the intent is
    /// applied.
    fn on_chat(&mut self, username: &str, scope: ChatScope, message: String) {
        let chat = ChatMessage {
            scope,
            message,
            username: Some(username.to_string()),
            subtype: None,
        };
        match scope {
            ChatScope::Global => self.registry.broadcast_chat(&chat),
            ChatScope::Map => {
                let Some(player) = self.world.player(username) else {
                    warn!("chat from unknown player {username}");
                    return;
                };
                let map_id = player.core.map_id.clone();
                if let Some(map) = self.world.map(&map_id) {
                    for name in &map.roster {
                        self.registry.send_chat(name, &chat);
                    }
                }
            }
        }
    }

    fn on_editor(&mut self, op: EditorOp) {
        match op {
            EditorOp::AddPlayerOnMap { name } => self.world.add_player_on_map(&name),
            EditorOp::RemovePlayerFromMap { name } => self.world.remove_player_from_map(&name),
            EditorOp::DisconnectPlayer { name } => self.on_disconnect(&name),
            EditorOp::ChangeSprite { name, sprite } => self.world.change_sprite(&name, sprite),
            EditorOp::SaveMap { map_id, tiles } => self.world.save_map(&map_id, tiles),
        }
    }

    fn announce(&mut self, events: Vec<CombatEvent>) {
        for event in events {
            match event {
                CombatEvent::PlayerDied { name } => {
                    let chat = ChatMessage {
                        scope: ChatScope::Global,
                        message: format!("{name} has fallen"),
                        username: None,
                        subtype: Some(ChatSubtype::Death),
                    };
                    self.registry.broadcast_chat(&chat);
                }
                CombatEvent::NpcDied {
                    map_id,
                    instance_id,
                } => debug!("npc {instance_id} on map {map_id} defeated"),
                CombatEvent::PlayerLeveled { name, level } => info!("{name} is now level {level}"),
            }
        }
    }

    /// One `{map, player}` frame per connected player on each map, built
    /// after the drain so every recipient sees the same settled world.
    pub fn broadcast(&self) {
        for map_id in self.world.map_ids() {
            let Some(snapshot) = self.world.snapshot(&map_id) else {
                continue;
            };
            let Some(map) = self.world.map(&map_id) else {
                continue;
            };
            for name in &map.roster {
                if !self.registry.is_connected(name) {
                    continue;
                }
                let Some(player) = self.world.player(name) else {
                    continue;
                };
                self.registry.send_state(
                    name,
                    StateFrame {
                        map: snapshot.clone(),
                        player: player.clone(),
                    },
                );
            }
        }
    }
}
