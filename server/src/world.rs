//! Canonical world state: maps, players, NPC instances and the item/NPC
//! catalogs. Pure storage with lookup and update operations; game rules live
//! in the resolver modules. The dispatcher task owns the single `World` value
//! outright, so none of this needs locking.

use log::{info, warn};
use shared::{DroppedItem, Item, MapKind, MapSnapshot, Npc, Player, Position, Tile, TILE_SIZE};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::player::create_player;

/// One map plus the rosters of who is currently on it. Player records live in
/// the world-level arena; the roster holds names only, so a player is never
/// materialized in two places.
#[derive(Debug, Clone)]
pub struct GameMap {
    pub id: String,
    pub name: String,
    pub kind: MapKind,
    pub tiles: Vec<Vec<Tile>>,
    /// Names of players currently present. Ordered so per-tick iteration is
    /// deterministic.
    pub roster: BTreeSet<String>,
    /// Live NPC instances keyed by instance id, ordered for the same reason.
    pub npcs: BTreeMap<String, Npc>,
    pub dropped_items: Vec<DroppedItem>,
}

impl GameMap {
    pub fn pixel_width(&self) -> f32 {
        self.tiles.first().map_or(0.0, |row| row.len() as f32) * TILE_SIZE
    }

    pub fn pixel_height(&self) -> f32 {
        self.tiles.len() as f32 * TILE_SIZE
    }

    /// The tile under a world coordinate, or `None` outside the grid.
    pub fn tile_at(&self, x: f32, y: f32) -> Option<&Tile> {
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let row = (y / TILE_SIZE) as usize;
        let col = (x / TILE_SIZE) as usize;
        self.tiles.get(row)?.get(col)
    }

    /// World positions of every tile carrying a spawn marker for `spawn_id`.
    pub fn spawn_positions(&self, spawn_id: &str) -> Vec<Position> {
        let mut positions = Vec::new();
        for (row, tiles) in self.tiles.iter().enumerate() {
            for (col, tile) in tiles.iter().enumerate() {
                if tile.npc_spawn.as_deref() == Some(spawn_id) {
                    positions.push(Position {
                        x: col as f32 * TILE_SIZE,
                        y: row as f32 * TILE_SIZE,
                    });
                }
            }
        }
        positions
    }
}

#[derive(Debug, Default)]
pub struct World {
    maps: HashMap<String, GameMap>,
    players: HashMap<String, Player>,
    items: HashMap<u32, Item>,
    npc_catalog: HashMap<String, Npc>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&self, map_id: &str) -> Option<&GameMap> {
        self.maps.get(map_id)
    }

    pub fn map_mut(&mut self, map_id: &str) -> Option<&mut GameMap> {
        self.maps.get_mut(map_id)
    }

    pub fn map_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.maps.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Registers an empty map, then populates it from its own tile markers.
    pub fn insert_map(&mut self, id: &str, name: &str, kind: MapKind, tiles: Vec<Vec<Tile>>) {
        self.maps.insert(
            id.to_string(),
            GameMap {
                id: id.to_string(),
                name: name.to_string(),
                kind,
                tiles: Vec::new(),
                roster: BTreeSet::new(),
                npcs: BTreeMap::new(),
                dropped_items: Vec::new(),
            },
        );
        self.save_map(id, tiles);
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.get(name)
    }

    pub fn player_mut(&mut self, name: &str) -> Option<&mut Player> {
        self.players.get_mut(name)
    }

    pub fn item(&self, item_id: u32) -> Option<&Item> {
        self.items.get(&item_id)
    }

    pub fn insert_item(&mut self, item: Item) {
        self.items.insert(item.id, item);
    }

    pub fn npc_template(&self, spawn_id: &str) -> Option<&Npc> {
        self.npc_catalog.get(spawn_id)
    }

    pub fn insert_npc_template(&mut self, npc: Npc) {
        self.npc_catalog.insert(npc.spawn_id.clone(), npc);
    }

    pub fn npc(&self, map_id: &str, instance_id: &str) -> Option<&Npc> {
        self.maps.get(map_id)?.npcs.get(instance_id)
    }

    pub fn npc_mut(&mut self, map_id: &str, instance_id: &str) -> Option<&mut Npc> {
        self.maps.get_mut(map_id)?.npcs.get_mut(instance_id)
    }

    /// Login by name. Idempotent: an existing record is reused, a missing one
    /// is created at the spawn point, and either way the player ends up on
    /// its map's roster.
    pub fn login(&mut self, username: &str) -> &Player {
        if !self.players.contains_key(username) {
            info!("creating player {username}");
            self.players
                .insert(username.to_string(), create_player(username));
        }
        self.add_player_on_map(username);
        &self.players[username]
    }

    /// Puts a player on the roster of the map its record points at.
    pub fn add_player_on_map(&mut self, name: &str) {
        let Some(player) = self.players.get(name) else {
            warn!("add_player_on_map: no player named {name}");
            return;
        };
        let map_id = player.core.map_id.clone();
        match self.maps.get_mut(&map_id) {
            Some(map) => {
                map.roster.insert(name.to_string());
            }
            None => warn!("add_player_on_map: {name} points at unknown map {map_id}"),
        }
    }

    pub fn remove_player_from_map(&mut self, name: &str) {
        let Some(player) = self.players.get(name) else {
            warn!("remove_player_from_map: no player named {name}");
            return;
        };
        let map_id = player.core.map_id.clone();
        if let Some(map) = self.maps.get_mut(&map_id) {
            map.roster.remove(name);
        }
    }

    /// Re-homes a player: off the old roster, record updated, onto the new
    /// roster, all in one step so the player is never observable in zero or
    /// two rosters.
    pub fn move_player(&mut self, name: &str, map_id: &str, position: Position) {
        let Some(player) = self.players.get_mut(name) else {
            warn!("move_player: no player named {name}");
            return;
        };
        let old_map = std::mem::replace(&mut player.core.map_id, map_id.to_string());
        player.core.position = position;
        if let Some(map) = self.maps.get_mut(&old_map) {
            map.roster.remove(name);
        }
        match self.maps.get_mut(map_id) {
            Some(map) => {
                map.roster.insert(name.to_string());
            }
            None => warn!("move_player: {name} moved to unknown map {map_id}"),
        }
    }

    /// Roster removal on disconnect. The record stays in the store so the
    /// same name re-enters with its progress intact.
    pub fn disconnect_player(&mut self, name: &str) {
        self.remove_player_from_map(name);
    }

    pub fn change_sprite(&mut self, name: &str, sprite: u32) {
        match self.players.get_mut(name) {
            Some(player) => player.core.sprite = sprite,
            None => warn!("change_sprite: no player named {name}"),
        }
    }

    /// Replaces a map's tile grid and rebuilds everything the grid implies:
    /// NPC instances from spawn markers, ground items from item markers.
    /// This is both the map-editor save path and the initial load path.
    pub fn save_map(&mut self, map_id: &str, tiles: Vec<Vec<Tile>>) {
        if !self.maps.contains_key(map_id) {
            warn!("save_map: unknown map {map_id}");
            return;
        }

        let mut npcs = BTreeMap::new();
        let mut counters: HashMap<String, u32> = HashMap::new();
        let mut ground = Vec::new();
        for (row, row_tiles) in tiles.iter().enumerate() {
            for (col, tile) in row_tiles.iter().enumerate() {
                let position = Position {
                    x: col as f32 * TILE_SIZE,
                    y: row as f32 * TILE_SIZE,
                };
                if let Some(spawn_id) = &tile.npc_spawn {
                    let Some(template) = self.npc_catalog.get(spawn_id) else {
                        warn!("save_map: map {map_id} references unknown npc {spawn_id}");
                        continue;
                    };
                    let serial = counters.entry(spawn_id.clone()).or_insert(0);
                    *serial += 1;
                    let mut npc = template.clone();
                    npc.core.id = format!("{spawn_id}#{serial}");
                    npc.core.map_id = map_id.to_string();
                    npc.core.position = position;
                    npc.core.health = npc.max_health;
                    npcs.insert(npc.core.id.clone(), npc);
                }
                if let Some(item_id) = tile.item {
                    match self.items.get(&item_id) {
                        Some(item) => ground.push(DroppedItem {
                            item_id,
                            position,
                            sprite: item.sprite,
                        }),
                        None => warn!("save_map: map {map_id} references unknown item {item_id}"),
                    }
                }
            }
        }

        if let Some(map) = self.maps.get_mut(map_id) {
            map.tiles = tiles;
            map.npcs = npcs;
            map.dropped_items = ground;
            info!(
                "map {map_id} loaded: {} npcs, {} ground items",
                map.npcs.len(),
                map.dropped_items.len()
            );
        }
    }

    /// Wire view of one map, with the roster resolved to full player records.
    pub fn snapshot(&self, map_id: &str) -> Option<MapSnapshot> {
        let map = self.maps.get(map_id)?;
        let players = map
            .roster
            .iter()
            .filter_map(|name| {
                self.players
                    .get(name)
                    .map(|player| (name.clone(), player.clone()))
            })
            .collect();
        Some(MapSnapshot {
            id: map.id.clone(),
            name: map.name.clone(),
            kind: map.kind,
            players,
            npcs: map.npcs.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            tiles: map.tiles.clone(),
            dropped_items: map.dropped_items.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content;
    use shared::{FIRST_MAP_ID, SPAWN_POSITION};

    #[test]
    fn test_login_creates_then_reuses() {
        let mut world = content::default_world();
        let id = world.login("ada").core.id.clone();
        assert_eq!(world.login("ada").core.id, id);
        assert_eq!(world.player("ada").unwrap().core.position, SPAWN_POSITION);
        let map = world.map(FIRST_MAP_ID).unwrap();
        assert!(map.roster.contains("ada"));
    }

    #[test]
    fn test_move_player_rehomes_rosters_atomically() {
        let mut world = content::default_world();
        world.login("ada");
        world.move_player("ada", "2", Position { x: 64.0, y: 64.0 });

        assert!(!world.map(FIRST_MAP_ID).unwrap().roster.contains("ada"));
        assert!(world.map("2").unwrap().roster.contains("ada"));
        let player = world.player("ada").unwrap();
        assert_eq!(player.core.map_id, "2");
        assert_eq!(player.core.position, Position { x: 64.0, y: 64.0 });
    }

    #[test]
    fn test_disconnect_keeps_record_but_clears_roster() {
        let mut world = content::default_world();
        world.login("ada");
        world.disconnect_player("ada");
        assert!(!world.map(FIRST_MAP_ID).unwrap().roster.contains("ada"));
        assert!(world.player("ada").is_some());
        // Re-entry lands back on the roster.
        world.login("ada");
        assert!(world.map(FIRST_MAP_ID).unwrap().roster.contains("ada"));
    }

    #[test]
    fn test_save_map_spawns_npcs_from_markers() {
        let world = content::default_world();
        let map = world.map(FIRST_MAP_ID).unwrap();
        assert!(!map.npcs.is_empty());
        for npc in map.npcs.values() {
            assert_eq!(npc.core.map_id, FIRST_MAP_ID);
            assert_eq!(npc.core.health, npc.max_health);
            let positions = map.spawn_positions(&npc.spawn_id);
            assert!(positions.contains(&npc.core.position));
        }
        // Instance ids are unique even when markers share a catalog id.
        let ids: BTreeSet<_> = map.npcs.values().map(|n| n.core.id.clone()).collect();
        assert_eq!(ids.len(), map.npcs.len());
    }

    #[test]
    fn test_snapshot_resolves_roster() {
        let mut world = content::default_world();
        world.login("ada");
        world.login("bob");
        let snapshot = world.snapshot(FIRST_MAP_ID).unwrap();
        assert!(snapshot.players.contains_key("ada"));
        assert!(snapshot.players.contains_key("bob"));
        assert_eq!(snapshot.id, FIRST_MAP_ID);
    }

    #[test]
    fn test_tile_at_bounds() {
        let world = content::default_world();
        let map = world.map(FIRST_MAP_ID).unwrap();
        assert!(map.tile_at(0.0, 0.0).is_some());
        assert!(map.tile_at(-1.0, 0.0).is_none());
        assert!(map.tile_at(map.pixel_width() + 1.0, 0.0).is_none());
    }
}
