//! Types shared between the authoritative server and its clients: the world
//! data model (characters, maps, tiles, items) and the JSON wire protocol
//! (client intents in, per-player state snapshots and chat frames out).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const TILE_SIZE: f32 = 64.0;
pub const SPRITE_WIDTH: f32 = 64.0;
pub const SPRITE_HEIGHT: f32 = 64.0;
pub const BASE_PLAYER_SPEED: f32 = 10.0;
pub const BOOST_MULTIPLIER: f32 = 150.0;
pub const PLAYER_MAX_HEALTH: f32 = 100.0;
pub const DEFAULT_INVENTORY_CAPACITY: usize = 10;
pub const FIRST_MAP_ID: &str = "1";
/// Players respawn here (tile 9,6 of the first map).
pub const SPAWN_POSITION: Position = Position { x: 576.0, y: 384.0 };

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn offset(self, dx: f32, dy: f32) -> Position {
        Position {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Straight-line distance between two points.
    pub fn distance(self, other: Position) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// One-tile step along this direction, in world units.
    pub fn step(self) -> (f32, f32) {
        match self {
            Direction::Up => (0.0, -TILE_SIZE),
            Direction::Down => (0.0, TILE_SIZE),
            Direction::Left => (-TILE_SIZE, 0.0),
            Direction::Right => (TILE_SIZE, 0.0),
        }
    }

    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharAction {
    Idle,
    Walk,
    Attack,
}

/// Ordered access levels: `User < Moderator < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    User,
    Moderator,
    Admin,
}

/// Fields every character has, whether player or NPC. The concrete variants
/// embed this so components that only care about position, health, facing and
/// map membership never need to know which kind they hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterCore {
    pub id: String,
    pub position: Position,
    pub width: f32,
    pub height: f32,
    pub sprite: u32,
    pub health: f32,
    pub attack: f32,
    pub direction: Direction,
    pub action: CharAction,
    pub attack_range: f32,
    pub map_id: String,
}

impl CharacterCore {
    /// Axis-aligned overlap test of this character's box, placed at `pos`,
    /// against another character's current box.
    pub fn overlaps_at(&self, pos: Position, other: &CharacterCore) -> bool {
        pos.x < other.position.x + other.width
            && pos.x + self.width > other.position.x
            && pos.y < other.position.y + other.height
            && pos.y + self.height > other.position.y
    }
}

/// The four corners of a `width`×`height` box at `pos`, sampled at
/// sub-pixel-exact coordinates so a box flush against a tile edge does not
/// leak into the neighboring tile. Scan order is the stable tie-break for
/// warp lookup: top-left, top-right, bottom-left, bottom-right.
pub fn box_corners(pos: Position, width: f32, height: f32) -> [Position; 4] {
    [
        Position { x: pos.x, y: pos.y },
        Position {
            x: pos.x + width - 1.0,
            y: pos.y,
        },
        Position {
            x: pos.x,
            y: pos.y + height - 1.0,
        },
        Position {
            x: pos.x + width - 1.0,
            y: pos.y + height - 1.0,
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectOp {
    Add,
    Multiply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Attribute {
    Health,
    Attack,
    AttackRange,
    Speed,
}

/// A numeric modifier an item applies on equip/use and reverses on unequip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub attribute: Attribute,
    pub op: EffectOp,
    pub value: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Weapon,
    Helmet,
    Chestplate,
    Gloves,
    Boots,
    Consumable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipSlot {
    Weapon,
    Helmet,
    Chestplate,
    Gloves,
    Boots,
}

impl ItemKind {
    /// The equipment slot this kind occupies, or `None` for consumables.
    pub fn equip_slot(self) -> Option<EquipSlot> {
        match self {
            ItemKind::Weapon => Some(EquipSlot::Weapon),
            ItemKind::Helmet => Some(EquipSlot::Helmet),
            ItemKind::Chestplate => Some(EquipSlot::Chestplate),
            ItemKind::Gloves => Some(EquipSlot::Gloves),
            ItemKind::Boots => Some(EquipSlot::Boots),
            ItemKind::Consumable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub sprite: u32,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    #[serde(flatten)]
    pub item: Item,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub items: Vec<InventoryItem>,
    pub max_capacity: usize,
}

impl Inventory {
    pub fn new(max_capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            max_capacity,
        }
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_capacity
    }

    pub fn contains(&self, item_id: u32) -> bool {
        self.items.iter().any(|slot| slot.item.id == item_id)
    }

    /// Adds one of `item`, stacking onto an existing slot when possible.
    /// Returns false when a new slot would exceed the capacity bound.
    pub fn insert(&mut self, item: Item) -> bool {
        if let Some(slot) = self.items.iter_mut().find(|slot| slot.item.id == item.id) {
            slot.quantity += 1;
            return true;
        }
        if self.is_full() {
            return false;
        }
        self.items.push(InventoryItem { item, quantity: 1 });
        true
    }

    /// Removes one of `item_id`, dropping the slot when its stack empties.
    pub fn remove_one(&mut self, item_id: u32) -> bool {
        let Some(index) = self.items.iter().position(|slot| slot.item.id == item_id) else {
            return false;
        };
        if self.items[index].quantity > 1 {
            self.items[index].quantity -= 1;
        } else {
            self.items.remove(index);
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Equipped {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helmet: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chestplate: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gloves: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boots: Option<Item>,
}

impl Equipped {
    pub fn slot_mut(&mut self, slot: EquipSlot) -> &mut Option<Item> {
        match slot {
            EquipSlot::Weapon => &mut self.weapon,
            EquipSlot::Helmet => &mut self.helmet,
            EquipSlot::Chestplate => &mut self.chestplate,
            EquipSlot::Gloves => &mut self.gloves,
            EquipSlot::Boots => &mut self.boots,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(flatten)]
    pub core: CharacterCore,
    pub name: String,
    pub level: u32,
    pub speed: f32,
    pub experience: u64,
    pub experience_to_next_level: u64,
    pub inventory: Inventory,
    pub equipped: Equipped,
    pub access: Access,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NpcBehavior {
    Aggressive,
    Hostile,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcDrop {
    pub item_id: u32,
    pub chance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Npc {
    #[serde(flatten)]
    pub core: CharacterCore,
    /// Catalog id tying this instance to its `Tile::npc_spawn` markers.
    pub spawn_id: String,
    pub behavior: NpcBehavior,
    pub max_health: f32,
    pub experience_value: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drops: Vec<NpcDrop>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warp {
    pub to: String,
    pub position: Position,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    pub tile_index: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warp: Option<Warp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npc_spawn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapKind {
    Pvp,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedItem {
    pub item_id: u32,
    pub position: Position,
    pub sprite: u32,
}

/// Wire view of one map: the full grid plus everyone currently on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSnapshot {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MapKind,
    pub players: HashMap<String, Player>,
    pub npcs: HashMap<String, Npc>,
    pub tiles: Vec<Vec<Tile>>,
    pub dropped_items: Vec<DroppedItem>,
}

// ---------------------------------------------------------------------------
// Wire protocol
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyCode {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Shift,
    Control,
}

impl KeyCode {
    pub fn direction(self) -> Option<Direction> {
        match self {
            KeyCode::ArrowUp => Some(Direction::Up),
            KeyCode::ArrowDown => Some(Direction::Down),
            KeyCode::ArrowLeft => Some(Direction::Left),
            KeyCode::ArrowRight => Some(Direction::Right),
            KeyCode::Shift | KeyCode::Control => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEdge {
    Press,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemVerb {
    Use,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatScope {
    Global,
    Map,
}

/// One inbound client message. The transport layer has already bound the
/// sending connection to a trusted player identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientIntent {
    Keyboard { key: KeyCode, action: KeyEdge },
    Item { item: u32, action: ItemVerb },
    Chat { scope: ChatScope, message: String },
}

/// First frame on a fresh connection; stands in for the external session
/// collaborator that vouches for the identity. Connections that do not
/// present one are rejected outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "login")]
pub struct LoginFrame {
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSubtype {
    Death,
}

/// Chat frame, pushed immediately rather than batched with snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "chat")]
pub struct ChatMessage {
    pub scope: ChatScope,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<ChatSubtype>,
}

/// Per-recipient snapshot: the recipient's map plus its own record, so the
/// client can tell itself apart from the map's `players` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFrame {
    pub map: MapSnapshot,
    pub player: Player,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core(id: &str, x: f32, y: f32) -> CharacterCore {
        CharacterCore {
            id: id.to_string(),
            position: Position { x, y },
            width: SPRITE_WIDTH,
            height: SPRITE_HEIGHT,
            sprite: 0,
            health: 100.0,
            attack: 10.0,
            direction: Direction::Down,
            action: CharAction::Idle,
            attack_range: TILE_SIZE,
            map_id: FIRST_MAP_ID.to_string(),
        }
    }

    #[test]
    fn test_box_corners_order_and_inset() {
        let corners = box_corners(Position { x: 64.0, y: 128.0 }, 64.0, 64.0);
        assert_eq!(corners[0], Position { x: 64.0, y: 128.0 });
        assert_eq!(corners[1], Position { x: 127.0, y: 128.0 });
        assert_eq!(corners[2], Position { x: 64.0, y: 191.0 });
        assert_eq!(corners[3], Position { x: 127.0, y: 191.0 });
    }

    #[test]
    fn test_overlap_detection() {
        let a = core("a", 0.0, 0.0);
        let b = core("b", 32.0, 32.0);
        assert!(a.overlaps_at(a.position, &b));
    }

    #[test]
    fn test_overlap_exact_touch_is_clear() {
        let a = core("a", 0.0, 0.0);
        let b = core("b", SPRITE_WIDTH, 0.0);
        assert!(!a.overlaps_at(a.position, &b));
    }

    #[test]
    fn test_distance_is_euclidean() {
        use assert_approx_eq::assert_approx_eq;
        let a = Position { x: 0.0, y: 0.0 };
        let b = Position { x: 3.0, y: 4.0 };
        assert_approx_eq!(a.distance(b), 5.0, 1e-6);
        assert_approx_eq!(b.distance(a), 5.0, 1e-6);
    }

    #[test]
    fn test_direction_step_is_one_tile() {
        assert_eq!(Direction::Up.step(), (0.0, -TILE_SIZE));
        assert_eq!(Direction::Down.step(), (0.0, TILE_SIZE));
        assert_eq!(Direction::Left.step(), (-TILE_SIZE, 0.0));
        assert_eq!(Direction::Right.step(), (TILE_SIZE, 0.0));
    }

    #[test]
    fn test_access_ordering() {
        assert!(Access::User < Access::Moderator);
        assert!(Access::Moderator < Access::Admin);
    }

    #[test]
    fn test_inventory_capacity_bound() {
        let mut inv = Inventory::new(2);
        let item = |id| Item {
            id,
            name: format!("item-{id}"),
            description: String::new(),
            sprite: 0,
            kind: ItemKind::Consumable,
            effects: vec![],
        };
        assert!(inv.insert(item(1)));
        assert!(inv.insert(item(2)));
        assert!(!inv.insert(item(3)));
        // Stacking an existing id never needs a new slot.
        assert!(inv.insert(item(1)));
        assert_eq!(inv.items[0].quantity, 2);
    }

    #[test]
    fn test_inventory_remove_one_unstacks_before_dropping() {
        let mut inv = Inventory::new(4);
        let item = Item {
            id: 7,
            name: "potion".into(),
            description: String::new(),
            sprite: 3,
            kind: ItemKind::Consumable,
            effects: vec![],
        };
        inv.insert(item.clone());
        inv.insert(item);
        assert!(inv.remove_one(7));
        assert!(inv.contains(7));
        assert!(inv.remove_one(7));
        assert!(!inv.contains(7));
        assert!(!inv.remove_one(7));
    }

    #[test]
    fn test_equip_slot_mapping() {
        assert_eq!(ItemKind::Weapon.equip_slot(), Some(EquipSlot::Weapon));
        assert_eq!(ItemKind::Boots.equip_slot(), Some(EquipSlot::Boots));
        assert_eq!(ItemKind::Consumable.equip_slot(), None);
    }

    #[test]
    fn test_keyboard_intent_wire_format() {
        let intent = ClientIntent::Keyboard {
            key: KeyCode::ArrowUp,
            action: KeyEdge::Press,
        };
        let json = serde_json::to_string(&intent).unwrap();
        assert_eq!(
            json,
            r#"{"type":"keyboard","key":"ArrowUp","action":"press"}"#
        );
        let back: ClientIntent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, intent);
    }

    #[test]
    fn test_item_intent_wire_format() {
        let json = r#"{"type":"item","item":3,"action":"use"}"#;
        let intent: ClientIntent = serde_json::from_str(json).unwrap();
        assert_eq!(
            intent,
            ClientIntent::Item {
                item: 3,
                action: ItemVerb::Use,
            }
        );
    }

    #[test]
    fn test_chat_intent_wire_format() {
        let json = r#"{"type":"chat","scope":"map","message":"hi"}"#;
        let intent: ClientIntent = serde_json::from_str(json).unwrap();
        assert_eq!(
            intent,
            ClientIntent::Chat {
                scope: ChatScope::Map,
                message: "hi".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_intent_is_rejected() {
        assert!(serde_json::from_str::<ClientIntent>("not json").is_err());
        assert!(serde_json::from_str::<ClientIntent>(r#"{"type":"fly"}"#).is_err());
    }

    #[test]
    fn test_chat_message_carries_type_tag() {
        let msg = ChatMessage {
            scope: ChatScope::Global,
            message: "hello".to_string(),
            username: Some("ada".to_string()),
            subtype: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"chat""#));
        assert!(!json.contains("subtype"));
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_death_notice_subtype() {
        let msg = ChatMessage {
            scope: ChatScope::Global,
            message: "ada has died".to_string(),
            username: None,
            subtype: Some(ChatSubtype::Death),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""subtype":"death""#));
    }

    #[test]
    fn test_login_frame_wire_format() {
        let frame: LoginFrame =
            serde_json::from_str(r#"{"type":"login","username":"ada"}"#).unwrap();
        assert_eq!(frame.username, "ada");
    }

    #[test]
    fn test_tile_serialization_omits_empty_markers() {
        let plain = Tile {
            tile_index: 4,
            ..Tile::default()
        };
        assert_eq!(serde_json::to_string(&plain).unwrap(), r#"{"tileIndex":4}"#);

        let warped = Tile {
            tile_index: 0,
            warp: Some(Warp {
                to: "2".to_string(),
                position: Position { x: 64.0, y: 64.0 },
            }),
            ..Tile::default()
        };
        let json = serde_json::to_string(&warped).unwrap();
        let back: Tile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, warped);
    }

    #[test]
    fn test_player_flattens_character_core() {
        let player = Player {
            core: core("ada", 576.0, 384.0),
            name: "ada".to_string(),
            level: 1,
            speed: BASE_PLAYER_SPEED,
            experience: 0,
            experience_to_next_level: 100,
            inventory: Inventory::new(DEFAULT_INVENTORY_CAPACITY),
            equipped: Equipped::default(),
            access: Access::User,
        };
        let json = serde_json::to_string(&player).unwrap();
        assert!(json.contains(r#""mapId":"1""#));
        assert!(json.contains(r#""attackRange""#));
        let back: Player = serde_json::from_str(&json).unwrap();
        assert_eq!(back, player);
    }
}
