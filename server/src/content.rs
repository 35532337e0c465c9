//! Built-in world content: the item catalog, the NPC catalog and the two
//! starter maps. In deployment the editor collaborator overwrites grids
//! through `World::save_map`; this module only provides the state the server
//! boots with.

use shared::{
    Attribute, CharAction, CharacterCore, Direction, Effect, EffectOp, Item, ItemKind, MapKind,
    Npc, NpcBehavior, NpcDrop, Position, Tile, SPRITE_HEIGHT, SPRITE_WIDTH, TILE_SIZE,
};

use crate::world::World;

const MAP_COLS: usize = 20;
const MAP_ROWS: usize = 14;

pub fn default_world() -> World {
    let mut world = World::new();
    for item in item_catalog() {
        world.insert_item(item);
    }
    for npc in npc_catalog() {
        world.insert_npc_template(npc);
    }
    world.insert_map("1", "Meadow", MapKind::Normal, meadow_tiles());
    world.insert_map("2", "Arena", MapKind::Pvp, arena_tiles());
    world
}

fn item(id: u32, name: &str, description: &str, sprite: u32, kind: ItemKind, effects: Vec<Effect>) -> Item {
    Item {
        id,
        name: name.to_string(),
        description: description.to_string(),
        sprite,
        kind,
        effects,
    }
}

fn add(attribute: Attribute, value: f32) -> Effect {
    Effect {
        attribute,
        op: EffectOp::Add,
        value,
    }
}

fn multiply(attribute: Attribute, value: f32) -> Effect {
    Effect {
        attribute,
        op: EffectOp::Multiply,
        value,
    }
}

fn item_catalog() -> Vec<Item> {
    vec![
        item(
            1,
            "Rusty Sword",
            "Seen better days, still cuts.",
            10,
            ItemKind::Weapon,
            vec![add(Attribute::Attack, 25.0)],
        ),
        item(
            2,
            "Leather Helmet",
            "Smells of the tannery.",
            11,
            ItemKind::Helmet,
            vec![add(Attribute::Health, 20.0)],
        ),
        item(
            3,
            "Healing Potion",
            "Bitter, effective.",
            12,
            ItemKind::Consumable,
            vec![add(Attribute::Health, 50.0)],
        ),
        item(
            4,
            "Swift Boots",
            "The cobbler swears by them.",
            13,
            ItemKind::Boots,
            vec![multiply(Attribute::Speed, 2.0)],
        ),
        item(
            5,
            "Iron Chestplate",
            "Heavy and reassuring.",
            14,
            ItemKind::Chestplate,
            vec![add(Attribute::Health, 40.0)],
        ),
        item(
            6,
            "Padded Gloves",
            "A steadier grip.",
            15,
            ItemKind::Gloves,
            vec![add(Attribute::Attack, 5.0)],
        ),
    ]
}

fn npc_template(
    spawn_id: &str,
    behavior: NpcBehavior,
    max_health: f32,
    attack: f32,
    experience_value: u64,
    sprite: u32,
    drops: Vec<NpcDrop>,
) -> Npc {
    Npc {
        core: CharacterCore {
            id: spawn_id.to_string(),
            position: Position::default(),
            width: SPRITE_WIDTH,
            height: SPRITE_HEIGHT,
            sprite,
            health: max_health,
            attack,
            direction: Direction::Down,
            action: CharAction::Idle,
            attack_range: TILE_SIZE,
            map_id: String::new(),
        },
        spawn_id: spawn_id.to_string(),
        behavior,
        max_health,
        experience_value,
        drops,
    }
}

fn npc_catalog() -> Vec<Npc> {
    vec![
        npc_template(
            "slime",
            NpcBehavior::Aggressive,
            100.0,
            10.0,
            500,
            20,
            vec![NpcDrop {
                item_id: 3,
                chance: 0.25,
            }],
        ),
        npc_template(
            "bandit",
            NpcBehavior::Hostile,
            120.0,
            15.0,
            500,
            21,
            vec![NpcDrop {
                item_id: 1,
                chance: 0.1,
            }],
        ),
        npc_template("elder", NpcBehavior::Neutral, 50.0, 0.0, 0, 22, vec![]),
    ]
}

fn open_grid() -> Vec<Vec<Tile>> {
    vec![vec![Tile::default(); MAP_COLS]; MAP_ROWS]
}

fn meadow_tiles() -> Vec<Vec<Tile>> {
    let mut tiles = open_grid();
    // A short wall west of the spawn clearing.
    for row in 2..=5 {
        tiles[row][3].blocked = true;
    }
    tiles[1][15].npc_spawn = Some("slime".to_string());
    tiles[2][17].npc_spawn = Some("slime".to_string());
    tiles[1][18].npc_spawn = Some("bandit".to_string());
    tiles[12][18].warp = Some(shared::Warp {
        to: "2".to_string(),
        position: Position { x: 64.0, y: 64.0 },
    });
    tiles[12][2].item = Some(3);
    tiles
}

fn arena_tiles() -> Vec<Vec<Tile>> {
    let mut tiles = open_grid();
    for col in 8..=11 {
        tiles[7][col].blocked = true;
    }
    tiles[11][16].npc_spawn = Some("bandit".to_string());
    tiles[12][16].npc_spawn = Some("elder".to_string());
    tiles[1][1].warp = Some(shared::Warp {
        to: "1".to_string(),
        position: shared::SPAWN_POSITION,
    });
    tiles
}
