//! Player lifecycle and item handling: record creation, respawn, and the
//! equip/consume/drop mutations the dispatcher delegates item intents to.
//! Equipping swaps: the previous occupant of the slot has its effects
//! reversed before the new item's effects apply.

use log::{info, warn};
use shared::{
    Access, Attribute, CharAction, CharacterCore, Direction, DroppedItem, Effect, EffectOp,
    Equipped, Inventory, Item, Player, BASE_PLAYER_SPEED, DEFAULT_INVENTORY_CAPACITY,
    FIRST_MAP_ID, PLAYER_MAX_HEALTH, SPAWN_POSITION, SPRITE_HEIGHT, SPRITE_WIDTH, TILE_SIZE,
};

use crate::world::World;

pub fn create_player(username: &str) -> Player {
    Player {
        core: CharacterCore {
            id: username.to_string(),
            position: SPAWN_POSITION,
            width: SPRITE_WIDTH,
            height: SPRITE_HEIGHT,
            sprite: 0,
            health: PLAYER_MAX_HEALTH,
            attack: 80.0,
            direction: Direction::Down,
            action: CharAction::Idle,
            attack_range: TILE_SIZE,
            map_id: FIRST_MAP_ID.to_string(),
        },
        name: username.to_string(),
        level: 1,
        speed: BASE_PLAYER_SPEED,
        experience: 0,
        experience_to_next_level: 100,
        inventory: Inventory::new(DEFAULT_INVENTORY_CAPACITY),
        equipped: Equipped::default(),
        access: Access::User,
    }
}

/// Full-health return to the fixed spawn point, re-homed in the same step.
pub fn respawn_player(world: &mut World, name: &str) {
    if let Some(player) = world.player_mut(name) {
        player.core.health = PLAYER_MAX_HEALTH;
    }
    world.move_player(name, FIRST_MAP_ID, SPAWN_POSITION);
}

/// Applies an item's effect list to a player, or exactly reverses a previous
/// application when `reverse` is set.
pub fn apply_effects(player: &mut Player, effects: &[Effect], reverse: bool) {
    for effect in effects {
        let value = match effect.attribute {
            Attribute::Health => &mut player.core.health,
            Attribute::Attack => &mut player.core.attack,
            Attribute::AttackRange => &mut player.core.attack_range,
            Attribute::Speed => &mut player.speed,
        };
        match effect.op {
            EffectOp::Add => {
                *value += if reverse { -effect.value } else { effect.value };
            }
            EffectOp::Multiply => {
                *value *= if reverse {
                    1.0 / effect.value
                } else {
                    effect.value
                };
            }
        }
    }
    player.core.health = player.core.health.max(0.0);
}

fn equip_item(player: &mut Player, item: Item) {
    let Some(slot) = item.kind.equip_slot() else {
        return;
    };
    if let Some(previous) = player.equipped.slot_mut(slot).take() {
        apply_effects(player, &previous.effects, true);
    }
    apply_effects(player, &item.effects, false);
    *player.equipped.slot_mut(slot) = Some(item);
}

/// Use intent: equipment swaps into its slot, consumables apply their effects
/// once and leave the inventory. Returns false when the player does not hold
/// the item or the catalog does not know it.
pub fn use_item(world: &mut World, name: &str, item_id: u32) -> bool {
    let Some(item) = world.item(item_id).cloned() else {
        warn!("use_item: unknown item {item_id}");
        return false;
    };
    let Some(player) = world.player_mut(name) else {
        warn!("use_item: no player named {name}");
        return false;
    };
    if !player.inventory.contains(item_id) {
        warn!("use_item: {name} does not hold item {item_id}");
        return false;
    }

    if item.kind.equip_slot().is_some() {
        equip_item(player, item);
    } else {
        apply_effects(player, &item.effects, false);
        player.inventory.remove_one(item_id);
    }
    true
}

/// Drop intent: one unit leaves the inventory and lands on the map at the
/// player's position.
pub fn drop_item(world: &mut World, name: &str, item_id: u32) -> bool {
    let Some(sprite) = world.item(item_id).map(|item| item.sprite) else {
        warn!("drop_item: unknown item {item_id}");
        return false;
    };
    let Some(player) = world.player_mut(name) else {
        warn!("drop_item: no player named {name}");
        return false;
    };
    if !player.inventory.remove_one(item_id) {
        warn!("drop_item: {name} does not hold item {item_id}");
        return false;
    }
    let position = player.core.position;
    let map_id = player.core.map_id.clone();
    if let Some(map) = world.map_mut(&map_id) {
        map.dropped_items.push(DroppedItem {
            item_id,
            position,
            sprite,
        });
    }
    true
}

/// Picks up any ground items overlapping the player's box, as far as
/// inventory capacity allows. Called after a committed move.
pub fn pick_up_items(world: &mut World, name: &str) {
    let Some(player) = world.player(name) else {
        return;
    };
    let core = player.core.clone();
    let map_id = core.map_id.clone();

    let overlapping: Vec<DroppedItem> = match world.map(&map_id) {
        Some(map) => map
            .dropped_items
            .iter()
            .filter(|dropped| {
                core.overlaps_at(
                    core.position,
                    &CharacterCore {
                        id: String::new(),
                        position: dropped.position,
                        width: TILE_SIZE,
                        height: TILE_SIZE,
                        ..core.clone()
                    },
                )
            })
            .cloned()
            .collect(),
        None => return,
    };

    for dropped in overlapping {
        let Some(item) = world.item(dropped.item_id).cloned() else {
            continue;
        };
        let Some(player) = world.player_mut(name) else {
            return;
        };
        if !player.inventory.insert(item) {
            break;
        }
        info!("{name} picked up item {}", dropped.item_id);
        if let Some(map) = world.map_mut(&map_id) {
            if let Some(index) = map
                .dropped_items
                .iter()
                .position(|d| d.item_id == dropped.item_id && d.position == dropped.position)
            {
                map.dropped_items.remove(index);
            }
        }
    }
}
