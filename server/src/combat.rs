//! Combat resolution and progression: target selection, damage, death,
//! experience award and the leveling loop. One strike per attack intent; the
//! same range/facing predicates serve players and NPCs on either side of the
//! exchange.

use log::{debug, info, warn};
use rand::Rng;
use shared::{CharAction, CharacterCore, Direction, DroppedItem, MapKind, Position};

use crate::player::respawn_player;
use crate::world::World;

/// What a resolution pass did, for the dispatcher to log and announce.
#[derive(Debug, Clone, PartialEq)]
pub enum CombatEvent {
    PlayerDied { name: String },
    NpcDied { map_id: String, instance_id: String },
    PlayerLeveled { name: String, level: u32 },
}

/// Experience required to clear `level`.
pub fn xp_threshold(level: u32) -> u64 {
    (100.0 * 1.5f64.powi(level as i32 - 1)).floor() as u64
}

/// Rolls accumulated experience into levels. Returns the levels gained.
pub fn level_up(player: &mut shared::Player) -> u32 {
    let before = player.level;
    while player.experience >= player.experience_to_next_level {
        player.experience -= player.experience_to_next_level;
        player.level += 1;
        player.experience_to_next_level = xp_threshold(player.level);
    }
    player.level - before
}

/// Straight-line reach test.
pub fn in_attack_range(attacker: &CharacterCore, target: &CharacterCore) -> bool {
    attacker.position.distance(target.position) <= attacker.attack_range
}

/// Half-plane facing test, bounded by the target's half-extents on the
/// perpendicular axis so a target merely sharing a row or column far off-axis
/// does not qualify. Targets behind the attacker never pass.
pub fn is_facing(attacker: &CharacterCore, target: &CharacterCore) -> bool {
    let dx = target.position.x - attacker.position.x;
    let dy = target.position.y - attacker.position.y;
    match attacker.direction {
        Direction::Up => dy < 0.0 && dx.abs() < target.width / 2.0,
        Direction::Down => dy > 0.0 && dx.abs() < target.width / 2.0,
        Direction::Left => dx < 0.0 && dy.abs() < target.height / 2.0,
        Direction::Right => dx > 0.0 && dy.abs() < target.height / 2.0,
    }
}

fn valid_target(attacker: &CharacterCore, target: &CharacterCore) -> bool {
    target.health > 0.0 && in_attack_range(attacker, target) && is_facing(attacker, target)
}

#[derive(Debug, Clone, PartialEq)]
enum TargetRef {
    Player(String),
    Npc(String),
}

/// The single target an attack strikes: the nearest valid candidate, with
/// live opponent players taking priority on pvp maps.
fn find_target(world: &World, attacker: &CharacterCore) -> Option<TargetRef> {
    let map = world.map(&attacker.map_id)?;

    if map.kind == MapKind::Pvp {
        let nearest_player = map
            .roster
            .iter()
            .filter_map(|name| world.player(name))
            .filter(|p| p.core.id != attacker.id && valid_target(attacker, &p.core))
            .min_by(|a, b| {
                attacker
                    .position
                    .distance(a.core.position)
                    .total_cmp(&attacker.position.distance(b.core.position))
            });
        if let Some(player) = nearest_player {
            return Some(TargetRef::Player(player.name.clone()));
        }
    }

    map.npcs
        .values()
        .filter(|npc| npc.core.id != attacker.id && valid_target(attacker, &npc.core))
        .min_by(|a, b| {
            attacker
                .position
                .distance(a.core.position)
                .total_cmp(&attacker.position.distance(b.core.position))
        })
        .map(|npc| TargetRef::Npc(npc.core.id.clone()))
}

/// Resolves one attack intent from a player, synchronously with the intent
/// that raised it.
pub fn resolve_player_attack(
    world: &mut World,
    attacker_name: &str,
    rng: &mut impl Rng,
) -> Vec<CombatEvent> {
    let Some(attacker) = world.player(attacker_name) else {
        warn!("attack: no player named {attacker_name}");
        return Vec::new();
    };
    let attacker_core = attacker.core.clone();

    let Some(target) = find_target(world, &attacker_core) else {
        debug!("{attacker_name} attacks the air");
        return Vec::new();
    };

    match target {
        TargetRef::Player(victim) => strike_player(world, attacker_core.attack, &victim),
        TargetRef::Npc(instance_id) => {
            strike_npc(world, attacker_name, &attacker_core.map_id, &instance_id, rng)
        }
    }
}

/// Damage applied to a player, from either a player or an NPC. Health clamps
/// at zero; death is a respawn, not a removal, and is idempotent.
pub fn strike_player(world: &mut World, damage: f32, victim: &str) -> Vec<CombatEvent> {
    let Some(player) = world.player_mut(victim) else {
        warn!("strike: no player named {victim}");
        return Vec::new();
    };
    player.core.health = (player.core.health - damage).max(0.0);
    if player.core.health > 0.0 {
        return Vec::new();
    }

    info!("{victim} died");
    respawn_player(world, victim);
    vec![CombatEvent::PlayerDied {
        name: victim.to_string(),
    }]
}

fn strike_npc(
    world: &mut World,
    attacker_name: &str,
    map_id: &str,
    instance_id: &str,
    rng: &mut impl Rng,
) -> Vec<CombatEvent> {
    let attack = match world.player(attacker_name) {
        Some(player) => player.core.attack,
        None => return Vec::new(),
    };

    let (dead, experience_value, death_position, drops, spawn_id) = {
        let Some(npc) = world.npc_mut(map_id, instance_id) else {
            warn!("strike: no npc {instance_id} on map {map_id}");
            return Vec::new();
        };
        npc.core.health = (npc.core.health - attack).max(0.0);
        (
            npc.core.health <= 0.0,
            npc.experience_value,
            npc.core.position,
            npc.drops.clone(),
            npc.spawn_id.clone(),
        )
    };
    if !dead {
        return Vec::new();
    }

    let mut events = vec![CombatEvent::NpcDied {
        map_id: map_id.to_string(),
        instance_id: instance_id.to_string(),
    }];

    if let Some(attacker) = world.player_mut(attacker_name) {
        attacker.experience += experience_value;
        let gained = level_up(attacker);
        if gained > 0 {
            let level = attacker.level;
            info!("{attacker_name} reached level {level}");
            events.push(CombatEvent::PlayerLeveled {
                name: attacker_name.to_string(),
                level,
            });
        }
    }

    roll_loot(world, map_id, death_position, &drops, rng);
    respawn_npc(world, map_id, instance_id, &spawn_id, rng);
    events
}

fn roll_loot(
    world: &mut World,
    map_id: &str,
    position: Position,
    drops: &[shared::NpcDrop],
    rng: &mut impl Rng,
) {
    for drop in drops {
        if rng.gen::<f32>() >= drop.chance {
            continue;
        }
        let Some(sprite) = world.item(drop.item_id).map(|item| item.sprite) else {
            warn!("loot table references unknown item {}", drop.item_id);
            continue;
        };
        if let Some(map) = world.map_mut(map_id) {
            map.dropped_items.push(DroppedItem {
                item_id: drop.item_id,
                position,
                sprite,
            });
        }
    }
}

/// Respawns a dead NPC at a uniformly random tile marked with its spawn id,
/// or removes the instance for good when its map has no such tile.
fn respawn_npc(
    world: &mut World,
    map_id: &str,
    instance_id: &str,
    spawn_id: &str,
    rng: &mut impl Rng,
) {
    let positions = match world.map(map_id) {
        Some(map) => map.spawn_positions(spawn_id),
        None => Vec::new(),
    };

    if positions.is_empty() {
        if let Some(map) = world.map_mut(map_id) {
            map.npcs.remove(instance_id);
        }
        info!("npc {instance_id} has no spawn tile on map {map_id}, gone for good");
        return;
    }

    let position = positions[rng.gen_range(0..positions.len())];
    if let Some(npc) = world.npc_mut(map_id, instance_id) {
        npc.core.health = npc.max_health;
        npc.core.position = position;
        npc.core.action = CharAction::Idle;
    }
}
