//! Autonomous NPC behavior, driven once per NPC per NPC-tick pulse. Each NPC
//! is a small {Idle, Walk, Attack} state machine whose branch is picked by
//! its behavior tag. Movement goes through the same collision predicate as
//! players; the only randomness is the hostile wander direction.

use log::debug;
use rand::Rng;
use shared::{CharAction, CharacterCore, Direction, NpcBehavior, Position, TILE_SIZE};

use crate::combat::{self, CombatEvent};
use crate::movement;
use crate::world::World;

/// Runs one behavior step for every NPC on every map.
pub fn run_npc_tick(world: &mut World, rng: &mut impl Rng) -> Vec<CombatEvent> {
    let mut events = Vec::new();
    for map_id in world.map_ids() {
        let instances: Vec<String> = match world.map(&map_id) {
            Some(map) => map.npcs.keys().cloned().collect(),
            None => continue,
        };
        for instance_id in instances {
            events.extend(tick_npc(world, &map_id, &instance_id, rng));
        }
    }
    events
}

/// One behavior step for one NPC.
pub fn tick_npc(
    world: &mut World,
    map_id: &str,
    instance_id: &str,
    rng: &mut impl Rng,
) -> Vec<CombatEvent> {
    let (core, behavior) = match world.npc(map_id, instance_id) {
        Some(npc) => (npc.core.clone(), npc.behavior),
        None => return Vec::new(),
    };

    if behavior == NpcBehavior::Neutral {
        set_action(world, map_id, instance_id, CharAction::Idle);
        return Vec::new();
    }

    let Some((target_name, target_core)) = nearest_player(world, map_id, &core) else {
        set_action(world, map_id, instance_id, CharAction::Idle);
        return Vec::new();
    };

    if combat::in_attack_range(&core, &target_core) && combat::is_facing(&core, &target_core) {
        let damage = core.attack;
        set_action(world, map_id, instance_id, CharAction::Attack);
        debug!("npc {instance_id} strikes {target_name}");
        return combat::strike_player(world, damage, &target_name);
    }

    if behavior == NpcBehavior::Aggressive {
        step_towards(world, map_id, instance_id, target_core.position);
    } else {
        wander(world, map_id, instance_id, rng);
    }
    Vec::new()
}

/// Nearest live player on the NPC's map by straight-line distance. The roster
/// is ordered, so ties break the same way every tick.
fn nearest_player(
    world: &World,
    map_id: &str,
    npc: &CharacterCore,
) -> Option<(String, CharacterCore)> {
    let map = world.map(map_id)?;
    let mut best: Option<(String, CharacterCore)> = None;
    let mut best_distance = f32::INFINITY;
    for name in &map.roster {
        let Some(player) = world.player(name) else {
            continue;
        };
        if player.core.health <= 0.0 {
            continue;
        }
        let distance = npc.position.distance(player.core.position);
        if distance < best_distance {
            best_distance = distance;
            best = Some((name.clone(), player.core.clone()));
        }
    }
    best
}

/// One-tile chase step: try the axis with the larger absolute delta first,
/// fall back to the other axis, facing following whichever axis was
/// attempted. Both blocked (or already aligned) leaves the NPC idle.
fn step_towards(world: &mut World, map_id: &str, instance_id: &str, target: Position) {
    let core = match world.npc(map_id, instance_id) {
        Some(npc) => npc.core.clone(),
        None => return,
    };
    let dx = target.x - core.position.x;
    let dy = target.y - core.position.y;

    let horizontal = (
        Position {
            x: core.position.x + dx.signum() * TILE_SIZE,
            y: core.position.y,
        },
        if dx > 0.0 {
            Direction::Right
        } else {
            Direction::Left
        },
        dx != 0.0,
    );
    let vertical = (
        Position {
            x: core.position.x,
            y: core.position.y + dy.signum() * TILE_SIZE,
        },
        if dy > 0.0 {
            Direction::Down
        } else {
            Direction::Up
        },
        dy != 0.0,
    );
    let attempts = if dx.abs() > dy.abs() {
        [horizontal, vertical]
    } else {
        [vertical, horizontal]
    };

    for (candidate, direction, axis_has_delta) in attempts {
        if !axis_has_delta {
            continue;
        }
        let blocked = movement::has_collision(world, &core, candidate);
        if let Some(npc) = world.npc_mut(map_id, instance_id) {
            npc.core.direction = direction;
            if !blocked {
                npc.core.position = candidate;
                npc.core.action = CharAction::Walk;
                return;
            }
        }
    }
    set_action(world, map_id, instance_id, CharAction::Idle);
}

/// One-tile step in a uniformly random cardinal direction; idles on
/// collision instead of retrying.
fn wander(world: &mut World, map_id: &str, instance_id: &str, rng: &mut impl Rng) {
    let core = match world.npc(map_id, instance_id) {
        Some(npc) => npc.core.clone(),
        None => return,
    };
    let direction = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
    let (dx, dy) = direction.step();
    let candidate = core.position.offset(dx, dy);

    let blocked = movement::has_collision(world, &core, candidate);
    if let Some(npc) = world.npc_mut(map_id, instance_id) {
        npc.core.direction = direction;
        if blocked {
            npc.core.action = CharAction::Idle;
        } else {
            npc.core.position = candidate;
            npc.core.action = CharAction::Walk;
        }
    }
}

fn set_action(world: &mut World, map_id: &str, instance_id: &str, action: CharAction) {
    if let Some(npc) = world.npc_mut(map_id, instance_id) {
        npc.core.action = action;
    }
}
