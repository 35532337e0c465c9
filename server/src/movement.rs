//! Movement legality: collision and warp lookup for a candidate position.
//! Pure reads over the world — both player moves and NPC steps go through the
//! same two predicates, and the dispatcher re-derives legality from scratch
//! for every commit instead of trusting anything client-reported.

use shared::{box_corners, CharacterCore, Position, Warp};

use crate::world::World;

/// True when placing `mover`'s box at `candidate` would overlap another live
/// character on the same map, land a corner on a blocked tile, or leave the
/// map bounds. The mover itself is excluded by instance id.
pub fn has_collision(world: &World, mover: &CharacterCore, candidate: Position) -> bool {
    let Some(map) = world.map(&mover.map_id) else {
        return false;
    };

    if candidate.x < 0.0
        || candidate.y < 0.0
        || candidate.x + mover.width > map.pixel_width()
        || candidate.y + mover.height > map.pixel_height()
    {
        return true;
    }

    let blocked = box_corners(candidate, mover.width, mover.height)
        .iter()
        .any(|corner| map.tile_at(corner.x, corner.y).is_some_and(|t| t.blocked));
    if blocked {
        return true;
    }

    map.roster
        .iter()
        .filter_map(|name| world.player(name))
        .map(|player| &player.core)
        .chain(map.npcs.values().map(|npc| &npc.core))
        .any(|other| {
            other.id != mover.id && other.health > 0.0 && mover.overlaps_at(candidate, other)
        })
}

/// The warp under the first corner of `mover`'s box at `candidate`, scanning
/// corners in the stable order defined by [`box_corners`].
pub fn find_warp(world: &World, mover: &CharacterCore, candidate: Position) -> Option<Warp> {
    let map = world.map(&mover.map_id)?;
    box_corners(candidate, mover.width, mover.height)
        .iter()
        .find_map(|corner| {
            map.tile_at(corner.x, corner.y)
                .and_then(|tile| tile.warp.clone())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content;
    use shared::{Tile, FIRST_MAP_ID, SPAWN_POSITION, TILE_SIZE};

    fn world_with_player() -> (World, CharacterCore) {
        let mut world = content::default_world();
        world.login("ada");
        let core = world.player("ada").unwrap().core.clone();
        (world, core)
    }

    #[test]
    fn test_out_of_bounds_collides() {
        let (world, core) = world_with_player();
        let map = world.map(FIRST_MAP_ID).unwrap();
        assert!(has_collision(&world, &core, Position { x: -1.0, y: 0.0 }));
        assert!(has_collision(&world, &core, Position { x: 0.0, y: -64.0 }));
        assert!(has_collision(
            &world,
            &core,
            Position {
                x: map.pixel_width() - core.width + 1.0,
                y: 0.0,
            }
        ));
        // Flush against the far edge is still inside.
        assert!(!has_collision(
            &world,
            &core,
            Position {
                x: map.pixel_width() - core.width,
                y: map.pixel_height() - core.height,
            }
        ));
    }

    #[test]
    fn test_blocked_tile_collides_at_every_corner() {
        let (mut world, core) = world_with_player();
        let blocked_at = |world: &mut World, col: usize, row: usize| {
            let map = world.map_mut(FIRST_MAP_ID).unwrap();
            map.tiles[row][col].blocked = true;
        };
        // Block the tile diagonally below-right of the spawn tile: only the
        // bottom-right corner of a box straddling it should collide.
        blocked_at(&mut world, 11, 8);
        let straddling = Position {
            x: 10.0 * TILE_SIZE + 32.0,
            y: 7.0 * TILE_SIZE + 32.0,
        };
        assert!(has_collision(&world, &core, straddling));
        // One full tile up-left clears it.
        let clear = Position {
            x: 10.0 * TILE_SIZE - 32.0,
            y: 7.0 * TILE_SIZE - 32.0,
        };
        assert!(!has_collision(&world, &core, clear));
    }

    #[test]
    fn test_box_flush_against_blocked_tile_does_not_leak() {
        let (mut world, core) = world_with_player();
        world.map_mut(FIRST_MAP_ID).unwrap().tiles[6][11].blocked = true;
        // Box occupying exactly the tile to the left: its right edge touches
        // the blocked tile but the inset corner sample stays out of it.
        let flush = Position {
            x: 10.0 * TILE_SIZE,
            y: 6.0 * TILE_SIZE,
        };
        assert!(!has_collision(&world, &core, flush));
        assert!(has_collision(&world, &core, flush.offset(1.0, 0.0)));
    }

    #[test]
    fn test_character_overlap_excludes_self() {
        let (mut world, core) = world_with_player();
        // Standing still never collides with yourself.
        assert!(!has_collision(&world, &core, core.position));

        world.login("bob");
        world.move_player("bob", FIRST_MAP_ID, SPAWN_POSITION.offset(TILE_SIZE, 0.0));
        assert!(has_collision(
            &world,
            &core,
            SPAWN_POSITION.offset(32.0, 0.0)
        ));
    }

    #[test]
    fn test_characters_on_other_maps_do_not_collide() {
        let (mut world, core) = world_with_player();
        world.login("bob");
        world.move_player("bob", "2", SPAWN_POSITION.offset(32.0, 0.0));
        assert!(!has_collision(
            &world,
            &core,
            SPAWN_POSITION.offset(32.0, 0.0)
        ));
    }

    #[test]
    fn test_warp_lookup_first_corner_wins() {
        let (mut world, core) = world_with_player();
        {
            let map = world.map_mut(FIRST_MAP_ID).unwrap();
            map.tiles[2][2].warp = Some(shared::Warp {
                to: "2".to_string(),
                position: Position { x: 64.0, y: 64.0 },
            });
            map.tiles[2][3].warp = Some(shared::Warp {
                to: "2".to_string(),
                position: Position { x: 128.0, y: 128.0 },
            });
        }
        // Box straddles both warp tiles; the top-left corner's tile wins.
        let straddling = Position {
            x: 2.0 * TILE_SIZE + 32.0,
            y: 2.0 * TILE_SIZE,
        };
        let warp = find_warp(&world, &core, straddling).unwrap();
        assert_eq!(warp.position, Position { x: 64.0, y: 64.0 });
    }

    #[test]
    fn test_no_warp_on_plain_tiles() {
        let (world, core) = world_with_player();
        assert!(find_warp(&world, &core, core.position).is_none());
    }

    #[test]
    fn test_predicates_do_not_mutate() {
        let (world, core) = world_with_player();
        let before = world.snapshot(FIRST_MAP_ID).unwrap();
        let _ = has_collision(&world, &core, core.position.offset(TILE_SIZE, 0.0));
        let _ = find_warp(&world, &core, core.position.offset(TILE_SIZE, 0.0));
        assert_eq!(world.snapshot(FIRST_MAP_ID).unwrap(), before);
    }

    #[test]
    fn test_dead_characters_do_not_block() {
        let (mut world, core) = world_with_player();
        let target = SPAWN_POSITION.offset(TILE_SIZE, 0.0);
        // Park a dead NPC on the target tile.
        let instance = {
            let map = world.map(FIRST_MAP_ID).unwrap();
            map.npcs.keys().next().unwrap().clone()
        };
        {
            let npc = world.npc_mut(FIRST_MAP_ID, &instance).unwrap();
            npc.core.position = target;
            npc.core.health = 0.0;
        }
        assert!(!has_collision(&world, &core, target));
    }

    #[test]
    fn test_missing_map_never_collides() {
        let (world, mut core) = world_with_player();
        core.map_id = "nowhere".to_string();
        assert!(!has_collision(&world, &core, Position { x: 0.0, y: 0.0 }));
        assert!(find_warp(&world, &core, Position { x: 0.0, y: 0.0 }).is_none());
    }

    #[test]
    fn test_default_tiles_are_walkable() {
        let tile = Tile::default();
        assert!(!tile.blocked);
        assert!(tile.warp.is_none());
    }
}
