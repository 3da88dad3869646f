// navigation.rs - Path agents and the repath system
//
// `NavigationSystem` owns the level bounds and cell size. Each agent's timer
// counts down; when it expires the occupancy grid is rebuilt from every
// `StaticCollider` and a fresh A* route toward the player is stored.
// `follow_path` consumes the waypoints.

use crate::components::{Position, StaticCollider};
use crate::pathfinding::find_world_path;
use crate::systems::player_position;
use gloam_core::ecs::{Component, World};
use gloam_core::math::{Aabb, Vec2};

/// Waypoints toward the current goal plus the repath schedule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathAgent {
    pub waypoints: Vec<Vec2>,
    pub next: usize,
    pub repath_interval: f32,
    pub repath_timer: f32,
}

impl PathAgent {
    /// Agent that plans on its first update and every `repath_interval`
    /// seconds after that.
    pub fn new(repath_interval: f32) -> Self {
        Self {
            repath_interval,
            ..Self::default()
        }
    }

    pub fn set_path(&mut self, waypoints: Vec<Vec2>) {
        self.waypoints = waypoints;
        self.next = 0;
    }

    pub fn clear(&mut self) {
        self.waypoints.clear();
        self.next = 0;
    }

    /// True when there is nothing left to follow, including no path at all.
    pub fn is_complete(&self) -> bool {
        self.next >= self.waypoints.len()
    }

    pub fn current_waypoint(&self) -> Option<Vec2> {
        self.waypoints.get(self.next).copied()
    }

    /// Skip waypoints that are reached or already passed and return the one
    /// to steer toward. A waypoint counts as passed when the one after it
    /// is closer to `position`.
    pub fn steer_target(&mut self, position: Vec2, tolerance: f32) -> Option<Vec2> {
        while let Some(waypoint) = self.current_waypoint() {
            let distance = waypoint.distance(position);
            let passed = self
                .waypoints
                .get(self.next + 1)
                .is_some_and(|after| after.distance(position) < distance);
            if distance > tolerance && !passed {
                return Some(waypoint);
            }
            self.next += 1;
        }
        None
    }

    /// Count the repath timer down. True when a new path is due.
    fn repath_due(&mut self, dt: f32) -> bool {
        self.repath_timer -= dt;
        if self.repath_timer > 0.0 {
            return false;
        }
        self.repath_timer = self.repath_interval;
        true
    }
}

pub struct NavigationSystem {
    bounds: Aabb,
    cell_size: f32,
}

impl NavigationSystem {
    pub fn new(bounds: Aabb, cell_size: f32) -> Self {
        Self { bounds, cell_size }
    }

    pub fn update(&mut self, world: &mut World, dt: f32) {
        let agents = world.entities_with(PathAgent::kind());
        if agents.is_empty() {
            return;
        }
        let player = player_position(world);
        let colliders: Vec<Aabb> = world
            .iter(StaticCollider::kind())
            .map(|(_, collider)| collider.0)
            .collect();

        for entity in agents {
            let Some(from) = world.get(entity, Position::kind()).map(|p| p.0) else {
                continue;
            };
            let Some(agent) = world.get_mut(entity, PathAgent::kind()) else {
                continue;
            };
            if !agent.repath_due(dt) {
                continue;
            }
            match player {
                Some(goal) => {
                    let path = find_world_path(self.bounds, self.cell_size, &colliders, from, goal);
                    tracing::debug!(%entity, nodes = path.len(), "path recomputed");
                    agent.set_path(path);
                }
                None => agent.clear(),
            }
        }
    }
}
