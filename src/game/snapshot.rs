//! World snapshot assembly
//!
//! One full snapshot per tick: every player's public fields, every live
//! projectile, power-up pad, dropped weapon, breakable object, and the
//! team scoreboard. Derived fields (`shield_active`, `reload_left`) are
//! computed from the absolute timers at build time.

use crate::net::protocol::{
    DroppedWeaponSnapshot, ObjectSnapshot, PlayerSnapshot, PowerUpSnapshot, ProjectileSnapshot,
    ServerMsg,
};

use super::world::World;

impl World {
    pub fn build_world_snapshot(&self, now: f64) -> ServerMsg {
        let mut players: Vec<PlayerSnapshot> = self
            .players
            .values()
            .map(|p| PlayerSnapshot {
                player_id: p.id,
                name: p.name.clone(),
                x: p.x,
                y: p.y,
                vx: p.vx,
                vy: p.vy,
                facing: p.facing,
                team_id: p.team_id,
                alive: p.alive,
                hp: p.hp,
                shield_active: p.is_shielded(now),
                weapon: p.weapon,
                coins: p.coins,
                reload_left: (p.reload_until - now).max(0.0),
            })
            .collect();
        players.sort_by_key(|p| p.player_id);

        let mut projectiles: Vec<ProjectileSnapshot> = self
            .projectiles
            .values()
            .map(|pr| ProjectileSnapshot {
                proj_id: pr.id,
                x: pr.x,
                y: pr.y,
                vx: pr.vx,
                vy: pr.vy,
                team_id: pr.team_id,
                weapon_id: pr.weapon,
            })
            .collect();
        projectiles.sort_by_key(|pr| pr.proj_id);

        let mut power_ups: Vec<PowerUpSnapshot> = self
            .power_ups
            .values()
            .map(|pu| PowerUpSnapshot {
                pu_id: pu.id,
                pu_type: pu.kind,
                x: pu.x,
                y: pu.y,
                active: pu.active,
                lifetime: pu.lifetime_timer,
            })
            .collect();
        power_ups.sort_by_key(|pu| pu.pu_id);

        let mut dropped_weapons: Vec<DroppedWeaponSnapshot> = self
            .dropped_weapons
            .values()
            .map(|d| DroppedWeaponSnapshot {
                drop_id: d.id,
                weapon_id: d.weapon,
                x: d.x,
                y: d.y,
                lifetime: d.lifetime,
            })
            .collect();
        dropped_weapons.sort_by_key(|d| d.drop_id);

        let mut objects: Vec<ObjectSnapshot> = self
            .objects
            .values()
            .map(|o| ObjectSnapshot {
                object_id: o.id,
                kind: o.kind,
                x: o.x,
                y: o.y,
                hp: o.hp,
                max_hp: o.max_hp,
                alive: o.alive,
            })
            .collect();
        objects.sort_by_key(|o| o.object_id);

        ServerMsg::World {
            players,
            projectiles,
            power_ups,
            dropped_weapons,
            objects,
            team_kills: self.team_kills.clone(),
        }
    }
}
