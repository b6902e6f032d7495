//! Simulation entities owned by the world store

use crate::net::protocol::{Facing, ObjectKind, PowerUpKind, WeaponId};

use super::{DROPPED_WEAPON_LIFE, DROP_PICKUP_DELAY, PLAYER_MAX_HP, STARTING_COINS};

/// Player hitbox in world pixels
pub const PLAYER_W: f32 = 5.0;
pub const PLAYER_H: f32 = 13.0;

/// Projectile hitbox
pub const PROJECTILE_SIZE: f32 = 4.0;

/// Power-up and dropped-weapon hitbox
pub const ITEM_SIZE: f32 = 10.0;

/// Strict AABB overlap, open on the touching edge
pub fn aabb_overlap(
    ax: f32,
    ay: f32,
    aw: f32,
    ah: f32,
    bx: f32,
    by: f32,
    bw: f32,
    bh: f32,
) -> bool {
    ax < bx + bw && ax + aw > bx && ay < by + bh && ay + ah > by
}

/// Authoritative per-player state
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: u32,
    pub name: String,
    /// -1 until a team is chosen in the lobby
    pub team_id: i32,
    pub ready: bool,

    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub on_ground: bool,
    pub facing: Facing,

    pub alive: bool,
    pub hp: i32,
    /// Seconds until revival while dead
    pub respawn_timer: f32,

    pub weapon: WeaponId,
    pub coins: i32,
    pub kills: u32,

    // Absolute expiry timestamps (unix seconds) so effect durations
    // survive message loss
    pub shield_until: f64,
    pub rapid_fire_until: f64,
    pub reload_until: f64,
}

impl PlayerState {
    pub fn new(id: u32, name: String) -> Self {
        Self {
            id,
            name,
            team_id: -1,
            ready: false,
            x: 100.0,
            y: 100.0,
            vx: 0.0,
            vy: 0.0,
            on_ground: false,
            facing: Facing::Right,
            alive: true,
            hp: PLAYER_MAX_HP,
            respawn_timer: 0.0,
            weapon: WeaponId::Pistol,
            coins: STARTING_COINS,
            kills: 0,
            shield_until: 0.0,
            rapid_fire_until: 0.0,
            reload_until: 0.0,
        }
    }

    pub fn is_shielded(&self, now: f64) -> bool {
        now < self.shield_until
    }

    pub fn rapid_fire_active(&self, now: f64) -> bool {
        now < self.rapid_fire_until
    }

    pub fn overlaps(&self, bx: f32, by: f32, bw: f32, bh: f32) -> bool {
        aabb_overlap(self.x, self.y, PLAYER_W, PLAYER_H, bx, by, bw, bh)
    }
}

/// A live bullet. `dist` accumulates sub-step travel against the
/// `range_px` budget; `lifetime` is a wall-clock fallback only.
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u32,
    pub owner_id: u32,
    pub team_id: i32,
    pub x: f32,
    pub y: f32,
    /// px per 1/60 s frame, advanced `v * dt * 60` per tick
    pub vx: f32,
    pub vy: f32,
    pub range_px: f32,
    pub dist: f32,
    pub lifetime: f32,
    pub damage: i32,
    pub weapon: WeaponId,
}

impl Projectile {
    pub fn new(id: u32, owner_id: u32, team_id: i32, x: f32, y: f32, vx: f32, vy: f32, weapon: WeaponId) -> Self {
        let spec = weapon.spec();
        // Nominal flight time, padded so the range budget is always what
        // actually terminates the bullet
        let lifetime = spec.range_px / (spec.bullet_speed * 60.0) + 1.0;
        Self {
            id,
            owner_id,
            team_id,
            x,
            y,
            vx,
            vy,
            range_px: spec.range_px,
            dist: 0.0,
            lifetime,
            damage: spec.damage,
            weapon,
        }
    }

    pub fn hits(&self, bx: f32, by: f32, bw: f32, bh: f32) -> bool {
        aabb_overlap(self.x, self.y, PROJECTILE_SIZE, PROJECTILE_SIZE, bx, by, bw, bh)
    }
}

/// A power-up pad: either active with a lifetime running, or inactive with
/// a respawn countdown. Never both.
#[derive(Debug, Clone)]
pub struct PowerUp {
    pub id: u32,
    pub kind: PowerUpKind,
    pub x: f32,
    pub y: f32,
    pub active: bool,
    pub respawn_timer: f32,
    pub lifetime_timer: f32,
}

impl PowerUp {
    pub fn new(id: u32, kind: PowerUpKind, x: f32, y: f32, lifetime: f32) -> Self {
        Self {
            id,
            kind,
            x,
            y,
            active: true,
            respawn_timer: 0.0,
            lifetime_timer: lifetime,
        }
    }
}

/// A weapon lying on the ground after its owner died
#[derive(Debug, Clone)]
pub struct DroppedWeapon {
    pub id: u32,
    pub weapon: WeaponId,
    pub x: f32,
    pub y: f32,
    pub lifetime: f32,
    /// Collectible only once this has run out
    pub pickup_delay: f32,
}

impl DroppedWeapon {
    pub fn new(id: u32, weapon: WeaponId, x: f32, y: f32) -> Self {
        Self {
            id,
            weapon,
            x,
            y,
            lifetime: DROPPED_WEAPON_LIFE,
            pickup_delay: DROP_PICKUP_DELAY,
        }
    }
}

/// Scenery that soaks damage and pays out coins when destroyed
#[derive(Debug, Clone)]
pub struct BreakableObject {
    pub id: u32,
    pub kind: ObjectKind,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub alive: bool,
}

impl BreakableObject {
    pub fn new(id: u32, kind: ObjectKind, x: f32, y: f32) -> Self {
        let spec = kind.spec();
        Self {
            id,
            kind,
            x,
            y,
            hp: spec.hp,
            max_hp: spec.hp,
            alive: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::POWER_UP_LIFETIME;
    use super::*;

    #[test]
    fn new_player_starts_unassigned_and_armed_with_pistol() {
        let p = PlayerState::new(3, "ana".into());
        assert_eq!(p.team_id, -1);
        assert!(!p.ready);
        assert_eq!(p.weapon, WeaponId::Pistol);
        assert_eq!(p.coins, STARTING_COINS);
        assert_eq!(p.hp, PLAYER_MAX_HP);
    }

    #[test]
    fn shield_window_is_an_absolute_timestamp() {
        let mut p = PlayerState::new(1, "bo".into());
        p.shield_until = 100.0;
        assert!(p.is_shielded(99.9));
        assert!(!p.is_shielded(100.0));
    }

    #[test]
    fn aabb_touching_edges_do_not_overlap() {
        assert!(!aabb_overlap(0.0, 0.0, 4.0, 4.0, 4.0, 0.0, 5.0, 13.0));
        assert!(aabb_overlap(0.0, 0.0, 4.0, 4.0, 3.9, 0.0, 5.0, 13.0));
    }

    #[test]
    fn projectile_inherits_weapon_budget() {
        let proj = Projectile::new(0, 1, 0, 0.0, 0.0, 7.0, 0.0, WeaponId::Pistol);
        assert_eq!(proj.range_px, 240.0);
        assert_eq!(proj.damage, 20);
        assert_eq!(proj.dist, 0.0);
        // safety fallback comfortably exceeds the nominal flight time
        assert!(proj.lifetime > 240.0 / (7.0 * 60.0));
    }

    #[test]
    fn power_up_starts_active_with_lifetime_running() {
        let pu = PowerUp::new(0, PowerUpKind::Speed, 10.0, 10.0, POWER_UP_LIFETIME);
        assert!(pu.active);
        assert!(pu.lifetime_timer > 0.0);
        assert_eq!(pu.respawn_timer, 0.0);
    }

    #[test]
    fn breakable_object_takes_stats_from_kind() {
        let obj = BreakableObject::new(0, ObjectKind::Barrel, 5.0, 5.0);
        assert_eq!(obj.hp, 40);
        assert_eq!(obj.max_hp, 40);
        assert!(obj.alive);
    }
}
