//! Game simulation modules

pub mod dispatch;
pub mod entities;
pub mod snapshot;
pub mod tick;
pub mod weapons;
pub mod world;

pub use world::World;

/// Core balance constants. Weapon, power-up, and object tables live in
/// [`weapons`].
pub const PLAYER_MAX_HP: i32 = 100;
pub const RESPAWN_DELAY: f32 = 3.0;

pub const STARTING_COINS: i32 = 30;
pub const KILL_COIN_REWARD: i32 = 15;

pub const SHOP_X: f32 = 464.0;
pub const SHOP_Y: f32 = 256.0;
pub const SHOP_RADIUS: f32 = 60.0;

pub const DROPPED_WEAPON_LIFE: f32 = 20.0;
pub const DROP_PICKUP_DELAY: f32 = 0.5;

pub const NUM_POWER_UPS: u32 = 7;
pub const POWER_UP_LIFETIME: f32 = 12.0;
pub const POWER_UP_RESPAWN_TIME: f32 = 15.0;
/// Uniform extra delay on reactivation, so pads never pulse in lockstep
pub const POWER_UP_RESPAWN_JITTER: f32 = 4.0;
/// Extra initial lifetime per pad slot at match start
pub const POWER_UP_LIFETIME_STAGGER: f32 = 1.5;

/// Shield granted at match start
pub const INITIAL_SHIELD_SECS: f64 = 3.0;
/// Shield granted after each respawn
pub const RESPAWN_SHIELD_SECS: f64 = 2.0;
/// Reload multiplier while rapid fire is active
pub const RAPID_FIRE_RELOAD_FACTOR: f64 = 0.5;

/// Max projectile advance per collision sub-step
pub const MAX_SUBSTEP_PX: f32 = 2.0;

/// Spawn heights passed to the map oracle
pub const PLAYER_SPAWN_HEIGHT: f32 = 13.0;
pub const POWER_UP_SPAWN_HEIGHT: f32 = 10.0;

/// Fixed per-team spawn slot lists used at match start, before random
/// respawn placement takes over
pub const TEAM_SPAWN_AREAS: [&[(f32, f32)]; 3] = [
    &[(48.0, 248.0), (64.0, 248.0), (80.0, 248.0)],
    &[(896.0, 248.0), (880.0, 248.0), (864.0, 248.0)],
    &[(240.0, 212.0), (256.0, 212.0), (272.0, 212.0)],
];

pub fn team_spawn_slots(team_id: i32) -> &'static [(f32, f32)] {
    usize::try_from(team_id)
        .ok()
        .and_then(|t| TEAM_SPAWN_AREAS.get(t))
        .copied()
        .unwrap_or(TEAM_SPAWN_AREAS[0])
}
