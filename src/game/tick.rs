//! The fixed-rate tick engine
//!
//! One pass per tick, in a fixed order: fall deaths, respawn countdowns,
//! sub-stepped projectile advance, power-up lifecycle, dropped-weapon
//! lifecycle, then the world snapshot broadcast. Everything runs under the
//! world lock, so a tick's effects are atomic to observers.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::net::protocol::{PowerUpKind, ServerMsg};
use crate::util::time::now_secs;

use super::entities::{PowerUp, Projectile, ITEM_SIZE, PLAYER_H, PLAYER_W};
use super::world::World;
use super::{
    MAX_SUBSTEP_PX, POWER_UP_LIFETIME, POWER_UP_RESPAWN_JITTER, POWER_UP_RESPAWN_TIME,
    POWER_UP_SPAWN_HEIGHT,
};

/// Drives `World::tick` at the configured rate until the match ends
pub async fn run(world: Arc<Mutex<World>>) {
    let (dt, tick_rate) = {
        let w = world.lock();
        (w.config.tick_delta(), w.config.tick_rate)
    };
    let mut interval =
        tokio::time::interval(Duration::from_micros(1_000_000 / tick_rate.max(1) as u64));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(tick_rate, "tick engine running");

    loop {
        interval.tick().await;
        let mut w = world.lock();
        if w.game_over {
            break;
        }
        if w.game_started && !w.players.is_empty() {
            w.tick(dt, now_secs());
        }
    }
    info!("tick engine stopped");
}

enum Fate {
    Alive,
    Consumed,
}

impl World {
    /// One simulation step. The phase order is load-bearing.
    pub fn tick(&mut self, dt: f32, now: f64) {
        self.tick_fall_deaths();
        self.tick_respawns(dt, now);
        self.tick_projectiles(dt, now);
        self.tick_power_ups(dt, now);
        self.tick_dropped_weapons(dt);

        let snapshot = self.build_world_snapshot(now);
        self.broadcast(&snapshot);
    }

    /// Anyone below the map's lower bound dies with no credited killer
    fn tick_fall_deaths(&mut self) {
        let fallen: Vec<u32> = self
            .players
            .values()
            .filter(|p| p.alive && self.map.below_world(p.y))
            .map(|p| p.id)
            .collect();
        for player_id in fallen {
            debug!(player_id, "fell below the world");
            self.kill_player(player_id, None);
        }
    }

    fn tick_respawns(&mut self, dt: f32, now: f64) {
        let mut due = Vec::new();
        for p in self.players.values_mut() {
            if !p.alive && p.respawn_timer > 0.0 {
                p.respawn_timer -= dt;
                if p.respawn_timer <= 0.0 {
                    due.push(p.id);
                }
            }
        }
        for player_id in due {
            self.respawn_player(player_id, now);
        }
    }

    fn tick_projectiles(&mut self, dt: f32, now: f64) {
        let mut ids: Vec<u32> = self.projectiles.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let Some(mut proj) = self.projectiles.remove(&id) else {
                continue;
            };
            if let Fate::Alive = self.step_projectile(&mut proj, dt, now) {
                self.projectiles.insert(id, proj);
            }
        }
    }

    /// Advance one projectile across the tick in sub-steps short enough
    /// that no hitbox narrower than a step can be tunneled through
    fn step_projectile(&mut self, proj: &mut Projectile, dt: f32, now: f64) -> Fate {
        let dx = proj.vx * dt * 60.0;
        let dy = proj.vy * dt * 60.0;
        let len = (dx * dx + dy * dy).sqrt();
        let steps = (len / MAX_SUBSTEP_PX).ceil().max(1.0);
        let (sx, sy, step_len) = (dx / steps, dy / steps, len / steps);

        for _ in 0..steps as u32 {
            proj.x += sx;
            proj.y += sy;
            proj.dist += step_len;

            // Range budget first: an exhausted bullet expires without
            // damage, which is what keeps short-range weapons short
            if proj.dist >= proj.range_px {
                return Fate::Consumed;
            }
            if self.map.projectile_out_of_bounds(proj.x, proj.y) {
                return Fate::Consumed;
            }

            let victim = self
                .players
                .values()
                .find(|p| {
                    p.alive
                        && p.id != proj.owner_id
                        && p.team_id != proj.team_id
                        && !p.is_shielded(now)
                        && proj.hits(p.x, p.y, PLAYER_W, PLAYER_H)
                })
                .map(|p| p.id);
            if let Some(victim_id) = victim {
                self.apply_player_hit(proj, victim_id);
                return Fate::Consumed;
            }

            let object = self
                .objects
                .values()
                .find(|o| {
                    o.alive && {
                        let spec = o.kind.spec();
                        proj.hits(o.x, o.y, spec.width, spec.height)
                    }
                })
                .map(|o| o.id);
            if let Some(object_id) = object {
                self.apply_object_hit(proj, object_id);
                return Fate::Consumed;
            }
        }

        // Wall-clock safety net against stuck entities
        proj.lifetime -= dt;
        if proj.lifetime <= 0.0 {
            return Fate::Consumed;
        }
        Fate::Alive
    }

    fn apply_player_hit(&mut self, proj: &Projectile, victim_id: u32) {
        let hp = {
            let Some(victim) = self.players.get_mut(&victim_id) else {
                return;
            };
            victim.hp = (victim.hp - proj.damage).max(0);
            victim.hp
        };
        self.broadcast(&ServerMsg::ProjectileHit {
            proj_id: proj.id,
            victim_id,
            damage: proj.damage,
            hp,
        });
        if hp <= 0 {
            self.kill_player(victim_id, Some(proj.owner_id));
        }
    }

    fn apply_object_hit(&mut self, proj: &Projectile, object_id: u32) {
        let (hp, destroyed, coin_min, coin_max) = {
            let Some(obj) = self.objects.get_mut(&object_id) else {
                return;
            };
            obj.hp = (obj.hp - proj.damage).max(0);
            let destroyed = obj.hp <= 0;
            if destroyed {
                obj.alive = false;
            }
            let spec = obj.kind.spec();
            (obj.hp, destroyed, spec.coin_min, spec.coin_max)
        };
        self.broadcast(&ServerMsg::ObjectHit {
            object_id,
            damage: proj.damage,
            hp,
        });
        if destroyed {
            let coin_bonus = self.rng.gen_range(coin_min..=coin_max);
            let coins = self.players.get_mut(&proj.owner_id).map(|p| {
                p.coins += coin_bonus;
                p.coins
            });
            if let Some(coins) = coins {
                self.send_to(proj.owner_id, &ServerMsg::CoinsUpdate { coins });
            }
            debug!(object_id, coin_bonus, "object destroyed");
            self.broadcast(&ServerMsg::ObjectDestroyed {
                object_id,
                shooter_id: proj.owner_id,
                coin_bonus,
            });
        }
    }

    fn tick_power_ups(&mut self, dt: f32, now: f64) {
        let mut ids: Vec<u32> = self.power_ups.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let Some(mut pu) = self.power_ups.remove(&id) else {
                continue;
            };
            self.step_power_up(&mut pu, dt, now);
            self.power_ups.insert(id, pu);
        }
    }

    fn step_power_up(&mut self, pu: &mut PowerUp, dt: f32, now: f64) {
        if !pu.active {
            pu.respawn_timer -= dt;
            if pu.respawn_timer <= 0.0 {
                // Reactivate on a fresh tile and rotate to the next kind
                let (x, y) = self
                    .map
                    .random_floor_position(&mut self.rng, POWER_UP_SPAWN_HEIGHT);
                pu.x = x;
                pu.y = y;
                pu.active = true;
                pu.lifetime_timer = POWER_UP_LIFETIME;
                pu.respawn_timer = 0.0;
                pu.kind = pu.kind.next();
            }
            return;
        }

        pu.lifetime_timer -= dt;
        if pu.lifetime_timer <= 0.0 {
            pu.active = false;
            pu.lifetime_timer = 0.0;
            pu.respawn_timer = self.jittered_respawn_delay();
            self.broadcast(&ServerMsg::PowerupExpired { pu_id: pu.id });
            return;
        }

        let taker = self
            .players
            .values()
            .find(|p| p.alive && p.overlaps(pu.x, pu.y, ITEM_SIZE, ITEM_SIZE))
            .map(|p| p.id);
        if let Some(player_id) = taker {
            pu.active = false;
            pu.lifetime_timer = 0.0;
            pu.respawn_timer = self.jittered_respawn_delay();
            let duration = pu.kind.duration();
            // Server-enforced effects land on the player before the
            // pickup event goes out
            if let Some(p) = self.players.get_mut(&player_id) {
                match pu.kind {
                    PowerUpKind::Shield => p.shield_until = now + duration,
                    PowerUpKind::RapidFire => p.rapid_fire_until = now + duration,
                    // Movement kinds only change client-side physics
                    PowerUpKind::Speed | PowerUpKind::Jump | PowerUpKind::DoubleJump => {}
                }
            }
            info!(player_id, kind = ?pu.kind, "power-up picked up");
            self.broadcast(&ServerMsg::PowerupPickup {
                pu_id: pu.id,
                pu_type: pu.kind,
                player_id,
                duration,
            });
        }
    }

    /// Jitter keeps the pads from reappearing in synchronized waves
    fn jittered_respawn_delay(&mut self) -> f32 {
        POWER_UP_RESPAWN_TIME + self.rng.gen_range(0.0..POWER_UP_RESPAWN_JITTER)
    }

    fn tick_dropped_weapons(&mut self, dt: f32) {
        let ids: Vec<u32> = self.dropped_weapons.keys().copied().collect();
        for id in ids {
            let expired = {
                let Some(drop) = self.dropped_weapons.get_mut(&id) else {
                    continue;
                };
                drop.lifetime -= dt;
                if drop.pickup_delay > 0.0 {
                    drop.pickup_delay = (drop.pickup_delay - dt).max(0.0);
                }
                drop.lifetime <= 0.0
            };
            if expired {
                self.dropped_weapons.remove(&id);
                self.broadcast(&ServerMsg::WeaponGone { drop_id: id });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::world::test_support::*;
    use super::super::{entities::DroppedWeapon, KILL_COIN_REWARD, STARTING_COINS};
    use super::*;
    use crate::net::protocol::WeaponId;

    const DT: f32 = 0.05;
    /// Far enough in the future that start-of-match shields have lapsed
    const NOW: f64 = 1_000.0;

    fn place(world: &mut World, id: u32, x: f32, y: f32) {
        let p = world.players.get_mut(&id).expect("player");
        p.x = x;
        p.y = y;
    }

    #[test]
    fn fast_projectile_cannot_tunnel_through_a_player() {
        let mut world = test_world();
        let (a, _rx_a, b, _rx_b) = start_two_player_game(&mut world);
        place(&mut world, a, 100.0, 240.0);
        place(&mut world, b, 120.0, 240.0);

        // 50 px advance in a single tick, far wider than the 5 px target
        let proj = Projectile::new(0, a, 0, 100.0, 243.0, 50.0 / 3.0, 0.0, WeaponId::Pistol);
        world.projectiles.insert(0, proj);
        world.tick(DT, NOW);

        assert!(world.projectiles.is_empty());
        assert_eq!(world.players[&b].hp, 100 - 20);
    }

    #[test]
    fn projectile_expires_at_its_range_budget() {
        let mut world = test_world();
        let (a, _rx_a, _b, _rx_b) = start_two_player_game(&mut world);
        place(&mut world, a, 100.0, 100.0);

        // Shotgun pellet: 130 px budget, 18 px per tick
        let proj = Projectile::new(0, a, 0, 100.0, 103.0, 6.0, 0.0, WeaponId::Shotgun);
        world.projectiles.insert(0, proj);

        for _ in 0..7 {
            world.tick(DT, NOW);
            let p = world.projectiles.get(&0).expect("still in flight");
            assert!(p.dist < p.range_px);
        }
        world.tick(DT, NOW);
        assert!(world.projectiles.is_empty());
    }

    #[test]
    fn beyond_range_target_is_never_hit() {
        let mut world = test_world();
        let (a, _rx_a, b, _rx_b) = start_two_player_game(&mut world);
        place(&mut world, a, 100.0, 240.0);
        // Past the shotgun's 130 px reach
        place(&mut world, b, 260.0, 240.0);

        let proj = Projectile::new(0, a, 0, 100.0, 243.0, 6.0, 0.0, WeaponId::Shotgun);
        world.projectiles.insert(0, proj);
        for _ in 0..20 {
            world.tick(DT, NOW);
        }
        assert!(world.projectiles.is_empty());
        assert_eq!(world.players[&b].hp, 100);
    }

    #[test]
    fn friendly_fire_owner_and_shield_are_excluded() {
        let mut world = test_world();
        let (a, _rx_a, b, _rx_b) = start_two_player_game(&mut world);
        place(&mut world, a, 100.0, 240.0);
        place(&mut world, b, 120.0, 240.0);

        // Same team: passes through
        let mut proj = Projectile::new(0, a, 1, 112.0, 243.0, 7.0, 0.0, WeaponId::Pistol);
        proj.team_id = world.players[&b].team_id;
        world.projectiles.insert(0, proj);
        world.tick(DT, NOW);
        assert_eq!(world.players[&b].hp, 100);
        world.projectiles.clear();

        // Shielded target: passes through
        world.players.get_mut(&b).expect("player").shield_until = NOW + 5.0;
        let proj = Projectile::new(1, a, 0, 112.0, 243.0, 7.0, 0.0, WeaponId::Pistol);
        world.projectiles.insert(1, proj);
        world.tick(DT, NOW);
        assert_eq!(world.players[&b].hp, 100);
    }

    #[test]
    fn lethal_hit_kills_once_and_credits_the_shooter() {
        let mut world = test_world();
        let (a, mut rx_a, b, _rx_b) = start_two_player_game(&mut world);
        place(&mut world, a, 100.0, 240.0);
        place(&mut world, b, 120.0, 240.0);
        world.players.get_mut(&b).expect("player").hp = 10;
        drain(&mut rx_a);

        let proj = Projectile::new(0, a, 0, 112.0, 243.0, 7.0, 0.0, WeaponId::Pistol);
        world.projectiles.insert(0, proj);
        world.tick(DT, NOW);

        let victim = &world.players[&b];
        assert!(!victim.alive);
        assert_eq!(victim.hp, 0);
        assert_eq!(world.players[&a].coins, STARTING_COINS + KILL_COIN_REWARD);
        assert_eq!(world.team_kills[&0], 1);

        let kills: Vec<_> = drain(&mut rx_a)
            .into_iter()
            .filter(|m| matches!(m, ServerMsg::PlayerKilled { .. }))
            .collect();
        assert_eq!(kills.len(), 1);
    }

    #[test]
    fn kill_limit_reached_mid_tick_ends_the_game() {
        let mut world = test_world();
        let (a, _rx_a, b, mut rx_b) = start_two_player_game(&mut world);
        world.team_kills.insert(0, world.config.kill_limit - 1);
        place(&mut world, a, 100.0, 240.0);
        place(&mut world, b, 120.0, 240.0);
        world.players.get_mut(&b).expect("player").hp = 5;
        drain(&mut rx_b);

        let proj = Projectile::new(0, a, 0, 112.0, 243.0, 7.0, 0.0, WeaponId::Pistol);
        world.projectiles.insert(0, proj);
        world.tick(DT, NOW);

        assert!(world.game_over);
        assert!(drain(&mut rx_b)
            .iter()
            .any(|m| matches!(m, ServerMsg::GameOver { winner_team } if *winner_team == 0)));
    }

    #[test]
    fn fall_death_is_an_environment_kill() {
        let mut world = test_world();
        let (_a, _rx_a, b, mut rx_b) = start_two_player_game(&mut world);
        place(&mut world, b, 100.0, 600.0);
        drain(&mut rx_b);

        world.tick(DT, NOW);

        assert!(!world.players[&b].alive);
        assert!(world.team_kills.values().all(|&k| k == 0));
        assert!(drain(&mut rx_b).iter().any(|m| {
            matches!(m, ServerMsg::PlayerKilled { victim_id, killer_id }
                if *victim_id == b && killer_id.is_none())
        }));
    }

    #[test]
    fn respawn_restores_and_shields_the_player() {
        let mut world = test_world();
        let (a, _rx_a, b, mut rx_b) = start_two_player_game(&mut world);
        world.kill_player(b, Some(a));
        drain(&mut rx_b);

        // 3 s countdown at 20 Hz
        for _ in 0..61 {
            world.tick(DT, NOW);
        }

        let p = &world.players[&b];
        assert!(p.alive);
        assert_eq!(p.hp, 100);
        assert!(p.is_shielded(NOW));
        assert!(drain(&mut rx_b)
            .iter()
            .any(|m| matches!(m, ServerMsg::Respawn { player_id, hp, .. } if *player_id == b && *hp == 100)));
    }

    #[test]
    fn power_up_states_stay_mutually_exclusive_through_the_cycle() {
        let mut world = test_world();
        start_two_player_game(&mut world);
        // Park the players away from every pad
        for p in world.players.values_mut() {
            p.x = -500.0;
            p.y = -500.0;
        }

        let check = |world: &World| {
            for pu in world.power_ups.values() {
                let active_running = pu.active && pu.lifetime_timer > 0.0;
                let inactive_waiting = !pu.active && pu.respawn_timer > 0.0;
                assert!(
                    active_running ^ inactive_waiting,
                    "power-up {} in impossible state: active={} lifetime={} respawn={}",
                    pu.id,
                    pu.active,
                    pu.lifetime_timer,
                    pu.respawn_timer
                );
            }
        };

        // Long enough to see every pad expire and reactivate at least once
        for _ in 0..(45.0 / DT) as u32 {
            world.tick(DT, NOW);
            check(&world);
        }
    }

    #[test]
    fn expired_power_up_rotates_kind_on_reactivation() {
        let mut world = test_world();
        start_two_player_game(&mut world);
        for p in world.players.values_mut() {
            p.x = -500.0;
            p.y = -500.0;
        }
        let kind_before = world.power_ups[&0].kind;

        {
            let pu = world.power_ups.get_mut(&0).expect("pad");
            pu.lifetime_timer = DT / 2.0;
        }
        world.tick(DT, NOW);
        assert!(!world.power_ups[&0].active);

        {
            let pu = world.power_ups.get_mut(&0).expect("pad");
            pu.respawn_timer = DT / 2.0;
        }
        world.tick(DT, NOW);
        let pu = &world.power_ups[&0];
        assert!(pu.active);
        assert_eq!(pu.kind, kind_before.next());
        assert!((pu.lifetime_timer - POWER_UP_LIFETIME).abs() < 1e-3);
    }

    #[test]
    fn shield_and_rapid_fire_pickups_apply_server_side() {
        let mut world = test_world();
        let (a, _rx_a, _b, _rx_b) = start_two_player_game(&mut world);

        {
            let pu = world.power_ups.get_mut(&0).expect("pad");
            pu.kind = PowerUpKind::Shield;
            pu.x = 300.0;
            pu.y = 300.0;
        }
        place(&mut world, a, 300.0, 298.0);
        world.tick(DT, NOW);
        assert!(!world.power_ups[&0].active);
        let p = &world.players[&a];
        assert!(p.is_shielded(NOW + 4.9));
        assert!(!p.is_shielded(NOW + 5.1));

        {
            let pu = world.power_ups.get_mut(&1).expect("pad");
            pu.kind = PowerUpKind::RapidFire;
            pu.x = 400.0;
            pu.y = 300.0;
        }
        place(&mut world, a, 400.0, 298.0);
        world.tick(DT, NOW);
        let p = &world.players[&a];
        assert!(p.rapid_fire_active(NOW + 7.9));
        assert!(!p.rapid_fire_active(NOW + 8.1));
    }

    #[test]
    fn uncollected_drop_expires_with_a_broadcast() {
        let mut world = test_world();
        let (_a, _rx_a, _b, mut rx_b) = start_two_player_game(&mut world);
        let mut drop = DroppedWeapon::new(3, WeaponId::Auto, 50.0, 50.0);
        drop.lifetime = DT / 2.0;
        world.dropped_weapons.insert(3, drop);
        drain(&mut rx_b);

        world.tick(DT, NOW);

        assert!(world.dropped_weapons.is_empty());
        assert!(drain(&mut rx_b)
            .iter()
            .any(|m| matches!(m, ServerMsg::WeaponGone { drop_id } if *drop_id == 3)));
    }

    #[test]
    fn pickup_delay_counts_down_during_ticks() {
        let mut world = test_world();
        start_two_player_game(&mut world);
        world
            .dropped_weapons
            .insert(4, DroppedWeapon::new(4, WeaponId::Auto, 50.0, 50.0));

        for _ in 0..11 {
            world.tick(DT, NOW);
        }
        assert_eq!(world.dropped_weapons[&4].pickup_delay, 0.0);
        assert!(world.dropped_weapons[&4].lifetime > 0.0);
    }

    #[test]
    fn objects_soak_hits_then_pay_out_and_stop_colliding() {
        let mut world = test_world();
        let (a, mut rx_a, _b, _rx_b) = start_two_player_game(&mut world);
        let object_id = *world
            .objects
            .iter()
            .find(|(_, o)| matches!(o.kind, crate::net::protocol::ObjectKind::Crate))
            .map(|(id, _)| id)
            .expect("crate placed at match start");
        let (ox, oy) = {
            let o = &world.objects[&object_id];
            (o.x, o.y)
        };
        place(&mut world, a, ox - 40.0, oy);
        let coins_before = world.players[&a].coins;
        drain(&mut rx_a);

        // Crate hp 30, sniper damage 70: one shot
        let proj = Projectile::new(0, a, 0, ox - 12.0, oy + 4.0, 14.0, 0.0, WeaponId::Sniper);
        world.projectiles.insert(0, proj);
        world.tick(DT, NOW);

        let obj = &world.objects[&object_id];
        assert!(!obj.alive);
        assert_eq!(obj.hp, 0);
        let bonus = world.players[&a].coins - coins_before;
        assert!((3..=8).contains(&bonus), "bonus {} out of range", bonus);

        let msgs = drain(&mut rx_a);
        assert!(msgs
            .iter()
            .any(|m| matches!(m, ServerMsg::ObjectHit { object_id: id, .. } if *id == object_id)));
        assert!(msgs.iter().any(|m| {
            matches!(m, ServerMsg::ObjectDestroyed { object_id: id, shooter_id, .. }
                if *id == object_id && *shooter_id == a)
        }));

        // A dead object no longer blocks bullets
        let proj = Projectile::new(1, a, 0, ox - 12.0, oy + 4.0, 14.0, 0.0, WeaponId::Sniper);
        world.projectiles.insert(1, proj);
        world.tick(DT, NOW);
        assert_eq!(world.objects[&object_id].hp, 0);
    }

    #[test]
    fn every_tick_broadcasts_a_world_snapshot() {
        let mut world = test_world();
        let (_a, _rx_a, _b, mut rx_b) = start_two_player_game(&mut world);
        drain(&mut rx_b);
        world.tick(DT, NOW);
        let msgs = drain(&mut rx_b);
        let world_msgs: Vec<_> = msgs
            .iter()
            .filter(|m| matches!(m, ServerMsg::World { .. }))
            .collect();
        assert_eq!(world_msgs.len(), 1);
        if let ServerMsg::World {
            players,
            power_ups,
            objects,
            team_kills,
            ..
        } = world_msgs[0]
        {
            assert_eq!(players.len(), 2);
            assert_eq!(power_ups.len(), 7);
            assert_eq!(objects.len(), 8);
            assert_eq!(team_kills.len(), 3);
        }
    }
}
