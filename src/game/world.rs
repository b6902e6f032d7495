//! The world: every simulation entity, the outbound connection registry,
//! and match orchestration (start, death processing, respawn, win check).
//!
//! One instance lives behind a single `Mutex`; connection readers and the
//! tick task take turns holding it. Nothing here blocks: outbound sends are
//! `try_send` into per-connection buffers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::config::Config;
use crate::map::GameMap;
use crate::net::protocol::{Facing, PowerUpKind, ServerMsg, WeaponId};

use super::entities::{BreakableObject, DroppedWeapon, PlayerState, PowerUp, Projectile};
use super::weapons::{weapon_table, OBJECT_LAYOUT};
use super::{
    team_spawn_slots, INITIAL_SHIELD_SECS, KILL_COIN_REWARD, NUM_POWER_UPS, PLAYER_MAX_HP,
    PLAYER_SPAWN_HEIGHT, POWER_UP_LIFETIME, POWER_UP_LIFETIME_STAGGER, POWER_UP_SPAWN_HEIGHT,
    RAPID_FIRE_RELOAD_FACTOR, RESPAWN_DELAY, RESPAWN_SHIELD_SECS, SHOP_X, SHOP_Y, STARTING_COINS,
};

/// Outbound lines buffered per connection before drop-on-overflow kicks in
const OUTBOUND_BUFFER: usize = 256;

pub struct World {
    pub config: Arc<Config>,
    pub map: Arc<GameMap>,

    pub players: HashMap<u32, PlayerState>,
    conns: HashMap<u32, mpsc::Sender<String>>,
    pub projectiles: HashMap<u32, Projectile>,
    pub power_ups: HashMap<u32, PowerUp>,
    pub dropped_weapons: HashMap<u32, DroppedWeapon>,
    pub objects: HashMap<u32, BreakableObject>,

    /// Running team scoreboard for the O(1) kill-limit check
    pub team_kills: BTreeMap<i32, u32>,

    next_conn_id: u32,
    next_proj_id: u32,
    next_drop_id: u32,
    next_object_id: u32,

    pub game_started: bool,
    pub game_over: bool,

    pub rng: ChaCha8Rng,
    shutdown_tx: watch::Sender<bool>,
}

impl World {
    pub fn new(config: Arc<Config>, map: Arc<GameMap>) -> Self {
        let rng = match config.game_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            map,
            players: HashMap::new(),
            conns: HashMap::new(),
            projectiles: HashMap::new(),
            power_ups: HashMap::new(),
            dropped_weapons: HashMap::new(),
            objects: HashMap::new(),
            team_kills: BTreeMap::new(),
            next_conn_id: 0,
            next_proj_id: 0,
            next_drop_id: 0,
            next_object_id: 0,
            game_started: false,
            game_over: false,
            rng,
            shutdown_tx,
        }
    }

    // ── Connections ──────────────────────────────────────────────────────

    /// Admit a new connection, or refuse once the table is full or a match
    /// is already running (no mid-match joins).
    pub fn try_register_connection(&mut self) -> Option<(u32, mpsc::Receiver<String>)> {
        if self.game_started || self.conns.len() >= self.config.max_players {
            return None;
        }
        let id = self.next_conn_id;
        self.next_conn_id += 1;
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        self.conns.insert(id, tx);
        Some((id, rx))
    }

    /// Disconnect cleanup; safe to call for ids that never joined
    pub fn disconnect(&mut self, player_id: u32) {
        self.conns.remove(&player_id);
        if self.players.remove(&player_id).is_some() {
            info!(player_id, "player disconnected");
            self.broadcast(&ServerMsg::PlayerLeft { player_id });
            if !self.game_started {
                let lobby = self.lobby_update();
                self.broadcast(&lobby);
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.conns.len()
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn signal_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    // ── Outbound messaging ───────────────────────────────────────────────

    pub fn send_to(&self, player_id: u32, msg: &ServerMsg) {
        let Some(tx) = self.conns.get(&player_id) else {
            return;
        };
        match serde_json::to_string(msg) {
            Ok(line) => Self::push_line(tx, player_id, line),
            Err(e) => warn!(player_id, error = %e, "failed to encode message"),
        }
    }

    /// Encode once, fan out to every connection
    pub fn broadcast(&self, msg: &ServerMsg) {
        let line = match serde_json::to_string(msg) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to encode broadcast");
                return;
            }
        };
        for (&player_id, tx) in &self.conns {
            Self::push_line(tx, player_id, line.clone());
        }
    }

    fn push_line(tx: &mpsc::Sender<String>, player_id: u32, line: String) {
        match tx.try_send(line) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                // A stalled client loses messages; the tick never waits
                warn!(player_id, "outbound buffer full, dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    // ── Lobby ────────────────────────────────────────────────────────────

    pub fn lobby_update(&self) -> ServerMsg {
        let mut players: Vec<_> = self
            .players
            .values()
            .map(|p| crate::net::protocol::LobbyPlayer {
                player_id: p.id,
                name: p.name.clone(),
                team_id: p.team_id,
                ready: p.ready,
            })
            .collect();
        players.sort_by_key(|p| p.player_id);

        let mut team_counts: BTreeMap<i32, usize> = BTreeMap::new();
        for p in self.players.values() {
            if p.team_id >= 0 {
                *team_counts.entry(p.team_id).or_insert(0) += 1;
            }
        }

        ServerMsg::LobbyUpdate {
            players,
            team_counts,
            game_started: self.game_started,
        }
    }

    /// Match starts once at least two players are connected and every one
    /// of them has a team and is ready
    pub fn all_ready(&self) -> bool {
        if self.players.len() < 2 {
            return false;
        }
        self.players.values().all(|p| p.team_id >= 0 && p.ready)
    }

    // ── Match start ──────────────────────────────────────────────────────

    pub fn start_game(&mut self, now: f64) {
        self.game_started = true;
        for team in 0..self.config.num_teams {
            self.team_kills.insert(team, 0);
        }

        // Round-robin each team's members over its fixed spawn slots,
        // in join order
        let mut ids: Vec<u32> = self.players.keys().copied().collect();
        ids.sort_unstable();
        let mut slot_by_team: HashMap<i32, usize> = HashMap::new();
        for pid in &ids {
            let Some(p) = self.players.get_mut(pid) else {
                continue;
            };
            let slots = team_spawn_slots(p.team_id);
            let slot = slot_by_team.entry(p.team_id).or_insert(0);
            let (sx, sy) = slots[*slot % slots.len()];
            *slot += 1;

            p.x = sx;
            p.y = sy;
            p.vx = 0.0;
            p.vy = 0.0;
            p.alive = true;
            p.hp = PLAYER_MAX_HP;
            p.weapon = WeaponId::Pistol;
            p.coins = STARTING_COINS;
            p.kills = 0;
            p.respawn_timer = 0.0;
            p.reload_until = 0.0;
            p.rapid_fire_until = 0.0;
            p.shield_until = now + INITIAL_SHIELD_SECS;
        }

        // Power-up pads at random floor tiles. Lifetimes are staggered so
        // the pads never all expire on the same tick.
        let mut kinds = PowerUpKind::ROTATION.to_vec();
        kinds.shuffle(&mut self.rng);
        for i in 0..NUM_POWER_UPS {
            let kind = kinds[i as usize % kinds.len()];
            let (x, y) = self
                .map
                .random_floor_position(&mut self.rng, POWER_UP_SPAWN_HEIGHT);
            let lifetime = POWER_UP_LIFETIME + i as f32 * POWER_UP_LIFETIME_STAGGER;
            self.power_ups.insert(i, PowerUp::new(i, kind, x, y, lifetime));
        }

        for &(kind, x, y) in OBJECT_LAYOUT {
            let id = self.next_object_id;
            self.next_object_id += 1;
            self.objects.insert(id, BreakableObject::new(id, kind, x, y));
        }

        let weapons = weapon_table();
        for pid in &ids {
            let Some(p) = self.players.get(pid) else {
                continue;
            };
            self.send_to(
                *pid,
                &ServerMsg::GameStart {
                    spawn_x: p.x,
                    spawn_y: p.y,
                    shop_x: SHOP_X,
                    shop_y: SHOP_Y,
                    weapons: weapons.clone(),
                    kill_limit: self.config.kill_limit,
                },
            );
        }
        info!(players = ids.len(), "game started");
    }

    // ── Combat ───────────────────────────────────────────────────────────

    /// Fire the owner's weapon, gated by the reload window. Rapid fire
    /// shortens the window server-side.
    pub fn spawn_projectile(&mut self, owner_id: u32, facing: Facing, now: f64) {
        let Some(p) = self.players.get_mut(&owner_id) else {
            return;
        };
        if !p.alive || now < p.reload_until {
            return;
        }
        let weapon = p.weapon;
        let spec = weapon.spec();
        let factor = if p.rapid_fire_active(now) {
            RAPID_FIRE_RELOAD_FACTOR
        } else {
            1.0
        };
        p.reload_until = now + spec.reload_time * factor;
        let (px, py, team) = (p.x, p.y, p.team_id);

        for i in 0..spec.pellets {
            let id = self.next_proj_id;
            self.next_proj_id += 1;
            let vx = match facing {
                Facing::Right => spec.bullet_speed,
                Facing::Left => -spec.bullet_speed,
            };
            let vy = if spec.pellets > 1 {
                -((spec.pellets - 1) as f32) / 2.0 * spec.spread + i as f32 * spec.spread
            } else {
                0.0
            };
            let x = px
                + match facing {
                    Facing::Right => 5.0,
                    Facing::Left => -4.0,
                };
            let y = py + 5.0;
            self.projectiles
                .insert(id, Projectile::new(id, owner_id, team, x, y, vx, vy, weapon));
        }
    }

    /// Leave the holder's non-pistol weapon at their position
    pub fn drop_weapon(&mut self, player_id: u32) {
        let Some(p) = self.players.get_mut(&player_id) else {
            return;
        };
        if p.weapon == WeaponId::Pistol {
            return;
        }
        let weapon = p.weapon;
        p.weapon = WeaponId::Pistol;
        let (x, y) = (p.x, p.y);

        let drop_id = self.next_drop_id;
        self.next_drop_id += 1;
        self.dropped_weapons
            .insert(drop_id, DroppedWeapon::new(drop_id, weapon, x, y));
        self.broadcast(&ServerMsg::WeaponDropped {
            drop_id,
            weapon_id: weapon,
            x,
            y,
        });
    }

    /// Death processing, in order: state flip, weapon drop, killer credit,
    /// kill broadcast, win check. `killer_id` is `None` for environment
    /// kills, which credit nobody.
    pub fn kill_player(&mut self, victim_id: u32, killer_id: Option<u32>) {
        {
            let Some(victim) = self.players.get_mut(&victim_id) else {
                return;
            };
            if !victim.alive {
                return;
            }
            victim.alive = false;
            victim.hp = 0;
            victim.respawn_timer = RESPAWN_DELAY;
        }
        self.drop_weapon(victim_id);

        if let Some(kid) = killer_id {
            // The killer may have disconnected while the bullet was in
            // flight; absence just forfeits the credit
            let credited = self.players.get_mut(&kid).map(|killer| {
                killer.coins += KILL_COIN_REWARD;
                killer.kills += 1;
                (killer.team_id, killer.coins)
            });
            if let Some((team, coins)) = credited {
                self.send_to(kid, &ServerMsg::CoinsUpdate { coins });
                *self.team_kills.entry(team).or_insert(0) += 1;
            }
        }

        self.broadcast(&ServerMsg::PlayerKilled {
            victim_id,
            killer_id,
        });
        self.check_win_condition();
    }

    pub fn respawn_player(&mut self, player_id: u32, now: f64) {
        let (x, y) = self
            .map
            .random_floor_position(&mut self.rng, PLAYER_SPAWN_HEIGHT);
        let revived = self.players.get_mut(&player_id).map(|p| {
            p.x = x;
            p.y = y;
            p.vx = 0.0;
            p.vy = 0.0;
            p.alive = true;
            p.hp = PLAYER_MAX_HP;
            p.respawn_timer = 0.0;
            p.shield_until = now + RESPAWN_SHIELD_SECS;
            (p.weapon, p.coins)
        });
        if let Some((weapon, coins)) = revived {
            self.broadcast(&ServerMsg::Respawn {
                player_id,
                x,
                y,
                hp: PLAYER_MAX_HP,
                weapon,
                coins,
            });
        }
    }

    /// Fires at most once; every call after `game_over` is a no-op
    pub fn check_win_condition(&mut self) {
        if self.game_over || !self.game_started {
            return;
        }
        let winner = self
            .team_kills
            .iter()
            .find(|&(_, &kills)| kills >= self.config.kill_limit)
            .map(|(&team, _)| team);
        if let Some(winner_team) = winner {
            self.game_over = true;
            info!(winner_team, "kill limit reached, game over");
            self.broadcast(&ServerMsg::GameOver { winner_team });
            self.signal_shutdown();
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tokio::sync::mpsc::Receiver;

    pub fn test_config() -> Config {
        Config {
            server_addr: "127.0.0.1:0".parse().expect("test addr"),
            log_level: "debug".to_string(),
            max_players: 6,
            num_teams: 3,
            tick_rate: 20,
            kill_limit: 15,
            map_file: None,
            game_seed: Some(42),
        }
    }

    pub fn test_world() -> World {
        World::new(
            Arc::new(test_config()),
            Arc::new(GameMap::default_layout()),
        )
    }

    /// Register a connection and a joined player in one step
    pub fn join_player(world: &mut World, name: &str) -> (u32, Receiver<String>) {
        let (id, rx) = world
            .try_register_connection()
            .expect("connection refused in test");
        world.handle_message(
            id,
            crate::net::protocol::ClientMsg::Join {
                name: name.to_string(),
            },
            0.0,
        );
        (id, rx)
    }

    /// Decode everything buffered on a connection
    pub fn drain(rx: &mut Receiver<String>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(line) = rx.try_recv() {
            out.push(serde_json::from_str(&line).expect("server sent invalid json"));
        }
        out
    }

    /// Put two players on opposing teams and start the match
    pub fn start_two_player_game(world: &mut World) -> (u32, Receiver<String>, u32, Receiver<String>) {
        use crate::net::protocol::ClientMsg;
        let (a, rx_a) = join_player(world, "ana");
        let (b, rx_b) = join_player(world, "bo");
        world.handle_message(a, ClientMsg::SelectTeam { team_id: 0 }, 0.0);
        world.handle_message(b, ClientMsg::SelectTeam { team_id: 1 }, 0.0);
        world.handle_message(a, ClientMsg::Ready { ready: true }, 0.0);
        world.handle_message(b, ClientMsg::Ready { ready: true }, 0.0);
        assert!(world.game_started);
        (a, rx_a, b, rx_b)
    }
}
