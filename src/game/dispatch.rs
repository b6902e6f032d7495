//! Inbound message validation and application
//!
//! Every message arrives here under the world lock. Rejections follow one
//! rule: explicit feedback where the client needs it (buying), silence
//! where mis-timing is routine (throwing during reload, picking a drop
//! that is already gone).

use tracing::{debug, info};

use crate::net::protocol::{BuyFailReason, ClientMsg, ServerMsg};

use super::entities::{PlayerState, ITEM_SIZE};
use super::world::World;
use super::{PLAYER_MAX_HP, SHOP_RADIUS, SHOP_X, SHOP_Y};

impl World {
    pub fn handle_message(&mut self, player_id: u32, msg: ClientMsg, now: f64) {
        match msg {
            ClientMsg::Join { name } => self.handle_join(player_id, name),
            ClientMsg::SelectTeam { team_id } => self.handle_select_team(player_id, team_id),
            ClientMsg::Ready { ready } => self.handle_ready(player_id, ready, now),
            ClientMsg::State {
                x,
                y,
                vx,
                vy,
                on_ground,
                facing,
            } => self.handle_state(player_id, x, y, vx, vy, on_ground, facing),
            ClientMsg::Throw { facing } => self.handle_throw(player_id, facing, now),
            ClientMsg::BuyWeapon { weapon_id } => self.handle_buy(player_id, weapon_id),
            ClientMsg::PickWeapon { drop_id } => self.handle_pick(player_id, drop_id),
            ClientMsg::FellOff => self.handle_fell_off(player_id),
        }
    }

    fn handle_join(&mut self, player_id: u32, name: String) {
        if self.game_started {
            return;
        }
        if self.players.contains_key(&player_id) {
            debug!(player_id, "duplicate join ignored");
            return;
        }
        let name = if name.is_empty() {
            format!("Player{}", player_id)
        } else {
            name
        };
        info!(player_id, name = %name, "player joined lobby");
        self.players
            .insert(player_id, PlayerState::new(player_id, name));

        self.send_to(
            player_id,
            &ServerMsg::Welcome {
                player_id,
                num_teams: self.config.num_teams,
                max_hp: PLAYER_MAX_HP,
            },
        );
        let lobby = self.lobby_update();
        self.broadcast(&lobby);
    }

    fn handle_select_team(&mut self, player_id: u32, team_id: i32) {
        if self.game_started {
            return;
        }
        let Some(current) = self.players.get(&player_id).map(|p| p.team_id) else {
            return;
        };
        if team_id >= 0 && team_id < self.config.num_teams {
            let members = self
                .players
                .values()
                .filter(|p| p.team_id == team_id)
                .count();
            let max_per_team = (self.config.max_players / self.config.num_teams.max(1) as usize).max(1);
            if members < max_per_team || current == team_id {
                if let Some(p) = self.players.get_mut(&player_id) {
                    p.team_id = team_id;
                    p.ready = false;
                    debug!(player_id, team_id, "team selected");
                }
            }
        }
        let lobby = self.lobby_update();
        self.broadcast(&lobby);
    }

    fn handle_ready(&mut self, player_id: u32, ready: bool, now: f64) {
        if self.game_started {
            return;
        }
        let Some(p) = self.players.get_mut(&player_id) else {
            return;
        };
        if p.team_id < 0 {
            return;
        }
        p.ready = ready;
        debug!(player_id, ready, "ready state changed");
        let lobby = self.lobby_update();
        self.broadcast(&lobby);
        if self.all_ready() {
            self.start_game(now);
        }
    }

    /// Client-reported movement, trusted as-is (documented soft spot)
    #[allow(clippy::too_many_arguments)]
    fn handle_state(
        &mut self,
        player_id: u32,
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        on_ground: bool,
        facing: Option<crate::net::protocol::Facing>,
    ) {
        if !self.game_started {
            return;
        }
        let Some(p) = self.players.get_mut(&player_id) else {
            return;
        };
        if !p.alive {
            return;
        }
        p.x = x;
        p.y = y;
        p.vx = vx;
        p.vy = vy;
        p.on_ground = on_ground;
        if let Some(f) = facing {
            p.facing = f;
        }
    }

    fn handle_throw(
        &mut self,
        player_id: u32,
        facing: Option<crate::net::protocol::Facing>,
        now: f64,
    ) {
        if !self.game_started {
            return;
        }
        let Some(p) = self.players.get(&player_id) else {
            return;
        };
        if !p.alive {
            return;
        }
        let facing = facing.unwrap_or(p.facing);
        self.spawn_projectile(player_id, facing, now);
    }

    fn handle_buy(&mut self, player_id: u32, weapon_id: crate::net::protocol::WeaponId) {
        if !self.game_started {
            return;
        }
        let Some(p) = self.players.get(&player_id) else {
            return;
        };
        if !p.alive {
            return;
        }

        let dx = p.x - SHOP_X;
        let dy = p.y - SHOP_Y;
        if dx * dx + dy * dy > SHOP_RADIUS * SHOP_RADIUS {
            self.send_to(
                player_id,
                &ServerMsg::BuyFailed {
                    reason: BuyFailReason::TooFar,
                },
            );
            return;
        }

        let price = weapon_id.spec().price;
        if p.coins < price {
            self.send_to(
                player_id,
                &ServerMsg::BuyFailed {
                    reason: BuyFailReason::InsufficientCoins,
                },
            );
            return;
        }

        let coins = {
            let Some(p) = self.players.get_mut(&player_id) else {
                return;
            };
            p.coins -= price;
            p.weapon = weapon_id;
            p.coins
        };
        info!(player_id, weapon = ?weapon_id, coins, "weapon bought");
        self.send_to(player_id, &ServerMsg::WeaponBought { weapon_id, coins });
    }

    /// Explicit pickup intent: proximity-checked server-side, and gated on
    /// the drop's pickup delay so the killer's own exiting bullet or a
    /// same-tick race cannot snatch it
    fn handle_pick(&mut self, player_id: u32, drop_id: u32) {
        if !self.game_started {
            return;
        }
        let Some(p) = self.players.get(&player_id) else {
            return;
        };
        if !p.alive {
            return;
        }
        let Some(drop) = self.dropped_weapons.get(&drop_id) else {
            return;
        };
        if drop.pickup_delay > 0.0 {
            return;
        }
        if !p.overlaps(drop.x, drop.y, ITEM_SIZE, ITEM_SIZE) {
            return;
        }

        let weapon_id = drop.weapon;
        self.dropped_weapons.remove(&drop_id);
        if let Some(p) = self.players.get_mut(&player_id) {
            p.weapon = weapon_id;
        }
        info!(player_id, drop_id, weapon = ?weapon_id, "weapon picked up");
        self.broadcast(&ServerMsg::WeaponPickup {
            drop_id,
            player_id,
            weapon_id,
        });
    }

    fn handle_fell_off(&mut self, player_id: u32) {
        if !self.game_started {
            return;
        }
        let Some(p) = self.players.get(&player_id) else {
            return;
        };
        if !p.alive {
            return;
        }
        info!(player_id, "fell off the map");
        self.kill_player(player_id, None);
    }
}
