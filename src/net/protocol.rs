//! Wire protocol message definitions
//!
//! One JSON object per line over TCP, tagged by a `type` field. These are
//! the only types that cross the socket boundary; the dispatcher and tick
//! engine never see raw JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Serde helper for `BTreeMap<i32, V>` fields living inside internally-tagged
/// enums. JSON object keys are always strings, and serde's internally-tagged
/// enum path buffers the payload into an intermediate form that does not coerce
/// those string keys back into integers on the way out — so a plain derive
/// round-trips fine as a standalone value but fails under `#[serde(tag = ...)]`.
/// This module keeps the exact wire shape (`{"0":1}`) and only parses the keys
/// explicitly on deserialize.
mod i32_key_map {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<V, S>(map: &BTreeMap<i32, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        V: Serialize,
        S: Serializer,
    {
        map.serialize(serializer)
    }

    pub fn deserialize<'de, V, D>(deserializer: D) -> Result<BTreeMap<i32, V>, D::Error>
    where
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let string_keyed: BTreeMap<String, V> = BTreeMap::deserialize(deserializer)?;
        string_keyed
            .into_iter()
            .map(|(k, v)| k.parse::<i32>().map(|k| (k, v)).map_err(D::Error::custom))
            .collect()
    }
}

/// Horizontal facing reported by clients and echoed in snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Left,
    Right,
}

impl Default for Facing {
    fn default() -> Self {
        Self::Right
    }
}

/// Purchasable weapons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponId {
    Pistol,
    Auto,
    SemiAuto,
    Sniper,
    Shotgun,
}

impl Default for WeaponId {
    fn default() -> Self {
        Self::Pistol
    }
}

/// Trigger behavior, client-side only (the server gates every shot on the
/// reload window either way)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireMode {
    Semi,
    Auto,
}

/// Power-up kinds, in fixed rotation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    Speed,
    Jump,
    Shield,
    RapidFire,
    DoubleJump,
}

/// Breakable object kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Tree,
    Barrel,
    Crate,
}

/// Reasons a purchase is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyFailReason {
    TooFar,
    InsufficientCoins,
}

fn default_true() -> bool {
    true
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Register in the lobby
    Join { name: String },

    /// Pick a team while in the lobby
    SelectTeam { team_id: i32 },

    /// Toggle ready state; omitted flag means ready
    Ready {
        #[serde(default = "default_true")]
        ready: bool,
    },

    /// Client-reported movement state, trusted by the server
    State {
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        #[serde(default)]
        on_ground: bool,
        facing: Option<Facing>,
    },

    /// Fire the held weapon
    Throw { facing: Option<Facing> },

    /// Purchase at the shop
    BuyWeapon { weapon_id: WeaponId },

    /// Collect a dropped weapon by id
    PickWeapon { drop_id: u32 },

    /// Client detected its own fall out of the world
    FellOff,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    Welcome {
        player_id: u32,
        num_teams: i32,
        max_hp: i32,
    },

    LobbyUpdate {
        players: Vec<LobbyPlayer>,
        #[serde(with = "i32_key_map")]
        team_counts: BTreeMap<i32, usize>,
        game_started: bool,
    },

    /// Sent individually to each player at match start
    GameStart {
        spawn_x: f32,
        spawn_y: f32,
        shop_x: f32,
        shop_y: f32,
        weapons: Vec<WeaponInfo>,
        kill_limit: u32,
    },

    /// Full snapshot, broadcast every tick
    World {
        players: Vec<PlayerSnapshot>,
        projectiles: Vec<ProjectileSnapshot>,
        power_ups: Vec<PowerUpSnapshot>,
        dropped_weapons: Vec<DroppedWeaponSnapshot>,
        objects: Vec<ObjectSnapshot>,
        #[serde(with = "i32_key_map")]
        team_kills: BTreeMap<i32, u32>,
    },

    ProjectileHit {
        proj_id: u32,
        victim_id: u32,
        damage: i32,
        hp: i32,
    },

    PlayerKilled {
        victim_id: u32,
        /// Absent for environment kills
        killer_id: Option<u32>,
    },

    ObjectHit {
        object_id: u32,
        damage: i32,
        hp: i32,
    },

    ObjectDestroyed {
        object_id: u32,
        shooter_id: u32,
        coin_bonus: i32,
    },

    Respawn {
        player_id: u32,
        x: f32,
        y: f32,
        hp: i32,
        weapon: WeaponId,
        coins: i32,
    },

    PowerupPickup {
        pu_id: u32,
        pu_type: PowerUpKind,
        player_id: u32,
        duration: f64,
    },

    PowerupExpired {
        pu_id: u32,
    },

    WeaponDropped {
        drop_id: u32,
        weapon_id: WeaponId,
        x: f32,
        y: f32,
    },

    WeaponPickup {
        drop_id: u32,
        player_id: u32,
        weapon_id: WeaponId,
    },

    WeaponGone {
        drop_id: u32,
    },

    WeaponBought {
        weapon_id: WeaponId,
        coins: i32,
    },

    CoinsUpdate {
        coins: i32,
    },

    BuyFailed {
        reason: BuyFailReason,
    },

    GameOver {
        winner_team: i32,
    },

    PlayerLeft {
        player_id: u32,
    },
}

/// Lobby roster entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyPlayer {
    pub player_id: u32,
    pub name: String,
    pub team_id: i32,
    pub ready: bool,
}

/// Weapon table entry shared with clients at match start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponInfo {
    pub id: WeaponId,
    pub name: String,
    pub fire_mode: FireMode,
    pub damage: i32,
    pub range_px: f32,
    pub reload_time: f64,
    pub bullet_speed: f32,
    pub pellets: u32,
    pub spread: f32,
    pub price: i32,
    pub color: [u8; 3],
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub player_id: u32,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub facing: Facing,
    pub team_id: i32,
    pub alive: bool,
    pub hp: i32,
    pub shield_active: bool,
    pub weapon: WeaponId,
    pub coins: i32,
    pub reload_left: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub proj_id: u32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub team_id: i32,
    pub weapon_id: WeaponId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerUpSnapshot {
    pub pu_id: u32,
    pub pu_type: PowerUpKind,
    pub x: f32,
    pub y: f32,
    pub active: bool,
    pub lifetime: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroppedWeaponSnapshot {
    pub drop_id: u32,
    pub weapon_id: WeaponId,
    pub x: f32,
    pub y: f32,
    pub lifetime: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub object_id: u32,
    pub kind: ObjectKind,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub alive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_msg_round_trips_tagged_json() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"join","name":"ana"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Join { ref name } if name == "ana"));

        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"buy_weapon","weapon_id":"semi_auto"}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMsg::BuyWeapon {
                weapon_id: WeaponId::SemiAuto
            }
        ));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"fell_off"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::FellOff));
    }

    #[test]
    fn ready_flag_defaults_to_true() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"ready"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Ready { ready: true }));
    }

    #[test]
    fn state_tolerates_missing_optional_fields() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"state","x":1.0,"y":2.0,"vx":0.0,"vy":0.0,"facing":null}"#)
                .unwrap();
        match msg {
            ClientMsg::State {
                on_ground, facing, ..
            } => {
                assert!(!on_ground);
                assert!(facing.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn unknown_type_is_an_error() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"warp","x":1}"#).is_err());
    }

    #[test]
    fn server_msg_uses_snake_case_tags() {
        let json = serde_json::to_string(&ServerMsg::GameOver { winner_team: 2 }).unwrap();
        assert!(json.contains(r#""type":"game_over""#));

        let json = serde_json::to_string(&ServerMsg::BuyFailed {
            reason: BuyFailReason::TooFar,
        })
        .unwrap();
        assert!(json.contains(r#""reason":"too_far""#));
    }
}
