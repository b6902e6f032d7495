//! Balance tables - weapons, power-ups, breakable objects

use crate::net::protocol::{FireMode, ObjectKind, PowerUpKind, WeaponId, WeaponInfo};

/// Static stats for one weapon
#[derive(Debug, Clone, Copy)]
pub struct WeaponSpec {
    pub name: &'static str,
    pub fire_mode: FireMode,
    /// Damage per pellet
    pub damage: i32,
    /// Range budget: max travel distance in world pixels
    pub range_px: f32,
    /// Seconds between shots
    pub reload_time: f64,
    /// Bullet speed in px per 1/60 s frame
    pub bullet_speed: f32,
    pub pellets: u32,
    /// Vertical pellet separation for multi-pellet weapons
    pub spread: f32,
    pub price: i32,
    pub color: [u8; 3],
}

impl WeaponId {
    pub const ALL: [WeaponId; 5] = [
        WeaponId::Pistol,
        WeaponId::Auto,
        WeaponId::SemiAuto,
        WeaponId::Sniper,
        WeaponId::Shotgun,
    ];

    pub fn spec(self) -> &'static WeaponSpec {
        match self {
            WeaponId::Pistol => &WeaponSpec {
                name: "Pistol",
                fire_mode: FireMode::Semi,
                damage: 20,
                range_px: 240.0,
                reload_time: 0.40,
                bullet_speed: 7.0,
                pellets: 1,
                spread: 0.0,
                price: 0,
                color: [210, 210, 210],
            },
            WeaponId::Auto => &WeaponSpec {
                name: "Auto",
                fire_mode: FireMode::Auto,
                damage: 12,
                range_px: 280.0,
                reload_time: 0.10,
                bullet_speed: 8.0,
                pellets: 1,
                spread: 0.0,
                price: 50,
                color: [255, 200, 50],
            },
            WeaponId::SemiAuto => &WeaponSpec {
                name: "Semi-Auto",
                fire_mode: FireMode::Semi,
                damage: 28,
                range_px: 320.0,
                reload_time: 0.30,
                bullet_speed: 9.0,
                pellets: 1,
                spread: 0.0,
                price: 60,
                color: [80, 200, 255],
            },
            WeaponId::Sniper => &WeaponSpec {
                name: "Sniper",
                fire_mode: FireMode::Semi,
                damage: 70,
                range_px: 800.0,
                reload_time: 1.80,
                bullet_speed: 14.0,
                pellets: 1,
                spread: 0.0,
                price: 80,
                color: [255, 50, 50],
            },
            WeaponId::Shotgun => &WeaponSpec {
                name: "Shotgun",
                fire_mode: FireMode::Semi,
                damage: 18,
                range_px: 130.0,
                reload_time: 0.90,
                bullet_speed: 6.0,
                pellets: 5,
                spread: 3.0,
                price: 70,
                color: [255, 140, 40],
            },
        }
    }
}

/// The full weapon table as sent to clients in `game_start`
pub fn weapon_table() -> Vec<WeaponInfo> {
    WeaponId::ALL
        .iter()
        .map(|&id| {
            let spec = id.spec();
            WeaponInfo {
                id,
                name: spec.name.to_string(),
                fire_mode: spec.fire_mode,
                damage: spec.damage,
                range_px: spec.range_px,
                reload_time: spec.reload_time,
                bullet_speed: spec.bullet_speed,
                pellets: spec.pellets,
                spread: spec.spread,
                price: spec.price,
                color: spec.color,
            }
        })
        .collect()
}

impl PowerUpKind {
    pub const ROTATION: [PowerUpKind; 5] = [
        PowerUpKind::Speed,
        PowerUpKind::Jump,
        PowerUpKind::Shield,
        PowerUpKind::RapidFire,
        PowerUpKind::DoubleJump,
    ];

    /// Effect duration in seconds
    pub fn duration(self) -> f64 {
        match self {
            PowerUpKind::Speed => 10.0,
            PowerUpKind::Jump => 10.0,
            PowerUpKind::Shield => 5.0,
            PowerUpKind::RapidFire => 8.0,
            PowerUpKind::DoubleJump => 10.0,
        }
    }

    /// Next kind in the fixed rotation, cycled on every reactivation so the
    /// mix stays varied without tracking global counts
    pub fn next(self) -> PowerUpKind {
        let idx = Self::ROTATION.iter().position(|&k| k == self).unwrap_or(0);
        Self::ROTATION[(idx + 1) % Self::ROTATION.len()]
    }
}

/// Static stats for one breakable object kind
#[derive(Debug, Clone, Copy)]
pub struct ObjectSpec {
    pub hp: i32,
    pub width: f32,
    pub height: f32,
    /// Inclusive coin bonus range awarded on destruction
    pub coin_min: i32,
    pub coin_max: i32,
}

impl ObjectKind {
    pub fn spec(self) -> &'static ObjectSpec {
        match self {
            ObjectKind::Tree => &ObjectSpec {
                hp: 60,
                width: 12.0,
                height: 28.0,
                coin_min: 8,
                coin_max: 14,
            },
            ObjectKind::Barrel => &ObjectSpec {
                hp: 40,
                width: 10.0,
                height: 14.0,
                coin_min: 5,
                coin_max: 10,
            },
            ObjectKind::Crate => &ObjectSpec {
                hp: 30,
                width: 12.0,
                height: 12.0,
                coin_min: 3,
                coin_max: 8,
            },
        }
    }
}

/// Fixed placements instantiated at match start, resting on the default
/// layout's ground and platforms
pub const OBJECT_LAYOUT: &[(ObjectKind, f32, f32)] = &[
    (ObjectKind::Tree, 144.0, 404.0),
    (ObjectKind::Tree, 752.0, 404.0),
    (ObjectKind::Barrel, 208.0, 418.0),
    (ObjectKind::Barrel, 688.0, 418.0),
    (ObjectKind::Crate, 420.0, 420.0),
    (ObjectKind::Crate, 496.0, 420.0),
    (ObjectKind::Barrel, 240.0, 338.0),
    (ObjectKind::Crate, 648.0, 340.0),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pistol_is_the_free_default() {
        let spec = WeaponId::Pistol.spec();
        assert_eq!(spec.price, 0);
        assert_eq!(spec.pellets, 1);
    }

    #[test]
    fn shotgun_fires_five_pellets_with_short_reach() {
        let spec = WeaponId::Shotgun.spec();
        assert_eq!(spec.pellets, 5);
        assert!(spec.range_px < WeaponId::Pistol.spec().range_px);
    }

    #[test]
    fn weapon_table_covers_every_weapon() {
        let table = weapon_table();
        assert_eq!(table.len(), WeaponId::ALL.len());
        assert!(table.iter().any(|w| w.id == WeaponId::Sniper && w.price == 80));
    }

    #[test]
    fn power_up_rotation_cycles_through_all_kinds() {
        let mut kind = PowerUpKind::Speed;
        let mut seen = Vec::new();
        for _ in 0..PowerUpKind::ROTATION.len() {
            seen.push(kind);
            kind = kind.next();
        }
        assert_eq!(kind, PowerUpKind::Speed);
        for k in PowerUpKind::ROTATION {
            assert!(seen.contains(&k));
        }
    }

    #[test]
    fn object_specs_have_positive_rewards() {
        for kind in [ObjectKind::Tree, ObjectKind::Barrel, ObjectKind::Crate] {
            let spec = kind.spec();
            assert!(spec.hp > 0);
            assert!(spec.coin_min <= spec.coin_max);
        }
    }
}
