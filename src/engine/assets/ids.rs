use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt::{Display, Formatter};

/// Identifies a visual asset for the lifetime of the process.
#[repr(u16)]
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive,
)]
pub enum AssetId {
    Cube = 0,
    Sphere = 1,
    DamagedHelmet = 2,
}

/// Identifies an entry of the static physical material table.
#[repr(u16)]
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive,
)]
pub enum MaterialId {
    Basic = 0,
    Metal = 1,
    Rubber = 2,
    Ice = 3,
}

/// Surface properties of a material as the solver consumes them.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PhysicalMaterial {
    pub friction: f32,
    pub static_friction: f32,
    pub restitution: f32,
}

impl PhysicalMaterial {
    pub const fn new(friction: f32, static_friction: f32, restitution: f32) -> Self {
        Self {
            friction,
            static_friction,
            restitution,
        }
    }
}

impl AssetId {
    pub const ALL: [AssetId; 3] = [AssetId::Cube, AssetId::Sphere, AssetId::DamagedHelmet];

    pub const fn material(self) -> MaterialId {
        match self {
            AssetId::Cube => MaterialId::Basic,
            AssetId::Sphere => MaterialId::Rubber,
            AssetId::DamagedHelmet => MaterialId::Metal,
        }
    }

    pub const fn file_name(self) -> &'static str {
        match self {
            AssetId::Cube => "cube.obj",
            AssetId::Sphere => "sphere.obj",
            AssetId::DamagedHelmet => "damaged_helmet.obj",
        }
    }
}

impl MaterialId {
    pub const ALL: [MaterialId; 4] = [
        MaterialId::Basic,
        MaterialId::Metal,
        MaterialId::Rubber,
        MaterialId::Ice,
    ];

    pub const fn properties(self) -> PhysicalMaterial {
        match self {
            MaterialId::Basic => PhysicalMaterial::new(0.5, 0.5, 0.6),
            MaterialId::Metal => PhysicalMaterial::new(0.4, 0.6, 0.2),
            MaterialId::Rubber => PhysicalMaterial::new(0.9, 1.0, 0.8),
            MaterialId::Ice => PhysicalMaterial::new(0.05, 0.1, 0.05),
        }
    }
}

impl Display for AssetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?} (\"{}\")", self.file_name())
    }
}

impl Display for MaterialId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_convert_through_u16() {
        for asset in AssetId::ALL {
            let raw: u16 = asset.into();
            assert_eq!(AssetId::try_from(raw).ok(), Some(asset));
        }
        assert!(AssetId::try_from(99u16).is_err());
        assert!(MaterialId::try_from(4u16).is_err());
    }

    #[test]
    fn asset_material_table() {
        assert_eq!(AssetId::Cube.material(), MaterialId::Basic);
        assert_eq!(AssetId::DamagedHelmet.material(), MaterialId::Metal);
        assert_eq!(MaterialId::Rubber.properties().restitution, 0.8);
    }
}
