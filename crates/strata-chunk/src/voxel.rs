use serde::Deserialize;

/// Material id stored per voxel. `Air` is the empty sentinel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum VoxelType {
    #[default]
    Air = 0,
    Water = 1,
    Generic = 2,
    Grass = 3,
    Dirt = 4,
    Rock = 5,
    Sand = 6,
    Wood = 7,
    Leaves = 8,
}

impl VoxelType {
    pub const ALL: [VoxelType; 9] = [
        VoxelType::Air,
        VoxelType::Water,
        VoxelType::Generic,
        VoxelType::Grass,
        VoxelType::Dirt,
        VoxelType::Rock,
        VoxelType::Sand,
        VoxelType::Wood,
        VoxelType::Leaves,
    ];

    #[inline]
    pub fn from_u8(v: u8) -> Option<VoxelType> {
        Self::ALL.get(v as usize).copied()
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Voxel {
    material: VoxelType,
}

impl Voxel {
    pub const AIR: Voxel = Voxel {
        material: VoxelType::Air,
    };

    #[inline]
    pub const fn new(material: VoxelType) -> Self {
        Self { material }
    }

    #[inline]
    pub fn material(self) -> VoxelType {
        self.material
    }

    #[inline]
    pub fn is_air(self) -> bool {
        self.material == VoxelType::Air
    }

    #[inline]
    pub fn is_water(self) -> bool {
        self.material == VoxelType::Water
    }

    /// Blocks movement and occludes neighbours.
    #[inline]
    pub fn is_solid(self) -> bool {
        !self.is_air() && !self.is_water()
    }

    /// Lets faces behind it show.
    #[inline]
    pub fn is_translucent(self) -> bool {
        !self.is_solid()
    }
}

impl From<VoxelType> for Voxel {
    fn from(material: VoxelType) -> Self {
        Voxel::new(material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_u8_round_trips_every_material() {
        for ty in VoxelType::ALL {
            assert_eq!(VoxelType::from_u8(ty.as_u8()), Some(ty));
        }
        assert_eq!(VoxelType::from_u8(200), None);
    }

    #[test]
    fn water_is_neither_air_nor_solid() {
        let w = Voxel::new(VoxelType::Water);
        assert!(!w.is_air());
        assert!(!w.is_solid());
        assert!(w.is_translucent());
        assert!(Voxel::new(VoxelType::Rock).is_solid());
        assert!(!Voxel::new(VoxelType::Leaves).is_translucent());
        assert!(Voxel::AIR.is_air());
    }
}
