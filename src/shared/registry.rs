// This is free and unencumbered software released into the public domain.

use super::{CameraDriver, CameraError, Facing, Rotation};

pub type CameraId = u32;

/// Static facts about one camera, captured at enumeration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraDescriptor {
    pub id: CameraId,
    pub facing: Facing,
    pub sensor_orientation: Rotation,
}

impl CameraDescriptor {
    pub fn new(id: CameraId, facing: Facing, sensor_orientation: Rotation) -> Self {
        Self {
            id,
            facing,
            sensor_orientation,
        }
    }
}

/// Enumerated cameras, grouped by facing in first-enumeration order.
#[derive(Clone, Debug, Default)]
pub struct CameraRegistry {
    cameras: Vec<CameraDescriptor>,
}

impl CameraRegistry {
    /// Queries every device the driver reports.
    pub fn enumerate(driver: &dyn CameraDriver) -> Result<Self, CameraError> {
        let count = driver.count()?;
        let cameras = (0..count)
            .map(|index| driver.describe(index))
            .collect::<Result<Vec<_>, _>>()?;
        log!(debug, count, "enumerated cameras");
        Ok(Self { cameras })
    }

    pub fn from_descriptors(cameras: impl IntoIterator<Item = CameraDescriptor>) -> Self {
        Self {
            cameras: cameras.into_iter().collect(),
        }
    }

    pub fn cameras(&self) -> &[CameraDescriptor] {
        &self.cameras
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn get(&self, id: CameraId) -> Option<&CameraDescriptor> {
        self.cameras.iter().find(|c| c.id == id)
    }

    pub fn by_facing(&self, facing: Facing) -> Vec<CameraId> {
        self.cameras
            .iter()
            .filter(|c| c.facing == facing)
            .map(|c| c.id)
            .collect()
    }

    /// The first camera with the given facing.
    pub fn first_facing(&self, facing: Facing) -> Option<&CameraDescriptor> {
        self.cameras.iter().find(|c| c.facing == facing)
    }

    /// Steps to the next camera: through the current facing group first, then
    /// on to the first camera of the next non-empty group (back, front,
    /// external, back, ...). Unknown ids restart the cycle.
    pub fn next_camera(&self, current: CameraId) -> Option<CameraId> {
        let Some(camera) = self.get(current) else {
            return self.cycle().next();
        };

        let group = self.by_facing(camera.facing);
        let position = group.iter().position(|&id| id == current)?;
        if let Some(&next) = group.get(position + 1) {
            return Some(next);
        }

        let start = Facing::ALL.iter().position(|&f| f == camera.facing)?;
        (1..=Facing::ALL.len())
            .map(|step| Facing::ALL[(start + step) % Facing::ALL.len()])
            .find_map(|facing| self.first_facing(facing).map(|c| c.id))
    }

    fn cycle(&self) -> impl Iterator<Item = CameraId> + '_ {
        Facing::ALL
            .iter()
            .flat_map(move |&facing| self.by_facing(facing))
    }
}
