use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

/// Athlete slot, 1 or 2
pub type Identity = u8;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Track {
    pub track_id: u32,
    pub identity: Identity,
    pub bbox: BBox<Ltrb>,
    pub misses: u32,
    pub last_center_x: f32,
}

impl Track {
    pub fn new(track_id: u32, identity: Identity, bbox: BBox<Ltrb>) -> Self {
        Self {
            track_id,
            identity,
            last_center_x: bbox.center_x(),
            bbox,
            misses: 0,
        }
    }

    #[inline]
    pub fn hit(&mut self, bbox: BBox<Ltrb>) {
        self.last_center_x = bbox.center_x();
        self.bbox = bbox;
        self.misses = 0;
    }
}

/// Athlete seen in the current frame
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TrackedPerson {
    pub identity: Identity,
    pub bbox: BBox<Ltrb>,
    pub track_id: u32,
}

impl From<&Track> for TrackedPerson {
    fn from(t: &Track) -> Self {
        Self {
            identity: t.identity,
            bbox: t.bbox,
            track_id: t.track_id,
        }
    }
}
