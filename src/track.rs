use crate::bbox::{BBox, Ltrb};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Tentative,
    Confirmed,
    Deleted,
}

#[derive(Debug, Clone)]
pub struct Track {
    pub track_id: u64,
    pub state: TrackState,
    pub hits: u32,
    pub time_since_update: u32,

    // predicted for the current frame
    pub bbox: BBox<Ltrb>,

    // detection that updated the track in the current frame, if any
    pub original: Option<BBox<Ltrb>>,
}

impl Track {
    #[inline]
    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    /// Box for the current frame. With `orig_coordinates` the detection that
    /// updated the track this frame is preferred over the prediction.
    pub fn predicted_box(&self, orig_coordinates: bool) -> BBox<Ltrb> {
        match (orig_coordinates, self.original) {
            (true, Some(bbox)) => bbox,
            _ => self.bbox,
        }
    }
}
