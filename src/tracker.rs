use std::rc::Rc;

use munkres::{solve_assignment, WeightMatrix};
use tracing::{debug, warn};

use crate::bbox::{BBox, Ltrb, Xywh};
use crate::config::TrackerConfig;
use crate::error::Error;
use crate::track::{Track, TrackState};
use crate::{Detection, Frame, Tracking};

const MAX_MATRIX_SIZE: usize = 256;
const UNREACHABLE_COST: f32 = 100000.0;

#[derive(Debug)]
struct Participant {
    id: u64,
    state: TrackState,
    hits: u32,
    time_since_update: u32,
    bbox: BBox<Xywh>,
    // center of the last matched detection
    anchor: (f32, f32),
    // center displacement per frame
    velocity: (f32, f32),
    original: Option<BBox<Ltrb>>,
}

impl Participant {
    fn new(id: u64, det: &Detection, n_init: u32) -> Self {
        Self {
            id,
            state: if n_init <= 1 {
                TrackState::Confirmed
            } else {
                TrackState::Tentative
            },
            hits: 1,
            time_since_update: 0,
            bbox: det.bbox(),
            anchor: (det.x, det.y),
            velocity: (0.0, 0.0),
            original: Some(det.bbox().as_ltrb()),
        }
    }

    fn predict(&mut self) {
        let b = self.bbox;
        self.bbox = BBox::xywh(
            b.cx() + self.velocity.0,
            b.cy() + self.velocity.1,
            b.width(),
            b.height(),
        );
        self.time_since_update += 1;
        self.original = None;
    }

    fn update(&mut self, det: &Detection, n_init: u32) {
        let frames = self.time_since_update.max(1) as f32;
        let measured = ((det.x - self.anchor.0) / frames, (det.y - self.anchor.1) / frames);

        self.velocity = if self.hits == 1 {
            measured
        } else {
            (
                self.velocity.0 * 0.5 + measured.0 * 0.5,
                self.velocity.1 * 0.5 + measured.1 * 0.5,
            )
        };

        self.bbox = det.bbox();
        self.anchor = (det.x, det.y);
        self.original = Some(det.bbox().as_ltrb());
        self.time_since_update = 0;
        self.hits += 1;

        if self.state == TrackState::Tentative && self.hits >= n_init {
            self.state = TrackState::Confirmed;
        }
    }

    fn mark_missed(&mut self, max_age: u32) {
        if self.state == TrackState::Tentative || self.time_since_update > max_age {
            self.state = TrackState::Deleted;
        }
    }
}

impl From<&Participant> for Track {
    fn from(p: &Participant) -> Track {
        Track {
            track_id: p.id,
            state: p.state,
            hits: p.hits,
            time_since_update: p.time_since_update,
            bbox: p.bbox.as_ltrb(),
            original: p.original,
        }
    }
}

/// IoU tracker with Hungarian assignment and a constant velocity motion model.
pub struct IouTracker {
    config: TrackerConfig,
    participants: Vec<Participant>,
    next_id: u64,
}

impl IouTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            participants: Vec::with_capacity(32),
            next_id: 1,
        }
    }

    /// `(participant, detection)` pairs whose IoU reaches the configured minimum.
    fn assignment(&self, detections: &[Detection]) -> Vec<(usize, usize)> {
        let (objs, dets) = (self.participants.len(), detections.len());
        if objs == 0 || dets == 0 {
            return Vec::new();
        }

        let n = objs.max(dets);
        if n > MAX_MATRIX_SIZE {
            warn!(n, "assignment matrix too big, skipping association");
            return Vec::new();
        }

        let mut costs = vec![UNREACHABLE_COST; n * n];
        for (r, p) in self.participants.iter().enumerate() {
            let predicted = p.bbox.as_ltrb();
            for (c, det) in detections.iter().enumerate() {
                costs[r * n + c] = 1.0 - predicted.iou(&det.bbox().as_ltrb());
            }
        }

        let mut mat = WeightMatrix::from_fn(n, |(r, c)| costs[r * n + c]);
        match solve_assignment(&mut mat) {
            Ok(positions) => positions
                .into_iter()
                .filter(|p| p.row < objs && p.column < dets)
                .filter(|p| 1.0 - costs[p.row * n + p.column] >= self.config.min_iou)
                .map(|p| (p.row, p.column))
                .collect(),
            Err(_) => {
                warn!("assignment could not be solved");
                Vec::new()
            }
        }
    }
}

impl Default for IouTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl Tracking for IouTracker {
    fn update(&mut self, detections: &[Detection], frame: &Frame) -> Result<(), Error> {
        for p in &mut self.participants {
            p.predict();
        }

        let matches = self.assignment(detections);

        let mut det_matched = vec![false; detections.len()];
        let mut obj_matched = vec![false; self.participants.len()];
        for &(obj, det) in &matches {
            self.participants[obj].update(&detections[det], self.config.n_init);
            obj_matched[obj] = true;
            det_matched[det] = true;
        }

        for (p, _) in self
            .participants
            .iter_mut()
            .zip(obj_matched)
            .filter(|(_, matched)| !matched)
        {
            p.mark_missed(self.config.max_age);
        }

        self.participants.retain(|p| p.state != TrackState::Deleted);

        for (det, _) in detections
            .iter()
            .zip(det_matched)
            .filter(|(_, matched)| !matched)
        {
            self.participants.push(Participant::new(self.next_id, det, self.config.n_init));
            self.next_id += 1;
        }

        debug!(
            frame = frame.index,
            matched = matches.len(),
            alive = self.participants.len(),
            "tracker updated"
        );

        Ok(())
    }

    fn tracks(&self) -> Rc<[Track]> {
        self.participants.iter().map(Track::from).collect()
    }
}
