use crate::detection::DetectionBox;
use crate::track::Track;

/// A confirmed track paired with the detector box that best explains it in
/// the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Association {
    pub track_id: u64,
    /// Index into the frame's detection boxes.
    pub detection: usize,
    pub iou: f32,
}

/// For every confirmed track, the detection box with maximum IoU against the
/// track's box for this frame. Tracks overlapping no box are skipped. Ties go
/// to the first box.
pub fn associate(tracks: &[Track], boxes: &[DetectionBox]) -> Vec<Association> {
    let mut associations = Vec::new();

    for track in tracks.iter().filter(|t| t.is_confirmed()) {
        let predicted = track.predicted_box(true);
        let mut best: Option<(usize, f32)> = None;

        for (idx, det) in boxes.iter().enumerate() {
            let iou = predicted.iou(&det.bbox());

            match best {
                Some((_, max)) if iou <= max => {}
                _ if iou > 0.0 => best = Some((idx, iou)),
                _ => {}
            }
        }

        if let Some((detection, iou)) = best {
            associations.push(Association {
                track_id: track.track_id,
                detection,
                iou,
            });
        }
    }

    associations
}
