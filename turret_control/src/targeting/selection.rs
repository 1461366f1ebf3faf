//! Best-target selection for one detection batch.

use turret_common::types::Detection;

/// Outcome of selecting over one frame's detections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    /// Largest box strictly above the area threshold.
    pub best: Option<Detection>,
    /// Boxes strictly above the area threshold.
    pub candidates: usize,
}

impl Selection {
    #[inline]
    pub const fn is_multi_target(&self) -> bool {
        self.candidates > 1
    }
}

/// Pick the detection with the largest area `> min_area`.
///
/// Only one target is ever tracked. On equal areas the earlier detection wins.
pub fn select_target(detections: &[Detection], min_area: u32) -> Selection {
    let mut best: Option<Detection> = None;
    let mut candidates = 0;

    for det in detections {
        let area = det.bbox.area();
        if area <= min_area as u64 {
            continue;
        }
        candidates += 1;
        if best.is_none_or(|b| area > b.bbox.area()) {
            best = Some(*det);
        }
    }

    Selection { best, candidates }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turret_common::types::BoundingBox;

    fn det(w: u32, h: u32) -> Detection {
        Detection::new(BoundingBox::new(10, 10, w, h), 0.9)
    }

    #[test]
    fn empty_batch_selects_nothing() {
        let sel = select_target(&[], 100);
        assert_eq!(sel.best, None);
        assert_eq!(sel.candidates, 0);
    }

    #[test]
    fn threshold_is_strict() {
        let sel = select_target(&[det(10, 10)], 100);
        assert!(sel.best.is_none());
        let sel = select_target(&[det(10, 10), det(11, 10)], 100);
        assert_eq!(sel.best.map(|d| d.bbox.area()), Some(110));
        assert_eq!(sel.candidates, 1);
        assert!(!sel.is_multi_target());
    }

    #[test]
    fn largest_of_several_wins() {
        let sel = select_target(&[det(20, 20), det(30, 30), det(25, 25)], 100);
        assert_eq!(sel.best.map(|d| d.bbox.area()), Some(900));
        assert_eq!(sel.candidates, 3);
        assert!(sel.is_multi_target());
    }

    #[test]
    fn tie_keeps_first() {
        let first = Detection::new(BoundingBox::new(0, 0, 20, 10), 0.5);
        let second = Detection::new(BoundingBox::new(100, 100, 10, 20), 0.9);
        let sel = select_target(&[first, second], 100);
        assert_eq!(sel.best, Some(first));
    }
}
