//! Damage collection and region algebra
//!
//! A [`DamageAccumulator`] lives for exactly one revalidate pass. Nodes that
//! own their damage push their previous and new bounds into it, mapped into
//! the space of the accumulator's owner. Consumers then call
//! [`DamageAccumulator::merged`] to get a disjoint rectangle list covering
//! exactly the damaged area.

use smallvec::SmallVec;
use tessera_paint::{Matrix, Rect};

/// Rectangles damaged during a single revalidate pass
#[derive(Clone, Debug, Default)]
pub struct DamageAccumulator {
    rects: Vec<Rect>,
}

impl DamageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `rect` after mapping it through `ctm`
    pub fn inval(&mut self, rect: Rect, ctm: &Matrix) {
        let mapped = rect.map(ctm);
        if !mapped.is_empty() {
            self.rects.push(mapped);
        }
    }

    /// Raw rectangles in emission order
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    /// Bounding box of everything recorded
    pub fn bounds(&self) -> Rect {
        self.rects.iter().fold(Rect::EMPTY, |acc, r| acc.union(r))
    }

    /// Disjoint cover of the recorded area
    pub fn merged(&self) -> Vec<Rect> {
        merge_rects(&self.rects)
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }
}

/// The parts of `rect` not covered by `hole`, as at most four rectangles
pub fn subtract(rect: &Rect, hole: &Rect) -> SmallVec<[Rect; 4]> {
    let mut pieces = SmallVec::new();
    let Some(overlap) = rect.intersect(hole) else {
        if !rect.is_empty() {
            pieces.push(*rect);
        }
        return pieces;
    };

    if overlap.top() > rect.top() {
        pieces.push(Rect::from_ltrb(rect.left(), rect.top(), rect.right(), overlap.top()));
    }
    if overlap.bottom() < rect.bottom() {
        pieces.push(Rect::from_ltrb(rect.left(), overlap.bottom(), rect.right(), rect.bottom()));
    }
    if overlap.left() > rect.left() {
        pieces.push(Rect::from_ltrb(rect.left(), overlap.top(), overlap.left(), overlap.bottom()));
    }
    if overlap.right() < rect.right() {
        pieces.push(Rect::from_ltrb(overlap.right(), overlap.top(), rect.right(), overlap.bottom()));
    }
    pieces
}

/// Merge possibly overlapping rectangles into a disjoint list
///
/// The result covers exactly the union of the inputs: no pixel is lost and
/// none is counted twice. Empty inputs are dropped. Rectangles that end up
/// sharing a full edge are coalesced.
pub fn merge_rects(rects: &[Rect]) -> Vec<Rect> {
    let mut merged: Vec<Rect> = Vec::with_capacity(rects.len());

    for rect in rects.iter().filter(|r| !r.is_empty()) {
        if merged.iter().any(|m| m.contains_rect(rect)) {
            continue;
        }
        merged.retain(|m| !rect.contains_rect(m));

        let mut pieces: Vec<Rect> = vec![*rect];
        for existing in &merged {
            if pieces.is_empty() {
                break;
            }
            pieces = pieces
                .iter()
                .flat_map(|piece| subtract(piece, existing))
                .collect();
        }
        merged.extend(pieces);
    }

    coalesce(&mut merged);
    merged
}

/// Join pairs of rectangles that share a complete edge
fn coalesce(rects: &mut Vec<Rect>) {
    let mut changed = true;
    while changed {
        changed = false;
        'outer: for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                if let Some(joined) = join(&rects[i], &rects[j]) {
                    rects[i] = joined;
                    rects.swap_remove(j);
                    changed = true;
                    break 'outer;
                }
            }
        }
    }
}

fn join(a: &Rect, b: &Rect) -> Option<Rect> {
    let same_columns = a.left() == b.left() && a.right() == b.right();
    let same_rows = a.top() == b.top() && a.bottom() == b.bottom();

    if same_columns && (a.bottom() == b.top() || b.bottom() == a.top()) {
        return Some(a.union(b));
    }
    if same_rows && (a.right() == b.left() || b.right() == a.left()) {
        return Some(a.union(b));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_area(rects: &[Rect]) -> f32 {
        rects.iter().map(Rect::area).sum()
    }

    fn pairwise_disjoint(rects: &[Rect]) -> bool {
        rects
            .iter()
            .enumerate()
            .all(|(i, a)| rects[i + 1..].iter().all(|b| !a.intersects(b)))
    }

    #[test]
    fn test_inval_maps_through_ctm() {
        let mut acc = DamageAccumulator::new();
        acc.inval(Rect::new(0.0, 0.0, 10.0, 10.0), &Matrix::scale(2.0, 2.0));
        acc.inval(Rect::EMPTY, &Matrix::IDENTITY);
        assert_eq!(acc.rects(), &[Rect::new(0.0, 0.0, 20.0, 20.0)]);
    }

    #[test]
    fn test_subtract_center_hole_leaves_frame() {
        let pieces = subtract(&Rect::new(0.0, 0.0, 30.0, 30.0), &Rect::new(10.0, 10.0, 10.0, 10.0));
        assert_eq!(pieces.len(), 4);
        assert_eq!(total_area(&pieces), 800.0);
        assert!(pairwise_disjoint(&pieces));
    }

    #[test]
    fn test_subtract_disjoint_is_identity() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let pieces = subtract(&rect, &Rect::new(10.0, 0.0, 5.0, 5.0));
        assert_eq!(pieces.as_slice(), &[rect]);
    }

    #[test]
    fn test_merge_overlapping_is_disjoint_with_union_area() {
        let merged = merge_rects(&[
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(5.0, 5.0, 10.0, 10.0),
        ]);
        assert!(pairwise_disjoint(&merged));
        assert_eq!(total_area(&merged), 175.0);
    }

    #[test]
    fn test_merge_adjacent_coalesces() {
        let merged = merge_rects(&[
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(10.0, 0.0, 10.0, 10.0),
            Rect::new(0.0, 10.0, 20.0, 5.0),
        ]);
        assert_eq!(merged, vec![Rect::new(0.0, 0.0, 20.0, 15.0)]);
    }

    #[test]
    fn test_merge_drops_contained() {
        let merged = merge_rects(&[
            Rect::new(2.0, 2.0, 2.0, 2.0),
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(3.0, 3.0, 1.0, 1.0),
        ]);
        assert_eq!(merged, vec![Rect::new(0.0, 0.0, 10.0, 10.0)]);
    }
}
