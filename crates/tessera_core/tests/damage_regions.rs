//! Damage coverage and rectangle merging

use std::sync::Arc;

use tessera_core::{merge_rects, DamageAccumulator, RenderGraph};
use tessera_paint::{Color, Matrix, Paint, Picture, PictureRecorder, Point, Rect};

fn picture(rect: Rect) -> Arc<dyn Picture> {
    let mut recorder = PictureRecorder::new();
    recorder.fill_rect(rect.x(), rect.y(), rect.width(), rect.height(), Paint::fill(Color::BLACK));
    Arc::new(recorder.finish())
}

/// Count unit cells whose centre lies in any of `rects`
fn covered_cells(rects: &[Rect], extent: i32) -> usize {
    let mut count = 0;
    for y in 0..extent {
        for x in 0..extent {
            let centre = Point::new(x as f32 + 0.5, y as f32 + 0.5);
            if rects.iter().any(|r| r.contains(centre)) {
                count += 1;
            }
        }
    }
    count
}

#[test]
fn test_moved_content_damages_old_and_new_area() {
    let old = Rect::new(0.0, 0.0, 10.0, 10.0);
    let new = Rect::new(30.0, 5.0, 8.0, 20.0);

    let mut graph = RenderGraph::new();
    let leaf = graph.create_picture(Some(picture(old)));
    let leaf_id = leaf.id();
    let m = graph.create_matrix(Matrix::IDENTITY);
    let effect = graph.create_transform_effect(m, leaf);
    graph.revalidate(effect.id(), None, &Matrix::IDENTITY);

    graph.set_picture(leaf_id, Some(picture(new))).unwrap();
    let mut acc = DamageAccumulator::new();
    graph.revalidate(effect.id(), Some(&mut acc), &Matrix::IDENTITY);

    let merged = acc.merged();
    for rect in [old, new] {
        assert!(merged.iter().any(|m| m.contains_rect(&rect)), "{:?} not covered", rect);
    }
    graph.release(effect);
}

#[test]
fn test_damage_is_mapped_through_the_caller_ctm() {
    let mut graph = RenderGraph::new();
    let leaf = graph.create_picture(Some(picture(Rect::new(0.0, 0.0, 10.0, 10.0))));
    let leaf_id = leaf.id();
    let m = graph.create_matrix(Matrix::translation(5.0, 0.0));
    let effect = graph.create_transform_effect(m, leaf);
    graph.revalidate(effect.id(), None, &Matrix::IDENTITY);

    graph
        .set_picture(leaf_id, Some(picture(Rect::new(0.0, 0.0, 10.0, 10.0))))
        .unwrap();
    let mut acc = DamageAccumulator::new();
    graph.revalidate(effect.id(), Some(&mut acc), &Matrix::scale(2.0, 2.0));
    assert_eq!(acc.bounds(), Rect::new(10.0, 0.0, 20.0, 20.0));
    graph.release(effect);
}

#[test]
fn test_merged_area_equals_union_area() {
    let inputs = [
        Rect::new(0.0, 0.0, 10.0, 10.0),
        Rect::new(5.0, 5.0, 10.0, 10.0),
        Rect::new(12.0, 0.0, 6.0, 30.0),
        Rect::new(2.0, 20.0, 4.0, 4.0),
        Rect::new(0.0, 0.0, 3.0, 3.0),
        Rect::new(14.0, 10.0, 2.0, 2.0),
        Rect::new(20.0, 20.0, 10.0, 1.0),
    ];
    let merged = merge_rects(&inputs);

    let merged_area: f32 = merged.iter().map(Rect::area).sum();
    assert_eq!(merged_area as usize, covered_cells(&inputs, 40));
    assert_eq!(covered_cells(&merged, 40), covered_cells(&inputs, 40));

    for (i, a) in merged.iter().enumerate() {
        for b in &merged[i + 1..] {
            assert!(!a.intersects(b), "{:?} overlaps {:?}", a, b);
        }
    }
}

#[test]
fn test_merge_ignores_empty_rects() {
    assert!(merge_rects(&[Rect::EMPTY, Rect::new(3.0, 3.0, 0.0, 5.0)]).is_empty());
}
