//! Zoomer behaviour through the graph

use tessera_core::{RenderGraph, ZoomMode, Zoomer};
use tessera_paint::{Matrix, Point};

#[test]
fn test_scale_about_anchor_moves_offset() {
    let mut graph = RenderGraph::new();
    let zoomer = graph.create_zoomer(Zoomer::default());
    graph.revalidate(zoomer.id(), None, &Matrix::IDENTITY);

    assert_eq!(graph.set_zoom_scale(zoomer.id(), 2.0, Point::new(50.0, 50.0)), Ok(true));
    let state = graph.zoomer(zoomer.id()).unwrap();
    assert_eq!(state.scale(), 2.0);
    assert_eq!(state.offset(), Point::new(-50.0, -50.0));
    assert!(graph.is_invalid(zoomer.id()));
    graph.release(zoomer);
}

#[test]
fn test_anchor_point_is_invariant() {
    let mut zoomer = Zoomer::default();
    zoomer.set_offset(Point::new(13.0, -8.0));
    for (scale, anchor) in [(0.5, Point::new(10.0, 10.0)), (3.0, Point::new(-40.0, 7.5)), (1.25, Point::ZERO)] {
        let before = zoomer.matrix().invert().unwrap().transform_point(anchor);
        assert!(zoomer.set_scale(scale, anchor));
        let after = zoomer.matrix().transform_point(before);
        assert!((after.x - anchor.x).abs() < 1e-3 && (after.y - anchor.y).abs() < 1e-3);
    }
}

#[test]
fn test_rejected_scale_does_not_invalidate() {
    let mut graph = RenderGraph::new();
    let zoomer = graph.create_zoomer(Zoomer::new(ZoomMode::Continuous));
    graph.revalidate(zoomer.id(), None, &Matrix::IDENTITY);

    assert_eq!(graph.set_zoom_scale(zoomer.id(), 0.005, Point::ZERO), Ok(false));
    assert_eq!(graph.set_zoom_scale(zoomer.id(), 150.0, Point::ZERO), Ok(false));
    assert!(!graph.is_invalid(zoomer.id()));
    assert_eq!(graph.zoomer(zoomer.id()).unwrap(), &Zoomer::default());
    graph.release(zoomer);
}

#[test]
fn test_device_transform_is_viewport_after_zoom() {
    let mut graph = RenderGraph::new();
    let zoomer = graph.create_zoomer(Zoomer::default());
    let viewport = graph.create_viewport(tessera_core::Viewport::new(100.0, 100.0, 2.0));
    let zoomer_id = zoomer.id();
    let device = graph.create_concat(zoomer, viewport);

    graph.pan_by(zoomer_id, 10.0, 0.0).unwrap();
    let p = graph.matrix(device.id()).transform_point(Point::new(1.0, 1.0));
    assert_eq!(p, Point::new(22.0, 2.0));
    assert!(graph.is_invalid(device.id()));
    graph.release(device);
}
