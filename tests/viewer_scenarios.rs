use std::sync::Arc;
use std::time::Duration;

use pagesurf::test_utils::{FakeEngine, FakeHost, RenderLog};
use pagesurf::{LoadFailure, Viewer, ViewerEvent, ViewerOptions};
use serial_test::serial;

const SETTLE: Duration = Duration::from_secs(10);
const VIEWPORT: f32 = 900.0;

fn viewer(engine: FakeEngine) -> Viewer<FakeHost> {
    Viewer::new(FakeHost::new(VIEWPORT), Arc::new(engine))
}

fn high_res_paints(log: &RenderLog, scale: f32) -> Vec<usize> {
    let mut pages: Vec<usize> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, s)| (*s - scale).abs() < f32::EPSILON)
        .map(|(p, _)| *p)
        .collect();
    pages.sort_unstable();
    pages
}

/// Drag the scrollbar so `page` sits just below the top of the viewport
fn scroll_to(v: &mut Viewer<FakeHost>, page: usize) {
    let top = v.layout().unwrap().top(page).unwrap();
    v.host_mut().set_scroll_top(top - 0.1 * VIEWPORT);
    v.on_scroll();
    assert!(v.settle(SETTLE));
}

/// Scrolling deep into a long document keeps only the window resident
#[test]
fn test_scroll_keeps_only_window_resident() {
    let mut v = viewer(FakeEngine::new(50));
    v.load_document(b"fifty pages".to_vec(), ViewerOptions::default().resident_set_bound(4))
        .unwrap();
    assert!(v.settle(SETTLE));
    assert_eq!(v.resident_pages(), vec![1, 2]);

    scroll_to(&mut v, 30);

    assert_eq!(v.current_page(), 30);
    assert_eq!(v.render_window(), vec![30, 29, 31]);
    assert_eq!(v.resident_pages(), vec![29, 30, 31]);
    assert_eq!(v.visible_pages(), vec![29, 30, 31]);
    // Rolled-back rasters count against the same bound
    assert_eq!(v.retired_pages(), vec![2]);
    assert!(v.resident_pages().len() + v.retired_pages().len() <= 4);

    for page in (1..=50).filter(|p| !(29..=31).contains(p)) {
        let s = v.surface(page).unwrap();
        assert!(s.thumbnail.is_loaded(), "page {page} lost its thumbnail");
        assert!(!s.high_res.is_materialized(), "page {page} still holds a raster");
        assert!(s.text_layer.is_none());
    }
}

/// A zoom change re-renders only the window; pages outside keep their old raster aside
#[test]
fn test_zoom_change_rerenders_window_only() {
    let engine = FakeEngine::new(20);
    let log = engine.render_log();
    let mut v = viewer(engine);
    v.load_document(
        b"twenty pages".to_vec(),
        ViewerOptions::default().initial_page(10).resident_set_bound(6),
    )
    .unwrap();
    assert!(v.settle(SETTLE));
    assert_eq!(v.resident_pages(), vec![9, 10, 11]);

    v.navigate_to_page(5);
    assert!(v.settle(SETTLE));
    assert_eq!(v.current_page(), 5);
    assert_eq!(v.resident_pages(), vec![4, 5, 6]);
    assert_eq!(v.retired_zoom(10), Some(100));

    log.lock().unwrap().clear();
    v.set_zoom(150);
    assert!(v.settle(SETTLE));

    assert_eq!(high_res_paints(&log, 1.5), vec![4, 5, 6]);
    assert_eq!(log.lock().unwrap().len(), 3);
    for page in [4, 5, 6] {
        let s = v.surface(page).unwrap();
        assert_eq!(s.last_rendered_scale, Some(150));
        assert_eq!(s.high_res.bitmap.width, 900);
        assert_eq!(v.text_layer(page).unwrap().zoom, 150);
    }
    assert_eq!(v.retired_zoom(10), Some(100));
    assert!(!v.surface(10).unwrap().high_res.is_visible());
}

/// Coming back to a page at the zoom it left with restores it without painting
#[test]
fn test_return_to_page_restores_retired_raster() {
    let engine = FakeEngine::new(20);
    let log = engine.render_log();
    let mut v = viewer(engine);
    v.load_document(
        b"restore".to_vec(),
        ViewerOptions::default().initial_page(10).resident_set_bound(6),
    )
    .unwrap();
    assert!(v.settle(SETTLE));

    v.navigate_to_page(5);
    assert!(v.settle(SETTLE));
    let paints_of_10 = high_res_paints(&log, 1.0).iter().filter(|&&p| p == 10).count();
    v.drain_events();

    v.navigate_to_page(10);
    assert!(v.settle(SETTLE));

    let after = high_res_paints(&log, 1.0).iter().filter(|&&p| p == 10).count();
    assert_eq!(after, paints_of_10);
    assert!(v
        .drain_events()
        .contains(&ViewerEvent::Restored { page: 10, zoom: 100 }));
    assert!(v.surface(10).unwrap().high_res.is_visible());
    assert!(v.text_layer(10).is_some());
    assert_eq!(v.retired_zoom(10), None);
}

/// A page that leaves the window mid re-render is painted again on return
#[test]
#[serial]
fn test_page_leaving_mid_rerender_is_not_restored_blank() {
    let engine = FakeEngine::new(20).with_render_delay(Duration::from_millis(100));
    let log = engine.render_log();
    let mut v = viewer(engine);
    v.load_document(
        b"leave mid render".to_vec(),
        ViewerOptions::default().initial_page(5).resident_set_bound(6),
    )
    .unwrap();
    assert!(v.settle(SETTLE));
    let paints_of_5 = high_res_paints(&log, 1.0).iter().filter(|&&p| p == 5).count();

    v.set_zoom(150);
    v.navigate_to_page(15);
    v.tick();
    assert_eq!(v.current_page(), 15);
    assert_eq!(v.retired_zoom(5), None);
    assert!(v.settle(SETTLE));

    v.set_zoom(100);
    v.drain_events();
    v.navigate_to_page(5);
    assert!(v.settle(SETTLE));

    assert!(!v
        .drain_events()
        .contains(&ViewerEvent::Restored { page: 5, zoom: 100 }));
    let after = high_res_paints(&log, 1.0).iter().filter(|&&p| p == 5).count();
    assert_eq!(after, paints_of_5 + 1);

    let s = v.surface(5).unwrap();
    assert_eq!(s.last_rendered_scale, Some(100));
    assert!(s.high_res.is_painted());
    assert_eq!(s.high_res.bitmap.width, 600);
    assert_eq!(s.high_res.bitmap.pixels[0], 5);
}

/// Retain mode keeps rasters outside the window and re-renders only the window on zoom
#[test]
fn test_retain_mode_keeps_rasters_outside_window() {
    let engine = FakeEngine::new(20);
    let log = engine.render_log();
    let mut v = viewer(engine);
    v.load_document(
        b"retain".to_vec(),
        ViewerOptions::default().initial_page(5).retain_high_res(true),
    )
    .unwrap();
    assert!(v.settle(SETTLE));
    v.drain_events();

    v.navigate_to_page(15);
    assert!(v.settle(SETTLE));

    assert_eq!(v.current_page(), 15);
    assert_eq!(v.resident_pages(), vec![4, 5, 6, 14, 15, 16]);
    assert_eq!(v.visible_pages(), vec![4, 5, 6, 14, 15, 16]);
    assert!(v.retired_pages().is_empty());
    for page in [4, 5, 6] {
        let s = v.surface(page).unwrap();
        assert!(s.high_res.is_painted());
        assert_eq!(s.last_rendered_scale, Some(100));
        assert!(v.text_layer(page).is_some());
    }
    assert!(!v
        .drain_events()
        .iter()
        .any(|e| matches!(e, ViewerEvent::Evicted { .. } | ViewerEvent::RolledBack { .. })));

    log.lock().unwrap().clear();
    v.set_zoom(150);
    assert!(v.settle(SETTLE));

    assert_eq!(high_res_paints(&log, 1.5), vec![14, 15, 16]);
    assert_eq!(log.lock().unwrap().len(), 3);
    assert_eq!(v.surface(5).unwrap().last_rendered_scale, Some(100));
    assert_eq!(v.surface(15).unwrap().last_rendered_scale, Some(150));
    assert!(!v
        .drain_events()
        .iter()
        .any(|e| matches!(e, ViewerEvent::Evicted { .. } | ViewerEvent::RolledBack { .. })));
}

/// Eager mode paints every page once in ascending order and never evicts
#[test]
fn test_eager_mode_materializes_all_pages_in_order() {
    let engine = FakeEngine::new(5);
    let log = engine.render_log();
    let mut v = viewer(engine);
    v.load_document(
        b"eager".to_vec(),
        ViewerOptions::default().eager(true).resident_set_bound(3),
    )
    .unwrap();
    assert!(v.settle(SETTLE));

    let paints = log.lock().unwrap().clone();
    assert_eq!(
        paints,
        vec![(1, 1.0), (2, 1.0), (3, 1.0), (4, 1.0), (5, 1.0)]
    );
    assert_eq!(v.visible_pages(), vec![1, 2, 3, 4, 5]);
    assert_eq!(v.resident_pages(), vec![1, 2, 3, 4, 5]);
    assert!(!v
        .drain_events()
        .iter()
        .any(|e| matches!(e, ViewerEvent::Evicted { .. } | ViewerEvent::RolledBack { .. })));
}

/// Only the last of two quick zoom changes lands
#[test]
#[serial]
fn test_back_to_back_zoom_keeps_last() {
    let mut v = viewer(FakeEngine::new(4).with_render_delay(Duration::from_millis(30)));
    v.load_document(b"zoomy".to_vec(), ViewerOptions::default()).unwrap();
    assert!(v.settle(SETTLE));
    v.drain_events();

    v.set_zoom(120);
    v.set_zoom(150);
    assert!(v.settle(SETTLE));

    let s = v.surface(1).unwrap();
    assert_eq!(s.last_rendered_scale, Some(150));
    assert_eq!(s.high_res.bitmap.width, 900);
    assert!(!v
        .drain_events()
        .iter()
        .any(|e| matches!(e, ViewerEvent::HighResShown { zoom: 120, .. })));
}

/// Zoom is clamped at both ends
#[test]
fn test_zoom_clamps_into_range() {
    let mut v = viewer(FakeEngine::new(2));
    v.load_document(b"clamp".to_vec(), ViewerOptions::default()).unwrap();
    v.set_zoom(500);
    assert_eq!(v.zoom(), 200);
    v.set_zoom_with(|z| i64::from(z) - 1000);
    assert_eq!(v.zoom(), 50);
    v.zoom_out();
    assert_eq!(v.zoom(), 50);
    v.reset_zoom();
    v.zoom_in();
    assert_eq!(v.zoom(), 110);
}

/// Navigating outside the document leaves everything as it was
#[test]
fn test_navigate_out_of_range_is_ignored() {
    let mut v = viewer(FakeEngine::new(5));
    v.load_document(b"five".to_vec(), ViewerOptions::default()).unwrap();
    assert!(v.settle(SETTLE));
    let scrolls = v.host().scrolls.len();

    v.navigate_to_page(0);
    v.navigate_to_page(6);
    assert!(v.settle(SETTLE));

    assert_eq!(v.host().scrolls.len(), scrolls);
    assert_eq!(v.current_page(), 1);
}

/// Navigation scrolls smoothly with the page a tenth of the viewport down
#[test]
fn test_navigate_scrolls_with_offset() {
    let mut v = viewer(FakeEngine::new(5));
    v.load_document(b"offset".to_vec(), ViewerOptions::default()).unwrap();
    assert!(v.settle(SETTLE));

    v.navigate_to_page(3);
    let top = v.layout().unwrap().top(3).unwrap();
    let (landed, behavior) = *v.host().scrolls.last().unwrap();
    assert_eq!(landed, top - 90.0);
    assert_eq!(behavior, pagesurf::ScrollBehavior::Smooth);
}

/// Reloading mid-render leaves nothing of the previous document behind
#[test]
#[serial]
fn test_reload_mid_render_drops_old_document() {
    let engine = FakeEngine::new(10).with_render_delay(Duration::from_millis(40));
    let mut v = viewer(engine);
    let first = v
        .load_document(b"first document".to_vec(), ViewerOptions::default())
        .unwrap();

    v.navigate_to_page(7);
    v.tick();
    assert!(v.pending_renders() > 0);

    let second = v
        .load_document(b"second document".to_vec(), ViewerOptions::default())
        .unwrap();
    assert_ne!(first.fingerprint, second.fingerprint);
    assert!(v.settle(SETTLE));

    assert_eq!(v.fingerprint(), Some(second.fingerprint.as_str()));
    assert_eq!(v.visible_pages(), vec![1, 2]);
    assert_eq!(v.resident_pages(), vec![1, 2]);
    assert_eq!(v.resources().live_count(), 10);
}

/// Many scroll and resize notifications collapse into one computation per frame
#[test]
fn test_viewport_work_is_frame_aligned() {
    let mut v = viewer(FakeEngine::new(10));
    v.load_document(b"frames".to_vec(), ViewerOptions::default()).unwrap();
    assert!(v.settle(SETTLE));

    let before = v.viewport_evaluations();
    for _ in 0..20 {
        v.on_scroll();
    }
    v.on_resize();
    assert_eq!(v.viewport_evaluations(), before);

    v.on_frame();
    assert_eq!(v.viewport_evaluations(), before + 1);
    v.on_frame();
    assert_eq!(v.viewport_evaluations(), before + 1);
}

/// A slow open fails with a timeout distinguishable from a malformed document
#[test]
#[serial]
fn test_load_timeout_is_distinguishable() {
    let mut v = viewer(FakeEngine::new(3).with_open_delay(Duration::from_millis(500)));
    let options = ViewerOptions {
        load_timeout: Duration::from_millis(50),
        ..ViewerOptions::default()
    };
    let err = v.load_document(b"slow".to_vec(), options).unwrap_err();
    assert!(err.is_timeout());
    assert!(!v.is_loaded());

    let mut v = viewer(FakeEngine::new(3));
    let err = v
        .load_document(FakeEngine::MALFORMED.to_vec(), ViewerOptions::default())
        .unwrap_err();
    assert!(matches!(err, LoadFailure::Malformed(_)));
    assert!(!err.is_timeout());
}

/// A failed load still tears down the document that was open before it
#[test]
fn test_failed_load_releases_previous_document() {
    let mut v = viewer(FakeEngine::new(4));
    v.load_document(b"good".to_vec(), ViewerOptions::default()).unwrap();
    assert!(v.settle(SETTLE));
    assert_eq!(v.resources().live_count(), 4);

    assert!(v
        .load_document(FakeEngine::MALFORMED.to_vec(), ViewerOptions::default())
        .is_err());
    assert!(!v.is_loaded());
    assert_eq!(v.resources().live_count(), 0);
    assert!(v.drain_events().contains(&ViewerEvent::Closed));
}

/// A page whose render fails keeps its thumbnail and is retried on re-entry
#[test]
fn test_failed_page_keeps_thumbnail_and_retries() {
    let engine = FakeEngine::new(10).with_failing_page(3);
    let log = engine.render_log();
    let mut v = viewer(engine);
    v.load_document(b"failing".to_vec(), ViewerOptions::default()).unwrap();
    assert!(v.settle(SETTLE));
    v.drain_events();

    v.navigate_to_page(3);
    assert!(v.settle(SETTLE));

    let failed = v.drain_events().into_iter().any(|e| match e {
        ViewerEvent::RenderFailed(f) => f.page == 3,
        _ => false,
    });
    assert!(failed);

    let s = v.surface(3).unwrap();
    assert!(s.thumbnail.is_loaded());
    assert!(!s.high_res.is_visible());
    assert!(s.last_error.is_some());
    assert!(!v.resident_pages().contains(&3));
    assert_eq!(v.visible_pages(), vec![2, 4]);

    let attempts = high_res_paints(&log, 1.0).iter().filter(|&&p| p == 3).count();
    v.navigate_to_page(8);
    assert!(v.settle(SETTLE));
    v.navigate_to_page(3);
    assert!(v.settle(SETTLE));
    let retried = high_res_paints(&log, 1.0).iter().filter(|&&p| p == 3).count();
    assert_eq!(retried, attempts + 1);

    assert!(v.render_high_res(3).is_err());
    assert!(v.render_thumbnail(3).is_ok());
}

/// Any page can be brought up explicitly, thumbnail first, then high-res at the current zoom
#[test]
fn test_explicit_thumbnail_then_high_res() {
    let mut v = viewer(FakeEngine::new(12));
    v.load_document(b"explicit".to_vec(), ViewerOptions::default()).unwrap();
    v.set_zoom(130);

    for page in [1, 7, 12] {
        v.render_thumbnail(page).unwrap();
        v.render_high_res(page).unwrap();
        let s = v.surface(page).unwrap();
        assert!(s.thumbnail.is_loaded());
        assert!(s.high_res.is_visible());
        assert_eq!(s.last_rendered_scale, Some(130));
        assert_eq!(v.text_layer(page).unwrap().zoom, 130);
    }
    assert!(v.resident_pages().len() <= 4);
}
