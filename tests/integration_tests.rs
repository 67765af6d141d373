extern crate sdf_font_tools;

use std::sync::{Arc, Barrier};
use std::thread;

use sdf_font_tools::sdf_outline_renderer::{
    is_inside, ContourBuilder, FieldParams, Glyph, GlyphId, SdfGlyphError,
};
use sdf_font_tools::{
    get_fields, get_fields_or_placeholder, FieldAtlas, GlyphFieldCache, GlyphSet, Lru, Renderer,
    Rgba, SdfFontError, Technique,
};

/// Handle length for approximating a quarter circle with one cubic.
const KAPPA: f64 = 0.552_284_749_830_793_4;

/// Draws a circle as four cubics; `ccw` picks the winding.
fn circle(builder: &mut ContourBuilder, cx: f64, cy: f64, r: f64, ccw: bool) {
    let k = KAPPA * r;
    let s = if ccw { 1.0 } else { -1.0 };
    builder
        .move_to((cx + r, cy))
        .and_then(|b| b.cubic_to((cx + r, cy + s * k), (cx + k, cy + s * r), (cx, cy + s * r)))
        .and_then(|b| b.cubic_to((cx - k, cy + s * r), (cx - r, cy + s * k), (cx - r, cy)))
        .and_then(|b| b.cubic_to((cx - r, cy - s * k), (cx - k, cy - s * r), (cx, cy - s * r)))
        .and_then(|b| b.cubic_to((cx + k, cy - s * r), (cx + r, cy - s * k), (cx + r, cy)))
        .and_then(|b| b.close())
        .expect("Unable to draw circle");
}

/// An "O" made of an outer ring of radius 30 and a hole of radius 20.
fn letter_o() -> Glyph {
    let mut builder = ContourBuilder::new();
    circle(&mut builder, 50.0, 50.0, 30.0, true);
    circle(&mut builder, 50.0, 50.0, 20.0, false);
    Glyph::new(GlyphId::from('O'), builder.finish().unwrap(), 100.0)
}

/// An "I": a plain rectangle.
fn letter_i() -> Glyph {
    let mut builder = ContourBuilder::new();
    builder
        .move_to((40.0, 20.0))
        .and_then(|b| b.line_to((60.0, 20.0)))
        .and_then(|b| b.line_to((60.0, 80.0)))
        .and_then(|b| b.line_to((40.0, 80.0)))
        .unwrap();
    Glyph::new(GlyphId::from('I'), builder.finish().unwrap(), 100.0)
}

fn glyph_cache() -> Arc<GlyphFieldCache> {
    Arc::new(GlyphFieldCache::new(GlyphSet::from_iter([
        letter_o(),
        letter_i(),
    ])))
}

#[test]
fn test_concurrent_requests_coalesce() {
    let cache = glyph_cache();
    let params = FieldParams::new(64, 64, 4.0).unwrap();
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get(GlyphId::from('O'), params)
            })
        })
        .collect();
    let fields: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .collect();

    let stats = cache.stats();
    assert_eq!(stats.rasterizations, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits + stats.coalesced, threads as u64 - 1);
    assert!(fields.iter().all(|field| Arc::ptr_eq(field, &fields[0])));
}

#[tokio::test]
async fn test_get_fields_preserves_order() {
    let cache = glyph_cache();
    let params = FieldParams::new(32, 32, 4.0).unwrap();
    let ids = [
        GlyphId::from('O'),
        GlyphId::from('I'),
        GlyphId::from('O'),
        GlyphId::from('I'),
    ];

    let fields = get_fields(Arc::clone(&cache), &ids, params)
        .await
        .expect("Unable to rasterize glyphs");
    assert_eq!(fields.len(), 4);
    assert!(Arc::ptr_eq(&fields[0], &fields[2]));
    assert!(Arc::ptr_eq(&fields[1], &fields[3]));
    assert_ne!(fields[0].values(), fields[1].values());
    assert_eq!(cache.stats().rasterizations, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_get_fields_single_flight() {
    let cache = glyph_cache();
    let params = FieldParams::new(48, 48, 4.0).unwrap();
    let ids = vec![GlyphId::from('O'); 12];

    let fields = get_fields(Arc::clone(&cache), &ids, params).await.unwrap();
    assert!(fields.iter().all(|field| Arc::ptr_eq(field, &fields[0])));
    assert_eq!(cache.stats().rasterizations, 1);
}

#[tokio::test]
async fn test_get_fields_unknown_glyph() {
    let cache = glyph_cache();
    let params = FieldParams::new(16, 16, 4.0).unwrap();
    let ids = [GlyphId::from('O'), GlyphId::from('Q')];

    match get_fields(Arc::clone(&cache), &ids, params).await {
        Err(SdfFontError::SdfGlyphError(SdfGlyphError::UnknownGlyph(id))) => {
            assert_eq!(id, GlyphId::from('Q'))
        }
        other => panic!("Expected an unknown glyph error, got {other:?}"),
    }

    let fields = get_fields_or_placeholder(cache, &ids, params).await.unwrap();
    assert!(fields[0].values().iter().any(|v| *v < 0.0));
    assert!(fields[1].values().iter().all(|v| *v == 1.0));
}

#[test]
fn test_rasterization_is_deterministic() {
    let params = FieldParams::new(40, 40, 6.0).unwrap();
    let first = glyph_cache().get(GlyphId::from('O'), params).unwrap();
    let second = glyph_cache().get(GlyphId::from('O'), params).unwrap();
    assert_eq!(first.values(), second.values());
}

#[test]
fn test_field_signs_agree_with_outline() {
    let glyph = letter_o();
    let params = FieldParams::new(64, 64, 4.0).unwrap();
    let field = glyph_cache().get(GlyphId::from('O'), params).unwrap();
    let transform = field.transform();

    for row in 0..64 {
        for col in 0..64 {
            let value = field.get(col, row).unwrap();
            let inside = is_inside(glyph.contours(), transform.cell_center(col, row));
            if value < 0.0 {
                assert!(inside, "({col}, {row}) = {value}");
            } else if value > 0.0 {
                assert!(!inside, "({col}, {row}) = {value}");
            }
        }
    }
}

#[test]
fn test_lru_cache_under_load() {
    let cache = Arc::new(
        GlyphFieldCache::new(GlyphSet::from_iter([letter_o(), letter_i()]))
            .with_eviction(Lru::with_max_entries(1)),
    );
    let params = FieldParams::new(16, 16, 4.0).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let id = if i % 2 == 0 { 'O' } else { 'I' };
            thread::spawn(move || cache.get(GlyphId::from(id), params).map(|_| ()))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert!(cache.len() <= 1);
}

#[test]
fn test_atlas_and_render() {
    let cache = glyph_cache();
    let params = FieldParams::new(32, 32, 4.0).unwrap();
    let fields: Vec<_> = ['O', 'I']
        .into_iter()
        .map(|c| (GlyphId::from(c), cache.get(GlyphId::from(c), params).unwrap()))
        .collect();

    let atlas = FieldAtlas::build(&fields, 128, 64, 2, 0.25).unwrap();
    assert_eq!(atlas.regions().count(), 2);
    assert!(atlas.data().iter().any(|v| *v > 191));

    let renderer = Renderer {
        technique: Technique::Smoothstep {
            edge: 0.0,
            softness: 0.1,
        },
        fill: Rgba::BLACK,
        outline: Rgba::BLACK,
        background: Rgba::WHITE,
    };
    let image = renderer
        .render_line(&cache, &[GlyphId::from('O'), GlyphId::from('I')], params, 0.5)
        .unwrap();
    // Two advances of 100 units at half a pixel per unit.
    assert_eq!(image.width, 100);

    // The stroke of the "O" on the left, at glyph coordinates (25, 50).
    let y = (image.height as f64 / 2.0) as u32;
    let stroke = image.get(12, y).unwrap();
    assert_eq!(stroke, Rgba::BLACK);
    // The hole of the "O" and the gap before the "I" are blank.
    assert_eq!(image.get(25, y).unwrap(), Rgba::WHITE);
    assert_eq!(image.get(45, y).unwrap(), Rgba::WHITE);
    // The "I" stem spans x = 140..160.
    assert_eq!(image.get(75, y).unwrap(), Rgba::BLACK);
}
