//! Rendering benchmarks.
//!
//! Display-list construction and diffing, tile bookkeeping, and whole frames per render mode.
//! Run: `cargo bench --bench rendering_bench`

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use displaylist::platform::{CanvasRegistry, MemoryAssets, MemorySurface};
use displaylist::rendering::{
    Color, DisplayList, DisplayListBuilder, DrawStyle, Point, Rectangle, TileCache, diff_bounds,
};
use displaylist::{
    ConfigManager, Drawable, RenderMode, Settings, SynchronousView, ViewEnvironment,
};

fn shapes(count: usize, shift: f32) -> DisplayList {
    let mut builder = DisplayListBuilder::new();
    for i in 0..count {
        let x = (i % 40) as f32 * 24.0 + shift;
        let y = (i / 40) as f32 * 24.0;
        builder = if i % 2 == 0 {
            builder.rectangle(
                Rectangle::new(x, y, 20.0, 20.0),
                DrawStyle::fill(Color::from_rgb8(40, 120, 220)),
            )
        } else {
            builder.circle(
                Point::new(x + 10.0, y + 10.0),
                9.0,
                DrawStyle::stroke(Color::BLACK, 2.0),
            )
        };
    }
    builder.build()
}

fn bench_display_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("DisplayList");

    for count in [100, 1_000, 5_000] {
        group.bench_with_input(BenchmarkId::new("build", count), &count, |b, &count| {
            b.iter(|| black_box(shapes(black_box(count), 0.0)));
        });

        let old = shapes(count, 0.0);
        let new = shapes(count, 3.0);
        group.bench_with_input(BenchmarkId::new("diff", count), &count, |b, _| {
            b.iter(|| black_box(diff_bounds(black_box(&old), black_box(&new))));
        });
    }

    group.finish();
}

fn bench_tile_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("TileCache");
    let viewport = Rectangle::new(0.0, 0.0, 1920.0, 1080.0);

    for tile_size in [64u32, 128, 256] {
        group.bench_with_input(
            BenchmarkId::new("invalidate_and_scan", tile_size),
            &tile_size,
            |b, &tile_size| {
                let mut cache: TileCache<()> = TileCache::new(tile_size, 1024);
                for coord in cache.tiles_in_rect(viewport) {
                    cache.insert(coord, ());
                }
                b.iter(|| {
                    cache.invalidate_rect(black_box(Rectangle::new(300.0, 200.0, 500.0, 260.0)));
                    let invalid = cache.get_invalid_tiles(viewport);
                    for coord in &invalid {
                        cache.insert(*coord, ());
                    }
                    black_box(invalid.len())
                });
            },
        );
    }

    group.finish();
}

fn bench_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("Frame");
    group.sample_size(20);

    for mode in [RenderMode::Direct, RenderMode::Partial, RenderMode::Tile] {
        let settings = Settings {
            render_mode: mode,
            ..Settings::default()
        };
        let env = ViewEnvironment::new(
            Arc::new(CanvasRegistry::new()),
            Arc::new(MemoryAssets::new()),
        )
        .with_config(ConfigManager::with_settings(settings));
        let mut view = SynchronousView::new(Box::new(MemorySurface::new(640, 480)), env)
            .expect("640x480 is a valid size");

        // The motion scene changes every frame, so each draw has real damage.
        group.bench_function(BenchmarkId::new("motion", format!("{mode:?}")), |b| {
            b.iter(|| black_box(view.draw_viewport(1, 1.0, 0.0, 0.0)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_display_list, bench_tile_cache, bench_frames);
criterion_main!(benches);
