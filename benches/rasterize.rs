use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tileraster::{
    rasterize, ExecutorConfig, FillRule, Geometry, ImageBuffer, Matrix, PathTag, Rgba8,
    TaskExecutor,
};

const KAPPA: f64 = 0.552_284_749_830_793_4;

fn circle(cx: f64, cy: f64, r: f64, color: Rgba8) -> Geometry {
    let k = KAPPA;
    let tags = vec![
        PathTag::Move,
        PathTag::Cubic,
        PathTag::Cubic,
        PathTag::Cubic,
        PathTag::Cubic,
        PathTag::Close,
    ];
    let points = vec![
        [1.0, 0.0],
        [1.0, k],
        [k, 1.0],
        [0.0, 1.0],
        [-k, 1.0],
        [-1.0, k],
        [-1.0, 0.0],
        [-1.0, -k],
        [-k, -1.0],
        [0.0, -1.0],
        [k, -1.0],
        [1.0, -k],
        [1.0, 0.0],
    ];
    let m = Matrix::new_custom(r, 0.0, 0.0, r, cx, cy);
    Geometry::with_computed_bounds(tags, points, m, color, FillRule::NonZero).unwrap()
}

/// Overlapping translucent circles and triangles covering a 1024x768 canvas.
fn scene(width: f64, height: f64) -> Vec<Geometry> {
    let mut seed = 0x9e37_79b9_7f4a_7c15u64;
    let mut next = move || {
        seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        (seed >> 11) as f64 / (1u64 << 53) as f64
    };
    (0..2000)
        .map(|i| {
            let color = Rgba8::from_straight(
                (next() * 255.0) as u8,
                (next() * 255.0) as u8,
                (next() * 255.0) as u8,
                (64.0 + next() * 191.0) as u8,
            );
            let (x, y) = (next() * width, next() * height);
            let size = 4.0 + next() * 60.0;
            if i % 2 == 0 {
                circle(x, y, size, color)
            } else {
                let tags = vec![PathTag::Move, PathTag::Line, PathTag::Line, PathTag::Close];
                let points = vec![[x, y], [x + size, y + size * 0.3], [x + size * 0.2, y + size]];
                Geometry::with_computed_bounds(tags, points, Matrix::IDENTITY, color, FillRule::EvenOdd)
                    .unwrap()
            }
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    let shapes = scene(1024.0, 768.0);
    let mut image = ImageBuffer::new(1024, 768).unwrap();

    let mut serial = TaskExecutor::serial();
    c.bench_function("rasterize 2000 paths serial", |b| {
        b.iter(|| {
            image.fill(Rgba8::TRANSPARENT);
            rasterize(black_box(&shapes), &Matrix::IDENTITY, &mut serial, &mut image);
        })
    });

    let mut pool = TaskExecutor::new(&ExecutorConfig::default()).unwrap();
    let name = format!("rasterize 2000 paths {} workers", pool.worker_count());
    c.bench_function(&name, |b| {
        b.iter(|| {
            image.fill(Rgba8::TRANSPARENT);
            rasterize(black_box(&shapes), &Matrix::IDENTITY, &mut pool, &mut image);
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
