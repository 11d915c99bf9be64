use criterion::{black_box, criterion_group, criterion_main, Criterion};
use strato_oit::{FragmentArena, GatherPhase, Rgba};

const WIDTH: u32 = 256;
const HEIGHT: u32 = 256;
const LAYERS: u32 = 6;

fn fill(gather: &GatherPhase<'_>) {
    for layer in 0..LAYERS {
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let depth = ((x ^ y ^ layer) % 97) as f32;
                gather.insert(x, y, Rgba::new(0.8, 0.4, 0.2, 0.3), depth);
            }
        }
    }
}

fn gather_and_resolve(c: &mut Criterion) {
    let mut arena = FragmentArena::new(WIDTH, HEIGHT, 8).unwrap();
    let background = Rgba::new(0.1, 0.1, 0.1, 1.0);

    c.bench_function("ppll_gather_256x256x6", |b| {
        b.iter(|| {
            let gather = arena.begin_gather();
            fill(&gather);
            black_box(gather.requested())
        })
    });

    c.bench_function("ppll_resolve_256x256x6", |b| {
        let gather = arena.begin_gather();
        fill(&gather);
        let resolve = gather.finish();
        b.iter(|| black_box(resolve.resolve_image(background)))
    });
}

criterion_group!(benches, gather_and_resolve);
criterion_main!(benches);
