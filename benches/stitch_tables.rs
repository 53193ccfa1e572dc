use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use loom_stitch_rs::stitching::{
    CameraContributionMap,
    CameraSourceMap,
    KernelSynthesizer,
    MergeKernelConfig,
    MergeKernelSynthesizer,
    PixelFormat,
    StitchPlanner,
    SyntheticRig,
    WarpKernelConfig,
    WarpKernelSynthesizer,
    generate_merge_tables,
    generate_warp_tables,
    largest_warp_table_size,
    smallest_warp_table_size,
};
use loom_stitch_rs::stitching::tables::CameraAtlas;

fn rig(label: &str) -> SyntheticRig {
    let (cameras, width, height) = match label {
        "4x1024x512" => (4, 1024, 512),
        "6x1536x768" => (6, 1536, 768),
        _ => (8, 2048, 1024),
    };
    SyntheticRig::new(cameras, width, height, 64).unwrap()
}

const RIGS: [&str; 3] = ["4x1024x512", "6x1536x768", "8x2048x1024"];

fn benchmark_table_sizing(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_sizing");

    for label in RIGS {
        let rig = rig(label);
        let map = CameraContributionMap::new(rig.width as usize, rig.height as usize, &rig.valid).unwrap();

        group.bench_with_input(BenchmarkId::new("smallest", label), &map, |b, map| {
            b.iter(|| smallest_warp_table_size(black_box(rig.num_cameras), map).unwrap());
        });
        group.bench_function(BenchmarkId::new("largest", label), |b| {
            b.iter(|| largest_warp_table_size(black_box(rig.num_cameras), rig.width as usize, rig.height as usize));
        });
    }

    group.finish();
}

fn benchmark_table_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_generation");
    group.sample_size(20);

    for label in RIGS {
        let rig = rig(label);
        let (w, h) = (rig.width as usize, rig.height as usize);
        let map = CameraContributionMap::new(w, h, &rig.valid).unwrap();
        let sources = CameraSourceMap::new(w, h, rig.num_cameras, &rig.sources).unwrap();
        let capacity = smallest_warp_table_size(rig.num_cameras, &map).unwrap();

        group.bench_function(BenchmarkId::new("warp", label), |b| {
            b.iter(|| {
                generate_warp_tables(rig.num_cameras, &map, &sources, CameraAtlas::default(), black_box(capacity)).unwrap()
            });
        });
        group.bench_function(BenchmarkId::new("merge", label), |b| {
            b.iter(|| generate_merge_tables(black_box(rig.num_cameras), &map).unwrap());
        });
    }

    group.finish();
}

fn benchmark_kernel_synthesis(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel_synthesis");

    let formats = [
        (PixelFormat::Rgbx, PixelFormat::Rgb, "8bit"),
        (PixelFormat::Rgb6, PixelFormat::Rgb4, "15bit"),
    ];
    for (input, output, label) in formats {
        let warp = WarpKernelConfig::builder()
            .input_format(input)
            .with_luma()
            .num_cameras(6)
            .table_capacity(1 << 20)
            .input_height(2160)
            .output_height(6 * 1024)
            .build();
        let merge = MergeKernelConfig::builder()
            .input_format(warp.output_format)
            .output_format(output)
            .dimensions(2048, 1024)
            .build();

        group.bench_with_input(BenchmarkId::new("warp", label), &warp, |b, config| {
            b.iter(|| WarpKernelSynthesizer::new().synthesize(black_box(config)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("merge", label), &merge, |b, config| {
            b.iter(|| MergeKernelSynthesizer::new().synthesize(black_box(config)).unwrap());
        });
    }

    group.finish();
}

fn benchmark_full_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_plan");
    group.sample_size(10);

    let rig = rig("6x1536x768");
    let planner = StitchPlanner::new(rig.config_builder().build());
    group.bench_function("6x1536x768", |b| {
        b.iter(|| planner.plan(black_box(&rig.maps())).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_table_sizing,
    benchmark_table_generation,
    benchmark_kernel_synthesis,
    benchmark_full_plan
);
criterion_main!(benches);
