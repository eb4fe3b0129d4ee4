use criterion::{Criterion, criterion_group, criterion_main};
use rvt_harness::{Arena, ProgramSynthesizer, Slot};
use rvt_core::{DumpPlan, RegionDump, SlotValue};

fn matmul_synth(arena: &mut Arena) -> ProgramSynthesizer {
    let left = arena.register_array(&(0..400).collect::<Vec<_>>());
    let right = arena.register_array(&(0..400).rev().collect::<Vec<_>>());
    let out = arena.register_array(&[0; 400]);
    let mut synth = ProgramSynthesizer::new("bench_matmul", "src/matmul.s")
        .with_runtime(Some("src/utils.s".into()));
    synth.include("src/dot.s");
    synth.bind(Slot::A0, SlotValue::Address(left.label().to_owned()));
    synth.bind(Slot::A1, SlotValue::Immediate(20));
    synth.bind(Slot::A2, SlotValue::Immediate(20));
    synth.bind(Slot::A3, SlotValue::Address(right.label().to_owned()));
    synth.bind(Slot::A4, SlotValue::Immediate(20));
    synth.bind(Slot::A5, SlotValue::Immediate(20));
    synth.bind(Slot::A6, SlotValue::Address(out.label().to_owned()));
    synth.call("matmul");
    synth
}

fn benchmark_synthesis(c: &mut Criterion) {
    let mut arena = Arena::new();
    let synth = matmul_synth(&mut arena);
    let mut dump = DumpPlan::default();
    dump.regions.push(RegionDump::Symbol {
        label: "rvt_array_2".to_owned(),
        len: 400,
    });

    c.bench_function("synth/matmul_20x20_build", |b| {
        b.iter(|| {
            let program = synth
                .build(arena.items(), dump.clone())
                .expect("benchmark program should build");
            assert_eq!(program.routine, "matmul");
        });
    });

    let program = synth
        .build(arena.items(), dump)
        .expect("benchmark program should build");
    c.bench_function("synth/matmul_20x20_render", |b| {
        b.iter(|| {
            let text = program.render();
            assert!(text.contains("jal ra, matmul"));
        });
    });
}

criterion_group!(synth_benches, benchmark_synthesis);
criterion_main!(synth_benches);
