//! Benchmarks for the interception path.
//!
//! - Class file parsing
//! - Gate decisions for units nobody targets (the common case on a host's load path)
//! - A full transformation with one injected call
//! - Loading the XML declaration front-end

extern crate classweave;

use classweave::{
    bytecode::{opcodes, Instruction},
    classfile::{ClassFile, ClassFileBuilder, MethodAccessFlags, MethodBody},
    loader::parse_declaration,
    mixin::{
        ClassTransformer, HandlerRef, InsertionPoint, MatchContract, MethodSelector, MixinEngine,
        Rule, RuleBundle,
    },
};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

const TARGET: &str = "bench/Target";

/// A class with `count` small methods `m0()I` .. `m{count-1}()I`
fn target_class(count: usize) -> Vec<u8> {
    let mut builder = ClassFileBuilder::new(TARGET);
    for index in 0..count {
        builder = builder.method(
            MethodAccessFlags::PUBLIC,
            &format!("m{index}"),
            "()I",
            move |pool| {
                let mut body = MethodBody::new(1);
                body.max_stack = 1;
                body.insns.push(Instruction::member(
                    opcodes::INVOKESTATIC,
                    pool.add_method_ref("bench/Other", "value", "()I", false)?,
                ));
                body.insns.push(Instruction::simple(opcodes::IRETURN));
                Ok(body)
            },
        );
    }
    builder.build().unwrap()
}

fn engine_with_inject() -> MixinEngine {
    let engine = MixinEngine::new();
    engine.register(RuleBundle::new("Bench", TARGET).with_rule(Rule::Inject {
        method: MethodSelector::exact("m7", "()I"),
        handler: HandlerRef::new("bench/Hooks", "enter"),
        at: InsertionPoint::head(),
        cancellable: false,
        remap: false,
        contract: MatchContract::require(1),
    }));
    engine
}

/// Benchmark decoding a class with 64 methods.
fn bench_parse_class(c: &mut Criterion) {
    let bytes = target_class(64);

    let mut group = c.benchmark_group("classfile");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("parse_64_methods", |b| {
        b.iter(|| {
            let class = ClassFile::parse(black_box(&bytes)).unwrap();
            black_box(class.methods().len())
        });
    });
    group.finish();
}

/// Benchmark the gate for a unit without bundles.
fn bench_decide_untargeted(c: &mut Criterion) {
    let engine = engine_with_inject();

    c.bench_function("decide_untargeted", |b| {
        b.iter(|| black_box(engine.decide(black_box("com/example/Unrelated"))));
    });
    c.bench_function("decide_platform", |b| {
        b.iter(|| black_box(engine.decide(black_box("java/lang/String"))));
    });
}

/// Benchmark a transformation that edits one of 64 methods.
fn bench_transform_inject(c: &mut Criterion) {
    let bytes = target_class(64);
    let engine = engine_with_inject();

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("inject_head_1_of_64", |b| {
        b.iter(|| {
            let transformed = engine.transform_unit(TARGET, black_box(&bytes)).unwrap();
            black_box(transformed.bytes.len())
        });
    });
    group.finish();
}

/// Benchmark parsing a declaration with one rule of every injector kind.
fn bench_parse_declaration(c: &mut Criterion) {
    let text = r#"<mixin name="Bench" target="bench.Target">
        <inject method="m0()I" handler="bench.Hooks.enter" at="HEAD"/>
        <redirect method="m1()I" handler="bench.Hooks.value" call="bench.Other.value()I"/>
        <modify-constant method="m2()I" handler="bench.Hooks.constant"/>
        <overwrite method="m3()I" handler="bench.Hooks.replace"/>
    </mixin>"#;

    c.bench_function("parse_declaration", |b| {
        b.iter(|| black_box(parse_declaration(black_box(text)).unwrap().rules.len()));
    });
}

criterion_group!(
    benches,
    bench_parse_class,
    bench_decide_untargeted,
    bench_transform_inject,
    bench_parse_declaration
);
criterion_main!(benches);
