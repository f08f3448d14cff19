//! Pipeline benchmarks: descriptor scoring, preparation, model fitting, evaluation
//!
//! Run with: cargo bench --bench pipeline_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use grade_affinity::descriptor::{Bond, DescriptorCalculator, DescriptorLayout, Ligand, LigandAtom, Receptor};
use grade_affinity::metrics::evaluate;
use grade_affinity::model::{build_pipeline, ModelParams, ModelType, Regressor};
use grade_affinity::prepare::{prepare, PrepareOptions, PrepareRequest};
use ndarray::{Array1, Array2};
use std::fmt::Write;

const SIZES: [usize; 2] = [100, 1_000];

/// Poly-alanine strand with `residues` residues along x
fn strand(residues: usize) -> Receptor {
    let mut pdb = String::new();
    let mut serial = 1;
    for r in 0..residues {
        #[allow(clippy::cast_precision_loss)]
        let x = r as f64 * 3.8;
        for (name, element, dx, dy, dz) in [
            ("N", "N", 0.0, 0.0, 0.0),
            ("CA", "C", 1.45, 0.0, 0.0),
            ("C", "C", 2.0, 1.4, 0.0),
            ("O", "O", 1.3, 2.4, 0.0),
            ("CB", "C", 2.0, -0.8, 1.2),
        ] {
            let _ = writeln!(
                pdb,
                "ATOM  {serial:>5} {name:<4} ALA A{seq:>4}    {:>8.3}{:>8.3}{:>8.3}  1.00 10.00          {element:>2}",
                x + dx,
                dy,
                dz,
                seq = r + 1,
            );
            serial += 1;
        }
    }
    let mut receptor = Receptor::from_pdb_str(&pdb).unwrap_or_default();
    receptor.clean();
    receptor
}

fn propanol() -> Ligand {
    let atom = |element: &str, coord: [f64; 3]| LigandAtom {
        element: element.to_string(),
        coord,
        charge: 0,
    };
    Ligand {
        name: Some("propanol".into()),
        atoms: vec![
            atom("C", [10.0, 4.0, 2.0]),
            atom("C", [11.5, 4.0, 2.0]),
            atom("C", [12.2, 5.3, 2.0]),
            atom("O", [13.6, 5.3, 2.0]),
        ],
        bonds: vec![
            Bond { from: 0, to: 1, order: 1 },
            Bond { from: 1, to: 2, order: 1 },
            Bond { from: 2, to: 3, order: 1 },
        ],
    }
}

fn bench_descriptors(c: &mut Criterion) {
    let mut group = c.benchmark_group("descriptor_row");
    let ligand = propanol();
    for residues in [10, 100] {
        let receptor = strand(residues);
        for layout in [DescriptorLayout::Grade, DescriptorLayout::ExtendedGrade] {
            let calculator = DescriptorCalculator::new(layout).with_charge_normalization(true);
            group.bench_with_input(
                BenchmarkId::new(layout.as_str(), residues),
                &receptor,
                |b, receptor| b.iter(|| calculator.calculate(black_box(receptor), black_box(&ligand))),
            );
        }
    }
    group.finish();
}

#[allow(clippy::cast_precision_loss)]
fn regression_data(rows: usize, cols: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((rows, cols), |(i, j)| ((i * 31 + j * 17) % 97) as f64 / 9.7);
    let y = x.rows().into_iter().map(|r| r.sum() + (r[0] * 0.5).sin()).collect();
    (x, y)
}

fn bench_fit_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_predict");
    group.sample_size(10);
    for rows in SIZES {
        let (x, y) = regression_data(rows, 34);
        for model in [ModelType::LinearRegression, ModelType::Ridge, ModelType::DecisionTree] {
            group.bench_with_input(BenchmarkId::new(model.as_str(), rows), &rows, |b, _| {
                b.iter(|| {
                    let mut pipeline = build_pipeline(ModelParams::default_for(model));
                    pipeline.fit(x.view(), y.view()).ok();
                    pipeline.predict(black_box(x.view())).ok()
                });
            });
        }
    }
    group.finish();
}

/// Descriptor and label CSVs with `rows` entries and `cols` channels
fn write_tables(dir: &std::path::Path, name: &str, rows: usize, cols: usize) {
    let mut features = String::from("PDB code");
    for j in 0..cols {
        let _ = write!(features, ",D{j}");
    }
    features.push('\n');
    let mut labels = String::from("PDB code,Affinity Data Type,pK\n");
    for i in 0..rows {
        let _ = write!(features, "{name}{i:05}");
        for j in 0..cols {
            let _ = write!(features, ",{}", (i * 7 + j * 3) % 41);
        }
        features.push('\n');
        let _ = writeln!(labels, "{name}{i:05},Kd,{}", i % 13);
    }
    let _ = std::fs::write(dir.join(format!("{name}_features.csv")), features);
    let _ = std::fs::write(dir.join(format!("{name}_labels.csv")), labels);
}

fn bench_prepare(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare");
    group.sample_size(10);
    let Ok(dir) = tempfile::tempdir() else {
        return;
    };
    for rows in SIZES {
        let train = format!("train{rows}");
        let test = format!("test{rows}");
        write_tables(dir.path(), &train, rows, 36);
        write_tables(dir.path(), &test, rows / 4, 36);
        let request = PrepareRequest::new(
            "pK",
            dir.path().join(format!("{train}_features.csv")),
            dir.path().join(format!("{test}_features.csv")),
            dir.path().join(format!("{train}_labels.csv")),
            dir.path().join(format!("{test}_labels.csv")),
            "none",
        );
        let options = PrepareOptions {
            seed: Some(0),
            ..PrepareOptions::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(rows), &request, |b, request| {
            b.iter(|| prepare(black_box(request), &options));
        });
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    for n in SIZES {
        let (_, y) = regression_data(n, 3);
        let predicted: Vec<f64> = y.iter().map(|v| v * 0.9 + 0.3).collect();
        let measured = y.to_vec();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| evaluate(black_box(&measured), black_box(&predicted), 0.9));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_descriptors,
    bench_prepare,
    bench_fit_predict,
    bench_evaluate
);
criterion_main!(benches);
