//! Compute GRADE / X-GRADE descriptors for every ligand of an SDF file
//! against one receptor structure.

use anyhow::{Context, Result};
use clap::Parser;
use grade_affinity::descriptor::{write_descriptors, DescriptorCalculator, DescriptorLayout};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "grade-descriptors")]
#[command(version, about = "Protein-ligand interaction descriptors (GRADE / X-GRADE)")]
struct Args {
    /// Receptor structure (PDB)
    #[arg(short = 'p', long = "protein")]
    protein: PathBuf,

    /// Ligands (SDF, one or more records)
    #[arg(short = 'l', long = "ligands")]
    ligands: PathBuf,

    /// Output CSV
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Extended layout (X-GRADE): donors and acceptors split by element
    #[arg(short = 'x', long = "extended")]
    extended: bool,

    /// Deprotonate acids and protonate bases before typing
    #[arg(short = 'c', long = "normalize-charges")]
    normalize_charges: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let layout = if args.extended {
        DescriptorLayout::ExtendedGrade
    } else {
        DescriptorLayout::Grade
    };
    let calculator = DescriptorCalculator::new(layout).with_charge_normalization(args.normalize_charges);

    let summary = write_descriptors(&calculator, &args.protein, &args.ligands, &args.output)
        .with_context(|| {
            format!(
                "failed to compute descriptors for {} / {}",
                args.protein.display(),
                args.ligands.display()
            )
        })?;

    if summary.written == 0 && summary.failed > 0 {
        error!(failed = summary.failed, "None of the ligands could be processed");
    }
    Ok(())
}
