//! Protein–ligand interaction descriptors
//!
//! A receptor (PDB) is read once and cleaned; every ligand of an SDF file is
//! typed into pharmacophore features and scored against the receptor
//! residues within [`ENVIRONMENT_RADIUS`] of it. One row per ligand is
//! streamed to CSV.
//!
//! ## Example
//!
//! ```rust,no_run
//! use grade_affinity::descriptor::{write_descriptors, DescriptorCalculator, DescriptorLayout};
//!
//! let calculator = DescriptorCalculator::new(DescriptorLayout::Grade).with_charge_normalization(true);
//! let summary = write_descriptors(&calculator, "1abc_protein.pdb", "1abc_ligands.sdf", "GRADE.csv")?;
//! println!("{} ligands written, {} failed", summary.written, summary.failed);
//! # Ok::<(), grade_affinity::Error>(())
//! ```

mod calculator;
mod features;
mod ligand;
mod structure;

pub use calculator::{write_descriptors, DescriptorCalculator, DescriptorLayout, DescriptorSummary};
pub use features::{ligand_features, receptor_features, Feature, FeatureType};
pub use ligand::{read_sdf, Bond, Ligand, LigandAtom, SdfReader};
pub use structure::{Atom, CleanReport, Receptor, Residue};

/// Radius (Å) of the receptor environment extracted around each ligand
pub const ENVIRONMENT_RADIUS: f64 = 21.0;

/// 3D point or vector in Å
pub type Point = [f64; 3];

/// Elements recognised by the readers; anything else triggers a warning
const KNOWN_ELEMENTS: &[&str] = &[
    "H", "D", "C", "N", "O", "F", "P", "S", "CL", "BR", "I", "B", "SE", "SI", "LI", "NA", "K",
    "MG", "CA", "MN", "FE", "CO", "NI", "CU", "ZN", "CD", "HG", "SR", "BA", "CS", "RB", "AL",
    "GA", "PT", "AU", "AG", "AS", "SB", "SN", "V", "CR", "MO", "W", "TI", "RU", "RH", "PD", "IR",
    "OS", "YB", "GD", "TB", "EU", "SM", "LA", "CE", "U", "XE", "KR", "AR", "HE", "NE",
];

/// Metal ions that survive receptor cleaning as single-atom residues
const METALS: &[&str] = &[
    "LI", "NA", "K", "RB", "CS", "MG", "CA", "SR", "BA", "MN", "FE", "CO", "NI", "CU", "ZN", "CD",
    "HG", "AL", "GA", "PT", "AU", "AG", "V", "CR", "MO", "W", "TI", "RU", "RH", "PD", "IR", "OS",
    "YB", "GD", "TB", "EU", "SM", "LA", "CE", "U",
];

/// Check an (upper-case) element symbol against the known element table
#[must_use]
pub fn is_known_element(element: &str) -> bool {
    KNOWN_ELEMENTS.contains(&element)
}

/// Check whether an (upper-case) element symbol is a metal
#[must_use]
pub fn is_metal(element: &str) -> bool {
    METALS.contains(&element)
}

/// Hydrogen or deuterium
#[must_use]
pub fn is_hydrogen(element: &str) -> bool {
    matches!(element, "H" | "D")
}

/// Usual ionic charge of a metal, used for electrostatics
pub(crate) fn metal_charge(element: &str) -> f64 {
    match element {
        "LI" | "NA" | "K" | "RB" | "CS" | "AG" => 1.0,
        "AL" | "GA" | "YB" | "GD" | "TB" | "EU" | "SM" | "LA" | "CE" => 3.0,
        _ => 2.0,
    }
}

/// Kyte-Doolittle hydrophobicity of a residue
pub(crate) fn hydrophobicity_scale(residue: &str) -> f64 {
    match residue {
        "ILE" => 4.5,
        "VAL" => 4.2,
        "LEU" => 3.8,
        "PHE" => 2.8,
        "CYS" => 2.5,
        "MET" => 1.9,
        "ALA" => 1.8,
        "GLY" => -0.4,
        "THR" => -0.7,
        "SER" => -0.8,
        "TRP" => -0.9,
        "TYR" => -1.3,
        "PRO" => -1.6,
        "HIS" => -3.2,
        "GLU" | "GLN" | "ASP" | "ASN" => -3.5,
        "LYS" => -3.9,
        "ARG" => -4.5,
        _ => 0.0,
    }
}

/// Lennard-Jones parameters `(rmin/2, epsilon)` by element
pub(crate) fn lj_parameters(element: &str) -> (f64, f64) {
    match element {
        "C" => (2.000, 0.110),
        "N" => (1.850, 0.200),
        "O" => (1.700, 0.120),
        "S" => (2.000, 0.450),
        "P" => (2.150, 0.585),
        "F" => (1.470, 0.061),
        "CL" => (1.770, 0.265),
        "BR" => (1.970, 0.320),
        "I" => (2.150, 0.400),
        e if is_metal(e) => (1.200, 0.050),
        _ => (1.900, 0.100),
    }
}

/// Euclidean distance between two points
#[must_use]
pub fn distance(p1: &Point, p2: &Point) -> f64 {
    distance_squared(p1, p2).sqrt()
}

/// Squared distance (avoids sqrt for cutoff checks)
#[must_use]
pub fn distance_squared(p1: &Point, p2: &Point) -> f64 {
    (p1[0] - p2[0]).powi(2) + (p1[1] - p2[1]).powi(2) + (p1[2] - p2[2]).powi(2)
}

pub(crate) fn sub(a: &Point, b: &Point) -> Point {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub(crate) fn dot(a: &Point, b: &Point) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn cross(a: &Point, b: &Point) -> Point {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Unit vector, or `None` for a (near) zero vector
pub(crate) fn normalized(v: &Point) -> Option<Point> {
    let len = dot(v, v).sqrt();
    (len > 1e-9).then(|| [v[0] / len, v[1] / len, v[2] / len])
}

/// Cosine of the angle between two vectors (0 for degenerate input)
pub(crate) fn cos_angle(a: &Point, b: &Point) -> f64 {
    match (normalized(a), normalized(b)) {
        (Some(a), Some(b)) => dot(&a, &b).clamp(-1.0, 1.0),
        _ => 0.0,
    }
}

/// Geometric center of a set of points
pub(crate) fn centroid<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Point> {
    let mut sum = [0.0; 3];
    let mut n = 0usize;
    for p in points {
        sum[0] += p[0];
        sum[1] += p[1];
        sum[2] += p[2];
        n += 1;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = n as f64;
    (n > 0.0).then(|| [sum[0] / n, sum[1] / n, sum[2] / n])
}

/// Unit normal of a (roughly planar) ring
pub(crate) fn ring_normal(points: &[Point]) -> Option<Point> {
    let center = centroid(points)?;
    // Sum of consecutive cross products is robust to slight puckering
    let mut acc = [0.0; 3];
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        let c = cross(&sub(p, &center), &sub(q, &center));
        acc = [acc[0] + c[0], acc[1] + c[1], acc[2] + c[2]];
    }
    normalized(&acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_tables() {
        assert!(is_known_element("CL"));
        assert!(!is_known_element("XX"));
        assert!(is_metal("ZN"));
        assert!(!is_metal("C"));
        assert!(is_hydrogen("D"));
        assert_eq!(metal_charge("NA"), 1.0);
        assert_eq!(metal_charge("ZN"), 2.0);
    }

    #[test]
    fn test_distance() {
        assert_eq!(distance(&[0.0, 0.0, 0.0], &[3.0, 4.0, 0.0]), 5.0);
        assert_eq!(distance_squared(&[1.0, 1.0, 1.0], &[1.0, 1.0, 3.0]), 4.0);
    }

    #[test]
    fn test_ring_normal_of_planar_hexagon() {
        let ring: Vec<Point> = (0..6)
            .map(|i| {
                let a = f64::from(i) * std::f64::consts::PI / 3.0;
                [1.4 * a.cos(), 1.4 * a.sin(), 2.0]
            })
            .collect();
        let n = ring_normal(&ring).unwrap();
        assert!((n[2].abs() - 1.0).abs() < 1e-9);
        assert_eq!(centroid(&ring).map(|c| (c[2] * 1e6).round()), Some(2e6));
    }

    #[test]
    fn test_cos_angle_degenerate() {
        assert_eq!(cos_angle(&[0.0; 3], &[1.0, 0.0, 0.0]), 0.0);
        assert!((cos_angle(&[1.0, 0.0, 0.0], &[-2.0, 0.0, 0.0]) + 1.0).abs() < 1e-12);
    }
}
