//! Descriptor layouts, interaction scoring and streaming CSV output

use super::features::{perceive_ligand, receptor_charges, receptor_features, Feature, FeatureType};
use super::ligand::{read_sdf, Ligand};
use super::structure::Receptor;
use super::{cos_angle, distance, distance_squared, lj_parameters, sub, Point, ENVIRONMENT_RADIUS};
use crate::table::format_float;
use crate::{Error, Result};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Coulomb constant in kcal·Å/(mol·e²)
const COULOMB: f64 = 332.0636;

/// Pair cutoff (Å) for the Lennard-Jones sums
const VDW_CUTOFF: f64 = 8.0;

/// Closest approach (Å) used in the energy sums
const MIN_DISTANCE: f64 = 0.5;

/// Descriptor column layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriptorLayout {
    /// Feature counts, interaction pairs, electrostatics and van der Waals
    #[default]
    Grade,
    /// As [`DescriptorLayout::Grade`] with donors and acceptors split by element
    ExtendedGrade,
}

impl DescriptorLayout {
    /// Name of the layout as used in descriptor file names
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grade => "GRADE",
            Self::ExtendedGrade => "X-GRADE",
        }
    }
}

/// Side of a pair: feature type plus an optional element filter
#[derive(Debug, Clone, Copy)]
struct Selector {
    kind: FeatureType,
    element: Option<&'static str>,
}

impl Selector {
    const fn of(kind: FeatureType) -> Self {
        Self { kind, element: None }
    }

    const fn with(kind: FeatureType, element: &'static str) -> Self {
        Self {
            kind,
            element: Some(element),
        }
    }

    fn matches(&self, feature: &Feature) -> bool {
        feature.kind == self.kind && self.element.map_or(true, |e| feature.element == e)
    }
}

/// Distance profile and angular term of an interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Geometry {
    Ionic,
    CationPi,
    PiStacking,
    Hydrophobic,
    WeightedHydrophobic,
    /// Hydrogen bond; the flag tells whether the ligand feature is the donor
    HBond(bool),
    HalogenBond,
    MetalCoordination,
}

impl Geometry {
    /// Distance (Å) below which the distance term is 1 and above which it is 0
    const fn range(self) -> (f64, f64) {
        match self {
            Self::Ionic => (4.0, 5.6),
            Self::CationPi => (4.5, 6.0),
            Self::PiStacking => (4.0, 5.5),
            Self::Hydrophobic | Self::WeightedHydrophobic => (4.0, 5.0),
            Self::HBond(_) => (3.0, 3.6),
            Self::HalogenBond => (3.2, 4.0),
            Self::MetalCoordination => (2.4, 3.0),
        }
    }
}

/// A named ligand→receptor interaction column pair (`_SUM`, `_MAX`)
#[derive(Debug, Clone, Copy)]
struct Interaction {
    name: &'static str,
    ligand: Selector,
    receptor: Selector,
    geometry: Geometry,
}

const fn interaction(
    name: &'static str,
    ligand: Selector,
    receptor: Selector,
    geometry: Geometry,
) -> Interaction {
    Interaction {
        name,
        ligand,
        receptor,
        geometry,
    }
}

use FeatureType::{
    Aromatic as AR, HBondAcceptor as HBA, HBondDonor as HBD, HalogenBondAcceptor as XBA,
    HalogenBondDonor as XBD, Hydrophobic as H, Metal as MET, NegativeIonizable as NI,
    PositiveIonizable as PI,
};

const LEADING_PAIRS: [Interaction; 7] = [
    interaction("PI-AR", Selector::of(PI), Selector::of(AR), Geometry::CationPi),
    interaction("AR-PI", Selector::of(AR), Selector::of(PI), Geometry::CationPi),
    interaction("PI-NI", Selector::of(PI), Selector::of(NI), Geometry::Ionic),
    interaction("NI-PI", Selector::of(NI), Selector::of(PI), Geometry::Ionic),
    interaction("AR-AR", Selector::of(AR), Selector::of(AR), Geometry::PiStacking),
    interaction("H-H", Selector::of(H), Selector::of(H), Geometry::Hydrophobic),
    interaction("HW-HW", Selector::of(H), Selector::of(H), Geometry::WeightedHydrophobic),
];

const HBOND_PAIRS: [Interaction; 2] = [
    interaction("HBD-HBA", Selector::of(HBD), Selector::of(HBA), Geometry::HBond(true)),
    interaction("HBA-HBD", Selector::of(HBA), Selector::of(HBD), Geometry::HBond(false)),
];

const ELEMENT_HBOND_PAIRS: [Interaction; 8] = [
    interaction("HBD_N-HBA_N", Selector::with(HBD, "N"), Selector::with(HBA, "N"), Geometry::HBond(true)),
    interaction("HBD_N-HBA_O", Selector::with(HBD, "N"), Selector::with(HBA, "O"), Geometry::HBond(true)),
    interaction("HBD_O-HBA_N", Selector::with(HBD, "O"), Selector::with(HBA, "N"), Geometry::HBond(true)),
    interaction("HBD_O-HBA_O", Selector::with(HBD, "O"), Selector::with(HBA, "O"), Geometry::HBond(true)),
    interaction("HBA_N-HBD_N", Selector::with(HBA, "N"), Selector::with(HBD, "N"), Geometry::HBond(false)),
    interaction("HBA_N-HBD_O", Selector::with(HBA, "N"), Selector::with(HBD, "O"), Geometry::HBond(false)),
    interaction("HBA_O-HBD_N", Selector::with(HBA, "O"), Selector::with(HBD, "N"), Geometry::HBond(false)),
    interaction("HBA_O-HBD_O", Selector::with(HBA, "O"), Selector::with(HBD, "O"), Geometry::HBond(false)),
];

const TRAILING_PAIRS: [Interaction; 2] = [
    interaction("XBD-XBA", Selector::of(XBD), Selector::of(XBA), Geometry::HalogenBond),
    interaction("HBA-MET", Selector::of(HBA), Selector::of(MET), Geometry::MetalCoordination),
];

/// Linear decay from 1 at `full` to 0 at `zero`
fn distance_term(d: f64, (full, zero): (f64, f64)) -> f64 {
    if d <= full {
        1.0
    } else if d >= zero {
        0.0
    } else {
        (zero - d) / (zero - full)
    }
}

/// Best linearity over the donor hydrogens (1 at 180°, 0 at 90° or below)
fn hbond_angle_term(donor: &Feature, acceptor: &Point) -> f64 {
    if donor.hydrogens.is_empty() {
        return 1.0;
    }
    donor
        .hydrogens
        .iter()
        .map(|h| (-cos_angle(&sub(&donor.position, h), &sub(acceptor, h))).max(0.0))
        .fold(0.0, f64::max)
}

fn pair_score(geometry: Geometry, ligand: &Feature, receptor: &Feature) -> f64 {
    let d = distance(&ligand.position, &receptor.position);
    let radial = distance_term(d, geometry.range());
    if radial == 0.0 {
        return 0.0;
    }
    let to_receptor = sub(&receptor.position, &ligand.position);
    let angular = match geometry {
        Geometry::Ionic | Geometry::Hydrophobic | Geometry::MetalCoordination => 1.0,
        Geometry::WeightedHydrophobic => ligand.weight * receptor.weight,
        Geometry::CationPi => {
            let ring = if ligand.kind == FeatureType::Aromatic { ligand } else { receptor };
            ring.normal.map_or(1.0, |n| cos_angle(&n, &to_receptor).abs())
        }
        Geometry::PiStacking => match (ligand.normal, receptor.normal) {
            // Parallel and T-shaped stacking both score
            (Some(a), Some(b)) => {
                let c = cos_angle(&a, &b).abs();
                c.max((1.0 - c * c).sqrt())
            }
            _ => 1.0,
        },
        Geometry::HBond(true) => hbond_angle_term(ligand, &receptor.position),
        Geometry::HBond(false) => hbond_angle_term(receptor, &ligand.position),
        Geometry::HalogenBond => ligand.anchor.map_or(1.0, |c| {
            (-cos_angle(&sub(&c, &ligand.position), &to_receptor)).max(0.0)
        }),
    };
    radial * angular
}

/// Computes descriptor rows for ligands against a receptor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptorCalculator {
    layout: DescriptorLayout,
    normalize_charges: bool,
    environment_radius: f64,
}

impl Default for DescriptorCalculator {
    fn default() -> Self {
        Self::new(DescriptorLayout::Grade)
    }
}

impl DescriptorCalculator {
    /// Calculator for a layout, without protonation normalization
    #[must_use]
    pub const fn new(layout: DescriptorLayout) -> Self {
        Self {
            layout,
            normalize_charges: false,
            environment_radius: ENVIRONMENT_RADIUS,
        }
    }

    /// Deprotonate acids and protonate bases before typing
    #[must_use]
    pub const fn with_charge_normalization(mut self, normalize: bool) -> Self {
        self.normalize_charges = normalize;
        self
    }

    /// Override the environment radius
    #[must_use]
    pub const fn with_environment_radius(mut self, radius: f64) -> Self {
        self.environment_radius = radius;
        self
    }

    /// Column layout
    #[must_use]
    pub const fn layout(&self) -> DescriptorLayout {
        self.layout
    }

    fn count_selectors(&self) -> Vec<(&'static str, Option<Selector>)> {
        let mut counts = vec![
            ("PI_CNT", Some(Selector::of(PI))),
            ("NI_CNT", Some(Selector::of(NI))),
            ("AR_CNT", Some(Selector::of(AR))),
            ("H_CNT", Some(Selector::of(H))),
        ];
        match self.layout {
            DescriptorLayout::Grade => {
                counts.push(("HBD_CNT", Some(Selector::of(HBD))));
                counts.push(("HBA_CNT", Some(Selector::of(HBA))));
            }
            DescriptorLayout::ExtendedGrade => {
                counts.push(("HBD_N_CNT", Some(Selector::with(HBD, "N"))));
                counts.push(("HBD_O_CNT", Some(Selector::with(HBD, "O"))));
                counts.push(("HBA_N_CNT", Some(Selector::with(HBA, "N"))));
                counts.push(("HBA_O_CNT", Some(Selector::with(HBA, "O"))));
            }
        }
        counts.push(("XBD_CNT", Some(Selector::of(XBD))));
        counts.push(("HEAVY_ATOM_CNT", None));
        counts
    }

    fn interactions(&self) -> Vec<Interaction> {
        let hbonds: &[Interaction] = match self.layout {
            DescriptorLayout::Grade => &HBOND_PAIRS,
            DescriptorLayout::ExtendedGrade => &ELEMENT_HBOND_PAIRS,
        };
        LEADING_PAIRS
            .iter()
            .chain(hbonds)
            .chain(TRAILING_PAIRS.iter())
            .copied()
            .collect()
    }

    /// Descriptor column names, without the `Ligand` column
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .count_selectors()
            .into_iter()
            .map(|(name, _)| name.to_string())
            .collect();
        for pair in self.interactions() {
            names.push(format!("{}_SUM", pair.name));
            names.push(format!("{}_MAX", pair.name));
        }
        names.extend(["ES", "VDW_ATT", "VDW_REP"].map(String::from));
        names
    }

    /// Descriptor vector of one ligand, in [`Self::column_names`] order.
    ///
    /// # Errors
    /// Returns error if the ligand has no heavy atoms
    pub fn calculate(&self, receptor: &Receptor, ligand: &Ligand) -> Result<Vec<f64>> {
        let prepared = PreparedReceptor::new(receptor);
        self.calculate_prepared(&prepared, ligand)
    }

    fn calculate_prepared(&self, receptor: &PreparedReceptor<'_>, ligand: &Ligand) -> Result<Vec<f64>> {
        if ligand.heavy_atom_count() == 0 {
            return Err(Error::Structure("ligand has no heavy atoms".to_string()));
        }

        let perception = perceive_ligand(ligand, self.normalize_charges);
        let environment: HashSet<usize> = receptor
            .receptor
            .environment(&ligand.coordinates(), self.environment_radius)
            .into_iter()
            .collect();
        let in_env = |residue: Option<usize>| residue.is_some_and(|r| environment.contains(&r));
        let env_features: Vec<&Feature> = receptor
            .features
            .iter()
            .filter(|f| in_env(f.residue))
            .collect();

        let mut row = Vec::with_capacity(self.column_names().len());

        for (_, selector) in self.count_selectors() {
            #[allow(clippy::cast_precision_loss)]
            let count = match selector {
                Some(s) => perception.features.iter().filter(|f| s.matches(f)).count(),
                None => ligand.heavy_atom_count(),
            } as f64;
            row.push(count);
        }

        for pair in self.interactions() {
            let mut sum = 0.0;
            let mut max = 0.0_f64;
            for lf in perception.features.iter().filter(|f| pair.ligand.matches(f)) {
                for rf in env_features.iter().filter(|f| pair.receptor.matches(f)) {
                    let score = pair_score(pair.geometry, lf, rf);
                    sum += score;
                    max = max.max(score);
                }
            }
            row.push(sum);
            row.push(max);
        }

        let mut es = 0.0;
        for (atom, &q) in ligand.atoms.iter().zip(&perception.charges) {
            if q == 0.0 {
                continue;
            }
            for (_, coord, rq) in receptor.charges.iter().filter(|c| environment.contains(&c.0)) {
                let r = distance(&atom.coord, coord).max(MIN_DISTANCE);
                // Distance-dependent dielectric eps(r) = 4r
                es += COULOMB * q * rq / (4.0 * r * r);
            }
        }
        row.push(es);

        let (attraction, repulsion) = lennard_jones(receptor, &environment, ligand);
        row.push(attraction);
        row.push(repulsion);

        Ok(row)
    }
}

/// Attractive and repulsive halves of the 12-6 sum over heavy atom pairs
fn lennard_jones(
    receptor: &PreparedReceptor<'_>,
    environment: &HashSet<usize>,
    ligand: &Ligand,
) -> (f64, f64) {
    let cutoff2 = VDW_CUTOFF * VDW_CUTOFF;
    let mut attraction = 0.0;
    let mut repulsion = 0.0;
    for (index, residue) in receptor.receptor.residues().iter().enumerate() {
        if !environment.contains(&index) {
            continue;
        }
        for ra in residue.atoms.iter().filter(|a| a.is_heavy()) {
            let (r_half, r_eps) = lj_parameters(&ra.element);
            for la in ligand.atoms.iter().filter(|a| a.is_heavy()) {
                let d2 = distance_squared(&ra.coord, &la.coord);
                if d2 > cutoff2 {
                    continue;
                }
                let (l_half, l_eps) = lj_parameters(&la.element);
                let epsilon = (r_eps * l_eps).sqrt();
                let rmin = r_half + l_half;
                let ratio6 = (rmin / d2.sqrt().max(MIN_DISTANCE)).powi(6);
                repulsion += epsilon * ratio6 * ratio6;
                attraction -= 2.0 * epsilon * ratio6;
            }
        }
    }
    (attraction, repulsion)
}

/// Receptor with its features and charges computed once for all ligands
struct PreparedReceptor<'a> {
    receptor: &'a Receptor,
    features: Vec<Feature>,
    charges: Vec<(usize, Point, f64)>,
}

impl<'a> PreparedReceptor<'a> {
    fn new(receptor: &'a Receptor) -> Self {
        Self {
            receptor,
            features: receptor_features(receptor),
            charges: receptor_charges(receptor),
        }
    }
}

/// Outcome of a descriptor run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DescriptorSummary {
    /// Rows written
    pub written: usize,
    /// Ligands that could not be read or scored
    pub failed: usize,
}

/// Compute descriptors for every ligand of an SDF file and stream them to CSV.
///
/// The receptor is read and cleaned first; failing to read it is fatal.
/// Each row is flushed as soon as it is written. A ligand that cannot be
/// parsed or scored is logged and skipped. Ligands without a title are named
/// by their 1-based position among the written rows.
///
/// # Errors
/// Returns error if the receptor or ligand file cannot be opened, the
/// receptor has no atoms, or the output cannot be written
pub fn write_descriptors<P, Q, R>(
    calculator: &DescriptorCalculator,
    receptor_path: P,
    ligands_path: Q,
    output_path: R,
) -> Result<DescriptorSummary>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    let receptor_path = receptor_path.as_ref();
    info!(receptor = %receptor_path.display(), "Reading receptor");
    let mut receptor = Receptor::from_pdb_file(receptor_path)?;
    let report = receptor.clean();
    if report.isolated_hydrogens > 0 || report.unknown_elements > 0 {
        warn!(
            isolated_hydrogens = report.isolated_hydrogens,
            unknown_elements = report.unknown_elements,
            "Receptor has structural anomalies"
        );
    }
    debug!(
        residues = receptor.residue_count(),
        removed = report.non_standard_removed + report.fragments_removed,
        "Receptor cleaned"
    );

    let ligands = read_sdf(ligands_path.as_ref())?;
    let prepared = PreparedReceptor::new(&receptor);

    let mut writer = csv::Writer::from_writer(File::create(output_path.as_ref())?);
    let mut header = vec!["Ligand".to_string()];
    header.extend(calculator.column_names());
    writer.write_record(&header)?;
    writer.flush()?;

    let mut summary = DescriptorSummary::default();
    for (position, record) in ligands.enumerate() {
        let result = record.and_then(|ligand| {
            let row = calculator.calculate_prepared(&prepared, &ligand)?;
            Ok((ligand.name, row))
        });
        match result {
            Ok((name, row)) => {
                let name = name.unwrap_or_else(|| (summary.written + 1).to_string());
                let mut record = Vec::with_capacity(row.len() + 1);
                record.push(name);
                record.extend(row.into_iter().map(format_float));
                writer.write_record(&record)?;
                writer.flush()?;
                summary.written += 1;
            }
            Err(Error::Io(e)) => return Err(Error::Io(e)),
            Err(e) => {
                error!(record = position + 1, error = %e, "Failed to process ligand");
                summary.failed += 1;
            }
        }
    }

    info!(
        written = summary.written,
        failed = summary.failed,
        layout = calculator.layout().as_str(),
        "Descriptors written"
    );
    Ok(summary)
}
