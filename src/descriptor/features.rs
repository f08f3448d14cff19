//! Pharmacophore feature typing
//!
//! Receptor atoms are typed from residue templates. Ligand atoms are typed
//! from topology: rings, implicit hydrogens and (optionally) the usual
//! protonation state of acidic and basic groups at physiological pH.

use super::ligand::{Bond, Ligand, AROMATIC_BOND};
use super::structure::{Receptor, Residue};
use super::{
    centroid, distance_squared, hydrophobicity_scale, is_hydrogen, metal_charge, ring_normal,
    Point,
};
use std::collections::{HashSet, VecDeque};
use std::fmt;

/// Largest ring searched during ring perception
const MAX_RING_SIZE: usize = 8;

/// Hydrogens within this distance (Å) of a receptor donor belong to it
const DONOR_HYDROGEN_DISTANCE: f64 = 1.2;

/// Pharmacophore feature type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureType {
    /// Hydrophobic atom
    Hydrophobic,
    /// Aromatic ring
    Aromatic,
    /// Positive ionizable group
    PositiveIonizable,
    /// Negative ionizable group
    NegativeIonizable,
    /// Hydrogen-bond donor
    HBondDonor,
    /// Hydrogen-bond acceptor
    HBondAcceptor,
    /// Halogen-bond donor
    HalogenBondDonor,
    /// Halogen-bond acceptor
    HalogenBondAcceptor,
    /// Metal ion
    Metal,
}

impl FeatureType {
    /// Short code used in descriptor column names
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Hydrophobic => "H",
            Self::Aromatic => "AR",
            Self::PositiveIonizable => "PI",
            Self::NegativeIonizable => "NI",
            Self::HBondDonor => "HBD",
            Self::HBondAcceptor => "HBA",
            Self::HalogenBondDonor => "XBD",
            Self::HalogenBondAcceptor => "XBA",
            Self::Metal => "MET",
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A typed feature with the geometry needed for scoring
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature type
    pub kind: FeatureType,
    /// Feature position (atom, ring center or group center)
    pub position: Point,
    /// Element of the feature atom; empty for ring and group features
    pub element: String,
    /// Hydrophobicity weight in [0, 1]; 1 for non-hydrophobic features
    pub weight: f64,
    /// Hydrogen positions of a donor, when known
    pub hydrogens: Vec<Point>,
    /// Atom bonded to a halogen-bond donor
    pub anchor: Option<Point>,
    /// Ring plane normal of an aromatic feature
    pub normal: Option<Point>,
    /// Receptor residue index
    pub residue: Option<usize>,
}

impl Feature {
    fn new(kind: FeatureType, position: Point, element: &str) -> Self {
        Self {
            kind,
            position,
            element: element.to_string(),
            weight: 1.0,
            hydrogens: Vec::new(),
            anchor: None,
            normal: None,
            residue: None,
        }
    }

    fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.clamp(0.0, 1.0);
        self
    }

    fn with_hydrogens(mut self, hydrogens: Vec<Point>) -> Self {
        self.hydrogens = hydrogens;
        self
    }
}

// ---------------------------------------------------------------------------
// Receptor
// ---------------------------------------------------------------------------

struct Template {
    donors: &'static [&'static str],
    acceptors: &'static [&'static str],
    hydrophobic: &'static [&'static str],
    rings: &'static [&'static [&'static str]],
    positive: Option<&'static str>,
    negative: Option<&'static str>,
}

const BENZENE: &[&str] = &["CG", "CD1", "CE1", "CZ", "CE2", "CD2"];

fn template(residue: &str) -> Template {
    let empty: &[&str] = &[];
    let mut t = Template {
        donors: empty,
        acceptors: empty,
        hydrophobic: empty,
        rings: &[],
        positive: None,
        negative: None,
    };
    match residue {
        "ALA" => t.hydrophobic = &["CB"],
        "VAL" => t.hydrophobic = &["CB", "CG1", "CG2"],
        "LEU" => t.hydrophobic = &["CB", "CG", "CD1", "CD2"],
        "ILE" => t.hydrophobic = &["CB", "CG1", "CG2", "CD1"],
        "MET" => {
            t.hydrophobic = &["CB", "CG", "SD", "CE"];
            t.acceptors = &["SD"];
        }
        "PHE" => {
            t.hydrophobic = &["CB", "CG", "CD1", "CD2", "CE1", "CE2", "CZ"];
            t.rings = &[BENZENE];
        }
        "TYR" => {
            t.hydrophobic = &["CB", "CG", "CD1", "CD2", "CE1", "CE2"];
            t.rings = &[BENZENE];
            t.donors = &["OH"];
            t.acceptors = &["OH"];
        }
        "TRP" => {
            t.hydrophobic = &["CB", "CG", "CD2", "CE3", "CZ2", "CZ3", "CH2"];
            t.rings = &[
                &["CD2", "CE2", "CZ2", "CH2", "CZ3", "CE3"],
                &["CG", "CD1", "NE1", "CE2", "CD2"],
            ];
            t.donors = &["NE1"];
        }
        "HIS" => {
            t.rings = &[&["CG", "ND1", "CE1", "NE2", "CD2"]];
            t.donors = &["ND1", "NE2"];
            t.acceptors = &["ND1", "NE2"];
        }
        "PRO" => t.hydrophobic = &["CB", "CG"],
        "CYS" => t.hydrophobic = &["SG"],
        "THR" => {
            t.hydrophobic = &["CG2"];
            t.donors = &["OG1"];
            t.acceptors = &["OG1"];
        }
        "SER" => {
            t.donors = &["OG"];
            t.acceptors = &["OG"];
        }
        "ASN" => {
            t.donors = &["ND2"];
            t.acceptors = &["OD1"];
        }
        "GLN" => {
            t.donors = &["NE2"];
            t.acceptors = &["OE1"];
        }
        "ASP" => {
            t.acceptors = &["OD1", "OD2"];
            t.negative = Some("CG");
        }
        "GLU" => {
            t.acceptors = &["OE1", "OE2"];
            t.negative = Some("CD");
        }
        "LYS" => {
            t.hydrophobic = &["CG", "CD"];
            t.donors = &["NZ"];
            t.positive = Some("NZ");
        }
        "ARG" => {
            t.hydrophobic = &["CG"];
            t.donors = &["NE", "NH1", "NH2"];
            t.positive = Some("CZ");
        }
        "A" | "DA" => {
            t.donors = &["N6"];
            t.acceptors = &["N1", "N3", "N7", "OP1", "OP2"];
        }
        "G" | "DG" => {
            t.donors = &["N1", "N2"];
            t.acceptors = &["O6", "N3", "N7", "OP1", "OP2"];
        }
        "C" | "DC" => {
            t.donors = &["N4"];
            t.acceptors = &["O2", "N3", "OP1", "OP2"];
        }
        "U" | "T" | "DT" | "DU" => {
            t.donors = &["N3"];
            t.acceptors = &["O2", "O4", "OP1", "OP2"];
        }
        _ => {}
    }
    t
}

fn is_amino_acid(residue: &Residue) -> bool {
    residue.name.len() == 3 && residue.is_standard()
}

fn residue_hydrogens(residue: &Residue, donor: &Point) -> Vec<Point> {
    let max2 = DONOR_HYDROGEN_DISTANCE * DONOR_HYDROGEN_DISTANCE;
    residue
        .atoms
        .iter()
        .filter(|a| is_hydrogen(&a.element) && distance_squared(&a.coord, donor) <= max2)
        .map(|a| a.coord)
        .collect()
}

fn type_residue(index: usize, residue: &Residue, out: &mut Vec<Feature>) {
    let start = out.len();

    if residue.is_single_metal() {
        let atom = &residue.atoms[0];
        out.push(Feature::new(FeatureType::Metal, atom.coord, &atom.element));
    }

    if is_amino_acid(residue) {
        if residue.name != "PRO" {
            if let Some(n) = residue.atom("N") {
                let hydrogens = residue_hydrogens(residue, &n.coord);
                out.push(
                    Feature::new(FeatureType::HBondDonor, n.coord, "N").with_hydrogens(hydrogens),
                );
            }
        }
        for name in ["O", "OXT"] {
            if let Some(o) = residue.atom(name) {
                out.push(Feature::new(FeatureType::HBondAcceptor, o.coord, "O"));
                out.push(Feature::new(FeatureType::HalogenBondAcceptor, o.coord, "O"));
            }
        }
    }

    let t = template(&residue.name);
    for name in t.donors {
        if let Some(atom) = residue.atom(name) {
            let hydrogens = residue_hydrogens(residue, &atom.coord);
            out.push(
                Feature::new(FeatureType::HBondDonor, atom.coord, &atom.element)
                    .with_hydrogens(hydrogens),
            );
        }
    }
    for name in t.acceptors {
        if let Some(atom) = residue.atom(name) {
            if atom.element != "S" {
                out.push(Feature::new(FeatureType::HBondAcceptor, atom.coord, &atom.element));
            }
            out.push(Feature::new(FeatureType::HalogenBondAcceptor, atom.coord, &atom.element));
        }
    }
    if residue.name == "CYS" {
        if let Some(sg) = residue.atom("SG") {
            out.push(Feature::new(FeatureType::HalogenBondAcceptor, sg.coord, "S"));
        }
    }

    let weight = (hydrophobicity_scale(&residue.name) + 4.5) / 9.0;
    for name in t.hydrophobic {
        if let Some(atom) = residue.atom(name) {
            out.push(
                Feature::new(FeatureType::Hydrophobic, atom.coord, &atom.element)
                    .with_weight(weight),
            );
        }
    }

    for ring in t.rings {
        let points: Option<Vec<Point>> = ring
            .iter()
            .map(|n| residue.atom(n).map(|a| a.coord))
            .collect();
        // Incomplete side chains have no ring feature
        if let Some(points) = points {
            if let Some(center) = centroid(&points) {
                let mut feature = Feature::new(FeatureType::Aromatic, center, "");
                feature.normal = ring_normal(&points);
                out.push(feature);
            }
        }
    }

    if let Some(name) = t.positive {
        if let Some(atom) = residue.atom(name) {
            out.push(Feature::new(FeatureType::PositiveIonizable, atom.coord, ""));
        }
    }
    if let Some(name) = t.negative {
        if let Some(atom) = residue.atom(name) {
            out.push(Feature::new(FeatureType::NegativeIonizable, atom.coord, ""));
        }
    }

    for feature in &mut out[start..] {
        feature.residue = Some(index);
    }
}

/// Type every residue of a (cleaned) receptor
#[must_use]
pub fn receptor_features(receptor: &Receptor) -> Vec<Feature> {
    let mut features = Vec::new();
    for (index, residue) in receptor.residues().iter().enumerate() {
        type_residue(index, residue, &mut features);
    }
    features
}

/// Charged receptor atoms as `(residue index, position, charge)`
pub(crate) fn receptor_charges(receptor: &Receptor) -> Vec<(usize, Point, f64)> {
    let mut charges = Vec::new();
    for (index, residue) in receptor.residues().iter().enumerate() {
        for atom in &residue.atoms {
            let q = match (residue.name.as_str(), atom.name.as_str()) {
                ("ASP", "OD1" | "OD2") | ("GLU", "OE1" | "OE2") | (_, "OP1" | "OP2") => -0.5,
                ("LYS", "NZ") => 1.0,
                ("ARG", "NH1" | "NH2") => 0.5,
                _ if residue.is_single_metal() => metal_charge(&atom.element),
                _ => continue,
            };
            charges.push((index, atom.coord, q));
        }
    }
    charges
}

// ---------------------------------------------------------------------------
// Ligand
// ---------------------------------------------------------------------------

/// Typed ligand: features plus per-atom charges for electrostatics
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LigandPerception {
    pub features: Vec<Feature>,
    pub charges: Vec<f64>,
}

struct Topology<'a> {
    ligand: &'a Ligand,
    adjacency: Vec<Vec<Bond>>,
    hydrogens: Vec<usize>,
    aromatic: Vec<bool>,
    rings: Vec<Vec<usize>>,
}

impl<'a> Topology<'a> {
    fn new(ligand: &'a Ligand) -> Self {
        let adjacency = ligand.adjacency();
        let rings = perceive_rings(ligand, &adjacency);
        let mut aromatic = vec![false; ligand.atoms.len()];
        for bond in ligand.bonds.iter().filter(|b| b.is_aromatic()) {
            aromatic[bond.from] = true;
            aromatic[bond.to] = true;
        }
        let aromatic_rings: Vec<&Vec<usize>> = rings
            .iter()
            .filter(|r| is_aromatic_ring(ligand, &adjacency, r))
            .collect();
        for ring in &aromatic_rings {
            for &atom in *ring {
                aromatic[atom] = true;
            }
        }
        let hydrogens = (0..ligand.atoms.len())
            .map(|i| hydrogen_count(ligand, &adjacency, i))
            .collect();
        let rings = aromatic_rings.into_iter().cloned().collect();
        Self {
            ligand,
            adjacency,
            hydrogens,
            aromatic,
            rings,
        }
    }

    fn element(&self, atom: usize) -> &str {
        &self.ligand.atoms[atom].element
    }

    fn heavy_neighbors(&self, atom: usize) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.adjacency[atom]
            .iter()
            .map(move |b| (b.partner(atom), b.order))
            .filter(move |(n, _)| self.ligand.atoms[*n].is_heavy())
    }

    fn heavy_degree(&self, atom: usize) -> usize {
        self.heavy_neighbors(atom).count()
    }

    fn explicit_hydrogens(&self, atom: usize) -> Vec<Point> {
        self.adjacency[atom]
            .iter()
            .map(|b| b.partner(atom))
            .filter(|&n| is_hydrogen(self.element(n)))
            .map(|n| self.ligand.atoms[n].coord)
            .collect()
    }

    /// Carbon double bonded to O, S or N (carbonyl, thiocarbonyl, imine)
    fn is_unsaturated_carbon(&self, atom: usize) -> bool {
        self.element(atom) == "C"
            && self
                .heavy_neighbors(atom)
                .any(|(n, order)| order == 2 && matches!(self.element(n), "O" | "S" | "N"))
    }

    /// S or P carrying a double-bonded oxygen
    fn is_oxo_acid_center(&self, atom: usize) -> bool {
        matches!(self.element(atom), "S" | "P")
            && self
                .heavy_neighbors(atom)
                .any(|(n, order)| order == 2 && self.element(n) == "O")
    }
}

/// Shortest ring through each bond, deduplicated, heavy atoms only
fn perceive_rings(ligand: &Ligand, adjacency: &[Vec<Bond>]) -> Vec<Vec<usize>> {
    let mut rings: Vec<Vec<usize>> = Vec::new();
    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    let heavy = |i: usize| ligand.atoms[i].is_heavy();

    for bond in &ligand.bonds {
        if !heavy(bond.from) || !heavy(bond.to) {
            continue;
        }
        // BFS from `from` to `to` without the bond itself
        let mut parent: Vec<Option<usize>> = vec![None; ligand.atoms.len()];
        let mut depth = vec![usize::MAX; ligand.atoms.len()];
        let mut queue = VecDeque::from([bond.from]);
        depth[bond.from] = 0;
        while let Some(u) = queue.pop_front() {
            if u == bond.to || depth[u] + 1 >= MAX_RING_SIZE {
                continue;
            }
            for b in &adjacency[u] {
                let v = b.partner(u);
                if !heavy(v) || depth[v] != usize::MAX || (u == bond.from && v == bond.to) {
                    continue;
                }
                depth[v] = depth[u] + 1;
                parent[v] = Some(u);
                queue.push_back(v);
            }
        }
        if depth[bond.to] == usize::MAX {
            continue;
        }
        let mut path = vec![bond.to];
        let mut cur = bond.to;
        while let Some(p) = parent[cur] {
            path.push(p);
            cur = p;
        }
        let mut key = path.clone();
        key.sort_unstable();
        if seen.insert(key) {
            rings.push(path);
        }
    }
    rings
}

fn bond_order(adjacency: &[Vec<Bond>], a: usize, b: usize) -> Option<u8> {
    adjacency[a]
        .iter()
        .find(|bond| bond.partner(a) == b)
        .map(|bond| bond.order)
}

/// Five- and six-membered rings that are aromatic or Kekulé-alternating
fn is_aromatic_ring(ligand: &Ligand, adjacency: &[Vec<Bond>], ring: &[usize]) -> bool {
    if !matches!(ring.len(), 5 | 6) {
        return false;
    }
    let ring_bonds: Vec<u8> = (0..ring.len())
        .filter_map(|i| bond_order(adjacency, ring[i], ring[(i + 1) % ring.len()]))
        .collect();
    if ring_bonds.len() != ring.len() {
        return false;
    }
    if ring_bonds.iter().all(|&o| o == AROMATIC_BOND) {
        return true;
    }

    // Atoms with a double bond inside the ring
    let unsaturated = (0..ring.len())
        .filter(|&i| {
            let prev = ring_bonds[(i + ring.len() - 1) % ring.len()];
            let next = ring_bonds[i];
            prev == 2 || next == 2 || prev == AROMATIC_BOND || next == AROMATIC_BOND
        })
        .count();
    match ring.len() {
        6 => unsaturated == 6,
        _ => {
            unsaturated == 4
                && ring.iter().enumerate().any(|(i, &atom)| {
                    let prev = ring_bonds[(i + ring.len() - 1) % ring.len()];
                    let next = ring_bonds[i];
                    prev == 1
                        && next == 1
                        && matches!(ligand.atoms[atom].element.as_str(), "N" | "O" | "S")
                })
        }
    }
}

/// Explicit plus implicit hydrogens from the element's default valence
fn hydrogen_count(ligand: &Ligand, adjacency: &[Vec<Bond>], atom: usize) -> usize {
    let a = &ligand.atoms[atom];
    if is_hydrogen(&a.element) {
        return 0;
    }
    let explicit = adjacency[atom]
        .iter()
        .filter(|b| is_hydrogen(&ligand.atoms[b.partner(atom)].element))
        .count();
    // Aromatic bonds count 1.5; work in half units
    let half_units: usize = adjacency[atom]
        .iter()
        .map(|b| if b.order == AROMATIC_BOND { 3 } else { 2 * usize::from(b.order) })
        .sum();
    let used = i32::try_from(half_units.div_ceil(2)).unwrap_or(i32::MAX);
    let charge = i32::from(a.charge);

    let valence = match a.element.as_str() {
        "C" => 4 - charge.abs(),
        "N" => 3 + charge,
        "O" => 2 + charge,
        "B" => 3,
        "S" if used <= 2 + charge => 2 + charge,
        "P" if used <= 3 => 3,
        "F" | "CL" | "BR" | "I" => 1,
        _ => return explicit,
    };
    let implicit = usize::try_from(valence - used).unwrap_or(0);
    explicit + implicit
}

/// Ionizable group found by protonation normalization
struct IonizableGroup {
    kind: FeatureType,
    center: usize,
    /// Atoms sharing the group charge
    charged: Vec<usize>,
    /// Atom gaining (+1) or losing (-1) a hydrogen
    protonation: Option<(usize, i32)>,
}

fn terminal_oxygens(topo: &Topology<'_>, center: usize) -> Vec<(usize, u8)> {
    topo.heavy_neighbors(center)
        .filter(|&(n, _)| topo.element(n) == "O" && topo.heavy_degree(n) == 1)
        .collect()
}

fn find_acids(topo: &Topology<'_>, groups: &mut Vec<IonizableGroup>) {
    for center in 0..topo.ligand.atoms.len() {
        let oxygens = terminal_oxygens(topo, center);
        let double = oxygens.iter().filter(|(_, o)| *o == 2).count();
        let single: Vec<usize> = oxygens
            .iter()
            .filter(|(_, o)| *o == 1)
            .map(|&(n, _)| n)
            .filter(|&n| topo.hydrogens[n] > 0 || topo.ligand.atoms[n].charge < 0)
            .collect();
        let is_acid = match topo.element(center) {
            "C" => double == 1 && !single.is_empty() && !topo.aromatic[center],
            "P" => double >= 1 && !single.is_empty(),
            "S" => double >= 2 && !single.is_empty(),
            _ => false,
        };
        if !is_acid {
            continue;
        }
        let protonated = single.iter().copied().find(|&n| topo.ligand.atoms[n].charge == 0);
        groups.push(IonizableGroup {
            kind: FeatureType::NegativeIonizable,
            center,
            charged: oxygens.iter().map(|&(n, _)| n).collect(),
            protonation: protonated.map(|n| (n, -1)),
        });
    }
}

fn find_bases(topo: &Topology<'_>, groups: &mut Vec<IonizableGroup>) {
    let mut in_amidine: HashSet<usize> = HashSet::new();

    // Amidines and guanidines: sp2 carbon with =N and at least one -N
    for center in 0..topo.ligand.atoms.len() {
        if topo.element(center) != "C" || topo.aromatic[center] {
            continue;
        }
        let nitrogens: Vec<(usize, u8)> = topo
            .heavy_neighbors(center)
            .filter(|&(n, _)| topo.element(n) == "N" && !topo.aromatic[n])
            .collect();
        let imine = nitrogens.iter().find(|(_, o)| *o == 2).map(|&(n, _)| n);
        let amines = nitrogens.iter().filter(|(_, o)| *o == 1).count();
        let has_oxo = topo
            .heavy_neighbors(center)
            .any(|(n, o)| o == 2 && matches!(topo.element(n), "O" | "S"));
        let Some(imine) = imine else { continue };
        if amines == 0 || has_oxo || topo.ligand.atoms[imine].charge != 0 {
            continue;
        }
        let members: Vec<usize> = nitrogens.iter().map(|&(n, _)| n).collect();
        in_amidine.extend(members.iter().copied());
        groups.push(IonizableGroup {
            kind: FeatureType::PositiveIonizable,
            center,
            charged: members,
            protonation: Some((imine, 1)),
        });
    }

    // Aliphatic amines
    for n in 0..topo.ligand.atoms.len() {
        if topo.element(n) != "N"
            || topo.aromatic[n]
            || in_amidine.contains(&n)
            || topo.ligand.atoms[n].charge != 0
        {
            continue;
        }
        let saturated = topo.adjacency[n].iter().all(|b| b.order == 1);
        let plain_neighbors = topo.heavy_neighbors(n).all(|(m, _)| {
            topo.element(m) == "C"
                && !topo.aromatic[m]
                && !topo.is_unsaturated_carbon(m)
                && !topo.is_oxo_acid_center(m)
        });
        if saturated && plain_neighbors && topo.heavy_degree(n) + topo.hydrogens[n] == 3 {
            groups.push(IonizableGroup {
                kind: FeatureType::PositiveIonizable,
                center: n,
                charged: vec![n],
                protonation: Some((n, 1)),
            });
        }
    }
}

/// Charged atom bonded to an oppositely charged atom (nitro, N-oxide)
fn is_charge_separated(topo: &Topology<'_>, atom: usize) -> bool {
    let q = topo.ligand.atoms[atom].charge;
    topo.heavy_neighbors(atom)
        .any(|(n, _)| i32::from(topo.ligand.atoms[n].charge) * i32::from(q) < 0)
}

fn is_amide_nitrogen(topo: &Topology<'_>, n: usize) -> bool {
    topo.heavy_neighbors(n)
        .any(|(m, _)| topo.is_unsaturated_carbon(m) || topo.is_oxo_acid_center(m))
}

fn hydrophobic_weight(topo: &Topology<'_>, atom: usize) -> Option<f64> {
    let element = topo.element(atom);
    if topo.ligand.atoms[atom].charge != 0 {
        return None;
    }
    match element {
        "CL" | "BR" | "I" => Some(1.0),
        "S" => {
            let carbons_only = topo.heavy_neighbors(atom).all(|(n, _)| topo.element(n) == "C");
            (carbons_only && topo.hydrogens[atom] == 0 && topo.heavy_degree(atom) == 2)
                .then_some(0.5)
        }
        "C" => {
            let mut weight = 1.0;
            for (n, _) in topo.heavy_neighbors(atom) {
                match topo.element(n) {
                    "C" => {}
                    "S" | "F" | "CL" | "BR" | "I" => weight = 0.75_f64.min(weight),
                    _ => return None,
                }
            }
            Some(weight)
        }
        _ => None,
    }
}

/// Type a ligand into features and per-atom charges
pub(crate) fn perceive_ligand(ligand: &Ligand, normalize_charges: bool) -> LigandPerception {
    let mut topo = Topology::new(ligand);
    let n_atoms = ligand.atoms.len();

    let mut groups = Vec::new();
    if normalize_charges {
        find_acids(&topo, &mut groups);
        find_bases(&topo, &mut groups);
    }

    let mut charges: Vec<f64> = ligand.atoms.iter().map(|a| f64::from(a.charge)).collect();
    let mut grouped = vec![false; n_atoms];
    let mut protonated = vec![false; n_atoms];
    for group in &groups {
        grouped[group.center] = true;
        #[allow(clippy::cast_precision_loss)]
        let share = group.charged.len().max(1) as f64;
        let sign = if group.kind == FeatureType::PositiveIonizable { 1.0 } else { -1.0 };
        for &atom in &group.charged {
            grouped[atom] = true;
            charges[atom] = sign / share;
        }
        if let Some((atom, delta)) = group.protonation {
            let h = &mut topo.hydrogens[atom];
            *h = usize::try_from(i64::try_from(*h).unwrap_or(0) + i64::from(delta)).unwrap_or(0);
            protonated[atom] = delta > 0;
        }
    }

    let mut features: Vec<Feature> = groups
        .iter()
        .map(|g| Feature::new(g.kind, ligand.atoms[g.center].coord, ""))
        .collect();

    // Formal charges outside normalized groups
    for (i, atom) in ligand.atoms.iter().enumerate() {
        if grouped[i] || atom.charge == 0 || !atom.is_heavy() || is_charge_separated(&topo, i) {
            continue;
        }
        let kind = if atom.charge > 0 {
            FeatureType::PositiveIonizable
        } else {
            FeatureType::NegativeIonizable
        };
        features.push(Feature::new(kind, atom.coord, ""));
    }

    for ring in &topo.rings {
        let points: Vec<Point> = ring.iter().map(|&i| ligand.atoms[i].coord).collect();
        if let Some(center) = centroid(&points) {
            let mut feature = Feature::new(FeatureType::Aromatic, center, "");
            feature.normal = ring_normal(&points);
            features.push(feature);
        }
    }

    for (i, atom) in ligand.atoms.iter().enumerate() {
        if !atom.is_heavy() {
            continue;
        }
        let element = atom.element.as_str();
        let charge = if grouped[i] { charges[i] } else { f64::from(atom.charge) };

        if matches!(element, "N" | "O") && topo.hydrogens[i] > 0 {
            features.push(
                Feature::new(FeatureType::HBondDonor, atom.coord, element)
                    .with_hydrogens(topo.explicit_hydrogens(i)),
            );
        }

        let acceptor = match element {
            "O" => charge <= 0.0 && !topo.aromatic[i],
            "N" => {
                charge <= 0.0
                    && !protonated[i]
                    && topo.hydrogens[i] + topo.heavy_degree(i) < 4
                    && if topo.aromatic[i] {
                        topo.heavy_degree(i) == 2 && topo.hydrogens[i] == 0
                    } else {
                        !is_amide_nitrogen(&topo, i)
                            && topo.heavy_neighbors(i).all(|(m, order)| order > 1 || !topo.aromatic[m])
                    }
            }
            _ => false,
        };
        if acceptor {
            features.push(Feature::new(FeatureType::HBondAcceptor, atom.coord, element));
        }

        if matches!(element, "CL" | "BR" | "I") {
            let carbon = topo
                .heavy_neighbors(i)
                .find(|&(n, _)| topo.element(n) == "C")
                .map(|(n, _)| ligand.atoms[n].coord);
            if let (Some(anchor), 1) = (carbon, topo.heavy_degree(i)) {
                let mut feature = Feature::new(FeatureType::HalogenBondDonor, atom.coord, element);
                feature.anchor = Some(anchor);
                features.push(feature);
            }
        }

        if !grouped[i] {
            if let Some(weight) = hydrophobic_weight(&topo, i) {
                features.push(
                    Feature::new(FeatureType::Hydrophobic, atom.coord, element)
                        .with_weight(weight),
                );
            }
        }
    }

    if !normalize_charges {
        charges = ligand.atoms.iter().map(|a| f64::from(a.charge)).collect();
    }

    LigandPerception { features, charges }
}

/// Type a ligand into pharmacophore features
#[must_use]
pub fn ligand_features(ligand: &Ligand, normalize_charges: bool) -> Vec<Feature> {
    perceive_ligand(ligand, normalize_charges).features
}
