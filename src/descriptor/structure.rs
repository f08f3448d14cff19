//! PDB receptor reading and cleaning

use super::{distance_squared, is_hydrogen, is_known_element, is_metal, Point};
use crate::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Standard residues kept by [`Receptor::clean`]: amino acids and nucleotides
const STANDARD_RESIDUES: &[&str] = &[
    "ALA", "ARG", "ASN", "ASP", "CYS", "GLN", "GLU", "GLY", "HIS", "ILE", "LEU", "LYS", "MET",
    "PHE", "PRO", "SER", "THR", "TRP", "TYR", "VAL", "A", "C", "G", "U", "T", "I", "DA", "DC",
    "DG", "DT", "DU", "DI",
];

/// Standard residues with fewer atoms than this (hydrogens included) are removed as fragments
const MIN_STANDARD_ATOMS: usize = 5;

/// Hydrogens farther than this (Å) from every heavy atom of their residue are isolated
const MAX_HYDROGEN_BOND_LENGTH: f64 = 1.3;

/// Single receptor atom
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Atom serial number
    pub serial: u32,
    /// Atom name (e.g. "CA", "OD1")
    pub name: String,
    /// Element symbol, upper case
    pub element: String,
    /// Coordinates in Å
    pub coord: Point,
}

impl Atom {
    /// Check if this is a heavy atom
    #[must_use]
    pub fn is_heavy(&self) -> bool {
        !is_hydrogen(&self.element)
    }
}

/// Residue with its atoms in file order
#[derive(Debug, Clone, PartialEq)]
pub struct Residue {
    /// Residue name, upper case
    pub name: String,
    /// Chain identifier
    pub chain_id: char,
    /// Residue sequence number
    pub seq: i32,
    /// Insertion code
    pub insertion_code: Option<char>,
    /// Whether the residue came from HETATM records
    pub is_hetatm: bool,
    /// Atoms of the residue
    pub atoms: Vec<Atom>,
}

impl Residue {
    /// Amino acid or nucleotide
    #[must_use]
    pub fn is_standard(&self) -> bool {
        STANDARD_RESIDUES.contains(&self.name.as_str())
    }

    /// Residue made of exactly one metal atom
    #[must_use]
    pub fn is_single_metal(&self) -> bool {
        self.atoms.len() == 1 && is_metal(&self.atoms[0].element)
    }

    /// Number of non-hydrogen atoms
    #[must_use]
    pub fn heavy_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| a.is_heavy()).count()
    }

    /// Look up an atom by name
    #[must_use]
    pub fn atom(&self, name: &str) -> Option<&Atom> {
        self.atoms.iter().find(|a| a.name == name)
    }

    /// Short label such as `ASP A 25`
    #[must_use]
    pub fn label(&self) -> String {
        match self.insertion_code {
            Some(icode) => format!("{} {} {}{icode}", self.name, self.chain_id, self.seq),
            None => format!("{} {} {}", self.name, self.chain_id, self.seq),
        }
    }
}

/// Counts of what [`Receptor::clean`] removed or flagged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Non-standard residues removed (waters, ligands, additives)
    pub non_standard_removed: usize,
    /// Standard residues removed for having too few heavy atoms
    pub fragments_removed: usize,
    /// Hydrogens without a heavy atom within bonding distance
    pub isolated_hydrogens: usize,
    /// Atoms whose element is not recognised
    pub unknown_elements: usize,
}

/// Receptor structure: residues of the first model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Receptor {
    residues: Vec<Residue>,
}

impl Receptor {
    /// Read a receptor from a PDB file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or holds no atoms
    pub fn from_pdb_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        Self::from_pdb_str(&contents).map_err(|e| match e {
            Error::Structure(msg) => Error::Structure(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Parse a receptor from PDB text.
    ///
    /// Only `ATOM`/`HETATM` records of the first model are read; alternate
    /// locations other than blank and `A` are skipped.
    ///
    /// # Errors
    /// Returns error on a malformed coordinate record or when no atoms are found
    pub fn from_pdb_str(contents: &str) -> Result<Self> {
        let mut residues: Vec<Residue> = Vec::new();
        let mut lookup: HashMap<(char, i32, Option<char>, String), usize> = HashMap::new();
        let mut seen_model = false;

        for (line_no, line) in contents.lines().enumerate() {
            if line.starts_with("MODEL") {
                if seen_model {
                    break;
                }
                seen_model = true;
                continue;
            }
            if line.starts_with("ENDMDL") {
                break;
            }

            let record = line.get(0..6).unwrap_or("").trim();
            if record != "ATOM" && record != "HETATM" {
                continue;
            }

            let alt_loc = line.get(16..17).and_then(extract_char);
            if !matches!(alt_loc, None | Some('A')) {
                continue;
            }

            let parsed = parse_atom_line(line)
                .map_err(|msg| Error::Structure(format!("line {}: {msg}", line_no + 1)))?;

            let key = (
                parsed.chain_id,
                parsed.seq,
                parsed.insertion_code,
                parsed.residue_name.clone(),
            );
            let index = *lookup.entry(key).or_insert_with(|| {
                residues.push(Residue {
                    name: parsed.residue_name.clone(),
                    chain_id: parsed.chain_id,
                    seq: parsed.seq,
                    insertion_code: parsed.insertion_code,
                    is_hetatm: record == "HETATM",
                    atoms: Vec::new(),
                });
                residues.len() - 1
            });
            residues[index].atoms.push(parsed.atom);
        }

        if residues.is_empty() {
            return Err(Error::Structure("no ATOM/HETATM records found".to_string()));
        }
        Ok(Self { residues })
    }

    /// Warn on isolated hydrogens and unknown elements across the whole
    /// structure, then remove non-standard residues (keeping single metal
    /// ions) and undersized standard fragments.
    pub fn clean(&mut self) -> CleanReport {
        let mut report = CleanReport::default();

        for residue in &self.residues {
            for atom in &residue.atoms {
                if !is_known_element(&atom.element) {
                    warn!(
                        residue = %residue.label(),
                        atom = %atom.name,
                        element = %atom.element,
                        "Unknown element"
                    );
                    report.unknown_elements += 1;
                } else if is_hydrogen(&atom.element) && is_isolated(atom, residue) {
                    warn!(residue = %residue.label(), atom = %atom.name, "Isolated hydrogen");
                    report.isolated_hydrogens += 1;
                }
            }
        }

        self.residues.retain(|residue| {
            if residue.is_standard() {
                if residue.atoms.len() < MIN_STANDARD_ATOMS {
                    warn!(
                        residue = %residue.label(),
                        atoms = residue.atoms.len(),
                        "Removing undersized residue fragment"
                    );
                    report.fragments_removed += 1;
                    return false;
                }
                true
            } else if residue.is_single_metal() {
                true
            } else {
                debug!(residue = %residue.label(), "Removing non-standard residue");
                report.non_standard_removed += 1;
                false
            }
        });

        report
    }

    /// Residues in file order
    #[must_use]
    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    /// Number of residues
    #[must_use]
    pub fn residue_count(&self) -> usize {
        self.residues.len()
    }

    /// Number of atoms
    #[must_use]
    pub fn atom_count(&self) -> usize {
        self.residues.iter().map(|r| r.atoms.len()).sum()
    }

    /// Indices of residues with any atom within `radius` of any of `points`
    #[must_use]
    pub fn environment(&self, points: &[Point], radius: f64) -> Vec<usize> {
        let r2 = radius * radius;
        self.residues
            .iter()
            .enumerate()
            .filter(|(_, residue)| {
                residue
                    .atoms
                    .iter()
                    .any(|a| points.iter().any(|p| distance_squared(&a.coord, p) <= r2))
            })
            .map(|(i, _)| i)
            .collect()
    }
}

fn is_isolated(hydrogen: &Atom, residue: &Residue) -> bool {
    let max2 = MAX_HYDROGEN_BOND_LENGTH * MAX_HYDROGEN_BOND_LENGTH;
    !residue
        .atoms
        .iter()
        .any(|a| a.is_heavy() && distance_squared(&a.coord, &hydrogen.coord) <= max2)
}

struct ParsedAtom {
    atom: Atom,
    residue_name: String,
    chain_id: char,
    seq: i32,
    insertion_code: Option<char>,
}

fn parse_atom_line(line: &str) -> std::result::Result<ParsedAtom, String> {
    let serial = line
        .get(6..11)
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(0);
    let name = line
        .get(12..16)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "missing atom name".to_string())?
        .to_string();
    let residue_name = line
        .get(17..20)
        .map(str::trim)
        .unwrap_or("")
        .to_ascii_uppercase();
    let chain_id = line.get(21..22).and_then(extract_char).unwrap_or(' ');
    let seq = line
        .get(22..26)
        .and_then(|s| s.trim().parse::<i32>().ok())
        .unwrap_or(0);
    let insertion_code = line.get(26..27).and_then(extract_char);

    let coord = [
        parse_f64_field(line, 30..38).ok_or_else(|| "invalid X coordinate".to_string())?,
        parse_f64_field(line, 38..46).ok_or_else(|| "invalid Y coordinate".to_string())?,
        parse_f64_field(line, 46..54).ok_or_else(|| "invalid Z coordinate".to_string())?,
    ];

    let element_field = line.get(76..78).map(str::trim).unwrap_or("");
    let element = resolve_element(element_field, &name, line.get(12..13));

    Ok(ParsedAtom {
        atom: Atom {
            serial,
            name,
            element,
            coord,
        },
        residue_name,
        chain_id,
        seq,
        insertion_code,
    })
}

fn parse_f64_field(line: &str, range: std::ops::Range<usize>) -> Option<f64> {
    line.get(range)?.trim().parse::<f64>().ok()
}

fn extract_char(slice: &str) -> Option<char> {
    slice.trim().chars().next()
}

/// Element from columns 77-78, else from the atom name.
///
/// Names starting in column 13 carry a two-letter element (`FE`, `ZN`);
/// names starting in column 14 carry a one-letter element.
fn resolve_element(element_field: &str, atom_name: &str, first_column: Option<&str>) -> String {
    let field: String = element_field
        .chars()
        .filter(char::is_ascii_alphabetic)
        .collect();
    if !field.is_empty() {
        return field.to_ascii_uppercase();
    }

    let letters: String = atom_name
        .chars()
        .filter(char::is_ascii_alphabetic)
        .collect::<String>()
        .to_ascii_uppercase();
    let two_letter =
        first_column.is_some_and(|c| c.chars().next().is_some_and(|ch| ch.is_ascii_alphabetic()));
    if two_letter && letters.len() >= 2 && is_known_element(&letters[..2]) {
        return letters[..2].to_string();
    }
    letters.chars().take(1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::too_many_arguments)]
    fn pdb_line(
        record: &str,
        serial: u32,
        name: &str,
        res_name: &str,
        chain: char,
        seq: i32,
        coord: Point,
        element: &str,
    ) -> String {
        format!(
            "{record:<6}{serial:>5} {name:<4} {res_name:<3} {chain}{seq:>4}    {:>8.3}{:>8.3}{:>8.3}  1.00 20.00          {element:>2}",
            coord[0], coord[1], coord[2]
        )
    }

    fn residue_lines(res: &str, seq: i32, names: &[(&str, &str)], origin: f64) -> Vec<String> {
        names
            .iter()
            .enumerate()
            .map(|(i, (name, element))| {
                let i = u32::try_from(i).unwrap();
                let serial = u32::try_from(seq).unwrap() * 10 + i;
                let x = origin + f64::from(i) * 1.4;
                pdb_line("ATOM", serial, name, res, 'A', seq, [x, 0.0, 0.0], element)
            })
            .collect()
    }

    #[test]
    fn test_parse_residues_and_elements() {
        let mut lines = residue_lines("ALA", 1, &[("N", "N"), ("CA", "C"), ("C", "C"), ("O", "O"), ("CB", "C")], 0.0);
        lines.push(pdb_line("HETATM", 99, "ZN", "ZN", 'A', 300, [10.0, 0.0, 0.0], "ZN"));
        let receptor = Receptor::from_pdb_str(&lines.join("\n")).unwrap();

        assert_eq!(receptor.residue_count(), 2);
        assert_eq!(receptor.atom_count(), 6);
        assert_eq!(receptor.residues()[0].atom("CB").unwrap().element, "C");
        assert!(receptor.residues()[1].is_hetatm);
        assert!(receptor.residues()[1].is_single_metal());
    }

    #[test]
    fn test_element_inferred_from_name() {
        assert_eq!(resolve_element("", "CA", Some(" ")), "C");
        assert_eq!(resolve_element("", "FE", Some("F")), "FE");
        assert_eq!(resolve_element("", "OD1", Some(" ")), "O");
        assert_eq!(resolve_element("Cl", "CL1", None), "CL");
    }

    #[test]
    fn test_first_model_and_altloc() {
        let a = pdb_line("ATOM", 1, "CA", "GLY", 'A', 1, [0.0, 0.0, 0.0], "C");
        let mut alt_b = pdb_line("ATOM", 2, "CB", "GLY", 'A', 1, [1.0, 0.0, 0.0], "C");
        alt_b.replace_range(16..17, "B");
        let second = pdb_line("ATOM", 3, "CA", "GLY", 'A', 2, [5.0, 0.0, 0.0], "C");
        let text = format!("MODEL        1\n{a}\n{alt_b}\nENDMDL\nMODEL        2\n{second}\nENDMDL\n");

        let receptor = Receptor::from_pdb_str(&text).unwrap();
        assert_eq!(receptor.atom_count(), 1);
    }

    #[test]
    fn test_empty_receptor_is_error() {
        assert!(matches!(
            Receptor::from_pdb_str("HEADER    nothing here\n"),
            Err(Error::Structure(_))
        ));
        assert!(matches!(
            Receptor::from_pdb_file("/nonexistent/receptor.pdb"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_malformed_coordinate_is_error() {
        let mut line = pdb_line("ATOM", 1, "CA", "GLY", 'A', 1, [0.0, 0.0, 0.0], "C");
        line.replace_range(30..38, "   abcde");
        assert!(Receptor::from_pdb_str(&line).is_err());
    }

    #[test]
    fn test_clean_removes_waters_and_fragments_keeps_metals() {
        let mut lines = residue_lines("LEU", 1, &[("N", "N"), ("CA", "C"), ("C", "C"), ("O", "O"), ("CB", "C")], 0.0);
        lines.extend(residue_lines("SER", 2, &[("N", "N"), ("CA", "C")], 20.0));
        lines.push(pdb_line("HETATM", 50, "O", "HOH", 'A', 400, [30.0, 0.0, 0.0], "O"));
        lines.push(pdb_line("HETATM", 51, "MG", "MG", 'A', 401, [35.0, 0.0, 0.0], "MG"));
        lines.extend(residue_lines("EDO", 402, &[("C1", "C"), ("O1", "O")], 40.0));

        let mut receptor = Receptor::from_pdb_str(&lines.join("\n")).unwrap();
        let report = receptor.clean();

        assert_eq!(report.fragments_removed, 1);
        assert_eq!(report.non_standard_removed, 2);
        let names: Vec<&str> = receptor.residues().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["LEU", "MG"]);
    }

    #[test]
    fn test_clean_flags_isolated_hydrogen_and_unknown_element() {
        let mut lines = residue_lines("VAL", 1, &[("N", "N"), ("CA", "C"), ("C", "C"), ("O", "O"), ("CB", "C")], 0.0);
        lines.push(pdb_line("ATOM", 90, "H", "VAL", 'A', 1, [0.0, 5.0, 0.0], "H"));
        lines.push(pdb_line("ATOM", 91, "HA", "VAL", 'A', 1, [1.4, 1.0, 0.0], "H"));
        lines.push(pdb_line("ATOM", 92, "QQ", "VAL", 'A', 1, [2.8, 1.0, 0.0], "QQ"));

        let mut receptor = Receptor::from_pdb_str(&lines.join("\n")).unwrap();
        let report = receptor.clean();
        assert_eq!(report.isolated_hydrogens, 1);
        assert_eq!(report.unknown_elements, 1);
        assert_eq!(receptor.residue_count(), 1);
    }

    #[test]
    fn test_environment_radius() {
        let mut lines = residue_lines("ALA", 1, &[("N", "N"), ("CA", "C"), ("C", "C"), ("O", "O")], 0.0);
        lines.extend(residue_lines("ALA", 2, &[("N", "N"), ("CA", "C"), ("C", "C"), ("O", "O")], 40.0));
        let receptor = Receptor::from_pdb_str(&lines.join("\n")).unwrap();

        // Residue 1 spans x = 0..4.2, residue 2 spans x = 40..44.2
        assert_eq!(receptor.environment(&[[10.0, 0.0, 0.0]], 21.0), vec![0]);
        assert_eq!(receptor.environment(&[[22.0, 0.0, 0.0]], 21.0), vec![0, 1]);
        assert_eq!(receptor.environment(&[[65.0, 0.0, 0.0]], 21.0), vec![1]);
        assert!(receptor.environment(&[[200.0, 0.0, 0.0]], 21.0).is_empty());
    }

    #[test]
    fn test_environment_radius_is_inclusive() {
        let lines = residue_lines("ALA", 1, &[("N", "N"), ("CA", "C"), ("C", "C"), ("O", "O")], 0.0);
        let receptor = Receptor::from_pdb_str(&lines.join("\n")).unwrap();

        assert_eq!(receptor.environment(&[[-21.0, 0.0, 0.0]], 21.0), vec![0]);
        assert!(receptor.environment(&[[-21.001, 0.0, 0.0]], 21.0).is_empty());
    }

    #[test]
    fn test_fragment_size_counts_hydrogens() {
        let mut lines = residue_lines(
            "GLY",
            1,
            &[("N", "N"), ("CA", "C"), ("C", "C"), ("H", "H"), ("HA2", "H")],
            0.0,
        );
        lines.extend(residue_lines("ALA", 2, &[("N", "N"), ("CA", "C"), ("C", "C"), ("O", "O")], 20.0));

        let mut receptor = Receptor::from_pdb_str(&lines.join("\n")).unwrap();
        let report = receptor.clean();

        assert_eq!(report.fragments_removed, 1);
        let kept: Vec<(&str, usize)> = receptor
            .residues()
            .iter()
            .map(|r| (r.name.as_str(), r.atoms.len()))
            .collect();
        assert_eq!(kept, vec![("GLY", 5)]);
    }

    #[test]
    fn test_anomalies_reported_in_removed_residues() {
        let mut lines = residue_lines("LEU", 1, &[("N", "N"), ("CA", "C"), ("C", "C"), ("O", "O"), ("CB", "C")], 0.0);
        lines.push(pdb_line("HETATM", 60, "O", "HOH", 'A', 400, [30.0, 0.0, 0.0], "O"));
        lines.push(pdb_line("HETATM", 61, "H1", "HOH", 'A', 400, [30.0, 4.0, 0.0], "H"));
        lines.push(pdb_line("HETATM", 62, "X1", "UNL", 'A', 401, [40.0, 0.0, 0.0], "QQ"));

        let mut receptor = Receptor::from_pdb_str(&lines.join("\n")).unwrap();
        let report = receptor.clean();

        assert_eq!(report.non_standard_removed, 2);
        assert_eq!(report.isolated_hydrogens, 1);
        assert_eq!(report.unknown_elements, 1);
        assert_eq!(receptor.residue_count(), 1);
    }
}
