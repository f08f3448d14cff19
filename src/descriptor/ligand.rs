//! SDF / MOL (V2000) ligand reading
//!
//! Records are separated by `$$$$`. A malformed record yields an error for
//! that record only; the reader moves on to the next one.

use super::{is_hydrogen, Point};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// Aromatic bond order code in the bond block
pub const AROMATIC_BOND: u8 = 4;

/// Ligand atom
#[derive(Debug, Clone, PartialEq)]
pub struct LigandAtom {
    /// Element symbol, upper case
    pub element: String,
    /// Coordinates in Å
    pub coord: Point,
    /// Formal charge
    pub charge: i8,
}

impl LigandAtom {
    /// Check if this is a heavy atom
    #[must_use]
    pub fn is_heavy(&self) -> bool {
        !is_hydrogen(&self.element)
    }
}

/// Bond between two atoms (0-based indices)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
    /// First atom
    pub from: usize,
    /// Second atom
    pub to: usize,
    /// Bond order 1-3, or [`AROMATIC_BOND`]
    pub order: u8,
}

impl Bond {
    /// Aromatic bond
    #[must_use]
    pub const fn is_aromatic(&self) -> bool {
        self.order == AROMATIC_BOND
    }

    /// The atom at the other end of the bond
    #[must_use]
    pub const fn partner(&self, atom: usize) -> usize {
        if self.from == atom {
            self.to
        } else {
            self.from
        }
    }
}

/// One ligand record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ligand {
    /// Title line, if not blank
    pub name: Option<String>,
    /// Atoms in block order
    pub atoms: Vec<LigandAtom>,
    /// Bonds in block order
    pub bonds: Vec<Bond>,
}

impl Ligand {
    /// Parse a single V2000 MOL block.
    ///
    /// # Errors
    /// Returns error on a missing or malformed header, counts line, atom or
    /// bond record, or a V3000 block
    pub fn from_mol_block(block: &str) -> Result<Self> {
        let lines: Vec<&str> = block.lines().collect();
        if lines.len() < 4 {
            return Err(Error::Structure(
                "not enough lines to parse a MOL header".to_string(),
            ));
        }

        let name = Some(lines[0].trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let counts = lines[3];
        if counts.contains("V3000") {
            return Err(Error::Structure("V3000 MOL blocks are not supported".to_string()));
        }
        let (natoms, nbonds) = parse_counts(counts)?;

        let first_atom = 4;
        let first_bond = first_atom + natoms;
        if lines.len() < first_bond + nbonds {
            return Err(Error::Structure(format!(
                "declared {natoms} atoms and {nbonds} bonds but the block is truncated"
            )));
        }

        let atoms = lines[first_atom..first_bond]
            .iter()
            .enumerate()
            .map(|(i, line)| {
                parse_atom(line).map_err(|msg| Error::Structure(format!("atom {}: {msg}", i + 1)))
            })
            .collect::<Result<Vec<_>>>()?;

        let bonds = lines[first_bond..first_bond + nbonds]
            .iter()
            .enumerate()
            .map(|(i, line)| {
                parse_bond(line, natoms)
                    .map_err(|msg| Error::Structure(format!("bond {}: {msg}", i + 1)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut ligand = Self { name, atoms, bonds };
        ligand.apply_property_block(&lines[first_bond + nbonds..])?;
        Ok(ligand)
    }

    /// `M  CHG` lines replace every charge of the atom block
    fn apply_property_block(&mut self, lines: &[&str]) -> Result<()> {
        let mut reset = false;
        for line in lines {
            if line.starts_with("M  END") {
                break;
            }
            let Some(rest) = line.strip_prefix("M  CHG") else {
                continue;
            };
            if !reset {
                for atom in &mut self.atoms {
                    atom.charge = 0;
                }
                reset = true;
            }
            let fields: Vec<i64> = rest
                .split_whitespace()
                .map(str::parse)
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| Error::Structure(format!("malformed charge line '{line}'")))?;
            let Some((&count, pairs)) = fields.split_first() else {
                continue;
            };
            if usize::try_from(count).ok() != Some(pairs.len() / 2) || pairs.len() % 2 != 0 {
                return Err(Error::Structure(format!("malformed charge line '{line}'")));
            }
            for pair in pairs.chunks(2) {
                let atom = usize::try_from(pair[0])
                    .ok()
                    .and_then(|i| i.checked_sub(1))
                    .filter(|&i| i < self.atoms.len())
                    .ok_or_else(|| Error::Structure(format!("charge on unknown atom {}", pair[0])))?;
                self.atoms[atom].charge = i8::try_from(pair[1])
                    .map_err(|_| Error::Structure(format!("charge {} out of range", pair[1])))?;
            }
        }
        Ok(())
    }

    /// Number of non-hydrogen atoms
    #[must_use]
    pub fn heavy_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| a.is_heavy()).count()
    }

    /// Atom coordinates in block order
    #[must_use]
    pub fn coordinates(&self) -> Vec<Point> {
        self.atoms.iter().map(|a| a.coord).collect()
    }

    /// Bonds incident to each atom
    #[must_use]
    pub fn adjacency(&self) -> Vec<Vec<Bond>> {
        let mut adjacency = vec![Vec::new(); self.atoms.len()];
        for bond in &self.bonds {
            adjacency[bond.from].push(*bond);
            adjacency[bond.to].push(*bond);
        }
        adjacency
    }
}

fn parse_counts(line: &str) -> Result<(usize, usize)> {
    let fixed = (
        line.get(0..3).and_then(|s| s.trim().parse::<usize>().ok()),
        line.get(3..6).and_then(|s| s.trim().parse::<usize>().ok()),
    );
    if let (Some(natoms), Some(nbonds)) = fixed {
        return Ok((natoms, nbonds));
    }
    let mut fields = line.split_whitespace().map(str::parse::<usize>);
    match (fields.next(), fields.next()) {
        (Some(Ok(natoms)), Some(Ok(nbonds))) => Ok((natoms, nbonds)),
        _ => Err(Error::Structure(format!("malformed counts line '{line}'"))),
    }
}

fn parse_atom(line: &str) -> std::result::Result<LigandAtom, String> {
    let (coord, symbol, code) = match parse_atom_fixed(line) {
        Some(parsed) => parsed,
        None => {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return Err("not enough columns".to_string());
            }
            let coord = [
                cols[0].parse().map_err(|_| "invalid X coordinate".to_string())?,
                cols[1].parse().map_err(|_| "invalid Y coordinate".to_string())?,
                cols[2].parse().map_err(|_| "invalid Z coordinate".to_string())?,
            ];
            let code = cols.get(5).and_then(|s| s.parse().ok()).unwrap_or(0);
            (coord, cols[3].to_string(), code)
        }
    };

    Ok(LigandAtom {
        element: symbol.to_ascii_uppercase(),
        coord,
        charge: charge_from_code(code),
    })
}

/// Fixed-column atom record: coordinates, symbol and charge code
fn parse_atom_fixed(line: &str) -> Option<(Point, String, u8)> {
    let x = line.get(0..10)?.trim().parse::<f64>().ok()?;
    let y = line.get(10..20)?.trim().parse::<f64>().ok()?;
    let z = line.get(20..30)?.trim().parse::<f64>().ok()?;
    let symbol = line.get(31..34)?.trim();
    let code = line
        .get(36..39)
        .and_then(|s| s.trim().parse::<u8>().ok())
        .unwrap_or(0);
    (!symbol.is_empty()).then(|| ([x, y, z], symbol.to_string(), code))
}

/// Atom block charge field: 1..3 → +3..+1, 5..7 → -1..-3, 4 is a radical
const fn charge_from_code(code: u8) -> i8 {
    match code {
        1 => 3,
        2 => 2,
        3 => 1,
        5 => -1,
        6 => -2,
        7 => -3,
        _ => 0,
    }
}

fn parse_bond(line: &str, natoms: usize) -> std::result::Result<Bond, String> {
    let fixed = (
        line.get(0..3).and_then(|s| s.trim().parse::<usize>().ok()),
        line.get(3..6).and_then(|s| s.trim().parse::<usize>().ok()),
        line.get(6..9).and_then(|s| s.trim().parse::<u8>().ok()),
    );
    let (a, b, order) = match fixed {
        (Some(a), Some(b), Some(order)) => (a, b, order),
        _ => {
            let cols: Vec<usize> = line
                .split_whitespace()
                .take(3)
                .map(str::parse)
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| "malformed bond record".to_string())?;
            if cols.len() < 3 {
                return Err("malformed bond record".to_string());
            }
            let order = u8::try_from(cols[2]).map_err(|_| "invalid bond order".to_string())?;
            (cols[0], cols[1], order)
        }
    };

    if !(1..=AROMATIC_BOND).contains(&order) {
        return Err(format!("unsupported bond order {order}"));
    }
    if a == 0 || b == 0 || a > natoms || b > natoms || a == b {
        return Err(format!("invalid atom pair {a}-{b}"));
    }
    Ok(Bond {
        from: a - 1,
        to: b - 1,
        order,
    })
}

/// Iterator over the records of an SDF stream
pub struct SdfReader<R> {
    lines: Lines<R>,
    done: bool,
}

impl<R: BufRead> SdfReader<R> {
    /// Wrap a buffered reader
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for SdfReader<R> {
    type Item = Result<Ligand>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut block = String::new();
        loop {
            match self.lines.next() {
                Some(Ok(line)) => {
                    if line.starts_with("$$$$") {
                        return Some(Ligand::from_mol_block(&block));
                    }
                    block.push_str(&line);
                    block.push('\n');
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.done = true;
                    // A trailing MOL block without a terminator still counts
                    return (!block.trim().is_empty()).then(|| Ligand::from_mol_block(&block));
                }
            }
        }
    }
}

/// Open an SDF file for record-by-record reading.
///
/// # Errors
/// Returns error if the file cannot be opened
pub fn read_sdf<P: AsRef<Path>>(path: P) -> Result<SdfReader<BufReader<File>>> {
    let file = File::open(path.as_ref())?;
    Ok(SdfReader::new(BufReader::new(file)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACETATE: &str = "\
acetate
  test

  4  3  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.5000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    2.2000    1.1000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
    2.2000   -1.1000    0.0000 O   0  5  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  2  3  2  0
  2  4  1  0
M  END
";

    #[test]
    fn test_parse_mol_block() {
        let ligand = Ligand::from_mol_block(ACETATE).unwrap();
        assert_eq!(ligand.name.as_deref(), Some("acetate"));
        assert_eq!(ligand.atoms.len(), 4);
        assert_eq!(ligand.bonds.len(), 3);
        assert_eq!(ligand.atoms[3].charge, -1);
        assert_eq!(ligand.bonds[1], Bond { from: 1, to: 2, order: 2 });
        assert_eq!(ligand.heavy_atom_count(), 4);
        assert_eq!(ligand.adjacency()[1].len(), 3);
    }

    #[test]
    fn test_charge_property_overrides_atom_block() {
        let block = ACETATE.replace("M  END", "M  CHG  1   3  -1\nM  END");
        let ligand = Ligand::from_mol_block(&block).unwrap();
        assert_eq!(ligand.atoms[2].charge, -1);
        assert_eq!(ligand.atoms[3].charge, 0);
    }

    #[test]
    fn test_malformed_blocks() {
        assert!(Ligand::from_mol_block("only\ntwo\n").is_err());
        let v3000 = "x\n\n\n  0  0  0     0  0            999 V3000\n";
        assert!(Ligand::from_mol_block(v3000).is_err());
        let truncated = ACETATE.lines().take(6).collect::<Vec<_>>().join("\n");
        assert!(Ligand::from_mol_block(&truncated).is_err());
        let bad_order = ACETATE.replace("  2  3  2  0", "  2  3  8  0");
        assert!(Ligand::from_mol_block(&bad_order).is_err());
    }

    #[test]
    fn test_reader_continues_after_bad_record() {
        let text = format!("{ACETATE}$$$$\nbroken\n\n\n  x  y\n$$$$\n{}", ACETATE.replace("acetate", ""));
        let records: Vec<Result<Ligand>> = SdfReader::new(text.as_bytes()).collect();

        assert_eq!(records.len(), 3);
        assert!(records[0].is_ok());
        assert!(records[1].is_err());
        assert_eq!(records[2].as_ref().unwrap().name, None);
    }

    #[test]
    fn test_read_sdf_missing_file() {
        assert!(matches!(read_sdf("/nonexistent/ligands.sdf"), Err(Error::Io(_))));
    }
}
