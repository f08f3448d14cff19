//! Receptor + ligand files to descriptor CSV

use grade_affinity::descriptor::{
    read_sdf, write_descriptors, DescriptorCalculator, DescriptorLayout, FeatureType, Receptor,
};
use grade_affinity::prepare::AblationPolicy;
use grade_affinity::table::Table;
use std::fs;

const POCKET: &str = "\
HEADER    TEST POCKET
ATOM      1  N   PHE A  10      -3.000   0.000   0.000  1.00 10.00           N
ATOM      2  CA  PHE A  10      -3.000   1.450   0.000  1.00 10.00           C
ATOM      3  C   PHE A  10      -1.600   2.000   0.000  1.00 10.00           C
ATOM      4  O   PHE A  10      -0.700   1.300   0.000  1.00 10.00           O
ATOM      5  CB  PHE A  10      -4.000   2.100   1.000  1.00 10.00           C
ATOM      6  CG  PHE A  10      -4.000   3.600   1.000  1.00 10.00           C
ATOM      7  CD1 PHE A  10      -2.790   4.300   1.000  1.00 10.00           C
ATOM      8  CD2 PHE A  10      -5.210   4.300   1.000  1.00 10.00           C
ATOM      9  CE1 PHE A  10      -2.790   5.700   1.000  1.00 10.00           C
ATOM     10  CE2 PHE A  10      -5.210   5.700   1.000  1.00 10.00           C
ATOM     11  CZ  PHE A  10      -4.000   6.400   1.000  1.00 10.00           C
ATOM     12  N   GLY A  11      -1.300   3.300   0.000  1.00 10.00           N
ATOM     13  CA  GLY A  11       0.000   3.900   0.000  1.00 10.00           C
ATOM     14  C   GLY A  11       0.100   5.400   0.000  1.00 10.00           C
ATOM     15  O   GLY A  11       1.100   6.000   0.000  1.00 10.00           O
ATOM     20  H   GLY A  11      -1.300   2.300   0.000  1.00 10.00           H
ATOM     16  N   ALA A  12      -0.900   6.000   0.000  1.00 10.00           N
ATOM     17  CA  ALA A  12      -1.000   7.400   0.000  1.00 10.00           C
HETATM   18  C1  GOL A 301       9.000   9.000   9.000  1.00 10.00           C
HETATM   19  O1  GOL A 301       9.000   9.000  10.400  1.00 10.00           O
END
";

const BENZENE: &str = "benzene
  handmade

  6  6  0  0  0  0  0  0  0  0999 V2000
   -3.0000    5.0000    4.5000 C   0  0  0  0  0  0  0  0  0  0  0  0
   -1.7900    5.7000    4.5000 C   0  0  0  0  0  0  0  0  0  0  0  0
   -1.7900    7.1000    4.5000 C   0  0  0  0  0  0  0  0  0  0  0  0
   -3.0000    7.8000    4.5000 C   0  0  0  0  0  0  0  0  0  0  0  0
   -4.2100    7.1000    4.5000 C   0  0  0  0  0  0  0  0  0  0  0  0
   -4.2100    5.7000    4.5000 C   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  4  0
  2  3  4  0
  3  4  4  0
  4  5  4  0
  5  6  4  0
  6  1  4  0
M  END
$$$$
";

const PHENOL: &str = "
  handmade

  7  7  0  0  0  0  0  0  0  0999 V2000
   -3.0000    5.0000    4.5000 C   0  0  0  0  0  0  0  0  0  0  0  0
   -1.7900    5.7000    4.5000 C   0  0  0  0  0  0  0  0  0  0  0  0
   -1.7900    7.1000    4.5000 C   0  0  0  0  0  0  0  0  0  0  0  0
   -3.0000    7.8000    4.5000 C   0  0  0  0  0  0  0  0  0  0  0  0
   -4.2100    7.1000    4.5000 C   0  0  0  0  0  0  0  0  0  0  0  0
   -4.2100    5.7000    4.5000 C   0  0  0  0  0  0  0  0  0  0  0  0
   -3.0000    3.6000    4.5000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  2  0
  2  3  1  0
  3  4  2  0
  4  5  1  0
  5  6  2  0
  6  1  1  0
  1  7  1  0
M  END
$$$$
";

fn column<'a>(header: &[&str], row: &'a [&str], name: &str) -> &'a str {
    row[header.iter().position(|h| *h == name).unwrap()]
}

#[test]
fn test_descriptor_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let pdb = dir.path().join("pocket.pdb");
    let sdf = dir.path().join("ligands.sdf");
    let out = dir.path().join("GRADE.csv");
    fs::write(&pdb, POCKET).unwrap();
    fs::write(&sdf, format!("{BENZENE}{PHENOL}")).unwrap();

    let calculator = DescriptorCalculator::new(DescriptorLayout::Grade);
    let summary = write_descriptors(&calculator, &pdb, &sdf, &out).unwrap();
    assert_eq!(summary.written, 2);
    assert_eq!(summary.failed, 0);

    let text = fs::read_to_string(&out).unwrap();
    let lines: Vec<Vec<&str>> = text.lines().map(|l| l.split(',').collect()).collect();
    let header = &lines[0];
    assert_eq!(header.len(), 1 + calculator.column_names().len());

    let benzene = &lines[1];
    assert_eq!(benzene[0], "benzene");
    assert_eq!(column(header, benzene, "AR_CNT"), "1.0");
    assert_eq!(column(header, benzene, "HEAVY_ATOM_CNT"), "6.0");
    // Ring stacked 3.5 Å above the PHE ring
    let stacking: f64 = column(header, benzene, "AR-AR_MAX").parse().unwrap();
    assert!(stacking > 0.9);

    let phenol = &lines[2];
    assert_eq!(phenol[0], "2");
    assert_eq!(column(header, phenol, "HBD_CNT"), "1.0");
    assert_eq!(column(header, phenol, "AR_CNT"), "1.0");
}

#[test]
fn test_descriptor_file_feeds_ablation() {
    let dir = tempfile::tempdir().unwrap();
    let pdb = dir.path().join("pocket.pdb");
    let sdf = dir.path().join("ligands.sdf");
    let out = dir.path().join("X-GRADE.csv");
    fs::write(&pdb, POCKET).unwrap();
    fs::write(&sdf, BENZENE).unwrap();

    let calculator = DescriptorCalculator::new(DescriptorLayout::ExtendedGrade);
    write_descriptors(&calculator, &pdb, &sdf, &out).unwrap();

    let table = Table::from_csv_path(&out, "Ligand", &[]).unwrap();
    let drop = AblationPolicy::from_tag("basic").drop_list("Ligand");
    let reduced = table.drop_columns(&drop).unwrap();
    assert_eq!(reduced.num_columns(), table.num_columns() - 6);
    assert_eq!(reduced.ids(), ["benzene".to_string()]);
}

#[test]
fn test_every_ligand_failing_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let pdb = dir.path().join("pocket.pdb");
    let sdf = dir.path().join("ligands.sdf");
    let out = dir.path().join("GRADE.csv");
    fs::write(&pdb, POCKET).unwrap();
    fs::write(&sdf, "broken\n\n\n  x\n$$$$\nalso broken\n\n\n  y\n$$$$\n").unwrap();

    let calculator = DescriptorCalculator::new(DescriptorLayout::Grade);
    let summary = write_descriptors(&calculator, &pdb, &sdf, &out).unwrap();
    assert_eq!(summary.written, 0);
    assert_eq!(summary.failed, 2);
    let text = fs::read_to_string(&out).unwrap();
    assert_eq!(text.lines().count(), 1);
}

#[test]
fn test_receptor_cleaning_removes_solvent_and_ligands() {
    let mut receptor = Receptor::from_pdb_str(POCKET).unwrap();
    assert_eq!(receptor.residue_count(), 4);
    let report = receptor.clean();
    // GOL is non-standard; ALA with two atoms is a fragment, GLY counts its hydrogen
    assert_eq!(report.non_standard_removed, 1);
    assert_eq!(report.fragments_removed, 1);
    assert_eq!(receptor.residue_count(), 2);
}

#[test]
fn test_sdf_reader_types_ligands() {
    let dir = tempfile::tempdir().unwrap();
    let sdf = dir.path().join("ligands.sdf");
    fs::write(&sdf, format!("{BENZENE}{PHENOL}")).unwrap();

    let ligands: Vec<_> = read_sdf(&sdf).unwrap().map(Result::unwrap).collect();
    assert_eq!(ligands.len(), 2);
    let features = grade_affinity::descriptor::ligand_features(&ligands[1], false);
    assert!(features.iter().any(|f| f.kind == FeatureType::HBondDonor && f.element == "O"));
    assert!(features.iter().any(|f| f.kind == FeatureType::Aromatic));
}
