//! Feature ablation policies
//!
//! Each tag maps to a fixed set of descriptor channels that are excluded from
//! a run. Tags outside the table fall back to [`AblationPolicy::IdentifierOnly`]:
//! the descriptor file is used as is. Driver tags such as `GRADE` or
//! `X-GRADE_class3_test` rely on that fallback.

use std::fmt;

const HW_HW: [&str; 2] = ["HW-HW_SUM", "HW-HW_MAX"];
const H_H: [&str; 2] = ["H-H_SUM", "H-H_MAX"];
const ES: &str = "ES";
const VDW: [&str; 2] = ["VDW_ATT", "VDW_REP"];

/// Named descriptor-column exclusion policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AblationPolicy {
    /// `basic`: no weighted hydrophobics, no electrostatics, no van der Waals
    Basic,
    /// `-w`: no plain hydrophobics, no electrostatics, no van der Waals
    NoPlainHydrophobic,
    /// `basic-el`: `basic` with electrostatics
    BasicEl,
    /// `-w-el`: `-w` with electrostatics
    NoPlainHydrophobicEl,
    /// `basic-el-vdw`: everything but weighted hydrophobics
    BasicElVdw,
    /// `-w-el-vdw`: everything but plain hydrophobics
    NoPlainHydrophobicElVdw,
    /// `basic-vdw`: drops the same channels as `basic`
    BasicVdw,
    /// `-w-vdw`: drops the same channels as `basic`
    NoPlainHydrophobicVdw,
    /// Any other tag: only the identifier column is removed
    IdentifierOnly,
}

impl AblationPolicy {
    /// Every policy with a fixed tag
    pub const NAMED: [Self; 8] = [
        Self::Basic,
        Self::NoPlainHydrophobic,
        Self::BasicEl,
        Self::NoPlainHydrophobicEl,
        Self::BasicElVdw,
        Self::NoPlainHydrophobicElVdw,
        Self::BasicVdw,
        Self::NoPlainHydrophobicVdw,
    ];

    /// Resolve a tag. Unknown tags resolve to `IdentifierOnly`; use
    /// [`AblationPolicy::is_named`] to tell the two apart.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        Self::NAMED
            .into_iter()
            .find(|p| p.tag() == Some(tag))
            .unwrap_or(Self::IdentifierOnly)
    }

    /// Tag of a named policy
    #[must_use]
    pub const fn tag(self) -> Option<&'static str> {
        match self {
            Self::Basic => Some("basic"),
            Self::NoPlainHydrophobic => Some("-w"),
            Self::BasicEl => Some("basic-el"),
            Self::NoPlainHydrophobicEl => Some("-w-el"),
            Self::BasicElVdw => Some("basic-el-vdw"),
            Self::NoPlainHydrophobicElVdw => Some("-w-el-vdw"),
            Self::BasicVdw => Some("basic-vdw"),
            Self::NoPlainHydrophobicVdw => Some("-w-vdw"),
            Self::IdentifierOnly => None,
        }
    }

    /// Whether this is one of the fixed policies
    #[must_use]
    pub const fn is_named(self) -> bool {
        !matches!(self, Self::IdentifierOnly)
    }

    /// Descriptor channels excluded by this policy (identifier not included)
    #[must_use]
    pub fn descriptor_columns(self) -> Vec<&'static str> {
        let mut columns = Vec::new();
        match self {
            Self::Basic | Self::BasicVdw | Self::NoPlainHydrophobicVdw => {
                columns.extend(HW_HW);
                columns.push(ES);
                columns.extend(VDW);
            }
            Self::NoPlainHydrophobic => {
                columns.extend(H_H);
                columns.push(ES);
                columns.extend(VDW);
            }
            Self::BasicEl => {
                columns.extend(HW_HW);
                columns.extend(VDW);
            }
            Self::NoPlainHydrophobicEl => {
                columns.extend(H_H);
                columns.extend(VDW);
            }
            Self::BasicElVdw => columns.extend(HW_HW),
            Self::NoPlainHydrophobicElVdw => columns.extend(H_H),
            Self::IdentifierOnly => {}
        }
        columns
    }

    /// Full drop list: the identifier column followed by the policy channels
    #[must_use]
    pub fn drop_list<'a>(self, identifier: &'a str) -> Vec<&'a str> {
        let mut drop = vec![identifier];
        drop.extend(self.descriptor_columns());
        drop
    }
}

impl fmt::Display for AblationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag().unwrap_or("<identifier only>"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_tags_roundtrip() {
        for policy in AblationPolicy::NAMED {
            let tag = policy.tag().unwrap();
            assert_eq!(AblationPolicy::from_tag(tag), policy);
        }
    }

    #[test]
    fn test_unknown_tag_falls_back() {
        let policy = AblationPolicy::from_tag("X-GRADE");
        assert_eq!(policy, AblationPolicy::IdentifierOnly);
        assert!(!policy.is_named());
        assert_eq!(policy.drop_list("PDB code"), vec!["PDB code"]);
    }

    #[test]
    fn test_basic_drop_list() {
        assert_eq!(
            AblationPolicy::Basic.drop_list("PDB code"),
            vec!["PDB code", "HW-HW_SUM", "HW-HW_MAX", "ES", "VDW_ATT", "VDW_REP"]
        );
    }

    #[test]
    fn test_el_vdw_policies_keep_interactions() {
        assert_eq!(
            AblationPolicy::NoPlainHydrophobicElVdw.descriptor_columns(),
            vec!["H-H_SUM", "H-H_MAX"]
        );
        assert_eq!(
            AblationPolicy::BasicElVdw.descriptor_columns(),
            vec!["HW-HW_SUM", "HW-HW_MAX"]
        );
    }

    #[test]
    fn test_vdw_variants_match_basic() {
        let basic = AblationPolicy::Basic.descriptor_columns();
        assert_eq!(AblationPolicy::BasicVdw.descriptor_columns(), basic);
        assert_eq!(AblationPolicy::NoPlainHydrophobicVdw.descriptor_columns(), basic);
    }
}
