use tracing::warn;

use crate::domain::RankedName;

/// Rank columns of the usage table, in output order.
pub const RANK_SLOTS: [&str; 22] = [
    "kingdom",
    "phylum",
    "subphylum",
    "class",
    "order",
    "suborder",
    "infraorder",
    "parvorder",
    "superfamily",
    "family",
    "subfamily",
    "tribe",
    "subtribe",
    "genus",
    "subgenus",
    "species",
    "subspecies",
    "infraspecies",
    "form",
    "variety",
    "aberration",
    "other",
];

const OTHER_SLOT: usize = RANK_SLOTS.len() - 1;

/// Barcode datasets and the Biota root both use "unranked"; it must never
/// reach the output.
pub const DROPPED_RANK: &str = "unranked";

/// A classification chain projected onto the fixed rank columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationSlots {
    names: [String; RANK_SLOTS.len()],
}

impl ClassificationSlots {
    pub fn get(&self, rank: &str) -> Option<&str> {
        slot_index(rank).map(|index| self.names[index].as_str())
    }

    /// Names in `RANK_SLOTS` order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

fn slot_index(rank: &str) -> Option<usize> {
    RANK_SLOTS.iter().position(|slot| *slot == rank)
}

/// Writes each name into its rank's slot, later entries winning. Ranks outside
/// the fixed set land in `other`.
pub fn flatten(classification: &[RankedName]) -> ClassificationSlots {
    let mut slots = ClassificationSlots::default();
    for entry in classification {
        if entry.rank == DROPPED_RANK {
            continue;
        }
        let index = match slot_index(&entry.rank) {
            Some(index) => index,
            None => {
                warn!(rank = %entry.rank, name = %entry.name, "rank has no column, stored as other");
                OTHER_SLOT
            }
        };
        slots.names[index] = entry.name.clone();
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(pairs: &[(&str, &str)]) -> Vec<RankedName> {
        pairs
            .iter()
            .map(|(rank, name)| RankedName {
                rank: rank.to_string(),
                name: name.to_string(),
            })
            .collect()
    }

    #[test]
    fn fills_known_ranks() {
        let slots = flatten(&chain(&[
            ("kingdom", "Animalia"),
            ("phylum", "Arthropoda"),
            ("family", "Araneidae"),
            ("species", "Araneus diadematus"),
        ]));
        assert_eq!(slots.get("kingdom"), Some("Animalia"));
        assert_eq!(slots.get("family"), Some("Araneidae"));
        assert_eq!(slots.get("genus"), Some(""));
        assert_eq!(slots.names().count(), 22);
    }

    #[test]
    fn unranked_never_appears() {
        let slots = flatten(&chain(&[("unranked", "Biota"), ("kingdom", "Plantae")]));
        assert_eq!(slots.get("unranked"), None);
        assert!(slots.names().all(|name| name != "Biota"));
        assert!(!RANK_SLOTS.contains(&DROPPED_RANK));
    }

    #[test]
    fn unknown_rank_goes_to_other() {
        let slots = flatten(&chain(&[("kingdom", "Animalia"), ("clade", "Euarthropoda")]));
        assert_eq!(slots.get("other"), Some("Euarthropoda"));
    }
}
