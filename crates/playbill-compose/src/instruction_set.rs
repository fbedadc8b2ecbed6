//! Opcode dialects the script VM can be told to interpret.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionSet {
    Rne,
    Dash,
    Chlcc,
    Mo6tw,
    Mo7,
    Mo8,
    Sgps3,
    Cc,
    Sg0,
    Darling,
}

pub const ALL_INSTRUCTION_SETS: &[InstructionSet] = &[
    InstructionSet::Rne,
    InstructionSet::Dash,
    InstructionSet::Chlcc,
    InstructionSet::Mo6tw,
    InstructionSet::Mo7,
    InstructionSet::Mo8,
    InstructionSet::Sgps3,
    InstructionSet::Cc,
    InstructionSet::Sg0,
    InstructionSet::Darling,
];

impl InstructionSet {
    /// Name as written in profiles (`InstructionSet.MO6TW`).
    pub fn name(self) -> &'static str {
        match self {
            InstructionSet::Rne => "RNE",
            InstructionSet::Dash => "Dash",
            InstructionSet::Chlcc => "CHLCC",
            InstructionSet::Mo6tw => "MO6TW",
            InstructionSet::Mo7 => "MO7",
            InstructionSet::Mo8 => "MO8",
            InstructionSet::Sgps3 => "SGPS3",
            InstructionSet::Cc => "CC",
            InstructionSet::Sg0 => "SG0",
            InstructionSet::Darling => "Darling",
        }
    }

    pub fn from_name(name: &str) -> Option<InstructionSet> {
        ALL_INSTRUCTION_SETS
            .iter()
            .copied()
            .find(|set| set.name() == name)
    }
}

impl fmt::Display for InstructionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl serde::Serialize for InstructionSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for set in ALL_INSTRUCTION_SETS {
            assert_eq!(InstructionSet::from_name(set.name()), Some(*set));
        }
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert_eq!(InstructionSet::from_name("MO6TW"), Some(InstructionSet::Mo6tw));
        assert_eq!(InstructionSet::from_name("mo6tw"), None);
    }
}
