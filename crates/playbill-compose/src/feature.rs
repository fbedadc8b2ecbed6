//! Feature flags for optional engine subsystems.
//!
//! Internally this uses a `u64` bitmask. Up to 64 distinct features can be
//! modeled without changing the representation. The set is additive: there is
//! no operation that removes a flag once it has been combined in.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum GameFeature {
    ScriptVm = 0,
    Renderer2D = 1,
    Input = 2,
    Audio = 3,
    Scene3D = 4,
    Video = 5,
    ModelViewer = 6,
    DebugUi = 7,
    // Add more as needed; keep < 64 without changing representation.
}

/// All known features, in bit order.
pub const ALL_FEATURES: &[GameFeature] = &[
    GameFeature::ScriptVm,
    GameFeature::Renderer2D,
    GameFeature::Input,
    GameFeature::Audio,
    GameFeature::Scene3D,
    GameFeature::Video,
    GameFeature::ModelViewer,
    GameFeature::DebugUi,
];

impl GameFeature {
    #[inline]
    pub fn bit(self) -> u64 {
        1u64 << (self as u8)
    }

    /// Canonical name used in diagnostics and emitted JSON.
    pub fn name(self) -> &'static str {
        match self {
            GameFeature::ScriptVm => "ScriptVM",
            GameFeature::Renderer2D => "Renderer2D",
            GameFeature::Input => "Input",
            GameFeature::Audio => "Audio",
            GameFeature::Scene3D => "Scene3D",
            GameFeature::Video => "Video",
            GameFeature::ModelViewer => "ModelViewer",
            GameFeature::DebugUi => "DebugUi",
        }
    }

    /// Parse a `GameFeature.<Name>` member. Profiles written for the SC3
    /// engine spell the script VM `Sc3VirtualMachine`.
    pub fn from_name(name: &str) -> Option<GameFeature> {
        match name {
            "ScriptVM" | "Sc3VirtualMachine" => Some(GameFeature::ScriptVm),
            "Renderer2D" => Some(GameFeature::Renderer2D),
            "Input" => Some(GameFeature::Input),
            "Audio" => Some(GameFeature::Audio),
            "Scene3D" => Some(GameFeature::Scene3D),
            "Video" => Some(GameFeature::Video),
            "ModelViewer" => Some(GameFeature::ModelViewer),
            "DebugUi" | "Nuklear" => Some(GameFeature::DebugUi),
            _ => None,
        }
    }
}

impl fmt::Display for GameFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of enabled features.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FeatureMask(u64);

impl FeatureMask {
    /// The identity of `combine`.
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn singleton(f: GameFeature) -> Self {
        Self(1u64 << (f as u8))
    }

    /// Every known feature.
    pub fn all() -> Self {
        ALL_FEATURES.iter().copied().collect()
    }

    /// Build a mask from raw bits, rejecting bits no known feature occupies.
    pub fn from_bits(bits: u64) -> Option<Self> {
        if bits & !Self::all().0 == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    #[inline]
    pub fn bits(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of enabled features.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn contains(&self, f: GameFeature) -> bool {
        (self.0 & f.bit()) != 0
    }

    #[inline]
    pub fn insert(&mut self, f: GameFeature) {
        self.0 |= f.bit();
    }

    /// Set union. Associative and commutative; `empty()` is the identity.
    pub fn combine(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Iterate enabled features in bit order.
    pub fn iter(&self) -> impl Iterator<Item = GameFeature> {
        let mask = self.0;
        ALL_FEATURES
            .iter()
            .copied()
            .filter(move |f| (mask & f.bit()) != 0)
    }
}

impl BitOr for FeatureMask {
    type Output = FeatureMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.combine(rhs)
    }
}

impl BitOr<GameFeature> for FeatureMask {
    type Output = FeatureMask;

    fn bitor(self, rhs: GameFeature) -> Self::Output {
        self.combine(FeatureMask::singleton(rhs))
    }
}

impl BitOrAssign for FeatureMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<GameFeature> for FeatureMask {
    fn from(f: GameFeature) -> Self {
        FeatureMask::singleton(f)
    }
}

impl FromIterator<GameFeature> for FeatureMask {
    fn from_iter<I: IntoIterator<Item = GameFeature>>(iter: I) -> Self {
        iter.into_iter()
            .fold(FeatureMask::empty(), |acc, f| acc | f)
    }
}

impl fmt::Debug for FeatureMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for FeatureMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for feat in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}", feat)?;
        }
        write!(f, "}}")
    }
}

impl serde::Serialize for FeatureMask {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for feat in self.iter() {
            seq.serialize_element(feat.name())?;
        }
        seq.end()
    }
}
