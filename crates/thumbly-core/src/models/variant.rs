use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Target pixel size of a rendered thumbnail.
///
/// Only the enumerated sizes are valid; any other requested size is rejected
/// before cache, existence, or coalescing logic runs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub enum Variant {
    Px96,
    Px240,
    Px480,
}

impl Variant {
    /// All supported sizes, smallest first.
    pub const ALL: [Variant; 3] = [Variant::Px96, Variant::Px240, Variant::Px480];

    /// Edge length in pixels.
    pub fn px(&self) -> u32 {
        match self {
            Variant::Px96 => 96,
            Variant::Px240 => 240,
            Variant::Px480 => 480,
        }
    }
}

impl TryFrom<u32> for Variant {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            96 => Ok(Variant::Px96),
            240 => Ok(Variant::Px240),
            480 => Ok(Variant::Px480),
            other => Err(format!(
                "Unsupported thumbnail variant: {} (supported: 96, 240, 480)",
                other
            )),
        }
    }
}

impl From<Variant> for u32 {
    fn from(variant: Variant) -> Self {
        variant.px()
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.px())
    }
}

impl FromStr for Variant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let px: u32 = s
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid variant: {}", s))?;
        Variant::try_from(px).map_err(|e| anyhow::anyhow!(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_round_trip() {
        for variant in Variant::ALL {
            let px = variant.px();
            assert_eq!(Variant::try_from(px).unwrap(), variant);
            assert_eq!(variant.to_string().parse::<Variant>().unwrap(), variant);
        }
    }

    #[test]
    fn test_unsupported_size_rejected() {
        assert!(Variant::try_from(128).is_err());
        assert!("128".parse::<Variant>().is_err());
        assert!("large".parse::<Variant>().is_err());
    }

    #[test]
    fn test_serde_as_number() {
        let json = serde_json::to_string(&Variant::Px240).unwrap();
        assert_eq!(json, "240");
        let parsed: Variant = serde_json::from_str("96").unwrap();
        assert_eq!(parsed, Variant::Px96);
        assert!(serde_json::from_str::<Variant>("100").is_err());
    }
}
