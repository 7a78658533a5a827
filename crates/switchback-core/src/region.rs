//! Region roles for the two-region pair.

use serde::{Deserialize, Serialize};

/// Which side of the region pair a deployment is.
///
/// Exactly one region holds active status at any time; the pointer itself
/// lives with the provider (see `RegionController::get_active_region`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionRole {
    Primary,
    Standby,
}

impl RegionRole {
    /// The opposite role.
    pub fn other(self) -> Self {
        match self {
            Self::Primary => Self::Standby,
            Self::Standby => Self::Primary,
        }
    }
}

impl std::fmt::Display for RegionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Standby => write!(f, "standby"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_flips_role() {
        assert_eq!(RegionRole::Primary.other(), RegionRole::Standby);
        assert_eq!(RegionRole::Standby.other(), RegionRole::Primary);
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RegionRole::Primary).unwrap(),
            "\"primary\""
        );
    }
}
