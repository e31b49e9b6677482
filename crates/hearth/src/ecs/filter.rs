//! State filter for views.

use std::fmt;
use std::ops::BitOr;

/// Bitmask selecting entities by their active flag and components by their
/// enabled flag.
///
/// An entity passes if its active state is in the mask (`ACTIVE` or
/// `INACTIVE`); each queried component passes if its enabled state is in the
/// mask (`COMPONENT_ENABLED` or `COMPONENT_DISABLED`). The default is
/// `ACTIVE | COMPONENT_ENABLED`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameObjectFilter {
    bits: u8,
}

impl GameObjectFilter {
    pub const ACTIVE: Self = Self { bits: 1 };
    pub const INACTIVE: Self = Self { bits: 1 << 1 };
    pub const COMPONENT_ENABLED: Self = Self { bits: 1 << 2 };
    pub const COMPONENT_DISABLED: Self = Self { bits: 1 << 3 };

    /// Either active state.
    pub const ANY_STATE: Self = Self { bits: 0b0011 };
    /// Either component state.
    pub const ANY_COMPONENT: Self = Self { bits: 0b1100 };
    /// Everything passes.
    pub const ALL: Self = Self { bits: 0b1111 };

    const STATE_MASK: u8 = 0b0011;
    const COMPONENT_MASK: u8 = 0b1100;

    pub const fn bits(self) -> u8 {
        self.bits
    }

    pub const fn contains(self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Replace the component-state half of the mask.
    #[must_use]
    pub const fn with_component_state(self, component: Self) -> Self {
        Self {
            bits: (self.bits & Self::STATE_MASK) | (component.bits & Self::COMPONENT_MASK),
        }
    }

    /// Does an entity with this active flag pass?
    pub const fn matches_active(self, active: bool) -> bool {
        if active {
            self.contains(Self::ACTIVE)
        } else {
            self.contains(Self::INACTIVE)
        }
    }

    /// Does a component with this enabled flag pass?
    pub const fn matches_component(self, enabled: bool) -> bool {
        if enabled {
            self.contains(Self::COMPONENT_ENABLED)
        } else {
            self.contains(Self::COMPONENT_DISABLED)
        }
    }
}

impl Default for GameObjectFilter {
    fn default() -> Self {
        Self::ACTIVE | Self::COMPONENT_ENABLED
    }
}

impl BitOr for GameObjectFilter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for GameObjectFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::ACTIVE, "ACTIVE"),
            (Self::INACTIVE, "INACTIVE"),
            (Self::COMPONENT_ENABLED, "COMPONENT_ENABLED"),
            (Self::COMPONENT_DISABLED, "COMPONENT_DISABLED"),
        ];
        let set: Vec<_> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "GameObjectFilter({})", set.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_active_and_enabled() {
        let f = GameObjectFilter::default();
        assert!(f.matches_active(true));
        assert!(!f.matches_active(false));
        assert!(f.matches_component(true));
        assert!(!f.matches_component(false));
    }

    #[test]
    fn with_component_state_keeps_active_half() {
        let f = (GameObjectFilter::INACTIVE | GameObjectFilter::ANY_COMPONENT)
            .with_component_state(GameObjectFilter::COMPONENT_ENABLED);
        assert!(f.matches_active(false));
        assert!(!f.matches_active(true));
        assert!(f.matches_component(true));
        assert!(!f.matches_component(false));
    }

    #[test]
    fn debug_lists_flags() {
        let s = format!("{:?}", GameObjectFilter::default());
        assert_eq!(s, "GameObjectFilter(ACTIVE | COMPONENT_ENABLED)");
    }
}
