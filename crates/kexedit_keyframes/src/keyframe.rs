// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe definitions for property curves.

use serde::{Deserialize, Serialize};

/// Interpolation mode on one side of a keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum InterpolationType {
    /// Constant (step)
    Constant = 0,
    /// Linear interpolation
    #[default]
    Linear = 1,
    /// Cubic bezier interpolation
    Bezier = 2,
}

impl InterpolationType {
    /// Decode an interpolation code, `None` when out of range
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Constant),
            1 => Some(Self::Linear),
            2 => Some(Self::Bezier),
            _ => None,
        }
    }

    /// On-disk code
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Bezier handle behaviour, editor only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum HandleType {
    /// Handles move independently
    #[default]
    Free = 0,
    /// Handles stay colinear
    Aligned = 1,
}

impl HandleType {
    /// Decode a handle code. Anything non-zero is treated as aligned.
    pub fn from_code(code: u8) -> Self {
        if code == 0 {
            Self::Free
        } else {
            Self::Aligned
        }
    }

    /// On-disk code
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Keyframe editing flags, editor only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyframeFlags(pub u8);

impl KeyframeFlags {
    /// No flags
    pub const NONE: Self = Self(0);
    /// Time cannot be dragged
    pub const LOCK_TIME: Self = Self(1);
    /// Value cannot be dragged
    pub const LOCK_VALUE: Self = Self(2);

    /// Whether every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two flag sets
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// A keyframe on a property curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Time along the section
    pub time: f32,
    /// Property value at this keyframe
    pub value: f32,
    /// Interpolation arriving at this keyframe
    pub in_interpolation: InterpolationType,
    /// Interpolation leaving this keyframe
    pub out_interpolation: InterpolationType,
    /// Incoming bezier slope
    pub in_tangent: f32,
    /// Outgoing bezier slope
    pub out_tangent: f32,
    /// Incoming handle length as a fraction of the segment
    pub in_weight: f32,
    /// Outgoing handle length as a fraction of the segment
    pub out_weight: f32,
}

impl Keyframe {
    /// Create a linear keyframe with flat tangents
    pub fn new(time: f32, value: f32) -> Self {
        Self {
            time,
            value,
            in_interpolation: InterpolationType::Linear,
            out_interpolation: InterpolationType::Linear,
            in_tangent: 0.0,
            out_tangent: 0.0,
            in_weight: 0.0,
            out_weight: 0.0,
        }
    }

    /// Set interpolation on both sides
    pub fn with_interpolation(mut self, incoming: InterpolationType, outgoing: InterpolationType) -> Self {
        self.in_interpolation = incoming;
        self.out_interpolation = outgoing;
        self
    }

    /// Set bezier tangents
    pub fn with_tangents(mut self, in_tangent: f32, out_tangent: f32) -> Self {
        self.in_tangent = in_tangent;
        self.out_tangent = out_tangent;
        self
    }

    /// Set bezier handle weights
    pub fn with_weights(mut self, in_weight: f32, out_weight: f32) -> Self {
        self.in_weight = in_weight;
        self.out_weight = out_weight;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let kf = Keyframe::new(1.0, 2.0);
        assert_eq!(kf.in_interpolation, InterpolationType::Linear);
        assert_eq!(kf.out_tangent, 0.0);
        assert_eq!(kf.in_weight, 0.0);
    }

    #[test]
    fn test_interpolation_codes() {
        assert_eq!(InterpolationType::from_code(2), Some(InterpolationType::Bezier));
        assert_eq!(InterpolationType::from_code(3), None);
        assert_eq!(HandleType::from_code(7), HandleType::Aligned);
    }

    #[test]
    fn test_flags() {
        let flags = KeyframeFlags::LOCK_TIME.union(KeyframeFlags::LOCK_VALUE);
        assert!(flags.contains(KeyframeFlags::LOCK_TIME));
        assert!(!KeyframeFlags::NONE.contains(KeyframeFlags::LOCK_VALUE));
    }
}
