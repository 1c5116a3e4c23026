// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe curves for KexEdit documents.
//!
//! Every keyframed property of every node lives in one flat array. A range
//! index keyed by [`kexedit_graph::CompositeKey`] maps each curve to its
//! slice of that array.

pub mod keyframe;
pub mod store;

pub use keyframe::{HandleType, InterpolationType, Keyframe, KeyframeFlags};
pub use store::{KeyframeError, KeyframeRange, KeyframeStore, RangeIssue};
