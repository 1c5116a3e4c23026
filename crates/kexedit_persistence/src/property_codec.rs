// SPDX-License-Identifier: MIT OR Apache-2.0
//! `DATA` chunk codec: keyframes, ranges and the three property maps.

use crate::cursor::{ByteCursor, ByteWriter};
use crate::diagnostics::Diagnostic;
use crate::document::Document;
use crate::error::FormatResult;
use indexmap::IndexMap;
use kexedit_graph::CompositeKey;
use kexedit_keyframes::{InterpolationType, Keyframe, KeyframeRange, KeyframeStore};

const KEYFRAME_SIZE: usize = 26;
const RANGE_SIZE: usize = 16;
const SCALAR_SIZE: usize = 12;
const VECTOR_SIZE: usize = 20;
const FLAG_SIZE: usize = 12;

/// Decoded `DATA` payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyData {
    /// Keyframe curves
    pub keyframes: KeyframeStore,
    /// Scalar map
    pub scalars: IndexMap<CompositeKey, f32>,
    /// Vector map
    pub vectors: IndexMap<CompositeKey, [f32; 3]>,
    /// Flag map
    pub flags: IndexMap<CompositeKey, i32>,
}

/// Codec for the `DATA` chunk
pub struct PropertyCodec;

impl PropertyCodec {
    /// Version written by [`PropertyCodec::encode`]
    pub const VERSION: u32 = 2;

    /// Decode a `DATA` payload
    pub fn decode(
        cursor: &mut ByteCursor<'_>,
        version: u32,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> FormatResult<PropertyData> {
        let count = cursor.read_count_of(KEYFRAME_SIZE)?;
        let mut keyframes = Vec::with_capacity(count);
        for _ in 0..count {
            let time = cursor.read_f32()?;
            let value = cursor.read_f32()?;
            let incoming = read_interpolation(cursor, diagnostics)?;
            let outgoing = read_interpolation(cursor, diagnostics)?;
            let in_tangent = cursor.read_f32()?;
            let out_tangent = cursor.read_f32()?;
            let in_weight = cursor.read_f32()?;
            let out_weight = cursor.read_f32()?;
            keyframes.push(
                Keyframe::new(time, value)
                    .with_interpolation(incoming, outgoing)
                    .with_tangents(in_tangent, out_tangent)
                    .with_weights(in_weight, out_weight),
            );
        }

        let count = cursor.read_count_of(RANGE_SIZE)?;
        let mut ranges = IndexMap::with_capacity(count);
        for _ in 0..count {
            let key = CompositeKey::from_raw(cursor.read_u64()?);
            let start = cursor.read_i32()?;
            let length = cursor.read_i32()?;
            ranges.insert(key, KeyframeRange::new(start, length));
        }

        let count = cursor.read_count_of(SCALAR_SIZE)?;
        let mut scalars = IndexMap::with_capacity(count);
        for _ in 0..count {
            let key = CompositeKey::from_raw(cursor.read_u64()?);
            scalars.insert(key, cursor.read_f32()?);
        }

        let count = cursor.read_count_of(VECTOR_SIZE)?;
        let mut vectors = IndexMap::with_capacity(count);
        for _ in 0..count {
            let key = CompositeKey::from_raw(cursor.read_u64()?);
            vectors.insert(key, cursor.read_vec3()?);
        }

        let count = cursor.read_count_of(FLAG_SIZE)?;
        let mut flags = IndexMap::with_capacity(count);
        for _ in 0..count {
            let key = CompositeKey::from_raw(cursor.read_u64()?);
            flags.insert(key, cursor.read_i32()?);
        }

        tracing::debug!(
            keyframes = keyframes.len(),
            ranges = ranges.len(),
            scalars = scalars.len(),
            vectors = vectors.len(),
            flags = flags.len(),
            version,
            "Decoded properties"
        );

        Ok(PropertyData {
            keyframes: KeyframeStore::from_parts(keyframes, ranges),
            scalars,
            vectors,
            flags,
        })
    }

    /// Encode the property half of a document at [`PropertyCodec::VERSION`]
    pub fn encode(writer: &mut ByteWriter, document: &Document) {
        let store = &document.keyframes;
        writer.write_count(store.keyframes().len());
        for kf in store.keyframes() {
            writer.write_f32(kf.time);
            writer.write_f32(kf.value);
            writer.write_u8(kf.in_interpolation.code());
            writer.write_u8(kf.out_interpolation.code());
            writer.write_f32(kf.in_tangent);
            writer.write_f32(kf.out_tangent);
            writer.write_f32(kf.in_weight);
            writer.write_f32(kf.out_weight);
        }

        writer.write_count(store.ranges().len());
        for (key, range) in store.ranges() {
            writer.write_u64(key.raw());
            writer.write_i32(range.start);
            writer.write_i32(range.length);
        }

        writer.write_count(document.scalars.len());
        for (key, value) in &document.scalars {
            writer.write_u64(key.raw());
            writer.write_f32(*value);
        }

        writer.write_count(document.vectors.len());
        for (key, value) in &document.vectors {
            writer.write_u64(key.raw());
            writer.write_vec3(*value);
        }

        writer.write_count(document.flags.len());
        for (key, value) in &document.flags {
            writer.write_u64(key.raw());
            writer.write_i32(*value);
        }
    }
}

fn read_interpolation(
    cursor: &mut ByteCursor<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) -> FormatResult<InterpolationType> {
    let code = cursor.read_u8()?;
    Ok(InterpolationType::from_code(code).unwrap_or_else(|| {
        tracing::warn!(code, "Unknown interpolation code");
        diagnostics.push(Diagnostic::unknown_interpolation(code));
        InterpolationType::Bezier
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use kexedit_graph::{NodeId, NodeMeta, PropertyId};
    use proptest::prelude::*;

    #[test]
    fn test_roundtrip() {
        let mut doc = Document::new();
        let key = CompositeKey::property(NodeId(1), PropertyId::RollSpeed);
        doc.keyframes
            .set(
                key,
                &[
                    Keyframe::new(0.0, 1.0),
                    Keyframe::new(1.0, 2.0)
                        .with_interpolation(InterpolationType::Bezier, InterpolationType::Constant)
                        .with_tangents(0.5, -0.5)
                        .with_weights(0.3, 0.4),
                ],
            )
            .unwrap();
        doc.scalars.insert(CompositeKey::meta(NodeId(1), NodeMeta::Duration), 5.0);
        doc.vectors.insert(CompositeKey::input(NodeId(1), 0), [1.0, 2.0, 3.0]);
        doc.flags.insert(CompositeKey::meta(NodeId(1), NodeMeta::Steering), 1);

        let mut w = ByteWriter::new();
        PropertyCodec::encode(&mut w, &doc);
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 4 + 2 * 26 + 4 + 16 + 4 + 12 + 4 + 20 + 4 + 12);

        let mut diagnostics = Vec::new();
        let mut c = ByteCursor::new(&bytes);
        let data = PropertyCodec::decode(&mut c, 2, &mut diagnostics).unwrap();
        assert!(c.is_empty());
        assert!(diagnostics.is_empty());
        assert_eq!(data.keyframes, doc.keyframes);
        assert_eq!(data.scalars, doc.scalars);
        assert_eq!(data.vectors, doc.vectors);
        assert_eq!(data.flags, doc.flags);
    }

    #[test]
    fn test_unknown_interpolation() {
        let mut w = ByteWriter::new();
        w.write_i32(1);
        w.write_f32(0.0);
        w.write_f32(1.0);
        w.write_u8(7);
        w.write_u8(1);
        for _ in 0..4 {
            w.write_f32(0.0);
        }
        for _ in 0..4 {
            w.write_i32(0);
        }
        let bytes = w.into_inner();

        let mut diagnostics = Vec::new();
        let data = PropertyCodec::decode(&mut ByteCursor::new(&bytes), 2, &mut diagnostics).unwrap();
        assert_eq!(data.keyframes.keyframes()[0].in_interpolation, InterpolationType::Bezier);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UnknownInterpolation { code: 7 });
    }

    fn any_keyframe() -> impl Strategy<Value = Keyframe> {
        (
            -1e4f32..1e4,
            -1e4f32..1e4,
            0u8..3,
            0u8..3,
            -10f32..10.0,
            -10f32..10.0,
            0f32..1.0,
            0f32..1.0,
        )
            .prop_map(|(time, value, incoming, outgoing, in_tangent, out_tangent, in_weight, out_weight)| {
                let interpolation = |code| InterpolationType::from_code(code).unwrap();
                Keyframe::new(time, value)
                    .with_interpolation(interpolation(incoming), interpolation(outgoing))
                    .with_tangents(in_tangent, out_tangent)
                    .with_weights(in_weight, out_weight)
            })
    }

    fn any_key() -> impl Strategy<Value = CompositeKey> {
        (0u32..64, any::<u8>()).prop_map(|(node, index)| CompositeKey::input(NodeId(node), index))
    }

    proptest! {
        #[test]
        fn test_arbitrary_properties_roundtrip(
            curves in proptest::collection::vec(
                (0u32..32, 0usize..PropertyId::ALL.len(), proptest::collection::vec(any_keyframe(), 1..5)),
                0..6,
            ),
            scalars in proptest::collection::vec((any_key(), -1e6f32..1e6), 0..8),
            vectors in proptest::collection::vec((any_key(), proptest::array::uniform3(-1e3f32..1e3)), 0..8),
            flags in proptest::collection::vec((any_key(), any::<i32>()), 0..8),
        ) {
            let mut doc = Document::new();
            for (node, property, curve) in curves {
                let key = CompositeKey::property(NodeId(node), PropertyId::ALL[property]);
                doc.keyframes.set(key, &curve).unwrap();
            }
            doc.scalars.extend(scalars);
            doc.vectors.extend(vectors);
            doc.flags.extend(flags);

            let mut w = ByteWriter::new();
            PropertyCodec::encode(&mut w, &doc);
            let bytes = w.into_inner();

            let mut diagnostics = Vec::new();
            let mut c = ByteCursor::new(&bytes);
            let data = PropertyCodec::decode(&mut c, PropertyCodec::VERSION, &mut diagnostics).unwrap();
            prop_assert!(c.is_empty());
            prop_assert!(diagnostics.is_empty());
            prop_assert_eq!(data.keyframes, doc.keyframes);
            prop_assert_eq!(data.scalars, doc.scalars);
            prop_assert_eq!(data.vectors, doc.vectors);
            prop_assert_eq!(data.flags, doc.flags);
        }
    }
}
