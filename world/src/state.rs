//! Dirty-tracked state records.
//!
//! Every simulation record keeps a [`DirtyFields`] mask next to its values.
//! Setters compare the old and new value and mark the field on change;
//! composite fields (per-type counters, slot arrays) are mutated through
//! helpers that call `mark_dirty` explicitly. The mask is only cleared by
//! `reset_dirty`, which callers invoke once a serialized payload has been
//! acknowledged.

use std::fmt;

use freeserf_core::MapPos;

use crate::codec::{CodecError, Decoder, Encoder};

/// Errors raised while applying text save values to records.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// The record has no field with this key.
    #[error("record {record} has no field named `{key}`")]
    UnknownKey {
        /// Record name.
        record: &'static str,
        /// Offending key.
        key: String,
    },
    /// A value could not be parsed.
    #[error("invalid value `{0}`")]
    InvalidValue(String),
    /// A list held the wrong number of items.
    #[error("expected {expected} list items, found {actual}")]
    ListLength {
        /// Expected number of items.
        expected: usize,
        /// Items found.
        actual: usize,
    },
}

/// Bit mask of changed fields, indexed by field declaration order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DirtyFields(u64);

impl DirtyFields {
    /// Mask with the first `count` fields set.
    #[must_use]
    pub const fn all(count: usize) -> Self {
        if count >= 64 {
            Self(u64::MAX)
        } else {
            Self((1u64 << count) - 1)
        }
    }

    /// Wraps a raw mask.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw mask.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Marks the field at `index`.
    pub fn mark(&mut self, index: u32) {
        self.0 |= 1 << index;
    }

    /// Reports whether the field at `index` is marked.
    #[must_use]
    pub const fn contains(self, index: u32) -> bool {
        self.0 & (1 << index) != 0
    }

    /// Reports whether nothing is marked.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of marked fields.
    #[must_use]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Clears every mark.
    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

/// Value that can live in a state record field.
pub trait StateValue: Copy + PartialEq + fmt::Debug {
    /// Writes the value to a sync payload.
    fn encode(&self, out: &mut Encoder) -> Result<(), CodecError>;

    /// Reads a value written by [`StateValue::encode`].
    fn decode(input: &mut Decoder<'_>) -> Result<Self, CodecError>;

    /// Renders the value for the text save format.
    fn to_text(&self) -> String;

    /// Parses a value rendered by [`StateValue::to_text`].
    fn from_text(text: &str) -> Result<Self, StateError>;
}

macro_rules! scalar_state_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl StateValue for $ty {
                fn encode(&self, out: &mut Encoder) -> Result<(), CodecError> {
                    out.write(self)
                }

                fn decode(input: &mut Decoder<'_>) -> Result<Self, CodecError> {
                    input.read()
                }

                fn to_text(&self) -> String {
                    self.to_string()
                }

                fn from_text(text: &str) -> Result<Self, StateError> {
                    text.trim()
                        .parse()
                        .map_err(|_| StateError::InvalidValue(text.to_owned()))
                }
            }
        )+
    };
}

scalar_state_value!(u8, u16, u32, u64, i32, bool);

impl StateValue for MapPos {
    fn encode(&self, out: &mut Encoder) -> Result<(), CodecError> {
        out.write(&self.raw())
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self, CodecError> {
        input.read().map(MapPos::from_raw)
    }

    fn to_text(&self) -> String {
        self.raw().to_string()
    }

    fn from_text(text: &str) -> Result<Self, StateError> {
        u32::from_text(text).map(MapPos::from_raw)
    }
}

impl<T: StateValue> StateValue for Option<T> {
    fn encode(&self, out: &mut Encoder) -> Result<(), CodecError> {
        match self {
            Some(value) => {
                out.write(&true)?;
                value.encode(out)
            }
            None => out.write(&false),
        }
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self, CodecError> {
        let present: bool = input.read()?;
        if present {
            T::decode(input).map(Some)
        } else {
            Ok(None)
        }
    }

    fn to_text(&self) -> String {
        self.as_ref().map(StateValue::to_text).unwrap_or_default()
    }

    fn from_text(text: &str) -> Result<Self, StateError> {
        if text.trim().is_empty() {
            Ok(None)
        } else {
            T::from_text(text).map(Some)
        }
    }
}

impl<T: StateValue, const N: usize> StateValue for [T; N] {
    fn encode(&self, out: &mut Encoder) -> Result<(), CodecError> {
        for item in self {
            item.encode(out)?;
        }
        Ok(())
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self, CodecError> {
        let mut items = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(T::decode(input)?);
        }
        items
            .try_into()
            .map_err(|items: Vec<T>| CodecError::LengthMismatch {
                expected: N,
                actual: items.len(),
            })
    }

    fn to_text(&self) -> String {
        self.iter()
            .map(StateValue::to_text)
            .collect::<Vec<_>>()
            .join(",")
    }

    fn from_text(text: &str) -> Result<Self, StateError> {
        let items = if text.trim().is_empty() && N == 0 {
            Vec::new()
        } else {
            text.split(',')
                .map(T::from_text)
                .collect::<Result<Vec<_>, _>>()?
        };
        let actual = items.len();
        items
            .try_into()
            .map_err(|_| StateError::ListLength { expected: N, actual })
    }
}

/// Behaviour shared by every generated state record.
pub trait Record: Default + Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Section name used by the text save format.
    const SECTION: &'static str;

    /// Fields changed since the last reset.
    fn dirty_fields(&self) -> DirtyFields;

    /// Clears the dirty mask.
    fn reset_dirty(&mut self);

    /// Marks every field dirty.
    fn mark_all_dirty(&mut self);

    /// Writes the dirty fields, or every field when `full` is set.
    fn encode(&self, out: &mut Encoder, full: bool) -> Result<(), CodecError>;

    /// Applies a record written by [`Record::encode`] without marking fields dirty.
    fn decode(&mut self, input: &mut Decoder<'_>) -> Result<(), CodecError>;

    /// Every field as a `(key, value)` pair for the text save format.
    fn text_fields(&self) -> Vec<(&'static str, String)>;

    /// Applies one `key = value` pair without marking the field dirty.
    fn apply_text_field(&mut self, key: &str, value: &str) -> Result<(), StateError>;

    /// Reports whether any field changed since the last reset.
    fn is_dirty(&self) -> bool {
        !self.dirty_fields().is_empty()
    }
}

/// Declares a dirty-tracked record together with its field enum.
///
/// Each field line reads `Variant => field, setter: Type = default;`. The
/// declaration order fixes both the bit index in the dirty mask and the
/// order in which fields are encoded.
macro_rules! state_record {
    (
        $(#[$record_meta:meta])*
        pub struct $record:ident in $section:literal;
        pub enum $fields:ident {
            $(
                $(#[$field_meta:meta])*
                $variant:ident => $field:ident, $setter:ident: $ty:ty = $default:expr;
            )+
        }
    ) => {
        $(#[$record_meta])*
        #[derive(Clone, Debug)]
        pub struct $record {
            $( $field: $ty, )+
            dirty: $crate::state::DirtyFields,
        }

        #[doc = concat!("Fields of [`", stringify!($record), "`] in encoding order.")]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $fields {
            $(
                $(#[$field_meta])*
                $variant,
            )+
        }

        impl $fields {
            /// Every field in encoding order.
            pub const ALL: &'static [$fields] = &[$($fields::$variant),+];

            /// Key used by the text save format.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $( $fields::$variant => stringify!($field), )+
                }
            }

            /// Resolves a text save key.
            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|field| field.name() == name)
            }
        }

        impl Default for $record {
            fn default() -> Self {
                Self {
                    $( $field: $default, )+
                    dirty: $crate::state::DirtyFields::default(),
                }
            }
        }

        impl PartialEq for $record {
            fn eq(&self, other: &Self) -> bool {
                true $( && self.$field == other.$field )+
            }
        }

        impl $record {
            $(
                $(#[$field_meta])*
                #[must_use]
                pub fn $field(&self) -> $ty {
                    self.$field
                }

                #[doc = concat!("Updates `", stringify!($field), "`, marking it dirty when the value changes.")]
                pub fn $setter(&mut self, value: $ty) {
                    if self.$field != value {
                        self.$field = value;
                        self.dirty.mark($fields::$variant as u32);
                    }
                }
            )+

            /// Marks a field dirty after it was mutated in place.
            pub fn mark_dirty(&mut self, field: $fields) {
                self.dirty.mark(field as u32);
            }

            /// Reports whether `field` changed since the last reset.
            #[must_use]
            pub fn is_field_dirty(&self, field: $fields) -> bool {
                self.dirty.contains(field as u32)
            }
        }

        impl $crate::state::Record for $record {
            const SECTION: &'static str = $section;

            fn dirty_fields(&self) -> $crate::state::DirtyFields {
                self.dirty
            }

            fn reset_dirty(&mut self) {
                self.dirty.clear();
            }

            fn mark_all_dirty(&mut self) {
                self.dirty = $crate::state::DirtyFields::all($fields::ALL.len());
            }

            fn encode(
                &self,
                out: &mut $crate::codec::Encoder,
                full: bool,
            ) -> Result<(), $crate::codec::CodecError> {
                let mask = if full {
                    $crate::state::DirtyFields::all($fields::ALL.len())
                } else {
                    self.dirty
                };
                out.write(&mask.bits())?;
                $(
                    if mask.contains($fields::$variant as u32) {
                        $crate::state::StateValue::encode(&self.$field, out)?;
                    }
                )+
                Ok(())
            }

            fn decode(
                &mut self,
                input: &mut $crate::codec::Decoder<'_>,
            ) -> Result<(), $crate::codec::CodecError> {
                let bits: u64 = input.read()?;
                let known = $crate::state::DirtyFields::all($fields::ALL.len()).bits();
                if bits & !known != 0 {
                    return Err($crate::codec::CodecError::UnknownFields {
                        record: stringify!($record),
                        bits,
                    });
                }
                let mask = $crate::state::DirtyFields::from_bits(bits);
                $(
                    if mask.contains($fields::$variant as u32) {
                        self.$field = <$ty as $crate::state::StateValue>::decode(input)?;
                    }
                )+
                Ok(())
            }

            fn text_fields(&self) -> Vec<(&'static str, String)> {
                vec![
                    $( (stringify!($field), $crate::state::StateValue::to_text(&self.$field)), )+
                ]
            }

            fn apply_text_field(
                &mut self,
                key: &str,
                value: &str,
            ) -> Result<(), $crate::state::StateError> {
                match key {
                    $(
                        stringify!($field) => {
                            self.$field = <$ty as $crate::state::StateValue>::from_text(value)?;
                        }
                    )+
                    _ => {
                        return Err($crate::state::StateError::UnknownKey {
                            record: stringify!($record),
                            key: key.to_owned(),
                        });
                    }
                }
                Ok(())
            }
        }
    };
}

pub(crate) use state_record;
