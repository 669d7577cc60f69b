#![forbid(unsafe_code)]

//! Explicit observed-state schema.
//!
//! A type is observable when it implements [`State`]: it names its reactive
//! fields up front ([`State::FIELDS`]), compares them one at a time, and
//! merges a partial [`State::Patch`] into itself. Nothing outside the schema
//! is tracked. [`reactive_state!`](crate::reactive_state) generates all of
//! this from a plain struct definition.

use std::fmt;
use std::hash::Hash;

/// Observed state of one reactive unit.
pub trait State: Clone + 'static {
    /// Identifier of one observed field.
    type Field: Copy + Eq + Hash + Ord + fmt::Debug + 'static;

    /// Partial change: only the fields it carries are assigned by
    /// [`merge`](State::merge).
    type Patch: Default;

    /// Every observed field, in declaration order.
    const FIELDS: &'static [Self::Field];

    fn field_name(field: Self::Field) -> &'static str;

    /// Loose inequality of one field between `self` and `other`.
    fn differs(&self, other: &Self, field: Self::Field) -> bool;

    /// Shallow merge of `patch` into `self`.
    fn merge(&mut self, patch: Self::Patch);

    /// Fields whose values differ between `self` and `other`.
    fn changed_fields(&self, other: &Self) -> Vec<Self::Field> {
        Self::FIELDS
            .iter()
            .copied()
            .filter(|&field| self.differs(other, field))
            .collect()
    }
}

/// Whether `field` changed between `previous` and `current`. A missing
/// previous state means everything changed.
pub fn field_changed<S: State>(previous: Option<&S>, current: &S, field: S::Field) -> bool {
    match previous {
        Some(previous) => previous.differs(current, field),
        None => true,
    }
}

/// Declare an observed state struct together with its field enum and patch
/// type.
///
/// ```
/// use trellis_runtime::reactive::State;
///
/// trellis_runtime::reactive_state! {
///     #[derive(Debug, Clone, Default)]
///     pub struct Slider {
///         pub value: f64,
///         pub label: String,
///     }
///     fields = SliderField;
///     patch = SliderPatch;
/// }
///
/// let mut slider = Slider::default();
/// slider.merge(SliderPatch::default().value(0.5));
/// assert_eq!(slider.value, 0.5);
/// assert_eq!(Slider::FIELDS, &[SliderField::value, SliderField::label]);
/// ```
///
/// Field enum variants reuse the field names verbatim. Every field type must
/// be `Clone + PartialEq`.
#[macro_export]
macro_rules! reactive_state {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty ),* $(,)?
        }
        fields = $fields:ident;
        patch = $patch:ident;
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field : $ty, )*
        }

        #[doc = concat!("Observed fields of [`", stringify!($name), "`].")]
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $fields {
            $( $field, )*
        }

        #[doc = concat!("Partial change to [`", stringify!($name), "`].")]
        #[derive(Clone, Default)]
        $vis struct $patch {
            $( pub $field : ::core::option::Option<$ty>, )*
        }

        impl $patch {
            $(
                #[must_use]
                pub fn $field(mut self, value: $ty) -> Self {
                    self.$field = ::core::option::Option::Some(value);
                    self
                }
            )*
        }

        impl $crate::reactive::State for $name {
            type Field = $fields;
            type Patch = $patch;

            const FIELDS: &'static [$fields] = &[ $( $fields::$field, )* ];

            fn field_name(field: $fields) -> &'static str {
                match field {
                    $( $fields::$field => stringify!($field), )*
                }
            }

            fn differs(&self, other: &Self, field: $fields) -> bool {
                match field {
                    $( $fields::$field => self.$field != other.$field, )*
                }
            }

            fn merge(&mut self, patch: $patch) {
                $(
                    if let ::core::option::Option::Some(value) = patch.$field {
                        self.$field = value;
                    }
                )*
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    crate::reactive_state! {
        #[derive(Debug, Clone, PartialEq, Default)]
        struct Form {
            name: String,
            age: u32,
            tags: Rc<Vec<String>>,
        }
        fields = FormField;
        patch = FormPatch;
    }

    #[test]
    fn merge_is_shallow() {
        let mut form = Form {
            name: "ada".into(),
            age: 36,
            tags: Rc::default(),
        };
        form.merge(FormPatch::default().age(37));
        assert_eq!(form.name, "ada");
        assert_eq!(form.age, 37);

        form.merge(FormPatch::default());
        assert_eq!(form.age, 37);
    }

    #[test]
    fn differs_compares_single_fields() {
        let a = Form::default();
        let mut b = a.clone();
        b.name = "grace".into();
        assert!(a.differs(&b, FormField::name));
        assert!(!a.differs(&b, FormField::age));
        assert_eq!(a.changed_fields(&b), vec![FormField::name]);
    }

    #[test]
    fn field_names_follow_declaration() {
        let names: Vec<_> = Form::FIELDS.iter().map(|&f| Form::field_name(f)).collect();
        assert_eq!(names, vec!["name", "age", "tags"]);
    }

    #[test]
    fn missing_previous_means_changed() {
        let form = Form::default();
        assert!(field_changed(None, &form, FormField::age));
        assert!(!field_changed(Some(&form), &form, FormField::age));
    }
}
