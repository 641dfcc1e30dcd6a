//! Type-erased values stored in the blackboard and passed through ports.
//!
//! An [`AnyValue`] remembers the concrete type it was created with, so it can be
//! converted on read:
//!
//! * to the very same type (plain clone),
//! * from a `String` to any type that has a string converter,
//! * between numeric types, as long as nothing is lost in the conversion,
//! * along registered polymorphic relationships (see [`PolymorphicCastRegistry`]).

use crate::{cast_registry::PolymorphicCastRegistry, error::CastError, NodeStatus};
use ::once_cell::sync::Lazy;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Parses a string into a value of a fixed type.
pub type StringConverter = fn(&str) -> Option<AnyValue>;

/// A cloneable, thread-safe, type-erased value.
///
/// The payload lives behind a reference count, so cloning never requires the
/// payload type to be `Clone`.
#[derive(Clone)]
pub struct AnyValue {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl AnyValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` of the held value (not of the container).
    pub fn held_type(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Converts the value to `T`, following the rules described at module level.
    pub fn cast<T>(&self, registry: &PolymorphicCastRegistry) -> Result<T, CastError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let target = TypeInfo::of::<T>();
        let converted = self.convert_to(&target, registry)?;
        converted
            .downcast_ref::<T>()
            .cloned()
            .ok_or(CastError::NoConversion {
                from: self.type_name,
                to: target.type_name(),
            })
    }

    /// Converts the value into the type described by `target`.
    /// An untyped target accepts anything as is.
    pub fn convert_to(
        &self,
        target: &TypeInfo,
        registry: &PolymorphicCastRegistry,
    ) -> Result<AnyValue, CastError> {
        let target_id = match target.type_id() {
            Some(id) if id != self.type_id => id,
            _ => return Ok(self.clone()),
        };

        if let Some(text) = self.downcast_ref::<String>() {
            return target.parse(text);
        }

        if let Some(number) = Number::of(self) {
            if NUMERIC_TYPES.contains(&target_id) {
                return number.convert(target_id).ok_or(CastError::OutOfRange {
                    from: self.type_name,
                    to: target.type_name(),
                });
            }
        }

        if registry.is_convertible(self.type_id, target_id) {
            return registry.try_cast(self, target_id, target.type_name());
        }

        Err(CastError::NoConversion {
            from: self.type_name,
            to: target.type_name(),
        })
    }
}

impl Debug for AnyValue {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        write!(fmt, "AnyValue<{}>", self.type_name)
    }
}

/// Static type descriptor of a blackboard entry or a port.
///
/// A `TypeInfo` without a type id is "untyped": it accepts values of any type
/// and gets fixed on the first concrete write.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    type_id: Option<TypeId>,
    type_name: &'static str,
    converter: Option<StringConverter>,
}

impl TypeInfo {
    pub fn any() -> Self {
        Self {
            type_id: None,
            type_name: "AnyTypeAllowed",
            converter: None,
        }
    }

    /// Describes `T`, picking up a built-in string converter for primitive types.
    pub fn of<T: 'static>() -> Self {
        let type_id = TypeId::of::<T>();
        Self {
            type_id: Some(type_id),
            type_name: std::any::type_name::<T>(),
            converter: BUILTIN_CONVERTERS.get(&type_id).copied(),
        }
    }

    /// Describes the type held by `value`.
    pub fn of_value(value: &AnyValue) -> Self {
        Self {
            type_id: Some(value.held_type()),
            type_name: value.type_name(),
            converter: BUILTIN_CONVERTERS.get(&value.held_type()).copied(),
        }
    }

    /// Describes `T` and parses strings with its `FromStr` implementation.
    pub fn with_converter<T>() -> Self
    where
        T: FromStr + Send + Sync + 'static,
    {
        Self {
            converter: Some(parse_from_str::<T>),
            ..Self::of::<T>()
        }
    }

    pub fn is_strongly_typed(&self) -> bool {
        self.type_id.is_some()
    }

    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn converter(&self) -> Option<StringConverter> {
        self.converter
    }

    pub fn is_string(&self) -> bool {
        self.type_id == Some(TypeId::of::<String>())
    }

    pub fn parse(&self, text: &str) -> Result<AnyValue, CastError> {
        if !self.is_strongly_typed() {
            return Ok(AnyValue::new(text.to_owned()));
        }
        let converter = self.converter.ok_or(CastError::NoConversion {
            from: std::any::type_name::<String>(),
            to: self.type_name,
        })?;
        converter(text).ok_or_else(|| CastError::Parse {
            text: text.to_owned(),
            to: self.type_name,
        })
    }
}

impl Debug for TypeInfo {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        fmt.debug_struct("TypeInfo")
            .field("type_name", &self.type_name)
            .field("has_converter", &self.converter.is_some())
            .finish()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

fn parse_from_str<T>(text: &str) -> Option<AnyValue>
where
    T: FromStr + Send + Sync + 'static,
{
    text.trim().parse::<T>().ok().map(AnyValue::new)
}

fn parse_bool(text: &str) -> Option<AnyValue> {
    match text.trim() {
        "true" | "True" | "TRUE" | "1" => Some(AnyValue::new(true)),
        "false" | "False" | "FALSE" | "0" => Some(AnyValue::new(false)),
        _ => None,
    }
}

fn parse_string(text: &str) -> Option<AnyValue> {
    Some(AnyValue::new(text.to_owned()))
}

static BUILTIN_CONVERTERS: Lazy<HashMap<TypeId, StringConverter>> = Lazy::new(|| {
    let mut map: HashMap<TypeId, StringConverter> = HashMap::new();
    macro_rules! from_str {
        ($($ty:ty),*) => {
            $( map.insert(TypeId::of::<$ty>(), parse_from_str::<$ty>); )*
        };
    }
    from_str!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, char, NodeStatus);
    map.insert(TypeId::of::<bool>(), parse_bool);
    map.insert(TypeId::of::<String>(), parse_string);
    map
});

static NUMERIC_TYPES: Lazy<HashSet<TypeId>> = Lazy::new(|| {
    [
        TypeId::of::<i8>(),
        TypeId::of::<i16>(),
        TypeId::of::<i32>(),
        TypeId::of::<i64>(),
        TypeId::of::<isize>(),
        TypeId::of::<u8>(),
        TypeId::of::<u16>(),
        TypeId::of::<u32>(),
        TypeId::of::<u64>(),
        TypeId::of::<usize>(),
        TypeId::of::<f32>(),
        TypeId::of::<f64>(),
        TypeId::of::<bool>(),
    ]
    .into_iter()
    .collect()
});

/// Intermediate representation for numeric conversions.
#[derive(Clone, Copy, Debug)]
enum Number {
    Int(i128),
    Float(f64),
    Bool(bool),
}

impl Number {
    fn of(value: &AnyValue) -> Option<Self> {
        macro_rules! integers {
            ($($ty:ty),*) => {
                $(
                    if let Some(v) = value.downcast_ref::<$ty>() {
                        return Some(Number::Int(*v as i128));
                    }
                )*
            };
        }
        integers!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
        if let Some(v) = value.downcast_ref::<f32>() {
            return Some(Number::Float(f64::from(*v)));
        }
        if let Some(v) = value.downcast_ref::<f64>() {
            return Some(Number::Float(*v));
        }
        value.downcast_ref::<bool>().map(|v| Number::Bool(*v))
    }

    fn as_integer(self) -> Option<i128> {
        match self {
            Number::Int(v) => Some(v),
            Number::Float(v)
                if v.is_finite()
                    && v.fract() == 0.0
                    && v >= i128::MIN as f64
                    && v <= i128::MAX as f64 =>
            {
                Some(v as i128)
            }
            Number::Float(_) => None,
            Number::Bool(v) => Some(v as i128),
        }
    }

    fn as_f64(self) -> Option<f64> {
        match self {
            Number::Int(v) => {
                let f = v as f64;
                (f as i128 == v).then_some(f)
            }
            Number::Float(v) => Some(v),
            Number::Bool(v) => Some(if v { 1. } else { 0. }),
        }
    }

    /// Returns `None` if the value cannot be represented exactly by `target`.
    fn convert(self, target: TypeId) -> Option<AnyValue> {
        macro_rules! integers {
            ($($ty:ty),*) => {
                $(
                    if target == TypeId::of::<$ty>() {
                        return self
                            .as_integer()
                            .and_then(|v| <$ty>::try_from(v).ok())
                            .map(AnyValue::new);
                    }
                )*
            };
        }
        integers!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

        if target == TypeId::of::<f64>() {
            return self.as_f64().map(AnyValue::new);
        }
        if target == TypeId::of::<f32>() {
            return self.as_f64().and_then(|v| {
                let narrow = v as f32;
                (f64::from(narrow) == v || v.is_nan()).then_some(AnyValue::new(narrow))
            });
        }
        if target == TypeId::of::<bool>() {
            return match self.as_integer() {
                Some(0) => Some(AnyValue::new(false)),
                Some(1) => Some(AnyValue::new(true)),
                _ => None,
            };
        }
        None
    }
}

#[cfg(test)]
mod test;
