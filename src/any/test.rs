use super::*;

fn registry() -> PolymorphicCastRegistry {
    PolymorphicCastRegistry::default()
}

#[test]
fn test_same_type() {
    let value = AnyValue::new(42i32);
    assert!(value.is::<i32>());
    assert_eq!(value.cast::<i32>(&registry()).unwrap(), 42);
}

#[test]
fn test_integer_widening_and_narrowing() {
    let reg = registry();
    assert_eq!(AnyValue::new(200i32).cast::<u8>(&reg).unwrap(), 200u8);
    assert_eq!(AnyValue::new(200u8).cast::<i64>(&reg).unwrap(), 200i64);
    assert!(matches!(
        AnyValue::new(300i32).cast::<u8>(&reg),
        Err(CastError::OutOfRange { .. })
    ));
    assert!(AnyValue::new(-1i32).cast::<u32>(&reg).is_err());
}

#[test]
fn test_float_conversions() {
    let reg = registry();
    assert_eq!(AnyValue::new(3.0f64).cast::<i32>(&reg).unwrap(), 3);
    assert!(AnyValue::new(3.5f64).cast::<i32>(&reg).is_err());
    assert_eq!(AnyValue::new(7i32).cast::<f64>(&reg).unwrap(), 7.);
    assert_eq!(AnyValue::new(0.5f64).cast::<f32>(&reg).unwrap(), 0.5f32);
    // 0.1 has no exact f32 representation
    assert!(AnyValue::new(0.1f64).cast::<f32>(&reg).is_err());
}

#[test]
fn test_bool_conversions() {
    let reg = registry();
    assert!(AnyValue::new(1i32).cast::<bool>(&reg).unwrap());
    assert!(!AnyValue::new(0u8).cast::<bool>(&reg).unwrap());
    assert!(AnyValue::new(2i32).cast::<bool>(&reg).is_err());
    assert_eq!(AnyValue::new(true).cast::<i32>(&reg).unwrap(), 1);
}

#[test]
fn test_string_parse() {
    let reg = registry();
    assert_eq!(AnyValue::new("42".to_string()).cast::<i32>(&reg).unwrap(), 42);
    assert!(AnyValue::new("true".to_string()).cast::<bool>(&reg).unwrap());
    assert_eq!(
        AnyValue::new("RUNNING".to_string())
            .cast::<NodeStatus>(&reg)
            .unwrap(),
        NodeStatus::Running
    );
    assert!(matches!(
        AnyValue::new("forty-two".to_string()).cast::<i32>(&reg),
        Err(CastError::Parse { .. })
    ));
}

#[derive(Clone, Debug, PartialEq)]
struct Point(i32, i32);

impl FromStr for Point {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s.split_once(';').ok_or(())?;
        Ok(Point(
            x.trim().parse().map_err(|_| ())?,
            y.trim().parse().map_err(|_| ())?,
        ))
    }
}

#[test]
fn test_custom_converter() {
    assert!(TypeInfo::of::<Point>().converter().is_none());
    let info = TypeInfo::with_converter::<Point>();
    let parsed = info.parse("3;4").unwrap();
    assert_eq!(parsed.downcast_ref::<Point>(), Some(&Point(3, 4)));
    assert!(info.parse("3").is_err());
}

#[test]
fn test_untyped_accepts_anything() {
    let value = AnyValue::new(Point(1, 2));
    let converted = value.convert_to(&TypeInfo::any(), &registry()).unwrap();
    assert!(converted.is::<Point>());
}

#[test]
fn test_unrelated_types() {
    assert!(matches!(
        AnyValue::new(Point(1, 2)).cast::<i32>(&registry()),
        Err(CastError::NoConversion { .. })
    ));
}
