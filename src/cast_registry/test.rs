use super::*;
use std::any::Any;

trait Animal: Send + Sync {
    fn name(&self) -> String;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

trait Feline: Animal {
    fn into_animal(self: Arc<Self>) -> Arc<dyn Animal>;
}

struct Sphynx;

impl Animal for Sphynx {
    fn name(&self) -> String {
        "Sphynx".to_string()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Feline for Sphynx {
    fn into_animal(self: Arc<Self>) -> Arc<dyn Animal> {
        self
    }
}

struct Dog;

impl Animal for Dog {
    fn name(&self) -> String {
        "Dog".to_string()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

fn build() -> PolymorphicCastRegistry {
    let registry = PolymorphicCastRegistry::new();
    registry.register_cast::<Arc<Sphynx>, Arc<dyn Feline>>(
        |sphynx| sphynx as Arc<dyn Feline>,
        |feline| feline.into_animal().into_any().downcast::<Sphynx>().ok(),
    );
    registry.register_cast::<Arc<dyn Feline>, Arc<dyn Animal>>(
        |feline| feline.into_animal(),
        |animal| {
            animal
                .into_any()
                .downcast::<Sphynx>()
                .ok()
                .map(|sphynx| sphynx as Arc<dyn Feline>)
        },
    );
    registry.register_cast::<Arc<Dog>, Arc<dyn Animal>>(
        |dog| dog as Arc<dyn Animal>,
        |animal| animal.into_any().downcast::<Dog>().ok(),
    );
    registry
}

fn id<T: 'static>() -> TypeId {
    TypeId::of::<T>()
}

#[test]
fn test_convertibility() {
    let registry = build();
    assert!(registry.is_convertible(id::<Arc<Sphynx>>(), id::<Arc<dyn Animal>>()));
    assert!(registry.is_convertible(id::<Arc<dyn Animal>>(), id::<Arc<Sphynx>>()));
    assert!(!registry.is_convertible(id::<Arc<Dog>>(), id::<Arc<Sphynx>>()));
    assert!(registry.can_upcast(id::<Arc<Sphynx>>(), id::<Arc<dyn Animal>>()));
    assert!(!registry.can_upcast(id::<Arc<dyn Animal>>(), id::<Arc<Sphynx>>()));
    assert_eq!(
        registry.base_types(id::<Arc<Sphynx>>()),
        vec![id::<Arc<dyn Feline>>()]
    );
}

#[test]
fn test_transitive_upcast_keeps_behavior() {
    let registry = build();
    let value = AnyValue::new(Arc::new(Sphynx));
    let animal = value
        .cast::<Arc<dyn Animal>>(&registry)
        .expect("upcast should succeed");
    assert_eq!(animal.name(), "Sphynx");
}

#[test]
fn test_runtime_checked_downcast() {
    let registry = build();
    let animal: Arc<dyn Animal> = Arc::new(Sphynx);
    let value = AnyValue::new(animal);

    let sphynx = value.cast::<Arc<Sphynx>>(&registry).unwrap();
    assert_eq!(sphynx.name(), "Sphynx");

    // Dog is a registered subtype of Animal, but the payload is not a Dog.
    assert!(matches!(
        value.cast::<Arc<Dog>>(&registry),
        Err(CastError::Polymorphic { .. })
    ));
}

#[test]
fn test_sibling_types_fail() {
    let registry = build();
    let value = AnyValue::new(Arc::new(Dog));
    assert!(value.cast::<Arc<Sphynx>>(&registry).is_err());
    assert!(value.cast::<Arc<dyn Feline>>(&registry).is_err());
}
