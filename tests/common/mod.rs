//! Shared object-graph fixture: a root with a nested bean chain, a plain
//! array, an indexed-property catalog, an overloaded service, and a generic
//! base class bound differently by two subclasses.
#![allow(dead_code)]

use ognav::{ClassBuilder, Engine, OgnavError, TypeHash, TypeRegistry, TypeTag, Value};

pub struct Bean3 {
    pub value: Value,
}

pub struct Bean2 {
    pub bean3: Value,
}

pub struct Catalog {
    pub items: Vec<Value>,
}

pub struct Service;

pub struct GenericParent {
    pub saved: Value,
}
pub struct LongChild {
    pub parent: GenericParent,
}
pub struct StringChild {
    pub parent: GenericParent,
}

pub struct Root {
    pub property: Value,
    pub list: Value,
    pub catalog: Value,
    pub service: Value,
    pub count: Value,
    pub long_child: Value,
    pub string_child: Value,
}

pub fn hash(name: &str) -> TypeHash {
    TypeHash::from_name(name)
}

fn int_setter(slot: fn(&mut Root) -> &mut Value) -> impl Fn(&mut Root, Value) -> Result<(), OgnavError> {
    move |root, value| {
        *slot(root) = value;
        Ok(())
    }
}

pub fn build_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();

    registry
        .register(
            ClassBuilder::<Bean3>::new("Bean3")
                .property_rw(
                    "value",
                    TypeTag::Int,
                    |b| b.value.clone(),
                    |b, v| {
                        b.value = v;
                        Ok(())
                    },
                )
                .build(),
        )
        .unwrap();

    registry
        .register(
            ClassBuilder::<Bean2>::new("Bean2")
                .property("bean3", TypeTag::Object(hash("Bean3")), |b| b.bean3.clone())
                .build(),
        )
        .unwrap();

    registry
        .register(
            ClassBuilder::<Catalog>::new("Catalog")
                .indexed_property(
                    "item",
                    TypeTag::Any,
                    |c, idx| match idx {
                        Value::Int(n) if *n >= 0 && (*n as usize) < c.items.len() => {
                            Ok(c.items[*n as usize].clone())
                        }
                        other => Err(OgnavError::native(format!("bad catalog index {other}"))),
                    },
                    |c, idx, value| match idx {
                        Value::Int(n) if *n >= 0 && (*n as usize) < c.items.len() => {
                            c.items[*n as usize] = value;
                            Ok(())
                        }
                        other => Err(OgnavError::native(format!("bad catalog index {other}"))),
                    },
                )
                .build(),
        )
        .unwrap();

    registry
        .register(
            ClassBuilder::<Service>::new("Service")
                .method("run", &[TypeTag::Float], TypeTag::String, |_, _| {
                    Ok(Value::from("float"))
                })
                .method("run", &[TypeTag::Int], TypeTag::String, |_, _| {
                    Ok(Value::from("int"))
                })
                .method("exec", &[TypeTag::Int], TypeTag::Int, |_, args| {
                    match &args[0] {
                        Value::Int(n) => Ok(Value::Int(n * 2)),
                        other => Err(OgnavError::native(format!("exec wants int, got {other}"))),
                    }
                })
                .method("describe", &[], TypeTag::String, |_, _| {
                    Ok(Value::from("a service"))
                })
                .method("fail", &[], TypeTag::Any, |_, _| {
                    Err(OgnavError::native("service deliberately failed"))
                })
                .variadic_method("sum", &[TypeTag::Int], TypeTag::Int, |_, args| {
                    let mut total = 0;
                    for arg in args {
                        match arg {
                            Value::Int(n) => total += n,
                            other => {
                                return Err(OgnavError::native(format!(
                                    "sum wants ints, got {other}"
                                )));
                            }
                        }
                    }
                    Ok(Value::Int(total))
                })
                .build(),
        )
        .unwrap();

    registry
        .register(
            ClassBuilder::<GenericParent>::new("GenericParent")
                .property("lastSaved", TypeTag::Any, |p| p.saved.clone())
                .method("save", &[TypeTag::Var("T")], TypeTag::Var("T"), |p, args| {
                    p.saved = args[0].clone();
                    Ok(args[0].clone())
                })
                .build(),
        )
        .unwrap();

    registry
        .register(
            ClassBuilder::<LongChild>::new("LongChild")
                .extends_as(
                    "GenericParent",
                    |c: &LongChild| &c.parent,
                    |c: &mut LongChild| &mut c.parent,
                )
                .bind_generic("T", TypeTag::Int)
                .build(),
        )
        .unwrap();

    registry
        .register(
            ClassBuilder::<StringChild>::new("StringChild")
                .extends_as(
                    "GenericParent",
                    |c: &StringChild| &c.parent,
                    |c: &mut StringChild| &mut c.parent,
                )
                .bind_generic("T", TypeTag::String)
                .build(),
        )
        .unwrap();

    registry
        .register(
            ClassBuilder::<Root>::new("Root")
                .property("property", TypeTag::Object(hash("Bean2")), |r| {
                    r.property.clone()
                })
                .property_rw(
                    "list",
                    TypeTag::Array,
                    |r| r.list.clone(),
                    int_setter(|r| &mut r.list),
                )
                .property("catalog", TypeTag::Object(hash("Catalog")), |r| {
                    r.catalog.clone()
                })
                .property("service", TypeTag::Object(hash("Service")), |r| {
                    r.service.clone()
                })
                .property_rw(
                    "count",
                    TypeTag::Int,
                    |r| r.count.clone(),
                    int_setter(|r| &mut r.count),
                )
                .property("longChild", TypeTag::Object(hash("LongChild")), |r| {
                    r.long_child.clone()
                })
                .property("stringChild", TypeTag::Object(hash("StringChild")), |r| {
                    r.string_child.clone()
                })
                .static_field("SIZE_STRING", Value::from("small"))
                .build(),
        )
        .unwrap();

    registry
        .register(
            ClassBuilder::<()>::new("MathUtil")
                .static_method("max", &[TypeTag::Int, TypeTag::Int], TypeTag::Int, |args| {
                    match (&args[0], &args[1]) {
                        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(*a.max(b))),
                        _ => Err(OgnavError::native("max wants two ints")),
                    }
                })
                .build(),
        )
        .unwrap();

    registry
}

pub fn engine() -> Engine {
    Engine::new(build_registry())
}

/// A fresh root whose `property.bean3.value` is 42 and whose list holds
/// three ints.
pub fn root() -> Value {
    let bean3 = Value::object(hash("Bean3"), Bean3 { value: Value::Int(42) });
    let bean2 = Value::object(hash("Bean2"), Bean2 { bean3 });
    Value::object(
        hash("Root"),
        Root {
            property: bean2,
            list: Value::array(vec![Value::Int(10), Value::Int(20), Value::Int(30)]),
            catalog: Value::object(
                hash("Catalog"),
                Catalog {
                    items: vec![Value::from("a"), Value::from("b")],
                },
            ),
            service: Value::object(hash("Service"), Service),
            count: Value::Int(3),
            long_child: Value::object(
                hash("LongChild"),
                LongChild {
                    parent: GenericParent { saved: Value::Null },
                },
            ),
            string_child: Value::object(
                hash("StringChild"),
                StringChild {
                    parent: GenericParent { saved: Value::Null },
                },
            ),
        },
    )
}
