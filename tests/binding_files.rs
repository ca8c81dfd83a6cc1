use kestrel_func::{
    CallState, Delegate, Func1, InvokeContext, MethodDescriptor, PersistentCallGroup, PersistentListenerMode, TypeInfo,
    Value, ValueType, World,
};
use std::cell::RefCell;
use std::rc::Rc;
use tempfile::tempdir;

type Log = Rc<RefCell<Vec<String>>>;

fn recorded(
    log: &Log,
    name: &'static str,
    params: Vec<ValueType>,
    body: fn(&[Value]) -> Value,
) -> MethodDescriptor {
    let log = Rc::clone(log);
    MethodDescriptor::new(name, params, ValueType::Int, move |_, args| {
        log.borrow_mut().push(name.to_string());
        body(args)
    })
}

fn counter_world(log: &Log) -> (World, Rc<TypeInfo>) {
    let mut world = World::new();
    let counter = world.register_type(
        TypeInfo::builder("Game.Counter, Game")
            .method(recorded(log, "add_one", vec![ValueType::Int], |args| match args {
                [Value::Int(x)] => Value::Int(x + 1),
                _ => Value::Unit,
            }))
            .method(recorded(log, "double", vec![ValueType::Int], |args| match args {
                [Value::Int(x)] => Value::Int(x * 2),
                _ => Value::Unit,
            }))
            .method(recorded(log, "ten", vec![], |_| Value::Int(10))),
    );
    (world, counter)
}

/// `add_one` on the caller's argument, `double` on a cached 7 and a switched-off `ten`.
fn bound_func(world: &mut World, counter: &Rc<TypeInfo>) -> Func1<i32, i32> {
    let first = world.spawn(counter);
    let second = world.spawn(counter);
    let world: &World = world;
    let mut func = Func1::<i32, i32>::new();
    let add_one = Delegate::<(i32,), i32>::bound(first, "add_one", |x: i32| x + 1);
    let double = Delegate::<(i32,), i32>::bound(second, "double", |x: i32| x * 2);
    let ten = Delegate::<(), i32>::bound(first, "ten", || 10);
    func.add_persistent_listener(world, &add_one).expect("add_one");
    func.add_cached_persistent_listener(world, &double, 7).expect("double");
    func.add_void_persistent_listener(world, &ten).expect("ten");
    func.set_persistent_listener_state(2, CallState::Off);
    func
}

#[test]
fn json_file_roundtrip_resolves_identically() {
    let log: Log = Rc::default();
    let (mut world, counter) = counter_world(&log);
    let mut func = bound_func(&mut world, &counter);

    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("bindings").join("func.json");
    func.persistent_calls().save_to_path(&path).expect("save json");
    let group = PersistentCallGroup::load_from_path(&path).expect("load json");
    assert_eq!(&group, func.persistent_calls());
    let mut loaded = Func1::<i32, i32>::from_persistent_calls(group);

    let cx = InvokeContext::playing(&world);
    assert_eq!(func.invoke(&cx, 5), Ok(14));
    let original_log = log.borrow().clone();
    log.borrow_mut().clear();
    assert_eq!(loaded.invoke(&cx, 5), Ok(14));
    assert_eq!(*log.borrow(), original_log);
    assert_eq!(original_log, vec!["add_one", "double"]);
}

#[test]
fn binary_file_roundtrip_resolves_identically() {
    let log: Log = Rc::default();
    let (mut world, counter) = counter_world(&log);
    let mut func = bound_func(&mut world, &counter);

    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("func.kfunc");
    func.persistent_calls().save_to_path(&path).expect("save binary");
    let bytes = std::fs::read(&path).expect("read binary");
    assert_eq!(&bytes[..4], b"KFNC");

    let mut loaded = Func1::<i32, i32>::from_persistent_calls(PersistentCallGroup::load_from_path(&path).expect("load"));
    assert_eq!(loaded.persistent_listener_state(2), Some(CallState::Off));
    assert_eq!(loaded.persistent_calls().listener(1).map(|call| call.mode()), Some(PersistentListenerMode::Int));

    let cx = InvokeContext::playing(&world);
    assert_eq!(loaded.invoke(&cx, 1), func.invoke(&cx, 1));
}

#[test]
fn func_serializes_as_its_persistent_calls() {
    let log: Log = Rc::default();
    let (mut world, counter) = counter_world(&log);
    let func = bound_func(&mut world, &counter);

    let json = serde_json::to_string(&func).expect("serialize func");
    let mut loaded: Func1<i32, i32> = serde_json::from_str(&json).expect("deserialize func");
    assert_eq!(loaded.persistent_listener_count(), 3);
    assert_eq!(loaded.runtime_listener_count(), 0);

    // A deserialized func resolves on its first invoke.
    assert_eq!(loaded.invoke(&InvokeContext::playing(&world), 0), Ok(14));
}

#[test]
fn loaded_bindings_with_destroyed_targets_are_skipped() {
    let log: Log = Rc::default();
    let (mut world, counter) = counter_world(&log);
    let func = bound_func(&mut world, &counter);
    let json = func.persistent_calls().to_json().expect("json");

    let doomed = func.persistent_target(1).expect("double target");
    world.despawn(doomed);
    let mut loaded = Func1::<i32, i32>::from_persistent_calls(PersistentCallGroup::from_json(&json).expect("parse"));
    assert_eq!(loaded.invoke(&InvokeContext::playing(&world), 5), Ok(6));
    assert_eq!(*log.borrow(), vec!["add_one"]);
}

#[test]
fn stored_type_names_are_tidied_on_load() {
    let json = r#"[
        {
            "target": { "id": 0, "generation": 0 },
            "methodName": "attach",
            "mode": "Object",
            "arguments": {
                "objectArg": { "id": 1, "generation": 0 },
                "objectArgTypeName": "Game.Door, Game, Version=1.2.0.0, Culture=neutral, PublicKeyToken=null"
            },
            "callState": "EditorAndRuntime"
        }
    ]"#;
    let group = PersistentCallGroup::from_json(json).expect("parse");
    let call = group.listener(0).expect("listener");
    assert_eq!(call.arguments().object_argument_type_name(), "Game.Door, Game");
    assert_eq!(call.call_state(), CallState::EditorAndRuntime);

    let saved = group.to_json().expect("json");
    assert!(!saved.contains("Version="));
}
