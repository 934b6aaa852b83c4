//! Scripted in-memory stand-in for a foreign runtime.
//!
//! Classes, members, and behaviors are registered up front; the engine then
//! talks to the mock through `JvmEnv` exactly as it would to a live runtime.
//! The mock additionally keeps the books the tests assert on: how many
//! invocation-surface calls were issued, which scratch-buffer leases are
//! still outstanding, and how many were released.

#![expect(dead_code, reason = "not every test binary exercises every helper")]

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
};

use charon::{
    CallTarget, ForeignError, JClass, JFieldId, JMethodId, JObject, JValue, JvmEnv, LeaseId, PrimArray, PrimKind,
};

/// What a registered method or constructor does when invoked.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Returns a fixed value. For void methods and constructors the value is
    /// ignored.
    Return(JValue),
    /// Returns the argument at the given index unchanged.
    Echo(usize),
    /// Allocates and returns a fresh string object.
    ReturnString(String),
    /// Raises a foreign exception.
    Throw { class_path: String, message: String },
    /// Constructors only: produce a null instance without raising.
    Fail,
}

impl Behavior {
    pub fn throws(message: &str) -> Self {
        Self::Throw {
            class_path: "java/lang/RuntimeException".to_owned(),
            message: message.to_owned(),
        }
    }
}

type MemberKey = (String, String, bool);

struct ClassDef {
    handle: u64,
    methods: HashMap<MemberKey, u64>,
    fields: HashMap<MemberKey, u64>,
    static_values: HashMap<u64, JValue>,
    instance_defaults: Vec<(u64, JValue)>,
}

struct MethodDef {
    behavior: Behavior,
}

enum ObjectData {
    Instance {
        class_path: String,
        fields: HashMap<u64, JValue>,
    },
    Str(String),
    PrimArr(PrimArray),
    ObjArr {
        items: Vec<Option<u64>>,
    },
}

#[derive(Default)]
struct World {
    classes: HashMap<String, ClassDef>,
    class_paths: HashMap<u64, String>,
    methods: HashMap<u64, MethodDef>,
    objects: HashMap<u64, ObjectData>,
    next_id: u64,
    leases: HashSet<u64>,
    releases: usize,
    pending: Option<ForeignError>,
    calls: usize,
    array_copy: bool,
}

impl World {
    fn fresh_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn alloc(&mut self, data: ObjectData) -> u64 {
        let id = self.fresh_id();
        self.objects.insert(id, data);
        id
    }

    fn class_path(&self, class: JClass) -> String {
        self.class_paths
            .get(&class.raw())
            .unwrap_or_else(|| panic!("unknown class handle {class:?}"))
            .clone()
    }

    fn throw(&mut self, class_path: &str, message: &str) {
        self.pending = Some(ForeignError {
            class_path: class_path.to_owned(),
            message: message.to_owned(),
        });
    }
}

pub struct MockJvm {
    world: RefCell<World>,
}

impl std::fmt::Debug for MockJvm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockJvm").finish_non_exhaustive()
    }
}

impl Default for MockJvm {
    fn default() -> Self {
        Self::new()
    }
}

impl MockJvm {
    pub fn new() -> Self {
        let world = World {
            array_copy: true,
            ..World::default()
        };
        Self {
            world: RefCell::new(world),
        }
    }

    /// Registers a class (with a succeeding no-argument constructor) and
    /// returns a builder for its members.
    pub fn class(&self, path: &str) -> ClassBuilder<'_> {
        {
            let mut world = self.world.borrow_mut();
            if !world.classes.contains_key(path) {
                let handle = world.fresh_id();
                world.classes.insert(
                    path.to_owned(),
                    ClassDef {
                        handle,
                        methods: HashMap::new(),
                        fields: HashMap::new(),
                        static_values: HashMap::new(),
                        instance_defaults: Vec::new(),
                    },
                );
                world.class_paths.insert(handle, path.to_owned());
            }
        }
        let builder = ClassBuilder {
            jvm: self,
            path: path.to_owned(),
        };
        builder.constructor("()V", Behavior::Return(JValue::Object(None)))
    }

    /// Allocates a live instance of a registered class, for adoption tests.
    pub fn alloc_instance(&self, path: &str) -> JObject {
        let mut world = self.world.borrow_mut();
        let fields = world
            .classes
            .get(path)
            .unwrap_or_else(|| panic!("class {path} is not registered"))
            .instance_defaults
            .iter()
            .copied()
            .collect();
        let id = world.alloc(ObjectData::Instance {
            class_path: path.to_owned(),
            fields,
        });
        JObject::from_raw(id)
    }

    /// Number of invocation-surface calls issued so far (constructions,
    /// method calls, field accesses).
    pub fn foreign_calls(&self) -> usize {
        self.world.borrow().calls
    }

    /// Scratch-buffer leases handed out and not yet released.
    pub fn outstanding_leases(&self) -> usize {
        self.world.borrow().leases.len()
    }

    /// Scratch-buffer leases released so far.
    pub fn lease_releases(&self) -> usize {
        self.world.borrow().releases
    }

    /// Whether element fetches hand out copies (`true`, the default) or
    /// direct views (`false`).
    pub fn set_array_copy(&self, copy: bool) {
        self.world.borrow_mut().array_copy = copy;
    }

    fn register_method(&self, path: &str, name: &str, descriptor: &str, is_static: bool, behavior: Behavior) {
        let mut world = self.world.borrow_mut();
        let id = world.fresh_id();
        world.methods.insert(id, MethodDef { behavior });
        world
            .classes
            .get_mut(path)
            .expect("class registered")
            .methods
            .insert((name.to_owned(), descriptor.to_owned(), is_static), id);
    }

    fn register_field(&self, path: &str, name: &str, descriptor: &str, is_static: bool, initial: JValue) {
        let mut world = self.world.borrow_mut();
        let id = world.fresh_id();
        let class = world.classes.get_mut(path).expect("class registered");
        class.fields.insert((name.to_owned(), descriptor.to_owned(), is_static), id);
        if is_static {
            class.static_values.insert(id, initial);
        } else {
            class.instance_defaults.push((id, initial));
        }
    }

    fn invoke(&self, _target: CallTarget, method: JMethodId, args: &[JValue]) -> JValue {
        let mut world = self.world.borrow_mut();
        world.calls += 1;
        let behavior = world
            .methods
            .get(&method.raw())
            .unwrap_or_else(|| panic!("unknown method id {method:?}"))
            .behavior
            .clone();
        match behavior {
            Behavior::Return(value) => value,
            Behavior::Echo(index) => args.get(index).copied().unwrap_or(JValue::Object(None)),
            Behavior::ReturnString(text) => {
                let id = world.alloc(ObjectData::Str(text));
                JValue::Object(Some(JObject::from_raw(id)))
            }
            Behavior::Throw { class_path, message } => {
                world.throw(&class_path, &message);
                JValue::Object(None)
            }
            Behavior::Fail => JValue::Object(None),
        }
    }

    fn load_field(&self, target: CallTarget, field: JFieldId) -> JValue {
        let mut world = self.world.borrow_mut();
        world.calls += 1;
        match target {
            CallTarget::Static(class) => {
                let path = world.class_path(class);
                world.classes[&path]
                    .static_values
                    .get(&field.raw())
                    .copied()
                    .unwrap_or(JValue::Object(None))
            }
            CallTarget::Instance(object) => match world.objects.get(&object.raw()) {
                Some(ObjectData::Instance { fields, .. }) => {
                    fields.get(&field.raw()).copied().unwrap_or(JValue::Object(None))
                }
                _ => panic!("field access on a non-instance handle"),
            },
        }
    }

    fn store_field(&self, target: CallTarget, field: JFieldId, value: JValue) {
        let mut world = self.world.borrow_mut();
        world.calls += 1;
        match target {
            CallTarget::Static(class) => {
                let path = world.class_path(class);
                world
                    .classes
                    .get_mut(&path)
                    .expect("class registered")
                    .static_values
                    .insert(field.raw(), value);
            }
            CallTarget::Instance(object) => match world.objects.get_mut(&object.raw()) {
                Some(ObjectData::Instance { fields, .. }) => {
                    fields.insert(field.raw(), value);
                }
                _ => panic!("field access on a non-instance handle"),
            },
        }
    }

    fn member_id<F>(&self, class: JClass, name: &str, descriptor: &str, is_static: bool, table: F, missing: &str) -> Option<u64>
    where
        F: Fn(&ClassDef) -> &HashMap<MemberKey, u64>,
    {
        let mut world = self.world.borrow_mut();
        let path = world.class_path(class);
        let id = table(&world.classes[&path])
            .get(&(name.to_owned(), descriptor.to_owned(), is_static))
            .copied();
        if id.is_none() {
            world.throw(missing, &format!("{path}.{name} {descriptor}"));
        }
        id
    }
}

pub struct ClassBuilder<'a> {
    jvm: &'a MockJvm,
    path: String,
}

impl ClassBuilder<'_> {
    pub fn constructor(self, descriptor: &str, behavior: Behavior) -> Self {
        self.jvm.register_method(&self.path, "<init>", descriptor, false, behavior);
        self
    }

    pub fn method(self, name: &str, descriptor: &str, behavior: Behavior) -> Self {
        self.jvm.register_method(&self.path, name, descriptor, false, behavior);
        self
    }

    pub fn static_method(self, name: &str, descriptor: &str, behavior: Behavior) -> Self {
        self.jvm.register_method(&self.path, name, descriptor, true, behavior);
        self
    }

    pub fn field(self, name: &str, descriptor: &str, initial: JValue) -> Self {
        self.jvm.register_field(&self.path, name, descriptor, false, initial);
        self
    }

    pub fn static_field(self, name: &str, descriptor: &str, initial: JValue) -> Self {
        self.jvm.register_field(&self.path, name, descriptor, true, initial);
        self
    }
}

macro_rules! prim_calls {
    ($($fn_name:ident => $variant:ident : $ty:ty = $default:expr),* $(,)?) => {
        $(fn $fn_name(&self, target: CallTarget, method: JMethodId, args: &[JValue]) -> $ty {
            match self.invoke(target, method, args) {
                JValue::$variant(v) => v,
                _ => $default,
            }
        })*
    };
}

macro_rules! prim_field_accessors {
    ($($get_name:ident / $set_name:ident => $variant:ident : $ty:ty = $default:expr),* $(,)?) => {
        $(
            fn $get_name(&self, target: CallTarget, field: JFieldId) -> $ty {
                match self.load_field(target, field) {
                    JValue::$variant(v) => v,
                    _ => $default,
                }
            }

            fn $set_name(&self, target: CallTarget, field: JFieldId, value: $ty) {
                self.store_field(target, field, JValue::$variant(value));
            }
        )*
    };
}

impl JvmEnv for MockJvm {
    fn find_class(&self, path: &str) -> Option<JClass> {
        let mut world = self.world.borrow_mut();
        match world.classes.get(path) {
            Some(def) => Some(JClass::from_raw(def.handle)),
            None => {
                world.throw("java/lang/NoClassDefFoundError", path);
                None
            }
        }
    }

    fn get_method_id(&self, class: JClass, name: &str, descriptor: &str) -> Option<JMethodId> {
        self.member_id(class, name, descriptor, false, |def| &def.methods, "java/lang/NoSuchMethodError")
            .map(JMethodId::from_raw)
    }

    fn get_static_method_id(&self, class: JClass, name: &str, descriptor: &str) -> Option<JMethodId> {
        self.member_id(class, name, descriptor, true, |def| &def.methods, "java/lang/NoSuchMethodError")
            .map(JMethodId::from_raw)
    }

    fn get_field_id(&self, class: JClass, name: &str, descriptor: &str) -> Option<JFieldId> {
        self.member_id(class, name, descriptor, false, |def| &def.fields, "java/lang/NoSuchFieldError")
            .map(JFieldId::from_raw)
    }

    fn get_static_field_id(&self, class: JClass, name: &str, descriptor: &str) -> Option<JFieldId> {
        self.member_id(class, name, descriptor, true, |def| &def.fields, "java/lang/NoSuchFieldError")
            .map(JFieldId::from_raw)
    }

    fn new_object(&self, class: JClass, constructor: JMethodId, _args: &[JValue]) -> Option<JObject> {
        let mut world = self.world.borrow_mut();
        world.calls += 1;
        let behavior = world
            .methods
            .get(&constructor.raw())
            .unwrap_or_else(|| panic!("unknown constructor id {constructor:?}"))
            .behavior
            .clone();
        match behavior {
            Behavior::Throw { class_path, message } => {
                world.throw(&class_path, &message);
                None
            }
            Behavior::Fail => None,
            _ => {
                let path = world.class_path(class);
                let fields = world.classes[&path].instance_defaults.iter().copied().collect();
                let id = world.alloc(ObjectData::Instance {
                    class_path: path,
                    fields,
                });
                Some(JObject::from_raw(id))
            }
        }
    }

    fn call_void_method(&self, target: CallTarget, method: JMethodId, args: &[JValue]) {
        self.invoke(target, method, args);
    }

    prim_calls! {
        call_boolean_method => Boolean: bool = false,
        call_byte_method => Byte: i8 = 0,
        call_char_method => Char: u16 = 0,
        call_short_method => Short: i16 = 0,
        call_int_method => Int: i32 = 0,
        call_long_method => Long: i64 = 0,
        call_float_method => Float: f32 = 0.0,
        call_double_method => Double: f64 = 0.0,
    }

    fn call_object_method(&self, target: CallTarget, method: JMethodId, args: &[JValue]) -> Option<JObject> {
        match self.invoke(target, method, args) {
            JValue::Object(object) => object,
            _ => None,
        }
    }

    prim_field_accessors! {
        get_boolean_field / set_boolean_field => Boolean: bool = false,
        get_byte_field / set_byte_field => Byte: i8 = 0,
        get_char_field / set_char_field => Char: u16 = 0,
        get_short_field / set_short_field => Short: i16 = 0,
        get_int_field / set_int_field => Int: i32 = 0,
        get_long_field / set_long_field => Long: i64 = 0,
        get_float_field / set_float_field => Float: f32 = 0.0,
        get_double_field / set_double_field => Double: f64 = 0.0,
    }

    fn get_object_field(&self, target: CallTarget, field: JFieldId) -> Option<JObject> {
        match self.load_field(target, field) {
            JValue::Object(object) => object,
            _ => None,
        }
    }

    fn set_object_field(&self, target: CallTarget, field: JFieldId, value: Option<JObject>) {
        self.store_field(target, field, JValue::Object(value));
    }

    fn new_string_utf(&self, text: &str) -> Option<JObject> {
        let mut world = self.world.borrow_mut();
        let id = world.alloc(ObjectData::Str(text.to_owned()));
        Some(JObject::from_raw(id))
    }

    fn get_string_utf_chars(&self, string: JObject) -> Option<(Vec<u8>, LeaseId)> {
        let mut world = self.world.borrow_mut();
        let bytes = match world.objects.get(&string.raw()) {
            Some(ObjectData::Str(text)) => text.clone().into_bytes(),
            _ => return None,
        };
        let lease = world.fresh_id();
        world.leases.insert(lease);
        Some((bytes, LeaseId::from_raw(lease)))
    }

    fn release_string_utf_chars(&self, _string: JObject, lease: LeaseId) {
        let mut world = self.world.borrow_mut();
        assert!(world.leases.remove(&lease.raw()), "released a lease that was never granted");
        world.releases += 1;
    }

    fn array_length(&self, array: JObject) -> i32 {
        let world = self.world.borrow();
        match world.objects.get(&array.raw()) {
            Some(ObjectData::PrimArr(data)) => data.len() as i32,
            Some(ObjectData::ObjArr { items }) => items.len() as i32,
            _ => panic!("array_length on a non-array handle"),
        }
    }

    fn new_prim_array(&self, kind: PrimKind, length: i32) -> Option<JObject> {
        let mut world = self.world.borrow_mut();
        let id = world.alloc(ObjectData::PrimArr(PrimArray::zeroed(kind, length.try_into().ok()?)));
        Some(JObject::from_raw(id))
    }

    fn set_prim_array_region(&self, array: JObject, values: &PrimArray) {
        let mut world = self.world.borrow_mut();
        match world.objects.get_mut(&array.raw()) {
            Some(ObjectData::PrimArr(data)) => {
                assert_eq!(data.kind(), values.kind(), "array region kind mismatch");
                assert_eq!(data.len(), values.len(), "array region length mismatch");
                *data = values.clone();
            }
            _ => panic!("set_prim_array_region on a non-array handle"),
        }
    }

    fn get_prim_array_elements(&self, kind: PrimKind, array: JObject) -> Option<(PrimArray, bool, LeaseId)> {
        let mut world = self.world.borrow_mut();
        let data = match world.objects.get(&array.raw()) {
            Some(ObjectData::PrimArr(data)) => {
                assert_eq!(data.kind(), kind, "element fetch kind mismatch");
                data.clone()
            }
            _ => return None,
        };
        let copied = world.array_copy;
        let lease = if copied {
            let lease = world.fresh_id();
            world.leases.insert(lease);
            LeaseId::from_raw(lease)
        } else {
            LeaseId::from_raw(0)
        };
        Some((data, copied, lease))
    }

    fn release_prim_array_elements(&self, _array: JObject, lease: LeaseId) {
        let mut world = self.world.borrow_mut();
        assert!(world.leases.remove(&lease.raw()), "released a lease that was never granted");
        world.releases += 1;
    }

    fn new_object_array(&self, length: i32, _element_class: JClass) -> Option<JObject> {
        let mut world = self.world.borrow_mut();
        let id = world.alloc(ObjectData::ObjArr {
            items: vec![None; length.try_into().ok()?],
        });
        Some(JObject::from_raw(id))
    }

    fn get_object_array_element(&self, array: JObject, index: i32) -> Option<JObject> {
        let world = self.world.borrow();
        match world.objects.get(&array.raw()) {
            Some(ObjectData::ObjArr { items }) => items[index as usize].map(JObject::from_raw),
            _ => panic!("object array access on a non-array handle"),
        }
    }

    fn set_object_array_element(&self, array: JObject, index: i32, element: Option<JObject>) {
        let mut world = self.world.borrow_mut();
        match world.objects.get_mut(&array.raw()) {
            Some(ObjectData::ObjArr { items }) => items[index as usize] = element.map(JObject::raw),
            _ => panic!("object array access on a non-array handle"),
        }
    }

    fn take_pending_exception(&self) -> Option<ForeignError> {
        self.world.borrow_mut().pending.take()
    }
}
