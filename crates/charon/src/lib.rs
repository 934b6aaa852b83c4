#![doc = include_str!("../../../README.md")]

mod descriptor;
mod dispatch;
mod env;
mod error;
mod marshal;
mod proxy;
mod resolve;
mod value;

pub use crate::{
    descriptor::{Descriptor, FieldDescriptor, MethodDescriptor, PrimKind, STRING_CLASS, TypeToken},
    env::{CallTarget, ForeignError, JClass, JFieldId, JMethodId, JObject, JValue, JvmEnv, LeaseId, PrimArray},
    error::{BridgeError, MemberRef, Result},
    proxy::{MemberKind, MemberSpec, Proxy, ProxySpec},
    value::{JavaObject, ProxyHandle, Value},
};
