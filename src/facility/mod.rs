//! Host logging facility model
//!
//! A facility is an ordered table of named members. Each member is either a
//! callable method or a data property. The bridge enumerates this table once
//! when it is created.

use eyre::{Result, eyre};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

pub mod ambient;

/// A facility method. Arguments arrive exactly as the caller passed them.
pub type Method = Arc<dyn Fn(&[Value]) -> Result<()> + Send + Sync>;

/// A data member with read/write access to the facility's state
pub trait Property: Send + Sync {
    fn get(&self) -> Value;
    fn set(&self, value: Value) -> Result<()>;
}

/// A plain value slot
#[derive(Debug, Default)]
pub struct Slot {
    value: Mutex<Value>,
}

impl Slot {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: Mutex::new(value.into()),
        }
    }
}

impl Property for Slot {
    fn get(&self) -> Value {
        self.value.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, value: Value) -> Result<()> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = value;
        Ok(())
    }
}

/// A facility member
#[derive(Clone)]
pub enum Member {
    Method(Method),
    Property(Arc<dyn Property>),
}

impl Member {
    pub fn is_method(&self) -> bool {
        matches!(self, Member::Method(_))
    }

    pub fn kind(&self) -> MemberKind {
        match self {
            Member::Method(_) => MemberKind::Method,
            Member::Property(_) => MemberKind::Property,
        }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Method(_) => f.write_str("Method(..)"),
            Member::Property(p) => f.debug_tuple("Property").field(&p.get()).finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Method,
    Property,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Method => f.write_str("method"),
            MemberKind::Property => f.write_str("property"),
        }
    }
}

/// A host logging facility
#[derive(Debug, Default)]
pub struct Facility {
    members: IndexMap<String, Member>,
}

impl Facility {
    pub fn builder() -> FacilityBuilder {
        FacilityBuilder::default()
    }

    /// Members in declaration order
    pub fn members(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|(name, member)| (name.as_str(), member))
    }

    /// Invoke a method directly, without any bridge involvement
    pub fn call(&self, name: &str, args: &[Value]) -> Result<()> {
        match self.members.get(name) {
            Some(Member::Method(method)) => method(args),
            Some(Member::Property(_)) => Err(eyre!("`{}` is a property, not a method", name)),
            None => Err(eyre!("facility has no member `{}`", name)),
        }
    }

    /// Current value of a property
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.members.get(name) {
            Some(Member::Property(property)) => Some(property.get()),
            _ => None,
        }
    }

    /// Assign a property
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        match self.members.get(name) {
            Some(Member::Property(property)) => property.set(value),
            Some(Member::Method(_)) => Err(eyre!("`{}` is a method, not a property", name)),
            None => Err(eyre!("facility has no member `{}`", name)),
        }
    }
}

/// Builder for [`Facility`]. Re-declaring a name replaces the earlier member.
#[derive(Default)]
pub struct FacilityBuilder {
    members: IndexMap<String, Member>,
}

impl FacilityBuilder {
    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.members.insert(name.into(), Member::Method(Arc::new(method)));
        self
    }

    /// A property backed by a plain [`Slot`]
    pub fn property(self, name: impl Into<String>, initial: impl Into<Value>) -> Self {
        self.accessor(name, Arc::new(Slot::new(initial)))
    }

    /// A property backed by a custom accessor
    pub fn accessor(mut self, name: impl Into<String>, property: Arc<dyn Property>) -> Self {
        self.members.insert(name.into(), Member::Property(property));
        self
    }

    pub fn build(self) -> Arc<Facility> {
        Arc::new(Facility { members: self.members })
    }
}

/// Render call arguments as one line: strings verbatim, everything else as JSON
pub fn render_args(args: &[Value]) -> String {
    args.iter()
        .map(|arg| match arg {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
