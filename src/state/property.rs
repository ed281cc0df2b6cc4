//! Materialized property state.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::model::{Name, PropertyId, PropertyType, Value};
use crate::nodetype::PropertyDefinition;
use crate::{Error, Result};
use super::{ItemState, ItemStateListener, Listeners, NodeState, Status};

/// Type, cardinality and payload of a property.
#[derive(Debug, Clone, PartialEq)]
struct Payload {
    property_type: PropertyType,
    multi_valued: bool,
    values: Vec<Value>,
}

/// A property, as materialized from a `PropertyDescriptor`.
pub struct PropertyState {
    name: Name,
    parent: Arc<NodeState>,
    definition: Arc<PropertyDefinition>,
    status: RwLock<Status>,
    payload: RwLock<Payload>,
    listeners: Listeners,
}

impl PropertyState {
    pub(crate) fn new(name: Name, parent: Arc<NodeState>, definition: Arc<PropertyDefinition>) -> Self {
        let multi_valued = definition.multiple;
        Self {
            name,
            parent,
            definition,
            status: RwLock::new(Status::Existing),
            payload: RwLock::new(Payload {
                property_type: PropertyType::Undefined,
                multi_valued,
                values: Vec::new(),
            }),
            listeners: Listeners::default(),
        }
    }

    /// Second construction phase: set type and values. Every value must be of
    /// `property_type`, and a single-valued property holds exactly one value.
    pub(crate) fn init(&self, property_type: PropertyType, multi_valued: bool, values: Vec<Value>) -> Result<()> {
        if let Some(bad) = values.iter().find(|v| v.property_type() != property_type) {
            return Err(Error::Malformed(format!(
                "property {} declares type {property_type} but holds a {} value",
                self.id(),
                bad.property_type()
            )));
        }
        if !multi_valued && values.len() != 1 {
            return Err(Error::Malformed(format!(
                "single-valued property {} holds {} values",
                self.id(),
                values.len()
            )));
        }
        *self.payload.write() = Payload { property_type, multi_valued, values };
        Ok(())
    }

    pub fn id(&self) -> PropertyId {
        PropertyId::new(self.parent.id().clone(), self.name.clone())
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn parent(&self) -> &Arc<NodeState> {
        &self.parent
    }

    pub fn definition(&self) -> &Arc<PropertyDefinition> {
        &self.definition
    }

    pub fn status(&self) -> Status {
        *self.status.read()
    }

    pub fn property_type(&self) -> PropertyType {
        self.payload.read().property_type
    }

    pub fn is_multi_valued(&self) -> bool {
        self.payload.read().multi_valued
    }

    pub fn values(&self) -> Vec<Value> {
        self.payload.read().values.clone()
    }

    /// The value of a single-valued property.
    pub fn value(&self) -> Option<Value> {
        let payload = self.payload.read();
        if payload.multi_valued {
            None
        } else {
            payload.values.first().cloned()
        }
    }

    pub fn add_listener(&self, listener: Weak<dyn ItemStateListener>) {
        self.listeners.add(listener);
    }

    /// Move to `to` and notify listeners.
    pub fn transition(self: &Arc<Self>, to: Status) -> Result<()> {
        let from = {
            let mut status = self.status.write();
            let from = *status;
            if !from.can_transition_to(to) {
                return Err(Error::InvalidTransition { from, to });
            }
            *status = to;
            from
        };
        self.listeners.notify(&ItemState::Property(self.clone()), from);
        Ok(())
    }
}

impl fmt::Debug for PropertyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = self.payload.read();
        f.debug_struct("PropertyState")
            .field("id", &self.id())
            .field("type", &payload.property_type)
            .field("multi_valued", &payload.multi_valued)
            .field("values", &payload.values.len())
            .field("status", &self.status())
            .finish()
    }
}
