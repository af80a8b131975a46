//! Ports - controllable recall parameters
//!
//! Ports are the one cross-thread-mutable resource touched during
//! staging: a control thread may write a volume while the audio thread
//! reads it mid-tick. Each port guards its value with its own lock;
//! reads and writes copy the value, so no lock is ever held across a
//! staging callback.

use std::sync::{Arc, Mutex};

/// A port's current value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PortValue {
    Float(f64),
    Bool(bool),
    UInt(u64),
}

impl PortValue {
    pub fn as_float(&self) -> f64 {
        match self {
            PortValue::Float(v) => *v,
            PortValue::Bool(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            PortValue::UInt(v) => *v as f64,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            PortValue::Float(v) => *v != 0.0,
            PortValue::Bool(v) => *v,
            PortValue::UInt(v) => *v != 0,
        }
    }

    pub fn as_uint(&self) -> u64 {
        match self {
            PortValue::Float(v) => *v as u64,
            PortValue::Bool(v) => *v as u64,
            PortValue::UInt(v) => *v,
        }
    }
}

/// A named control value shared between the control and audio threads
pub struct Port {
    name: String,
    value: Mutex<PortValue>,
}

impl Port {
    pub fn new(name: impl Into<String>, value: PortValue) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            value: Mutex::new(value),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy the current value out
    pub fn safe_read(&self) -> PortValue {
        *self.value.lock().expect("port lock poisoned")
    }

    /// Replace the value
    pub fn safe_write(&self, value: PortValue) {
        *self.value.lock().expect("port lock poisoned") = value;
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.name)
            .field("value", &self.safe_read())
            .finish()
    }
}

/// Find a port by name in a port list
pub fn find_port<'a>(ports: &'a [Arc<Port>], name: &str) -> Option<&'a Arc<Port>> {
    ports.iter().find(|port| port.name() == name)
}
