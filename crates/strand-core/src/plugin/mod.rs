//! Plugin host capability
//!
//! The recall layer consumes external effect plugins through this
//! boundary: instantiate against a sample rate, connect control values,
//! run one buffer period. Loading real plugin binaries is a provider's
//! concern; the engine validates indices before every connect/run call
//! and treats any failure as grounds to retire the hosting recall, not
//! to stall the tick.

mod error;
pub mod native;

pub use error::{PluginError, PluginResult};

use std::sync::Arc;

/// One control input of a plugin
#[derive(Debug, Clone)]
pub struct PortDescriptor {
    pub name: String,
    pub default: f32,
    pub min: f32,
    pub max: f32,
}

impl PortDescriptor {
    pub fn new(name: impl Into<String>, default: f32, min: f32, max: f32) -> Self {
        Self {
            name: name.into(),
            default,
            min,
            max,
        }
    }
}

/// Static description of a plugin
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    pub name: String,
    pub maker: String,
    pub controls: Vec<PortDescriptor>,
}

/// A live plugin handle
///
/// The hosting recall keeps its audio buffers stable across `run`; the
/// instance may keep internal state between periods.
pub trait PluginInstance: Send {
    fn activate(&mut self) {}

    /// Set one control value; out-of-range indices error
    fn connect_control(&mut self, index: usize, value: f32) -> PluginResult<()>;

    /// Process one period from `input` into `output`
    fn run(&mut self, input: &[f32], output: &mut [f32]) -> PluginResult<()>;

    fn deactivate(&mut self) {}
}

/// A plugin provider
pub trait PluginHost: Send + Sync {
    fn descriptor(&self) -> &PluginDescriptor;

    fn instantiate(&self, samplerate: u32) -> PluginResult<Box<dyn PluginInstance>>;
}

/// Known plugin providers, injected into the engine at construction
pub struct PluginRegistry {
    hosts: Vec<Arc<dyn PluginHost>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self { hosts: Vec::new() }
    }

    /// Registry preloaded with the built-in providers
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(native::GainHost::new()));
        registry.register(Arc::new(native::LowpassHost::new()));
        registry
    }

    pub fn register(&mut self, host: Arc<dyn PluginHost>) {
        log::info!("plugin registered: {}", host.descriptor().name);
        self.hosts.push(host);
    }

    pub fn find(&self, name: &str) -> Option<&Arc<dyn PluginHost>> {
        self.hosts
            .iter()
            .find(|host| host.descriptor().name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.hosts
            .iter()
            .map(|host| host.descriptor().name.as_str())
            .collect()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = PluginRegistry::builtin();
        assert!(registry.find("gain").is_some());
        assert!(registry.find("lowpass").is_some());
        assert!(registry.find("missing").is_none());
    }
}
