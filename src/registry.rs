//! Registration of top-level controllers with the hosting application.
//!
//! Each controller registers itself by a stable name at construction so the
//! host can discover it. The registry is an explicitly constructed, injected
//! instance owned by the application root, not a process-wide singleton.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

/// A named, discoverable controller.
pub trait Tool {
    /// Stable name the hosting application discovers this tool by.
    fn name(&self) -> &str;
}

/// The application-wide registry of tool instances.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RefCell<HashMap<String, Rc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tool` under its own name, replacing (with a warning) any
    /// previous registration under that name.
    pub fn register(&self, tool: Rc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.borrow_mut().insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "replaced an existing tool registration");
        } else {
            tracing::debug!(tool = %name, "tool registered");
        }
    }

    /// Looks up a tool by name.
    pub fn tool(&self, name: &str) -> Option<Rc<dyn Tool>> {
        self.tools.borrow().get(name).cloned()
    }

    /// Names of every registered tool.
    pub fn names(&self) -> Vec<String> {
        self.tools.borrow().keys().cloned().collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.borrow().len()
    }

    /// Returns true when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.tools.borrow().is_empty()
    }
}
