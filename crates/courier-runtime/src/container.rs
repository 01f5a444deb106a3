//! Module container.
//!
//! The application's components are grouped into named [`Module`]s. The
//! container keeps them in registration order, which is the discovery order
//! the pipeline composer relies on, and holds the chat clients by name.

use std::collections::HashMap;

use tracing::{debug, warn};

use courier_core::BoxedClient;
use courier_framework::Component;

/// A named group of components.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    components: Vec<Component>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
        }
    }

    /// Adds a component.
    pub fn component(mut self, component: impl Into<Component>) -> Self {
        self.components.push(component.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Components in registration order.
    pub fn components(&self) -> &[Component] {
        &self.components
    }
}

/// Registered modules and clients.
#[derive(Default)]
pub struct ModulesContainer {
    modules: Vec<Module>,
    clients: HashMap<String, BoxedClient>,
}

impl ModulesContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module. A module name registered twice keeps the later
    /// module at the earlier position.
    pub fn add_module(&mut self, module: Module) {
        match self.modules.iter_mut().find(|m| m.name == module.name) {
            Some(existing) => {
                warn!(module = %module.name, "module registered twice, replacing");
                *existing = module;
            }
            None => {
                debug!(module = %module.name, components = module.components.len(), "module registered");
                self.modules.push(module);
            }
        }
    }

    /// Registers a client under its own name.
    pub fn provide_client(&mut self, client: BoxedClient) {
        let name = client.name().to_string();
        if self.clients.insert(name.clone(), client).is_some() {
            warn!(client = %name, "client registered twice, replacing");
        }
    }

    pub fn client(&self, name: &str) -> Option<BoxedClient> {
        self.clients.get(name).cloned()
    }

    /// The modules selected by `include`, in registration order.
    ///
    /// An empty `include` selects every module. Names matching no module are
    /// ignored.
    pub fn modules(&self, include: &[String]) -> Vec<&Module> {
        if include.is_empty() {
            return self.modules.iter().collect();
        }

        for name in include {
            if !self.modules.iter().any(|m| &m.name == name) {
                debug!(module = %name, "included module is not registered");
            }
        }
        self.modules
            .iter()
            .filter(|m| include.contains(&m.name))
            .collect()
    }

    /// The components of the selected modules, in discovery order.
    pub fn components<'a>(&'a self, include: &[String]) -> impl Iterator<Item = &'a Component> {
        self.modules(include)
            .into_iter()
            .flat_map(|m| m.components.iter())
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}

impl std::fmt::Debug for ModulesContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModulesContainer")
            .field("modules", &self.modules.iter().map(Module::name).collect::<Vec<_>>())
            .field("clients", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use courier_core::testing::RecordingClient;
    use courier_framework::handler;

    use super::*;

    fn component(name: &str) -> Component {
        Component::builder(name.to_string(), ())
            .update()
            .method(handler("noop", || async {}).uses())
            .build()
    }

    fn container() -> ModulesContainer {
        let mut container = ModulesContainer::new();
        container.add_module(Module::new("a").component(component("a1")).component(component("a2")));
        container.add_module(Module::new("b").component(component("b1")));
        container.add_module(Module::new("c").component(component("c1")));
        container
    }

    fn names<'a>(components: impl Iterator<Item = &'a Component>) -> Vec<&'a str> {
        components.map(Component::name).collect()
    }

    #[test]
    fn test_empty_include_selects_all_in_order() {
        let container = container();
        assert_eq!(names(container.components(&[])), vec!["a1", "a2", "b1", "c1"]);
    }

    #[test]
    fn test_include_keeps_container_order() {
        let container = container();
        let include = vec!["c".to_string(), "a".to_string(), "missing".to_string()];
        assert_eq!(names(container.components(&include)), vec!["a1", "a2", "c1"]);
    }

    #[test]
    fn test_duplicate_module_replaces_in_place() {
        let mut container = container();
        container.add_module(Module::new("a").component(component("a3")));

        assert_eq!(container.module_count(), 3);
        assert_eq!(names(container.components(&[])), vec!["a3", "b1", "c1"]);
    }

    #[test]
    fn test_clients_by_name() {
        let mut container = ModulesContainer::new();
        container.provide_client(RecordingClient::named("support"));

        assert!(container.client("support").is_some());
        assert!(container.client("telegram").is_none());
    }
}
