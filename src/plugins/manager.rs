//! Plugin manager - active plugin registry and the name to constructor table

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::errors::PluginError;
use crate::infrastructure::config::PluginSettings;
use crate::plugins::trait_def::Plugin;

/// Constructor for a plugin from its configured settings
pub type PluginFactory = fn(name: &str, settings: &PluginSettings) -> Result<Arc<dyn Plugin>, PluginError>;

/// Name to constructor lookup used when enabling plugins at runtime
#[derive(Clone, Default)]
pub struct PluginFactories {
    factories: HashMap<String, PluginFactory>,
}

impl PluginFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every plugin shipped with the bot
    pub fn builtin() -> Self {
        let mut factories = Self::new();
        factories.register("about", crate::plugins::about::create);
        factories.register("echo", crate::plugins::echo::create);
        factories.register("auto-reply", crate::plugins::auto_reply::create);
        factories.register("url-helper", crate::plugins::url_helper::create);
        factories.register("tuling", crate::plugins::tuling::create);
        factories.register("logger", crate::plugins::logger::create);
        factories.register("notify", crate::plugins::notify::create);
        factories
    }

    pub fn register(&mut self, name: impl Into<String>, factory: PluginFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Construct a plugin and verify its environment. A plugin that fails
    /// the check is never handed out.
    pub fn create(&self, name: &str, settings: &PluginSettings) -> Result<Arc<dyn Plugin>, PluginError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PluginError::Unknown(name.to_string()))?;
        let plugin = factory(name, settings)?;
        if !plugin.check_environment() {
            warn!("Plugin '{}' environment check failed, leaving it disabled", name);
            return Err(PluginError::Environment(name.to_string()));
        }
        Ok(plugin)
    }
}

/// Ordered registry of active plugins; slot 0 holds the built-in router
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginManager {
    pub fn new(builtin: Arc<dyn Plugin>) -> Self {
        Self {
            plugins: vec![builtin],
        }
    }

    /// Append an active plugin. At most one instance per name.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        let name = plugin.name().to_string();

        if self.contains(&name) {
            return Err(PluginError::AlreadyRunning(name));
        }

        info!("Registering plugin: {}", name);
        self.plugins.push(plugin);
        Ok(())
    }

    /// Remove the first plugin named `name`. The built-in slot is never removed.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Plugin>> {
        let idx = self.plugins.iter().skip(1).position(|p| p.name() == name)? + 1;
        info!("Unregistered plugin: {}", name);
        Some(self.plugins.remove(idx))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.iter().find(|p| p.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name() == name)
    }

    /// Active plugins in registration order
    pub fn snapshot(&self) -> Vec<Arc<dyn Plugin>> {
        self.plugins.clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::bot::Bot;
    use crate::domain::entities::ChatEvent;
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl Plugin for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn summary(&self) -> &str {
            "test"
        }
        fn help(&self, _bot: &Bot) -> String {
            String::new()
        }
        async fn start(&self, _bot: &Bot) {}
        async fn on_chat(&self, _bot: &Bot, _event: &ChatEvent) {}
    }

    struct Broken;

    #[async_trait]
    impl Plugin for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn summary(&self) -> &str {
            "never ready"
        }
        fn help(&self, _bot: &Bot) -> String {
            String::new()
        }
        fn check_environment(&self) -> bool {
            false
        }
        async fn start(&self, _bot: &Bot) {}
        async fn on_chat(&self, _bot: &Bot, _event: &ChatEvent) {}
    }

    #[test]
    fn builtin_slot_cannot_be_removed() {
        let mut manager = PluginManager::new(Arc::new(Named("admin")));
        manager.register(Arc::new(Named("about"))).expect("register");
        assert!(manager.unregister("admin").is_none());
        assert!(manager.unregister("about").is_some());
        assert_eq!(manager.names(), vec!["admin".to_string()]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut manager = PluginManager::new(Arc::new(Named("admin")));
        manager.register(Arc::new(Named("about"))).expect("register");
        let err = manager.register(Arc::new(Named("about"))).unwrap_err();
        assert!(matches!(err, PluginError::AlreadyRunning(_)));
        assert_eq!(manager.names().len(), 2);
    }

    #[test]
    fn failed_environment_check_yields_no_plugin() {
        let mut factories = PluginFactories::new();
        factories.register("broken", |_, _| Ok(Arc::new(Broken) as Arc<dyn Plugin>));
        let err = factories.create("broken", &PluginSettings::enabled()).err();
        assert!(matches!(err, Some(PluginError::Environment(_))));
        assert!(matches!(
            factories.create("nope", &PluginSettings::enabled()).err(),
            Some(PluginError::Unknown(_))
        ));
    }
}
