//! Application registry
//!
//! Built once at startup and handed to the daemon. The set of applications
//! is fixed at compile time; the registry only maps configured type names
//! to constructors.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, instrument};

use crate::{DaemonApplication, RegistryError, RegistryResult};

/// Constructor producing a fresh application instance
pub type AppFactory = Box<dyn Fn() -> Box<dyn DaemonApplication> + Send + Sync>;

/// Maps application type names to constructors
#[derive(Default)]
pub struct AppRegistry {
    factories: BTreeMap<String, AppFactory>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under a type name
    ///
    /// Registering the same name twice is an error.
    #[instrument(skip_all, fields(app = %name.as_ref()))]
    pub fn register<F>(&mut self, name: impl AsRef<str>, factory: F) -> RegistryResult<()>
    where
        F: Fn() -> Box<dyn DaemonApplication> + Send + Sync + 'static,
    {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.factories.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }

        debug!("Registering application type");
        self.factories.insert(name.to_string(), Box::new(factory));
        Ok(())
    }

    /// Register a type whose fresh instance is its `Default`
    pub fn register_default<A>(&mut self, name: impl AsRef<str>) -> RegistryResult<()>
    where
        A: DaemonApplication + Default + 'static,
    {
        self.register(name, || {
            Box::new(A::default()) as Box<dyn DaemonApplication>
        })
    }

    /// Build a fresh instance of a registered type
    pub fn create(&self, name: &str) -> Option<Box<dyn DaemonApplication>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered type names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for AppRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppRegistry")
            .field("apps", &self.names())
            .finish()
    }
}
