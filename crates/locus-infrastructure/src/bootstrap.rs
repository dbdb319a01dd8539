//! Runtime Bootstrap - Composition Root
//!
//! Assembles a named service locator, its implementations, the descriptor
//! files listed in the configuration and a run-level controller.
//!
//! ```text
//! LocusConfig → ServiceLocatorFactory → ServiceLocator
//!                                          ↑      ↑
//!                          implementations    Populator (*.locus files)
//!                                          ↓
//!                                 RunLevelController
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let runtime = Bootstrap::new(config)
//!     .register(store_implementation)
//!     .build()?;
//!
//! runtime.controller().proceed_to(5)?;
//! let store = runtime.locator().get::<SqlStore>()?;
//!
//! runtime.shutdown()?;
//! ```

use crate::config::LocusConfig;
use crate::factory::ServiceLocatorFactory;
use crate::populator::{
    DescriptorFileFinder, DirectoryFinder, PathsFinder, Populator, PopulatorPostProcessor,
};
use crate::run_level::RunLevelController;
use locus_application::ServiceLocator;
use locus_domain::constants::INITIAL_RUN_LEVEL;
use locus_domain::ports::Implementation;
use locus_domain::{Error, MultiResult};
use std::sync::Arc;
use tracing::info;

/// Builder for a [`Runtime`]
pub struct Bootstrap {
    config: LocusConfig,
    factory: &'static ServiceLocatorFactory,
    implementations: Vec<Arc<dyn Implementation>>,
    processors: Vec<Arc<dyn PopulatorPostProcessor>>,
}

impl Bootstrap {
    pub fn new(config: LocusConfig) -> Self {
        Self {
            config,
            factory: ServiceLocatorFactory::global(),
            implementations: Vec::new(),
            processors: Vec::new(),
        }
    }

    /// Register the locator with another factory than the global one
    #[must_use]
    pub fn with_factory(mut self, factory: &'static ServiceLocatorFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Make an implementation available to lazily bound descriptors
    #[must_use]
    pub fn register(mut self, implementation: Arc<dyn Implementation>) -> Self {
        self.implementations.push(implementation);
        self
    }

    /// Post-process descriptors read from configured files
    #[must_use]
    pub fn with_post_processor(mut self, processor: Arc<dyn PopulatorPostProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Create the locator, populate it and attach a run-level controller
    ///
    /// On failure the locator is destroyed again.
    pub fn build(self) -> MultiResult<Runtime> {
        let locator_config = &self.config.locator;
        let parent = match &locator_config.parent {
            Some(parent) => Some(self.factory.find(parent).ok_or_else(|| {
                Error::not_found(format!("parent service locator '{parent}'"))
            })?),
            None => None,
        };
        let locator = self.factory.create(
            &locator_config.name,
            parent.as_ref(),
            locator_config.create_policy,
        )?;

        match self.assemble(&locator) {
            Ok(controller) => {
                info!(
                    locator = locator.name(),
                    implementations = self.implementations.len(),
                    "Runtime assembled"
                );
                Ok(Runtime {
                    config: Arc::new(self.config),
                    locator,
                    controller,
                    factory: self.factory,
                })
            }
            Err(errors) => {
                self.factory.destroy(locator.name());
                Err(errors)
            }
        }
    }

    fn assemble(&self, locator: &ServiceLocator) -> MultiResult<RunLevelController> {
        for implementation in &self.implementations {
            locator.register_implementation(Arc::clone(implementation));
        }
        let controller = RunLevelController::with_config(locator, &self.config.run_level)?;

        let sources = &self.config.populator;
        if !sources.files.is_empty() || !sources.directories.is_empty() {
            let populator = self
                .processors
                .iter()
                .fold(Populator::new(locator), |populator, processor| {
                    populator.with_post_processor(Arc::clone(processor))
                });
            let mut files = sources.files.clone();
            files.extend(DirectoryFinder::new(sources.directories.iter().cloned()).find()?);
            populator.populate(&PathsFinder::new(files))?;
        }
        Ok(controller)
    }
}

/// An assembled locator with its run-level controller
pub struct Runtime {
    config: Arc<LocusConfig>,
    locator: ServiceLocator,
    controller: RunLevelController,
    factory: &'static ServiceLocatorFactory,
}

impl Runtime {
    /// Configuration the runtime was built from
    pub fn config(&self) -> &LocusConfig {
        &self.config
    }

    pub fn locator(&self) -> &ServiceLocator {
        &self.locator
    }

    pub fn controller(&self) -> &RunLevelController {
        &self.controller
    }

    /// Bring every run level down, then destroy the locator
    pub fn shutdown(self) -> MultiResult<()> {
        let result = if self.controller.current_level() > INITIAL_RUN_LEVEL {
            self.controller.proceed_to(INITIAL_RUN_LEVEL).map(|_| ())
        } else {
            Ok(())
        };
        self.factory.destroy(self.locator.name());
        info!(locator = self.locator.name(), "Runtime shut down");
        result
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("locator", &self.locator.name())
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}
