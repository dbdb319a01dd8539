//! Descriptor populator
//!
//! Reads descriptor files in the interchange format, lets post-processors
//! rewrite or drop each descriptor, then binds everything through a single
//! dynamic configuration. Either every descriptor is committed or none is.

use crate::constants::DESCRIPTOR_FILE_EXTENSION;
use crate::format;
use locus_application::{ActiveDescriptor, ServiceLocator};
use locus_domain::value_objects::Descriptor;
use locus_domain::{Error, MultiError, MultiResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

// ============================================================================
// File discovery
// ============================================================================

/// Source of descriptor files
pub trait DescriptorFileFinder: Send + Sync {
    /// Files to read, in reading order
    fn find(&self) -> MultiResult<Vec<PathBuf>>;
}

/// A fixed list of files
#[derive(Debug, Clone, Default)]
pub struct PathsFinder {
    paths: Vec<PathBuf>,
}

impl PathsFinder {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl DescriptorFileFinder for PathsFinder {
    fn find(&self) -> MultiResult<Vec<PathBuf>> {
        Ok(self.paths.clone())
    }
}

/// Every `*.locus` file below a set of directories, sorted by path
#[derive(Debug, Clone, Default)]
pub struct DirectoryFinder {
    roots: Vec<PathBuf>,
}

impl DirectoryFinder {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }
}

impl DescriptorFileFinder for DirectoryFinder {
    fn find(&self) -> MultiResult<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut errors = MultiError::new();
        for root in &self.roots {
            if !root.is_dir() {
                errors.push(Error::not_found(format!(
                    "descriptor directory {}",
                    root.display()
                )));
                continue;
            }
            let mut files: Vec<PathBuf> = WalkDir::new(root)
                .follow_links(false)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .map(walkdir::DirEntry::into_path)
                .filter(|path| path.is_file() && is_descriptor_file(path))
                .collect();
            files.sort();
            found.extend(files);
        }
        errors.into_result(found)
    }
}

fn is_descriptor_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension == DESCRIPTOR_FILE_EXTENSION)
}

// ============================================================================
// Post-processing
// ============================================================================

/// Rewrites descriptors before they are bound
pub trait PopulatorPostProcessor: Send + Sync {
    /// The descriptor to bind, or `None` to drop it
    fn process(&self, descriptor: Descriptor) -> Option<Descriptor>;
}

impl<F> PopulatorPostProcessor for F
where
    F: Fn(Descriptor) -> Option<Descriptor> + Send + Sync,
{
    fn process(&self, descriptor: Descriptor) -> Option<Descriptor> {
        self(descriptor)
    }
}

// ============================================================================
// Populator
// ============================================================================

/// Binds descriptors read from files into a locator
pub struct Populator {
    locator: ServiceLocator,
    processors: Vec<Arc<dyn PopulatorPostProcessor>>,
}

impl Populator {
    pub fn new(locator: &ServiceLocator) -> Self {
        Self {
            locator: locator.clone(),
            processors: Vec::new(),
        }
    }

    /// Run `processor` on every descriptor, after those added before it
    #[must_use]
    pub fn with_post_processor(mut self, processor: Arc<dyn PopulatorPostProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Read every file `finder` reports and bind the result
    ///
    /// Nothing is bound when any file is missing or malformed; every such
    /// problem is reported.
    pub fn populate(&self, finder: &dyn DescriptorFileFinder) -> MultiResult<Vec<Arc<ActiveDescriptor>>> {
        let files = finder.find()?;
        let mut descriptors = Vec::new();
        let mut errors = MultiError::new();
        for file in &files {
            match format::read_file(file) {
                Ok(read) => {
                    debug!(file = %file.display(), descriptors = read.len(), "Descriptor file read");
                    descriptors.extend(read);
                }
                Err(e) => errors.absorb(e),
            }
        }
        errors.into_result(())?;
        self.bind_all(descriptors, files.len())
    }

    /// Bind descriptors that were parsed elsewhere
    pub fn populate_descriptors(
        &self,
        descriptors: Vec<Descriptor>,
    ) -> MultiResult<Vec<Arc<ActiveDescriptor>>> {
        self.bind_all(descriptors, 0)
    }

    fn bind_all(
        &self,
        descriptors: Vec<Descriptor>,
        files: usize,
    ) -> MultiResult<Vec<Arc<ActiveDescriptor>>> {
        let mut dynamic = self.locator.create_dynamic_configuration();
        let mut bound = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let processed = self
                .processors
                .iter()
                .try_fold(descriptor, |descriptor, processor| processor.process(descriptor));
            if let Some(descriptor) = processed {
                bound.push(dynamic.bind(descriptor));
            }
        }
        dynamic.commit()?;
        info!(
            locator = self.locator.name(),
            files,
            bound = bound.len(),
            "Descriptors populated"
        );
        Ok(bound)
    }
}

impl std::fmt::Debug for Populator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Populator")
            .field("locator", &self.locator.name())
            .field("processors", &self.processors.len())
            .finish()
    }
}
