use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
#[cfg(test)]
use std::sync::atomic::AtomicUsize;
#[cfg(test)]
use std::sync::atomic::Ordering;

use crate::payload::create_parent_dir;
use crate::payload::EntryType;
use crate::payload::PayloadIterator;
use crate::resources::Layout;
use crate::resources::LinkMap;
use crate::Bundle;
use crate::Error;

/// Finds and extracts the files needed to integrate the bundle into the desktop.
///
/// Type 1 payloads can not stream the contents of symbolic links. Instead the links are
/// collected in the first traversal (done by the constructor) and resolved to regular entries
/// that are then read in the second traversal. Every extraction is a separate traversal.
pub struct ResourcesExtractor {
    bundle: Bundle,
    layout: Layout,
    entries: Vec<String>,
    entry_types: HashMap<String, EntryType>,
    links: LinkMap,
    #[cfg(test)]
    traversals: AtomicUsize,
}

impl ResourcesExtractor {
    pub fn new(bundle: &Bundle) -> Result<Self, Error> {
        Self::with_layout(bundle, Layout::default())
    }

    pub fn with_layout(bundle: &Bundle, layout: Layout) -> Result<Self, Error> {
        let mut extractor = Self {
            bundle: bundle.clone(),
            layout,
            entries: Vec::new(),
            entry_types: HashMap::new(),
            links: LinkMap::default(),
            #[cfg(test)]
            traversals: AtomicUsize::new(0),
        };
        let mut iter = extractor.files()?;
        while !iter.is_end() {
            let path = iter.path()?.to_string();
            let entry_type = iter.entry_type()?;
            if entry_type == EntryType::Link {
                extractor.links.insert(&path, iter.link_target()?);
            }
            extractor.entry_types.insert(path.clone(), entry_type);
            extractor.entries.push(path);
            iter.advance()?;
        }
        log::trace!(
            "Found {} entries and {} links in {}",
            extractor.entries.len(),
            extractor.links.len(),
            bundle.path().display()
        );
        Ok(extractor)
    }

    /// All entry paths in traversal order.
    pub fn entries(&self) -> &[String] {
        &self.entries[..]
    }

    /// Reads the entry following symbolic links.
    pub fn extract(&self, path: &str) -> Result<Vec<u8>, Error> {
        let mut contents = self.extract_many([path])?;
        contents
            .remove(path)
            .ok_or_else(|| Error::EntryNotFound(path.to_string()))
    }

    /// Reads all entries in one traversal following symbolic links.
    ///
    /// Fails with [`Error::EntryNotFound`] naming the first path that could not be read.
    pub fn extract_many<I, S>(&self, paths: I) -> Result<BTreeMap<String, Vec<u8>>, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested: Vec<String> = paths.into_iter().map(|p| p.as_ref().to_string()).collect();
        let targets = self.resolve_all(requested.iter().map(String::as_str))?;
        let mut contents = BTreeMap::new();
        let mut remaining = targets.len();
        let mut iter = self.files()?;
        while !iter.is_end() && remaining != 0 {
            if let Some(sources) = targets.get(iter.path()?) {
                let data = iter.read_to_vec()?;
                for source in sources.iter() {
                    contents.insert(source.clone(), data.clone());
                }
                remaining -= 1;
            }
            iter.advance()?;
        }
        for path in requested.iter() {
            if !contents.contains_key(path) {
                return Err(Error::EntryNotFound(path.clone()));
            }
        }
        Ok(contents)
    }

    /// Writes every source entry to its destination in one traversal following symbolic links.
    ///
    /// An entry that is the target of several sources is extracted once and then copied.
    pub fn extract_to<I, S, P>(&self, targets: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = (S, P)>,
        S: AsRef<str>,
        P: AsRef<Path>,
    {
        let requested: Vec<(String, PathBuf)> = targets
            .into_iter()
            .map(|(s, p)| (s.as_ref().to_string(), p.as_ref().to_path_buf()))
            .collect();
        let resolved = self.resolve_all(requested.iter().map(|(s, _)| s.as_str()))?;
        let mut destinations: HashMap<&str, Vec<&Path>> = HashMap::new();
        for (source, destination) in requested.iter() {
            destinations
                .entry(source.as_str())
                .or_default()
                .push(destination.as_path());
        }
        let mut done = HashSet::new();
        let mut iter = self.files()?;
        while !iter.is_end() && done.len() != resolved.len() {
            let path = iter.path()?.to_string();
            if let Some(sources) = resolved.get(&path) {
                let mut all: Vec<&Path> = Vec::new();
                for destination in sources
                    .iter()
                    .flat_map(|source| destinations[source.as_str()].iter().copied())
                {
                    if !all.contains(&destination) {
                        all.push(destination);
                    }
                }
                if let Some((first, rest)) = all.split_first() {
                    let is_dir = iter.entry_type()? == EntryType::Directory;
                    iter.extract_to(first)?;
                    for destination in rest {
                        if is_dir {
                            fs_err::create_dir_all(destination)?;
                        } else {
                            create_parent_dir(destination)?;
                            fs_err::copy(first, destination)?;
                        }
                    }
                }
                done.insert(path);
            }
            iter.advance()?;
        }
        for (source, _) in requested.iter() {
            let found = resolved
                .iter()
                .any(|(target, sources)| done.contains(target) && sources.contains(source));
            if !found {
                return Err(Error::EntryNotFound(source.clone()));
            }
        }
        Ok(())
    }

    /// Reads the entry as UTF-8 text following symbolic links.
    pub fn extract_text(&self, path: &str) -> Result<String, Error> {
        let data = self.extract(path)?;
        String::from_utf8(data).map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e).into())
    }

    /// Returns the path of the main desktop entry: the first top-level `.desktop` file.
    ///
    /// If the entry is a link, returns the path of its target.
    pub fn desktop_entry_path(&self) -> Option<String> {
        let path = self
            .entries
            .iter()
            .find(|path| !path.contains('/') && path.ends_with(".desktop"))?;
        Some(self.links.target(path).unwrap_or(path).to_string())
    }

    /// Returns icon theme entries whose file stem is `name` in traversal order.
    pub fn icon_file_paths(&self, name: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|path| self.layout.is_icon(path, name))
            .cloned()
            .collect()
    }

    /// Returns MIME type package entries in traversal order.
    pub fn mime_type_packages_paths(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|path| self.layout.is_mime_package(path))
            .cloned()
            .collect()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Maps resolved targets to the requested paths, failing on the first unresolved one.
    fn resolve_all<'a, I>(&self, paths: I) -> Result<HashMap<String, Vec<String>>, Error>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut targets: HashMap<String, Vec<String>> = HashMap::new();
        for path in paths {
            match self.links.resolve(path, &self.entry_types) {
                Ok(target) => {
                    let sources = targets.entry(target).or_default();
                    if !sources.iter().any(|source| source == path) {
                        sources.push(path.to_string());
                    }
                }
                Err(e) => {
                    log::debug!("Failed to resolve {:?}: {}", path, e);
                    return Err(Error::EntryNotFound(path.to_string()));
                }
            }
        }
        Ok(targets)
    }

    fn files(&self) -> Result<PayloadIterator, Error> {
        #[cfg(test)]
        self.traversals.fetch_add(1, Ordering::Relaxed);
        self.bundle.files()
    }

    #[cfg(test)]
    pub(crate) fn num_traversals(&self) -> usize {
        self.traversals.load(Ordering::Relaxed)
    }
}
