use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Component;
use std::path::Path;

use normalize_path::NormalizePath;

use crate::payload::EntryType;
use crate::LinkError;

/// Symbolic links of the payload with targets relative to the payload root.
#[derive(Default, Debug)]
pub(crate) struct LinkMap {
    links: HashMap<String, Result<String, LinkError>>,
}

impl LinkMap {
    /// Records the link with the target as stored in the payload.
    pub fn insert(&mut self, link: &str, target: &str) {
        self.links
            .insert(link.to_string(), normalize_target(link, target));
    }

    /// Returns the target of the link one level down.
    pub fn target(&self, link: &str) -> Option<&str> {
        match self.links.get(link) {
            Some(Ok(target)) => Some(target.as_str()),
            _ => None,
        }
    }

    /// Follows the chain of links starting at `path` until a regular entry.
    ///
    /// Paths that are not links resolve to themselves whatever their type.
    pub fn resolve(
        &self,
        path: &str,
        entries: &HashMap<String, EntryType>,
    ) -> Result<String, LinkError> {
        let mut visited = HashSet::new();
        let mut current = path;
        while let Some(target) = self.links.get(current) {
            if !visited.insert(current) {
                return Err(LinkError::Cycle(path.to_string()));
            }
            current = target.as_ref().map(String::as_str).map_err(Clone::clone)?;
        }
        if current == path {
            return Ok(current.to_string());
        }
        match entries.get(current) {
            Some(EntryType::Regular) => Ok(current.to_string()),
            Some(..) => Err(LinkError::NotRegular(path.to_string(), current.to_string())),
            None => Err(LinkError::Dangling(path.to_string(), current.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }
}

/// Interprets the target relative to the directory of the link.
///
/// Absolute targets are relative to the payload root.
fn normalize_target(link: &str, target: &str) -> Result<String, LinkError> {
    let path = if target.starts_with('/') {
        Path::new(target.trim_start_matches('/')).to_path_buf()
    } else {
        Path::new(link)
            .parent()
            .unwrap_or(Path::new(""))
            .join(target)
    };
    let mut depth: usize = 0;
    for comp in path.components() {
        match comp {
            Component::Normal(..) => depth += 1,
            Component::ParentDir => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| LinkError::OutsideRoot(link.to_string()))?;
            }
            _ => {}
        }
    }
    if depth == 0 {
        return Err(LinkError::OutsideRoot(link.to_string()));
    }
    Ok(path.normalize().to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(paths: &[(&str, EntryType)]) -> HashMap<String, EntryType> {
        paths
            .iter()
            .map(|(path, kind)| (path.to_string(), *kind))
            .collect()
    }

    #[test]
    fn targets_are_relative_to_link_dir() {
        assert_eq!(Ok("a/c".into()), normalize_target("a/b", "c"));
        assert_eq!(Ok("a/c/d".into()), normalize_target("a/b", "./c/d"));
        assert_eq!(Ok("c".into()), normalize_target("a/b", "../c"));
        assert_eq!(Ok("x/y".into()), normalize_target("a/b", "/x/y"));
        assert_eq!(Ok("x/y".into()), normalize_target("a/b", "//x/./y"));
        assert_eq!(Ok("c".into()), normalize_target("b", "c"));
        assert_eq!(
            Err(LinkError::OutsideRoot("a/b".into())),
            normalize_target("a/b", "../../c")
        );
        assert_eq!(
            Err(LinkError::OutsideRoot("a".into())),
            normalize_target("a", "..")
        );
        assert_eq!(Err(LinkError::OutsideRoot("a".into())), normalize_target("a", "/"));
    }

    #[test]
    fn resolve_chain() {
        let mut links = LinkMap::default();
        links.insert("icon.png", "usr/share/icons/icon.png");
        links.insert("usr/share/icons/icon.png", "hicolor/256/icon.png");
        let entries = entries(&[
            ("icon.png", EntryType::Link),
            ("usr/share/icons/icon.png", EntryType::Link),
            ("usr/share/icons/hicolor/256/icon.png", EntryType::Regular),
        ]);
        assert_eq!(
            Ok("usr/share/icons/hicolor/256/icon.png".into()),
            links.resolve("icon.png", &entries)
        );
        assert_eq!(Some("usr/share/icons/icon.png"), links.target("icon.png"));
        assert_eq!(Ok("AppRun".into()), links.resolve("AppRun", &entries));
    }

    #[test]
    fn cycles_are_detected() {
        let mut links = LinkMap::default();
        links.insert("a", "b");
        links.insert("b", "a");
        links.insert("self", "self");
        let entries = entries(&[
            ("a", EntryType::Link),
            ("b", EntryType::Link),
            ("self", EntryType::Link),
        ]);
        assert_eq!(Err(LinkError::Cycle("a".into())), links.resolve("a", &entries));
        assert_eq!(
            Err(LinkError::Cycle("self".into())),
            links.resolve("self", &entries)
        );
    }

    #[test]
    fn dangling_and_outside() {
        let mut links = LinkMap::default();
        links.insert("a", "missing");
        links.insert("b", "../../etc/passwd");
        let entries = entries(&[("a", EntryType::Link), ("b", EntryType::Link)]);
        assert_eq!(
            Err(LinkError::Dangling("a".into(), "missing".into())),
            links.resolve("a", &entries)
        );
        assert_eq!(
            Err(LinkError::OutsideRoot("b".into())),
            links.resolve("b", &entries)
        );
        assert_eq!(2, links.len());
    }

    #[test]
    fn chains_end_on_regular_entries() {
        let mut links = LinkMap::default();
        links.insert("share", "usr/share");
        links.insert("p", "pipe");
        links.insert("q", "p");
        let entries = entries(&[
            ("share", EntryType::Link),
            ("usr/share", EntryType::Directory),
            ("p", EntryType::Link),
            ("q", EntryType::Link),
            ("pipe", EntryType::Unknown),
        ]);
        assert_eq!(
            Err(LinkError::NotRegular("share".into(), "usr/share".into())),
            links.resolve("share", &entries)
        );
        assert_eq!(
            Err(LinkError::NotRegular("q".into(), "pipe".into())),
            links.resolve("q", &entries)
        );
        assert_eq!(Ok("usr/share".into()), links.resolve("usr/share", &entries));
    }
}
