use std::io::Read;
use std::path::Path;

use crate::payload::AnyBackend;
use crate::payload::EntryType;
use crate::payload::PayloadBackend;
use crate::payload::PayloadEntry;
use crate::Bundle;
use crate::Error;

/// Read-only, forward-only, single-pass iterator over the payload entries.
///
/// The contents of every entry can be read or extracted at most once. Traversing the payload
/// again requires a new iterator. Iterators are not `Clone`: each one owns its file handle.
pub struct PayloadIterator {
    state: State,
}

enum State {
    Positioned {
        backend: AnyBackend,
        consumed: bool,
    },
    Exhausted,
    Failed,
}

impl PayloadIterator {
    /// Opens the payload and moves to the first entry.
    pub fn new(bundle: &Bundle) -> Result<Self, Error> {
        let mut backend = AnyBackend::open(bundle)?;
        let state = if backend.next_entry()? {
            State::Positioned {
                backend,
                consumed: false,
            }
        } else {
            State::Exhausted
        };
        Ok(Self { state })
    }

    /// Returns the end sentinel.
    pub fn end() -> Self {
        Self {
            state: State::Exhausted,
        }
    }

    /// Returns this very iterator: there is no independent second pass over the same instance.
    pub fn begin(&mut self) -> &mut Self {
        self
    }

    pub fn is_end(&self) -> bool {
        !matches!(self.state, State::Positioned { .. })
    }

    pub fn entry_type(&self) -> Result<EntryType, Error> {
        Ok(self.backend()?.entry_type())
    }

    pub fn path(&self) -> Result<&str, Error> {
        Ok(self.backend()?.path())
    }

    /// Returns the link target or an empty string if the entry is not a link.
    pub fn link_target(&self) -> Result<&str, Error> {
        Ok(self.backend()?.link_target())
    }

    /// Returns the view of the current entry.
    pub fn entry(&mut self) -> Result<PayloadEntry<'_>, Error> {
        self.backend()?;
        Ok(PayloadEntry::new(self))
    }

    /// Streams the contents of the current entry.
    ///
    /// Type 2 links are followed. Directories have no contents.
    pub fn read(&mut self) -> Result<Box<dyn Read + '_>, Error> {
        self.consume()?.reader()
    }

    /// Reads the whole contents of the current entry.
    pub fn read_to_vec(&mut self) -> Result<Vec<u8>, Error> {
        self.consume()?.read_to_vec()
    }

    /// Writes the current entry to `target` creating parent directories.
    pub fn extract_to<P: AsRef<Path>>(&mut self, target: P) -> Result<(), Error> {
        self.consume()?.extract_to(target.as_ref())
    }

    /// Moves to the next entry.
    ///
    /// Advancing the end sentinel is a no-op. Traversal errors are returned once, after that the
    /// iterator stays at the end.
    pub fn advance(&mut self) -> Result<(), Error> {
        let State::Positioned { backend, consumed } = &mut self.state else {
            return Ok(());
        };
        *consumed = false;
        match backend.next_entry() {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.state = State::Exhausted;
                Ok(())
            }
            Err(e) => {
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    fn backend(&self) -> Result<&AnyBackend, Error> {
        match &self.state {
            State::Positioned { backend, .. } => Ok(backend),
            State::Exhausted | State::Failed => Err(Error::IteratorState),
        }
    }

    /// Marks the contents of the current entry as consumed.
    fn consume(&mut self) -> Result<&mut AnyBackend, Error> {
        let State::Positioned { backend, consumed } = &mut self.state else {
            return Err(Error::IteratorState);
        };
        if backend.entry_type() == EntryType::Unknown {
            return Err(Error::UnsupportedEntry(backend.path().to_string()));
        }
        if *consumed {
            return Err(Error::AlreadyConsumed(backend.path().to_string()));
        }
        *consumed = true;
        Ok(backend)
    }
}

impl PartialEq for PayloadIterator {
    /// Iterators are equal if both are at the end or they are the same object.
    fn eq(&self, other: &Self) -> bool {
        (self.is_end() && other.is_end()) || std::ptr::eq(self, other)
    }
}

impl std::fmt::Debug for PayloadIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            State::Positioned { backend, consumed } => f
                .debug_struct("PayloadIterator")
                .field("path", &backend.path())
                .field("consumed", consumed)
                .finish(),
            State::Exhausted => f.write_str("PayloadIterator(end)"),
            State::Failed => f.write_str("PayloadIterator(failed)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::collections::BTreeSet;

    use arbtest::arbtest;
    use walkdir::WalkDir;

    use super::*;
    use crate::test::BundleFile;
    use crate::test::IsoBuilder;
    use crate::test::SquashfsBuilder;

    fn type1() -> BundleFile {
        BundleFile::new(
            &IsoBuilder::new()
                .file("AppRun", b"#!/bin/sh\n")
                .file("app.desktop", b"[Desktop Entry]\n")
                .symlink("icon.png", "usr/share/icons/hicolor/256/icon.png")
                .file("usr/share/icons/hicolor/256/icon.png", b"png")
                .fifo("pipe")
                .build(),
        )
    }

    fn type2() -> BundleFile {
        BundleFile::new(
            &SquashfsBuilder::new()
                .compressed()
                .file("AppRun", b"#!/bin/sh\n")
                .file("app.desktop", b"[Desktop Entry]\n")
                .symlink("icon.png", "usr/share/icons/hicolor/256/icon.png")
                .file("usr/share/icons/hicolor/256/icon.png", b"png")
                .fifo("pipe")
                .build(),
        )
    }

    fn entries(bundle: &Bundle) -> Vec<(EntryType, String, String)> {
        let mut iter = bundle.files().unwrap();
        let end = PayloadIterator::end();
        let mut entries = Vec::new();
        while *iter.begin() != end {
            let entry = iter.entry().unwrap();
            entries.push((
                entry.entry_type(),
                entry.path().to_string(),
                entry.link_target().to_string(),
            ));
            iter.advance().unwrap();
        }
        entries
    }

    #[test]
    fn type1_skips_directories_and_special_files() {
        let file = type1();
        let bundle = Bundle::open(file.path()).unwrap();
        let expected: Vec<(EntryType, String, String)> = [
            (EntryType::Regular, "AppRun", ""),
            (EntryType::Regular, "app.desktop", ""),
            (EntryType::Link, "icon.png", "usr/share/icons/hicolor/256/icon.png"),
            (EntryType::Regular, "usr/share/icons/hicolor/256/icon.png", ""),
        ]
        .into_iter()
        .map(|(t, p, l)| (t, p.to_string(), l.to_string()))
        .collect();
        similar_asserts::assert_eq!(expected, entries(&bundle));
    }

    #[test]
    fn type1_links_have_no_contents() {
        let file = type1();
        let bundle = Bundle::open(file.path()).unwrap();
        let mut iter = bundle.files().unwrap();
        while iter.path().unwrap() != "icon.png" {
            iter.advance().unwrap();
        }
        assert_eq!(Vec::<u8>::new(), iter.read_to_vec().unwrap());
    }

    #[test]
    fn type2_yields_all_entries() {
        let file = type2();
        let bundle = Bundle::open(file.path()).unwrap();
        let entries = entries(&bundle);
        let expected: Vec<(EntryType, String, String)> = [
            (EntryType::Regular, "AppRun", ""),
            (EntryType::Regular, "app.desktop", ""),
            (EntryType::Link, "icon.png", "usr/share/icons/hicolor/256/icon.png"),
            (EntryType::Unknown, "pipe", ""),
            (EntryType::Directory, "usr", ""),
            (EntryType::Directory, "usr/share", ""),
            (EntryType::Directory, "usr/share/icons", ""),
            (EntryType::Directory, "usr/share/icons/hicolor", ""),
            (EntryType::Directory, "usr/share/icons/hicolor/256", ""),
            (EntryType::Regular, "usr/share/icons/hicolor/256/icon.png", ""),
        ]
        .into_iter()
        .map(|(t, p, l)| (t, p.to_string(), l.to_string()))
        .collect();
        similar_asserts::assert_eq!(expected, entries);
    }

    #[test]
    fn contents_are_consumed_once() {
        for file in [type1(), type2()] {
            let bundle = Bundle::open(file.path()).unwrap();
            let workdir = file.workdir();
            let mut iter = bundle.files().unwrap();
            while !iter.is_end() {
                let path = iter.path().unwrap().to_string();
                if iter.entry_type().unwrap() == EntryType::Unknown {
                    assert!(matches!(iter.read(), Err(Error::UnsupportedEntry(..))));
                    assert!(matches!(
                        iter.extract_to(workdir.join("unknown")),
                        Err(Error::UnsupportedEntry(..))
                    ));
                } else {
                    iter.read_to_vec().unwrap();
                    assert!(matches!(iter.read(), Err(Error::AlreadyConsumed(p)) if p == path));
                    assert!(matches!(
                        iter.extract_to(workdir.join(&path)),
                        Err(Error::AlreadyConsumed(..))
                    ));
                    assert!(matches!(iter.read_to_vec(), Err(Error::AlreadyConsumed(..))));
                }
                iter.advance().unwrap();
            }
        }
    }

    #[test]
    fn extract_then_read_fails() {
        let file = type2();
        let bundle = Bundle::open(file.path()).unwrap();
        let target = file.workdir().join("nested/dir/AppRun");
        let mut iter = bundle.files().unwrap();
        assert_eq!("AppRun", iter.path().unwrap());
        iter.extract_to(&target).unwrap();
        assert_eq!(b"#!/bin/sh\n".to_vec(), fs_err::read(&target).unwrap());
        assert!(matches!(iter.read(), Err(Error::AlreadyConsumed(..))));
    }

    #[test]
    fn end_state_is_terminal() {
        for file in [type1(), type2()] {
            let bundle = Bundle::open(file.path()).unwrap();
            let mut iter = bundle.files().unwrap();
            while !iter.is_end() {
                iter.advance().unwrap();
            }
            for _ in 0..3 {
                assert!(matches!(iter.entry_type(), Err(Error::IteratorState)));
                assert!(matches!(iter.path(), Err(Error::IteratorState)));
                assert!(matches!(iter.link_target(), Err(Error::IteratorState)));
                assert!(matches!(iter.read(), Err(Error::IteratorState)));
                assert!(matches!(iter.entry(), Err(Error::IteratorState)));
                iter.advance().unwrap();
            }
            assert_eq!(iter, PayloadIterator::end());
        }
    }

    #[test]
    fn equality() {
        let file = type2();
        let bundle = Bundle::open(file.path()).unwrap();
        let a = bundle.files().unwrap();
        let b = bundle.files().unwrap();
        assert!(PartialEq::eq(&a, &a));
        assert_ne!(a, b);
        assert_ne!(a, PayloadIterator::end());
        assert_eq!(PayloadIterator::end(), PayloadIterator::end());
    }

    #[test]
    fn independent_iterators() {
        let file = type2();
        let bundle = Bundle::open(file.path()).unwrap();
        let mut a = bundle.files().unwrap();
        let mut b = bundle.files().unwrap();
        a.advance().unwrap();
        assert_eq!("app.desktop", a.path().unwrap());
        assert_eq!("AppRun", b.path().unwrap());
        assert_eq!(b"#!/bin/sh\n".to_vec(), b.read_to_vec().unwrap());
        assert_eq!(b"[Desktop Entry]\n".to_vec(), a.read_to_vec().unwrap());
    }

    #[test]
    fn type2_reads_through_links() {
        let file = type2();
        let bundle = Bundle::open(file.path()).unwrap();
        let mut iter = bundle.files().unwrap();
        while iter.path().unwrap() != "icon.png" {
            iter.advance().unwrap();
        }
        let mut buf = Vec::new();
        iter.read().unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(b"png".to_vec(), buf);
    }

    #[test]
    fn type2_extracts_links_and_directories() {
        let file = type2();
        let bundle = Bundle::open(file.path()).unwrap();
        let workdir = file.workdir();
        let mut iter = bundle.files().unwrap();
        while !iter.is_end() {
            let path = iter.path().unwrap().to_string();
            if iter.entry_type().unwrap() != EntryType::Unknown {
                iter.extract_to(workdir.join(&path)).unwrap();
            }
            iter.advance().unwrap();
        }
        let extracted: BTreeSet<String> = WalkDir::new(&workdir)
            .min_depth(1)
            .into_iter()
            .map(|entry| {
                let entry = entry.unwrap();
                let path = entry.path().strip_prefix(&workdir).unwrap();
                path.to_str().unwrap().to_string()
            })
            .collect();
        let expected: BTreeSet<String> = bundle
            .list_files()
            .unwrap()
            .into_iter()
            .filter(|path| path != "pipe")
            .collect();
        similar_asserts::assert_eq!(expected, extracted);
        assert!(workdir.join("usr/share/icons/hicolor/256").is_dir());
        assert_eq!(
            Path::new("usr/share/icons/hicolor/256/icon.png"),
            fs_err::read_link(workdir.join("icon.png")).unwrap()
        );
        assert_eq!(b"png".to_vec(), fs_err::read(workdir.join("icon.png")).unwrap());
        // Existing destinations are replaced.
        let mut iter = bundle.files().unwrap();
        while iter.path().unwrap() != "icon.png" {
            iter.advance().unwrap();
        }
        iter.extract_to(workdir.join("icon.png")).unwrap();
    }

    #[test]
    fn empty_payload() {
        let file = BundleFile::new(&SquashfsBuilder::new().build());
        let bundle = Bundle::open(file.path()).unwrap();
        let iter = bundle.files().unwrap();
        assert!(iter.is_end());
        assert_eq!(iter, PayloadIterator::end());
    }

    #[test]
    fn corrupt_payload() {
        let mut data = SquashfsBuilder::new().file("AppRun", b"run").build();
        data.truncate(1024 + 10);
        let file = BundleFile::new(&data);
        let bundle = Bundle::open(file.path()).unwrap();
        assert!(matches!(bundle.files(), Err(Error::Io(..))));
    }

    #[test]
    fn all_files_are_read_back() {
        arbtest(|u| {
            let mut files = BTreeMap::new();
            let num_files = u.int_in_range(0..=10)?;
            for i in 0..num_files {
                let depth = u.int_in_range(0..=2)?;
                let mut path = String::new();
                for _ in 0..depth {
                    path.push_str(&format!("d{}/", u.int_in_range(0..=2)?));
                }
                path.push_str(&format!("f{}", i));
                let len = u.int_in_range(0..=10_000)?;
                let mut contents = vec![0_u8; len];
                u.fill_buffer(&mut contents[..])?;
                files.insert(path, contents);
            }
            let mut iso = IsoBuilder::new();
            let mut squashfs = SquashfsBuilder::new();
            if u.arbitrary()? {
                squashfs = squashfs.compressed();
            }
            if u.arbitrary()? {
                squashfs = squashfs.with_fragments();
            }
            for (path, contents) in files.iter() {
                iso = iso.file(path, contents);
                squashfs = squashfs.file(path, contents);
            }
            for data in [iso.build(), squashfs.build()] {
                let file = BundleFile::new(&data);
                let bundle = Bundle::open(file.path()).unwrap();
                let mut iter = bundle.files().unwrap();
                let mut actual = BTreeMap::new();
                while !iter.is_end() {
                    if iter.entry_type().unwrap() == EntryType::Regular {
                        let path = iter.path().unwrap().to_string();
                        actual.insert(path, iter.read_to_vec().unwrap());
                    }
                    iter.advance().unwrap();
                }
                similar_asserts::assert_eq!(files, actual);
            }
            Ok(())
        });
    }
}
