use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

/// Well-known directories inside the payload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Layout {
    /// Icon theme directory.
    pub icons_dir: String,
    /// Shared MIME-info database packages.
    pub mime_packages_dir: String,
}

impl Layout {
    /// Checks that the path is under the icons directory and its file stem is `name`.
    ///
    /// Only the last extension is removed: `foo.svg.gz` is an icon named `foo.svg`.
    pub fn is_icon(&self, path: &str, name: &str) -> bool {
        strip_dir(path, &self.icons_dir)
            .and_then(|rest| Path::new(rest).file_stem())
            .is_some_and(|stem| stem == name)
    }

    pub fn is_mime_package(&self, path: &str) -> bool {
        strip_dir(path, &self.mime_packages_dir)
            .is_some_and(|rest| rest.ends_with(".xml"))
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            icons_dir: "usr/share/icons".into(),
            mime_packages_dir: "usr/share/mime/packages".into(),
        }
    }
}

/// Returns the part of the path under the directory.
fn strip_dir<'a>(path: &'a str, dir: &str) -> Option<&'a str> {
    let dir = dir.trim_matches('/');
    path.strip_prefix(dir)?
        .strip_prefix('/')
        .filter(|rest| !rest.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icons() {
        let layout = Layout::default();
        assert!(layout.is_icon("usr/share/icons/hicolor/256x256/apps/foo.png", "foo"));
        assert!(layout.is_icon("usr/share/icons/hicolor/scalable/apps/foo.svg", "foo"));
        assert!(layout.is_icon("usr/share/icons/foo", "foo"));
        assert!(layout.is_icon("usr/share/icons/hicolor/64x64/apps/org.app.Foo.png", "org.app.Foo"));
        assert!(!layout.is_icon("usr/share/icons/hicolor/64x64/apps/org.app.Foo.png", "org.app"));
        assert!(!layout.is_icon("usr/share/icons/hicolor/256x256/apps/foo.bar.png", "foo"));
        assert!(!layout.is_icon("usr/share/icons/hicolor/scalable/apps/foo.svg.gz", "foo"));
        assert!(!layout.is_icon("usr/share/icons/hicolor/256x256/apps/bar.png", "foo"));
        assert!(!layout.is_icon("usr/share/icons/hicolor/256x256/apps/foobar.png", "foo"));
        assert!(!layout.is_icon("usr/share/pixmaps/foo.png", "foo"));
        assert!(!layout.is_icon("usr/share/icons", "icons"));
    }

    #[test]
    fn mime_packages() {
        let layout = Layout {
            mime_packages_dir: "/usr/share/mime/packages/".into(),
            ..Default::default()
        };
        assert!(layout.is_mime_package("usr/share/mime/packages/app.xml"));
        assert!(!layout.is_mime_package("usr/share/mime/packages/app.txt"));
        assert!(layout.is_mime_package("usr/share/mime/packages/nested/app.xml"));
        assert!(!layout.is_mime_package("usr/share/mime/app.xml"));
        assert!(!layout.is_mime_package("usr/share/mime/packages"));
    }

    #[test]
    fn deserialize() {
        let layout: Layout = toml::from_str("icons_dir = \"opt/icons\"").unwrap();
        assert_eq!("opt/icons", layout.icons_dir);
        assert_eq!(Layout::default().mime_packages_dir, layout.mime_packages_dir);
        assert!(toml::from_str::<Layout>("unknown = 1").is_err());
    }
}
