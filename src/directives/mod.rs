//! Import directive rewriting.
//!
//! Scripts reference shared modules with short sigils (`import "!json"`,
//! `import "~/scripts/util"`). The interpreter resolves imports relative to the
//! file it loads, so each sigil is replaced by the matching directory expressed
//! relative to the scratch file. Rewriting is purely textual: sigils inside
//! string literals are rewritten too, and directory existence is left to the
//! interpreter.

use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

use crate::source::{ResolvedSource, SourceRevision};

/// Hidden directory under the home directory holding user modules.
pub const DOTFILE_DIR: &str = ".wren";

/// Directories the sigils point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveRoots {
    /// `lib` directory inside the read-only resources.
    pub library: PathBuf,
    pub home: PathBuf,
    /// Writable per-user data directory.
    pub user_data: PathBuf,
}

impl DirectiveRoots {
    pub fn new(library: PathBuf, home: PathBuf, user_data: PathBuf) -> Self {
        Self {
            library,
            home,
            user_data,
        }
    }

    pub fn dotfile_dir(&self) -> PathBuf {
        self.home.join(DOTFILE_DIR)
    }
}

#[derive(Debug, Clone, Copy)]
enum Root {
    Library,
    Home,
    Dotfile,
    UserData,
}

struct Directive {
    pattern: &'static str,
    /// Text kept in front of the substituted path.
    keep: &'static str,
    root: Root,
}

const IMPORT: &str = "import \"";

const DIRECTIVES: &[Directive] = &[
    Directive { pattern: "import \"!", keep: IMPORT, root: Root::Library },
    Directive { pattern: "import \"~", keep: IMPORT, root: Root::Home },
    Directive { pattern: "${~}", keep: "", root: Root::Home },
    Directive { pattern: "import \"#", keep: IMPORT, root: Root::Dotfile },
    Directive { pattern: "${#}", keep: "", root: Root::Dotfile },
    Directive { pattern: "import \"$", keep: IMPORT, root: Root::UserData },
];

/// Rewrite every directive in `revision` for a scratch file at `scratch_path`.
pub fn resolve(revision: &SourceRevision, roots: &DirectiveRoots, scratch_path: &Path) -> ResolvedSource {
    ResolvedSource {
        text: rewrite(&revision.text, roots, scratch_path),
        revision: revision.id,
    }
}

/// Rewrite every directive occurrence in `text`.
pub fn rewrite(text: &str, roots: &DirectiveRoots, scratch_path: &Path) -> String {
    let scratch_dir = scratch_path.parent().unwrap_or_else(|| Path::new(""));
    let mut out = text.to_string();

    for directive in DIRECTIVES {
        if !out.contains(directive.pattern) {
            continue;
        }
        let target = match directive.root {
            Root::Library => roots.library.clone(),
            Root::Home => roots.home.clone(),
            Root::Dotfile => roots.dotfile_dir(),
            Root::UserData => roots.user_data.clone(),
        };
        let replacement = format!(
            "{}{}{}",
            directive.keep,
            relative_to(scratch_dir, &target).display(),
            MAIN_SEPARATOR
        );
        out = out.replace(directive.pattern, &replacement);
    }

    out
}

/// Path of `target` as seen from the directory `base`.
///
/// Returns `target` unchanged when the two share no root (different drives),
/// and `.` when they are the same directory.
pub fn relative_to(base: &Path, target: &Path) -> PathBuf {
    let base: Vec<Component> = base
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let target: Vec<Component> = target
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let rooted = |c: &Component| matches!(c, Component::Prefix(_) | Component::RootDir);
    if common == 0 && target.first().is_some_and(rooted) {
        return target.iter().collect();
    }

    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push("..");
    }
    for component in &target[common..] {
        rel.push(component.as_os_str());
    }

    if rel.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        rel
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn roots() -> DirectiveRoots {
        DirectiveRoots::new(
            PathBuf::from("/opt/wren-live/assets/lib"),
            PathBuf::from("/home/ada"),
            PathBuf::from("/home/ada/.local/share/wren_live"),
        )
    }

    fn scratch() -> PathBuf {
        PathBuf::from("/tmp/wren-live-abc.wren")
    }

    #[test]
    fn library_import_points_at_bundled_lib() {
        let out = rewrite("import \"!json\" for JSON", &roots(), &scratch());
        assert_eq!(out, "import \"../opt/wren-live/assets/lib/json\" for JSON");
    }

    #[test]
    fn home_and_dotfile_imports() {
        let src = "import \"~scripts/util\" for Util\nimport \"#mods/fmt\" for Fmt";
        let out = rewrite(src, &roots(), &scratch());
        assert_eq!(
            out,
            "import \"../home/ada/scripts/util\" for Util\nimport \"../home/ada/.wren/mods/fmt\" for Fmt"
        );
    }

    #[test]
    fn user_data_import() {
        let out = rewrite("import \"$snippets\"", &roots(), &scratch());
        assert_eq!(out, "import \"../home/ada/.local/share/wren_live/snippets\"");
    }

    #[test]
    fn every_occurrence_is_rewritten() {
        let src = "import \"!a\"\nimport \"!b\"\nimport \"!c\"";
        let out = rewrite(src, &roots(), &scratch());
        assert!(!out.contains("import \"!"));
        assert_eq!(out.matches("../opt/wren-live/assets/lib/").count(), 3);
    }

    #[test]
    fn interpolation_forms_have_no_import_prefix() {
        let out = rewrite("var a = \"${~}notes.txt\"\nvar b = \"${#}rc\"", &roots(), &scratch());
        assert_eq!(out, "var a = \"../home/ada/notes.txt\"\nvar b = \"../home/ada/.wren/rc\"");
    }

    #[test]
    fn sigils_inside_strings_are_still_rewritten() {
        let out = rewrite("System.print(\"${~}\")", &roots(), &scratch());
        assert_eq!(out, "System.print(\"../home/ada/\")");
    }

    #[test]
    fn text_without_directives_is_untouched() {
        let src = "import \"random\" for Random\nSystem.print(\"~ ! # $\")";
        assert_eq!(rewrite(src, &roots(), &scratch()), src);
    }

    #[test]
    fn resolve_keeps_revision_id() {
        let revision = SourceRevision::new(7, "import \"~x\"");
        let resolved = resolve(&revision, &roots(), &scratch());
        assert_eq!(resolved.revision, 7);
        assert_eq!(resolved.text, "import \"../home/ada/x\"");
    }

    #[test]
    fn relative_paths() {
        assert_eq!(relative_to(Path::new("/a/b"), Path::new("/a/b")), PathBuf::from("."));
        assert_eq!(relative_to(Path::new("/a/b"), Path::new("/a/c/d")), PathBuf::from("../c/d"));
        assert_eq!(relative_to(Path::new("/a/b/c"), Path::new("/a")), PathBuf::from("../.."));
        assert_eq!(relative_to(Path::new("/tmp"), Path::new("/tmp/x")), PathBuf::from("x"));
    }
}
