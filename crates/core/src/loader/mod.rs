//! Package loading.
//!
//! A `PackageLoader` turns a locator into Go packages with parsed syntax and
//! module metadata, and answers per-package module queries. `GoListLoader`
//! drives `go list`; `MemoryLoader` serves fixtures from memory.

mod go_list;
mod memory;

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use crate::error::{DeepcoverError, DeepcoverResult};
use crate::syntax::{self, FileSyntax};

pub use go_list::{GoListLoader, FAKE_GO_LIST_ENV};
pub use memory::MemoryLoader;

/// Where the user's package lives, normalized for the `go` commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    /// Pattern handed to `go list` / `go test`.
    pub pattern: String,
    /// Working directory for every `go` command of the run.
    pub workdir: Option<PathBuf>,
}

impl Locator {
    /// A directory on disk becomes `.` run from inside it; anything else is an
    /// import path resolved from the current directory.
    pub fn parse(path: &str) -> Self {
        let as_dir = Path::new(path);
        if as_dir.is_dir() {
            let dir = as_dir.canonicalize().unwrap_or_else(|_| as_dir.to_path_buf());
            Self { pattern: ".".to_string(), workdir: Some(dir) }
        } else {
            Self::import_path(path)
        }
    }

    pub fn import_path(path: &str) -> Self {
        Self { pattern: path.to_string(), workdir: None }
    }

    pub fn apply(&self, cmd: &mut Command) {
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.workdir {
            Some(dir) => write!(f, "{}", dir.display()),
            None => f.write_str(&self.pattern),
        }
    }
}

/// A loaded package. Only root packages and packages of a root package's module carry syntax.
#[derive(Debug, Clone)]
pub struct Package {
    pub import_path: String,
    pub name: String,
    pub dir: PathBuf,
    /// Module path; `None` for standard packages and packages outside any module.
    pub module: Option<String>,
    pub standard: bool,
    /// Present only because something else imports it.
    pub dep_only: bool,
    /// External test package (`<import path>_test`).
    pub xtest: bool,
    pub syntax: Vec<FileSyntax>,
    /// Load, dependency and parse diagnostics.
    pub errors: Vec<String>,
}

impl Package {
    pub fn is_root(&self) -> bool {
        !self.dep_only
    }

    pub fn module_path(&self) -> Option<&str> {
        self.module.as_deref()
    }
}

/// Query service over Go packages.
pub trait PackageLoader: Send + Sync {
    /// Load the packages matched by `locator` plus their dependency closure,
    /// including test files of the matched packages.
    fn load(&self, locator: &Locator) -> DeepcoverResult<Vec<Package>>;

    /// Module path of `package`; `None` for standard-library packages or when
    /// no module metadata exists.
    fn module_of(&self, locator: &Locator, package: &str) -> DeepcoverResult<Option<String>>;

    fn name(&self) -> &'static str;
}

/// One record of `go list -json` output.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ListedPackage {
    pub dir: PathBuf,
    pub import_path: String,
    pub name: String,
    pub standard: bool,
    pub dep_only: bool,
    pub go_files: Vec<String>,
    pub cgo_files: Vec<String>,
    pub test_go_files: Vec<String>,
    pub x_test_go_files: Vec<String>,
    pub test_imports: Vec<String>,
    pub x_test_imports: Vec<String>,
    pub module: Option<ListedModule>,
    pub error: Option<ListedError>,
    pub deps_errors: Vec<ListedError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ListedModule {
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ListedError {
    pub pos: String,
    pub err: String,
}

impl fmt::Display for ListedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pos.is_empty() {
            f.write_str(&self.err)
        } else {
            write!(f, "{}: {}", self.pos, self.err)
        }
    }
}

impl ListedPackage {
    fn module_path(&self) -> Option<&str> {
        if self.standard {
            return None;
        }
        self.module.as_ref().map(|m| m.path.as_str())
    }
}

/// Turn listed records into packages, parsing the files of the root packages
/// and of every package that shares a module with one of them.
pub(crate) fn assemble<R>(listed: Vec<ListedPackage>, read: R) -> DeepcoverResult<Vec<Package>>
where
    R: Fn(&Path) -> io::Result<String>,
{
    let root_modules: HashSet<String> = listed
        .iter()
        .filter(|p| !p.dep_only)
        .filter_map(|p| p.module_path().map(str::to_string))
        .collect();

    let mut packages = Vec::with_capacity(listed.len());
    for record in listed {
        let parse = !record.dep_only
            || record.module_path().is_some_and(|m| root_modules.contains(m));
        let module = record.module_path().map(str::to_string);

        let mut errors: Vec<String> = record.error.iter().map(ToString::to_string).collect();
        errors.extend(record.deps_errors.iter().map(ToString::to_string));

        let mut files: Vec<&String> = record.go_files.iter().chain(&record.cgo_files).collect();
        if !record.dep_only {
            files.extend(&record.test_go_files);
        }
        let syntax = if parse {
            parse_files(&record.dir, &files, &read, &mut errors)?
        } else {
            Vec::new()
        };

        if parse && !record.dep_only && !record.x_test_go_files.is_empty() {
            let mut xtest_errors = Vec::new();
            let xfiles: Vec<&String> = record.x_test_go_files.iter().collect();
            let xsyntax = parse_files(&record.dir, &xfiles, &read, &mut xtest_errors)?;
            packages.push(Package {
                import_path: format!("{}_test", record.import_path),
                name: format!("{}_test", record.name),
                dir: record.dir.clone(),
                module: module.clone(),
                standard: false,
                dep_only: false,
                xtest: true,
                syntax: xsyntax,
                errors: xtest_errors,
            });
        }

        packages.push(Package {
            import_path: record.import_path,
            name: record.name,
            dir: record.dir,
            module,
            standard: record.standard,
            dep_only: record.dep_only,
            xtest: false,
            syntax,
            errors,
        });
    }
    Ok(packages)
}

fn parse_files<R>(
    dir: &Path,
    files: &[&String],
    read: &R,
    errors: &mut Vec<String>,
) -> DeepcoverResult<Vec<FileSyntax>>
where
    R: Fn(&Path) -> io::Result<String>,
{
    let mut parsed = Vec::with_capacity(files.len());
    for file in files {
        let path = dir.join(file);
        let source = read(&path).map_err(|e| DeepcoverError::io_path("read", &path, e))?;
        match syntax::parse_file(&path, &source) {
            Ok(syntax) => parsed.push(syntax),
            Err(e) => errors.push(e.to_string()),
        }
    }
    syntax::number_init_functions(&mut parsed);
    Ok(parsed)
}
