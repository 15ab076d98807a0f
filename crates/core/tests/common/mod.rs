#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use deepcover_core::coverage::{TestInvocation, Toolchain};
use deepcover_core::{DeepcoverError, DeepcoverResult, Locator, MemoryLoader};

pub const MODULE: &str = "example.com/deepcover";
pub const ROOT: &str = "example.com/deepcover/testexample";
pub const SUBPKG: &str = "example.com/deepcover/testexample/subpkg";
pub const SIBLING: &str = "example.com/deepcover/testexample2";
pub const OTHER_MODULE: &str = "example.com/other";
pub const OTHER_LIB: &str = "example.com/other/lib";

pub const EXAMPLE_GO: &str = r#"package testexample

import (
	"example.com/deepcover/testexample/subpkg"
	"example.com/other/lib"
)

func Top() {
	Bottom()
}

func Bottom() {
	subpkg.SubPkg(subpkg.Enum1)

	inter := newInterface()
	inter.Method()
}

func Alternative() {
	subpkg.SubPkg(subpkg.Enum2)
	lib.Helper()
}

func init() {}
"#;

pub const INTERFACE_GO: &str = r#"package testexample

import "strconv"

type Interface interface {
	Method()
}

func newInterface() Interface {
	return &Struct{}
}

type Struct struct{}

func (s *Struct) Method() {
	_, err := strconv.Atoi("1")
	if err != nil {
		panic(err)
	}
}

type Other struct{}

func (o Other) Method() {}
"#;

pub const EXAMPLE_TEST_GO: &str = r#"package testexample

import "testing"

func TestTop(t *testing.T) {
	Top()
}

func TestBottom(t *testing.T) {
	Bottom()
}

func TestAlternative(t *testing.T) {
	Alternative()
}
"#;

pub const SUBTEST_GO: &str = r#"package subpkg

import (
	"time"
)

const (
	Enum1 = iota
	Enum2
)

func SubPkg(e int) {
	if e == Enum1 {
		time.Sleep(1 * time.Nanosecond)
	}

	if e == Enum2 {
		time.Sleep(1 * time.Nanosecond)
	}
}
"#;

pub const SIBLING_GO: &str = r#"package testexample2

func Top() {}
"#;

pub const LIB_GO: &str = r#"package lib

func Helper() {}
"#;

/// `go tool cover -func` output for a run of the example tests.
pub const SUMMARY: &str = "\
example.com/deepcover/testexample/example.go:8:\t\tTop\t\t\t100.0%
example.com/deepcover/testexample/example.go:12:\t\tBottom\t\t\t100.0%
example.com/deepcover/testexample/example.go:19:\t\tAlternative\t\t100.0%
example.com/deepcover/testexample/example.go:24:\t\tinit\t\t\t100.0%
example.com/deepcover/testexample/interface.go:9:\tnewInterface\t\t100.0%
example.com/deepcover/testexample/interface.go:15:\tMethod\t\t\t75.0%
example.com/deepcover/testexample/interface.go:24:\tMethod\t\t\t100.0%
example.com/deepcover/testexample/subpkg/subtest.go:12:\tSubPkg\t\t\t83.3%
example.com/deepcover/testexample2/sibling.go:3:\tTop\t\t\t0.0%
total:\t\t\t\t\t\t(statements)\t\t\t90.0%
";

/// The example module, a sibling package sharing the root's path prefix, a
/// second module and the standard packages it touches.
pub fn example_loader() -> MemoryLoader {
    MemoryLoader::new()
        .package(Some(MODULE), ROOT, &[("example.go", EXAMPLE_GO), ("interface.go", INTERFACE_GO)])
        .test_files(ROOT, &[("example_test.go", EXAMPLE_TEST_GO)])
        .package(Some(MODULE), SUBPKG, &[("subtest.go", SUBTEST_GO)])
        .package(Some(MODULE), SIBLING, &[("sibling.go", SIBLING_GO)])
        .package(Some(OTHER_MODULE), OTHER_LIB, &[("lib.go", LIB_GO)])
        .standard("strconv")
        .standard("testing")
        .standard("time")
}

#[derive(Debug, Default)]
pub struct ToolchainLog {
    pub test_runs: Vec<Vec<String>>,
    pub profiles: Vec<PathBuf>,
    pub summaries: usize,
}

/// Toolchain double: records invocations, writes an empty profile and
/// serves a canned summary.
#[derive(Clone)]
pub struct FakeToolchain {
    summary: String,
    fail_tests: bool,
    log: Arc<Mutex<ToolchainLog>>,
}

impl FakeToolchain {
    pub fn new(summary: &str) -> Self {
        Self { summary: summary.to_string(), fail_tests: false, log: Arc::default() }
    }

    pub fn failing() -> Self {
        Self { fail_tests: true, ..Self::new("") }
    }

    pub fn log(&self) -> Arc<Mutex<ToolchainLog>> {
        Arc::clone(&self.log)
    }
}

impl Toolchain for FakeToolchain {
    fn run_tests(&self, invocation: &TestInvocation<'_>) -> DeepcoverResult<()> {
        let mut log = self.log.lock().unwrap();
        log.test_runs.push(invocation.args());
        log.profiles.push(invocation.profile.to_path_buf());
        std::fs::write(invocation.profile, "mode: atomic\n").unwrap();
        if self.fail_tests {
            return Err(DeepcoverError::Invocation {
                command: "go test".into(),
                detail: "exit status 1: --- FAIL: TestTop".into(),
            });
        }
        Ok(())
    }

    fn summarize(&self, _locator: &Locator, profile: &Path) -> DeepcoverResult<String> {
        assert!(profile.is_file(), "profile must exist while summarizing");
        self.log.lock().unwrap().summaries += 1;
        Ok(self.summary.clone())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
