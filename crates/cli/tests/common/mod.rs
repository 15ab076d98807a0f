#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;

pub const MODULE: &str = "example.com/demo";
pub const PACKAGE: &str = "example.com/demo/calc";

pub const CALC_GO: &str = r#"package calc

func Add(a, b int) int {
	return a + b
}

func Abs(n int) int {
	if n < 0 {
		return -n
	}
	return n
}
"#;

pub const CALC_TEST_GO: &str = r#"package calc

import "testing"

func TestAdd(t *testing.T) {
	if Add(1, 2) != 3 {
		t.Fatal("add")
	}
}

func TestAbs(t *testing.T) {
	if Abs(-1) != 1 {
		t.Fatal("abs")
	}
}
"#;

pub const SUMMARY: &str = "\
example.com/demo/calc/calc.go:3:\tAdd\t\t100.0%
example.com/demo/calc/calc.go:7:\tAbs\t\t50.0%
total:\t\t(statements)\t66.7%
";

/// Files backing the fake `go list` and `go tool cover` hooks.
pub struct FakeGo {
    pub go_list: PathBuf,
    pub cover_func: PathBuf,
}

/// Lay out the calc package under `root` and write the canned tool outputs.
pub fn fake_go(root: &Path) -> FakeGo {
    let dir = root.join("calc");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("calc.go"), CALC_GO).unwrap();
    fs::write(dir.join("calc_test.go"), CALC_TEST_GO).unwrap();

    let records = [
        json!({ "ImportPath": "testing", "Name": "testing", "Standard": true, "DepOnly": true }),
        json!({
            "ImportPath": PACKAGE,
            "Name": "calc",
            "Dir": dir,
            "GoFiles": ["calc.go"],
            "TestGoFiles": ["calc_test.go"],
            "TestImports": ["testing"],
            "Module": { "Path": MODULE, "Dir": root, "Main": true },
        }),
    ];
    let go_list = root.join("go-list.json");
    fs::write(&go_list, records.iter().map(|r| format!("{r}\n")).collect::<String>()).unwrap();
    let cover_func = root.join("cover-func.txt");
    fs::write(&cover_func, SUMMARY).unwrap();
    FakeGo { go_list, cover_func }
}

/// `deepcover` with both `go` hooks pointed at `fake` and a `go` binary that
/// cannot exist.
pub fn deepcover_cmd(fake: &FakeGo) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("deepcover");
    cmd.env("DEEPCOVER_FAKE_GO_LIST", &fake.go_list)
        .env("DEEPCOVER_FAKE_COVER_FUNC", &fake.cover_func)
        .env("DEEPCOVER_GO", "/definitely/not/a/go/binary")
        .env_remove("DEEPCOVER_LOG");
    cmd
}
