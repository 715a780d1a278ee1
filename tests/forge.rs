//! Whole-pipeline tests: forge an SRC program, then build and run the
//! generated C with the system compiler when one is available.

use std::path::Path;
use std::process::Command;

fn have_gcc() -> bool {
    Command::new("gcc")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Compiles and runs the generated C, returning the process exit code.
fn run_c(dir: &Path, c_file: &Path) -> i32 {
    let binary = dir.join("program");
    let status = Command::new("gcc")
        .arg(c_file)
        .arg("-o")
        .arg(&binary)
        .status()
        .expect("gcc should run");
    assert!(status.success(), "generated C should compile cleanly");
    Command::new(&binary)
        .status()
        .expect("program should run")
        .code()
        .unwrap_or(-1)
}

#[test]
fn minimal_struct_program_runs() {
    if !have_gcc() {
        eprintln!("skipping: no C compiler available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let origin = dir.path().join("main.src");
    std::fs::write(
        &origin,
        "struct P { int x; int y; }\n\
         fn main() -> int { return new P { 1, 2 }->x; }\n",
    )
    .unwrap();

    let target = smelt_compile::compile_file(&origin).unwrap();
    assert_eq!(run_c(dir.path(), &target), 1);
}

#[test]
fn arithmetic_and_locals_run() {
    if !have_gcc() {
        eprintln!("skipping: no C compiler available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let origin = dir.path().join("main.src");
    std::fs::write(
        &origin,
        "fn add(int a, int b) -> int { return a + b; }\n\
         fn main() -> int {\n\
             int total = 0;\n\
             int i = 0;\n\
             while (i < 5) {\n\
                 total = add(total, i);\n\
                 i = i + 1;\n\
             }\n\
             return total;\n\
         }\n",
    )
    .unwrap();

    let target = smelt_compile::compile_file(&origin).unwrap();
    assert_eq!(run_c(dir.path(), &target), 10);
}

#[test]
fn native_import_prints() {
    if !have_gcc() {
        eprintln!("skipping: no C compiler available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let origin = dir.path().join("main.src");
    std::fs::write(
        &origin,
        "import native stdio;\n\
         fn main() -> int { printf(\"hi\\n\"); return 0; }\n",
    )
    .unwrap();

    let target = match smelt_compile::compile_file(&origin) {
        Ok(target) => target,
        Err(e) => panic!("native import failed: {}", e),
    };
    let c_source = std::fs::read_to_string(&target).unwrap();
    assert!(c_source.contains("#include <stdio.h>"));

    let binary = dir.path().join("program");
    let status = Command::new("gcc")
        .arg(&target)
        .arg("-o")
        .arg(&binary)
        .status()
        .unwrap();
    assert!(status.success());
    let output = Command::new(&binary).output().unwrap();
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hi\n");
}
