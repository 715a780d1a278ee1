//! The compilation pipeline.
//!
//! ```text
//! SRC source (.src)
//!       │
//!       ▼
//! ┌───────────────────┐
//! │  Import driver    │ three passes, transitive imports
//! └─────────┬─────────┘
//!           ▼
//! ┌───────────────────┐
//! │  AST              │ declarations in source order
//! └─────────┬─────────┘
//!           ▼
//! ┌───────────────────┐
//! │  C emitter        │ one translation unit
//! └─────────┬─────────┘
//!           ▼
//!      C source (.src.c)
//! ```

use crate::codegen_c;
use smelt_base::{CompileError, Result};
use smelt_language::context::Context;
use smelt_language::import;
use std::path::{Path, PathBuf};

/// Compiles one origin file to C source, in memory.
pub fn compile_to_c(origin: &Path) -> Result<String> {
    let mut ctx = Context::new();
    import::parse_origin(&mut ctx, origin)?;
    codegen_c::emit(&ctx.ast)
}

/// Compiles one origin file and writes `<origin>.c` next to it.
///
/// Returns the path of the written file.
pub fn compile_file(origin: &Path) -> Result<PathBuf> {
    let output = compile_to_c(origin)?;
    let mut target = origin.as_os_str().to_os_string();
    target.push(".c");
    let target = PathBuf::from(target);
    std::fs::write(&target, output).map_err(|e| {
        CompileError::internal(format!(
            "unable to write output file {}: {}",
            target.display(),
            e
        ))
    })?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn compile_source(source: &str) -> String {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.src");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(source.as_bytes()).unwrap();
        compile_to_c(&path).unwrap()
    }

    #[test]
    fn minimal_struct_program_compiles() {
        let output = compile_source(
            "struct P { int x; int y; }\n\
             fn main() -> int { return new P { 1, 2 }->x; }\n",
        );
        assert!(output.contains("#include <stdint.h>"));
        assert!(output.contains("typedef struct P P;"));
        assert!(output.contains("struct P {"));
        assert!(output.contains("int32_t x;"));
        assert!(output.contains("int32_t main()"));
        assert!(output.contains("P* _cst_tmpvar_0_ = malloc(sizeof(P));"));
        assert!(output.contains("return _cst_tmpvar_0_->x;"));
    }

    #[test]
    fn forward_declared_struct_resolves_to_itself() {
        let output = compile_source(
            "struct N;\n\
             struct N { N* next; int v; }\n",
        );
        let typedefs = output.matches("typedef struct N N;").count();
        assert_eq!(typedefs, 1, "exactly one typedef for N:\n{}", output);
        assert!(output.contains("N* next;"));
    }

    #[test]
    fn enums_emit_mangled_members() {
        let output = compile_source(
            "enum Color { Red, Green, Blue }\n\
             fn main() -> int { return (int) 0; }\n",
        );
        assert!(output.contains("typedef enum Color {"));
        assert!(output.contains("_cst_enum__Color__member__Red = 0,"));
        assert!(output.contains("_cst_enum__Color__member__Blue = 2,"));
    }

    #[test]
    fn unsigned_globals_use_the_unsigned_primitive() {
        let output = compile_source("unsigned int x = 1;\n");
        assert!(output.contains("uint32_t x;"), "forward:\n{}", output);
        assert!(output.contains("uint32_t x = 1;"), "definition:\n{}", output);
    }

    #[test]
    fn compile_file_writes_next_to_the_origin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prog.src");
        std::fs::write(&path, "fn main() -> int { return 0; }\n").unwrap();
        let target = compile_file(&path).unwrap();
        assert_eq!(target.file_name().unwrap(), "prog.src.c");
        let written = std::fs::read_to_string(target).unwrap();
        assert!(written.contains("int32_t main()"));
    }
}
