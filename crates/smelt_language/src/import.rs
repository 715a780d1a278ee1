//! The import driver.
//!
//! Compilation starts at one *origin* file, which is swept three times:
//!
//! 1. **Pass 1** registers every top-level name as a forward declaration,
//!    fast-forwarding over bodies. Imports found on the way are processed
//!    recursively, also at pass 1.
//! 2. **Pass 2** fills in structure members, enum values, function
//!    signatures, and alias targets. Imports are re-visited at pass 2.
//! 3. **Pass 3** runs on the origin only and parses function bodies and
//!    variable initializers.
//!
//! Every touched file is recorded with the last pass completed on it; a
//! re-import at a pass already done is silently dropped, which is what
//! makes cyclic and diamond imports converge. `import native` files are
//! routed through the system C preprocessor and the C-native translator on
//! pass 1 only.

use crate::ast::{DcImport, DeclBody, Declaration};
use crate::context::{Context, ImportedFile, Pass};
use crate::native;
use crate::parser;
use smelt_base::{warn, CompileError, Result};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Parses the origin file and its transitive imports into the context's
/// AST, running all three passes.
pub fn parse_origin(ctx: &mut Context, filename: &Path) -> Result<()> {
    if ctx.pass != Pass::Three {
        return Err(CompileError::internal(
            "parse_origin requires a freshly created context",
        ));
    }

    let filename = filename.canonicalize().map_err(|e| {
        CompileError::syntax(format!(
            "unable to resolve path {}: {}",
            filename.display(),
            e
        ))
    })?;

    // Register the origin up front so self-imports are suppressed.
    ctx.files.push(ImportedFile {
        filename: filename.clone(),
        is_native: false,
        last: Pass::One,
    });
    ctx.filename = Some(filename.clone());

    for pass in [Pass::One, Pass::Two, Pass::Three] {
        ctx.pass = pass;
        ctx.files[0].last = pass;
        parse_file(ctx, &filename)?;
    }
    Ok(())
}

fn parse_file(ctx: &mut Context, filename: &Path) -> Result<()> {
    let source = std::fs::read_to_string(filename).map_err(|e| {
        CompileError::syntax(format!("unable to open file {}: {}", filename.display(), e))
    })?;
    parser::parse(ctx, &source).map_err(|e| {
        CompileError {
            message: format!("{}: {}", filename.display(), e.message),
            ..e
        }
    })
}

/// Translates an import path to a filename: segments joined by `/`, with
/// `.src` for SRC imports and `.h` for native ones.
fn import_to_filename(import: &DcImport) -> PathBuf {
    let extension = if import.is_native { "h" } else { "src" };
    let mut path = PathBuf::from(import.path.join("/"));
    path.set_extension(extension);
    path
}

/// Handles one `import` statement at the context's current pass.
pub fn process_import(ctx: &mut Context, import: DcImport) -> Result<()> {
    let relative = import_to_filename(&import);

    // Native paths go to the preprocessor verbatim; SRC paths resolve
    // against the origin file's directory.
    let filename = if import.is_native {
        relative
    } else {
        let parent = ctx
            .filename
            .as_ref()
            .and_then(|f| f.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default();
        parent.join(relative)
    };

    // Repeat (circular or diamond) imports at an already-completed pass
    // are dropped.
    let mut known = false;
    for file in &mut ctx.files {
        if file.filename == filename {
            known = true;
            if file.is_native != import.is_native {
                warn(&format!(
                    "name conflict between native and non-native imports of {}",
                    filename.display()
                ));
            } else if file.last >= ctx.pass {
                return Ok(());
            }
            file.last = ctx.pass;
            break;
        }
    }
    if !known {
        ctx.files.push(ImportedFile {
            filename: filename.clone(),
            is_native: import.is_native,
            last: ctx.pass,
        });
    }

    if import.is_native {
        if ctx.pass == Pass::One {
            let header = filename.to_string_lossy().into_owned();
            ctx.ast
                .add_declaration(Declaration::new(DeclBody::Import(import), true))?;
            let preprocessed = preprocess(&header)?;
            native::parse_native(ctx, &preprocessed, &header)?;
        }
        Ok(())
    } else {
        if ctx.pass != Pass::Three {
            let was_origin = ctx.in_origin;
            ctx.in_origin = false;
            let result = parse_file(ctx, &filename);
            ctx.in_origin = was_origin;
            result?;
        }
        Ok(())
    }
}

/// Runs the system C preprocessor over `#include <header>` and returns its
/// output.
///
/// The contract is minimal: any program that reads source on stdin and
/// writes preprocessed C on stdout would do.
fn preprocess(header: &str) -> Result<String> {
    let mut child = Command::new("gcc")
        .args(["-E", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| CompileError::internal(format!("unable to start the C preprocessor: {}", e)))?;

    {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CompileError::internal("preprocessor stdin is unavailable"))?;
        let mut stdin = std::io::BufWriter::new(stdin);
        write!(stdin, "#include <{}>", header)
            .map_err(|e| CompileError::internal(format!("unable to write to the preprocessor: {}", e)))?;
        // Dropping the handle closes stdin so the child sees EOF.
    }

    let mut output = String::new();
    child
        .stdout
        .take()
        .ok_or_else(|| CompileError::internal("preprocessor stdout is unavailable"))?
        .read_to_string(&mut output)
        .map_err(|e| CompileError::internal(format!("unable to read the preprocessor output: {}", e)))?;

    let status = child
        .wait()
        .map_err(|e| CompileError::internal(format!("unable to reap the preprocessor: {}", e)))?;
    if !status.success() {
        return Err(CompileError::internal(format!(
            "the C preprocessor failed for <{}> with {}",
            header, status
        )));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_paths_resolve_with_extensions() {
        let import = DcImport {
            path: vec!["core".to_string(), "io".to_string()],
            is_native: false,
        };
        assert_eq!(import_to_filename(&import), PathBuf::from("core/io.src"));

        let import = DcImport {
            path: vec!["stdio".to_string()],
            is_native: true,
        };
        assert_eq!(import_to_filename(&import), PathBuf::from("stdio.h"));
    }
}
