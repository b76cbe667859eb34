//! Compiler invocation rewriting
//!
//! A compile step from the database produces an object file. The analysis
//! needs the same invocation to produce a JSON AST dump on stdout instead:
//! same include paths, defines, and language options, but no codegen and
//! no output file.

/// Flags that take their value as a separate argument and must be dropped
/// together with it.
const DROP_WITH_VALUE: &[&str] = &["-o", "-MF", "-MT", "-MQ"];

/// Flags dropped standalone: compilation mode and dependency-file output.
const DROP_ALONE: &[&str] = &["-c", "-M", "-MM", "-MD", "-MMD", "-MG", "-MP"];

/// Rewrite a compile argv into an AST-dump argv, running `dumper` instead
/// of the original compiler binary.
pub fn ast_dump_argv(argv: &[String], dumper: &str) -> Vec<String> {
    let mut out = Vec::with_capacity(argv.len() + 4);
    out.push(dumper.to_string());

    let mut args = argv.iter().skip(1);
    while let Some(arg) = args.next() {
        if DROP_WITH_VALUE.contains(&arg.as_str()) {
            args.next();
            continue;
        }
        if DROP_ALONE.contains(&arg.as_str()) {
            continue;
        }
        // -o<path> spelled as one token
        if arg.len() > 2 && arg.starts_with("-o") {
            continue;
        }
        out.push(arg.clone());
    }

    out.push("-fsyntax-only".to_string());
    out.push("-Xclang".to_string());
    out.push("-ast-dump=json".to_string());
    out
}
