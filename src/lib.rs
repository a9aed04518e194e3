pub mod codegen;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod pretty;
pub mod span;

use diagnostics::CompileError;

/// Knobs of one compilation session, wired from the CLI flags.
#[derive(Debug, Clone)]
pub struct Options {
    pub optimize: bool,
    pub verify: bool,
    pub print_globals: bool,
    pub print_ir_pre: bool,
    pub print_ir_post: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            optimize: true,
            verify: true,
            print_globals: false,
            print_ir_pre: false,
            print_ir_post: false,
        }
    }
}

/// Compile a source buffer into a ready-to-run JIT module.
pub fn compile(source: &str, opts: &Options) -> Result<codegen::Jit, CompileError> {
    // 1. Lex
    let tokens = lexer::lex(source)?;

    // 2. Parse
    let mut parser = parser::Parser::new(&tokens, source);
    let globals = parser.parse_program()?;

    if opts.print_globals {
        print!("{}", pretty::render_globals(&globals));
    }

    // 3. Lower + verify
    codegen::codegen(&globals, opts)
}

/// Compile and execute `main`, returning its 64-bit result.
pub fn compile_and_run(source: &str, opts: &Options) -> Result<i64, CompileError> {
    compile(source, opts)?.run_main()
}
