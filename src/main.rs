use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "small", about = "The small-lang JIT compiler")]
struct Cli {
    /// Source file to compile and run
    file: PathBuf,

    /// Do not execute main()
    #[arg(long)]
    no_run: bool,

    /// Disable IR optimization
    #[arg(long)]
    no_opt: bool,

    /// Disable IR verification
    #[arg(long)]
    no_verify: bool,

    /// Print parsed globals
    #[arg(long)]
    print_globals: bool,

    /// Print IR before optimization
    #[arg(long)]
    print_ir_pre: bool,

    /// Print IR after optimization
    #[arg(long)]
    print_ir_post: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{err}");
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let source = match std::fs::read_to_string(&cli.file) {
        Ok(source) => source,
        Err(err) => {
            let err = smallc::diagnostics::CompileError::io(format!(
                "failed to read {}: {err}",
                cli.file.display()
            ));
            smallc::diagnostics::render_error("", &cli.file.to_string_lossy(), &err);
            std::process::exit(1);
        }
    };

    let opts = smallc::Options {
        optimize: !cli.no_opt,
        verify: !cli.no_verify,
        print_globals: cli.print_globals,
        print_ir_pre: cli.print_ir_pre,
        print_ir_post: cli.print_ir_post,
    };

    let jit = match smallc::compile(&source, &opts) {
        Ok(jit) => jit,
        Err(err) => {
            let filename = cli.file.to_string_lossy();
            smallc::diagnostics::render_error(&source, &filename, &err);
            std::process::exit(1);
        }
    };

    if cli.no_run {
        return;
    }

    match jit.run_main() {
        Ok(ret) => println!("main() returned {ret}"),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
