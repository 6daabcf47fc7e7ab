use clap::Parser as ClapParser;
use lazuli_ast::ast::Program;
use std::io::Write;
use std::path::PathBuf;

/// Compile and run a lazuli program over standard input/output.
#[derive(ClapParser, Debug)]
#[command(name = "lazuli", version, about)]
struct Opts {
    /// Source file to run.
    file: PathBuf,

    /// Print the token stream and exit.
    #[arg(long)]
    dump_tokens: bool,

    /// Print the surface syntax tree as JSON and exit.
    #[arg(long)]
    dump_ast: bool,

    /// Do not prepend the library prelude.
    #[arg(long)]
    no_prelude: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let opts = Opts::parse();
    std::process::exit(run(&opts));
}

fn run(opts: &Opts) -> i32 {
    let file = opts.file.display();
    let mut source = match std::fs::read_to_string(&opts.file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{file}: {e}");
            return 1;
        }
    };
    if !source.ends_with('\n') {
        source.push('\n');
    }

    let tokens = match lazuli_lexer::lex(&source) {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("{file}:{e}");
            return 1;
        }
    };
    if opts.dump_tokens {
        for token in &tokens {
            println!("{}: {}", token.loc, token.tok);
        }
        return 0;
    }

    let mut program = match lazuli_parser::parse(&tokens) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{file}:{e}");
            return 1;
        }
    };
    if opts.dump_ast {
        match serde_json::to_string_pretty(&program) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("{file}: {e}");
                return 1;
            }
        }
        return 0;
    }

    if !opts.no_prelude {
        match prelude() {
            Ok(prelude) => {
                program.data_defs.splice(0..0, prelude.data_defs);
                program.definitions.splice(0..0, prelude.definitions);
            }
            Err(message) => {
                eprintln!("<prelude>: {message}");
                return 1;
            }
        }
    }

    let lowered = match lazuli_core::lower_program(&program) {
        Ok(lowered) => lowered,
        Err(e) => {
            eprintln!("{file}:{e}");
            return 1;
        }
    };
    log::debug!("running {file}");

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut interpreter = lazuli_runtime::Interpreter::new(stdin.lock(), stdout.lock());
    match interpreter.run(&lowered) {
        Ok(()) => 0,
        Err(e) => {
            drop(interpreter);
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "error: {e}");
            1
        }
    }
}

fn prelude() -> Result<Program, String> {
    let tokens = lazuli_lexer::lex(lazuli_core::PRELUDE).map_err(|e| e.to_string())?;
    lazuli_parser::parse(&tokens).map_err(|e| e.to_string())
}
