use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand, ValueEnum};
use monkey::{new_compiler, new_interpreter, Engine};
use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

#[derive(ClapParser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long, value_enum)]
    engine: Option<EngineType>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a Monkey source file
    Run {
        #[arg(name = "FILE")]
        path: PathBuf,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, ValueEnum)]
enum EngineType {
    Interpreter,
    Compiler,
}

fn main() {
    let cli = Cli::parse();

    let engine = match cli.engine {
        Some(EngineType::Interpreter) => new_interpreter(),
        Some(EngineType::Compiler) | None => new_compiler(),
    };

    match cli.command {
        Some(Commands::Run { path }) => {
            execute_file(path, engine).unwrap_or_else(|err| {
                println!("{}", err);
                std::process::exit(1);
            });
        }
        None => {
            start_repl(engine);
        }
    }
}

fn execute_file(path: PathBuf, mut engine: Box<dyn Engine>) -> Result<()> {
    let input = fs::read_to_string(&path).context(format!("Failed to read {}", path.display()))?;

    engine.run(&input)?;

    Ok(())
}

fn start_repl(mut engine: Box<dyn Engine>) {
    loop {
        print!(">> ");
        io::stdout().flush().expect("Failed to flush stdout");

        let mut input = String::new();

        let bytes_read = io::stdin()
            .read_line(&mut input)
            .expect("Failed to read line");
        if bytes_read == 0 {
            break;
        }

        match engine.run(&input) {
            Ok(output) => println!("{}", output),
            Err(err) => {
                println!("{}", MONKEY_FACE);
                println!("Woops! We ran into some monkey business here!");
                println!("{}", err);
                continue;
            }
        }
    }
}

const MONKEY_FACE: &str = r#"
            __,__
   .--.  .-"     "-.  .--.
  / .. \/  .-. .-.  \/ .. \
 | |  '|  /   Y   \  |'  | |
 | \   \  \ 0 | 0 /  /   / |
  \ '- ,\.-"""""""-./, -' /
   ''-' /_   ^ ^   _\ '-''
       |  \._   _./  |
       \   \ '~' /   /
        '._ '-=-' _.'
           '-----'
"#;
