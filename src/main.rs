use clap::{Parser as ClapParser, Subcommand};
use clove_match::cli::{self, CliError, DEFAULT_MAX_BYTES, FilterOptions, FilterResult};
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "clove-match")]
#[command(about = "clove-match - Filter JSON documents with compiled boolean expressions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the NDJSON documents that match an expression
    Filter {
        /// The expression, in its JSON form
        expression: String,

        /// NDJSON input (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Reject documents larger than this many bytes
        #[arg(long, default_value_t = DEFAULT_MAX_BYTES)]
        max_bytes: usize,

        /// Only compile the expression, don't run it
        #[arg(long)]
        syntax_only: bool,

        /// Print the compiled plan
        #[arg(long)]
        explain: bool,

        /// Print the documents that do not match
        #[arg(short = 'v', long)]
        invert: bool,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Filter {
            expression,
            input,
            max_bytes,
            syntax_only,
            explain,
            invert,
        } => run_filter(FilterOptions {
            expression,
            input,
            max_bytes,
            syntax_only,
            explain,
            invert,
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_filter(mut options: FilterOptions) -> Result<(), CliError> {
    let needs_input = !options.syntax_only && !options.explain;
    if options.input.is_none() && needs_input && !atty::is(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        options.input = Some(buffer);
    }

    match cli::execute_filter(&options)? {
        FilterResult::SyntaxValid { buckets, slots } => {
            println!("Expression is valid ({} buckets, {} slots)", buckets, slots)
        }
        FilterResult::Explained(plan) => print!("{}", plan),
        FilterResult::Filtered { lines, .. } => {
            for line in lines {
                println!("{}", line);
            }
        }
    }
    Ok(())
}
