//! gocker - Minimal Container Engine CLI
//!
//! ## Usage
//!
//! ```sh
//! gocker pull <image>
//! gocker run <image> <command> [args...]
//! ```
//!
//! `pull` downloads an official Docker Hub image (`library/<image>`,
//! tag `latest`) into `$HOME/.local/share/gocker/images/<image>/`.
//!
//! `run` launches the command inside new UTS/PID/Mount/User namespaces
//! with the image rootfs as `/` and a fixed v2 cgroup (50M memory, 20%
//! CPU). The exit code of the containerized process is propagated.

use gocker::{Container, ImagePuller, Runner};
use std::process::ExitCode;
use std::time::Instant;

// =============================================================================
// CLI Parsing
// =============================================================================

#[derive(Debug)]
enum Command {
    Pull {
        image: String,
    },
    Run {
        image: String,
        command: String,
        args: Vec<String>,
    },
    Version,
    Help,
}

fn parse_args() -> Result<Command, String> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        return Ok(Command::Help);
    }

    match args[1].as_str() {
        "pull" => {
            if args.len() != 3 {
                return Err("pull requires exactly one <image>".to_string());
            }
            Ok(Command::Pull {
                image: args[2].clone(),
            })
        }
        "run" => {
            if args.len() < 4 {
                return Err("run requires <image> <command> [args...]".to_string());
            }
            Ok(Command::Run {
                image: args[2].clone(),
                command: args[3].clone(),
                args: args[4..].to_vec(),
            })
        }
        "version" | "--version" | "-v" => Ok(Command::Version),
        "help" | "--help" | "-h" => Ok(Command::Help),
        unknown => Err(format!("unknown command: {}", unknown)),
    }
}

fn print_help() {
    println!("gocker - minimal container engine");
    println!();
    println!("USAGE:");
    println!("    gocker pull <image>                  Pull an image from Docker Hub");
    println!("    gocker run <image> <command> [args]  Run a command in a container");
    println!("    gocker version                       Print version");
    println!("    gocker help                          Print this help");
}

// =============================================================================
// Command Handlers
// =============================================================================

fn pull(image: &str) -> ExitCode {
    let start = Instant::now();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        let puller = ImagePuller::new(image)?;
        puller.pull().await
    });

    if let Err(e) = result {
        eprintln!("Error while pulling '{}' image: {}", image, e);
        return ExitCode::FAILURE;
    }

    println!("Elapsed time: {:.3}s", start.elapsed().as_secs_f64());
    ExitCode::SUCCESS
}

fn run(image: &str, command: &str, args: Vec<String>) -> ExitCode {
    let container = match Container::new(image, command, args) {
        Ok(container) => container,
        Err(e) => {
            eprintln!("Error during container creation: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match Runner::new(container).run() {
        // Propagate the containerized process's exit code verbatim
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error during container execution: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = match parse_args() {
        Ok(command) => command,
        Err(reason) => {
            eprintln!("Error: {}", reason);
            print_help();
            return ExitCode::FAILURE;
        }
    };

    match command {
        Command::Pull { image } => pull(&image),
        Command::Run {
            image,
            command,
            args,
        } => run(&image, &command, args),
        Command::Version => {
            println!("gocker {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Command::Help => {
            print_help();
            ExitCode::SUCCESS
        }
    }
}
