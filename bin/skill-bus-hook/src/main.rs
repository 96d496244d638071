use std::io::Read;

use clap::{Parser, Subcommand};

use dispatch::Stage;

/// skill-bus-hook — dispatch entrypoint for the host's hook events.
///
/// One JSON event arrives on stdin; at most one JSON response line leaves on
/// stdout. The exit code is always 0 on a dispatch path: the worst outcome of
/// any internal fault is that the skill loads with no injected context.
#[derive(Parser)]
#[command(name = "skill-bus-hook", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// PreToolUse: the host is about to run a skill
    Pre,
    /// PostToolUse: a skill's tool call just finished
    Post,
    /// UserPromptSubmit: the user typed a slash-prefixed prompt
    Prompt,
}

fn main() {
    let cli = Cli::parse();
    let stage = match cli.command {
        Command::Pre => Stage::Pre,
        Command::Post => Stage::Post,
        Command::Prompt => Stage::Prompt,
    };

    let mut raw = String::new();
    if std::io::stdin().read_to_string(&mut raw).is_err() {
        return;
    }

    if let Some(line) = dispatch::run(stage, &raw) {
        println!("{}", line);
    }
}
