#[macro_use]
extern crate tracing;

use std::env;
use std::io;
use std::path::PathBuf;

use anyhow::Context as _;
use forkat::log::Logging;
use forkat::{SplitCfg, SplitOutcome, WaitMode};
use seahorse::{App, Command, Context, Flag, FlagType};

fn main() {
    let args: Vec<String> = if let Ok(args_str) = env::var("FORKAT_ARGS") {
        env::args()
            .take(1)
            .chain(parse_env_variable_as_args(&args_str))
            .collect()
    } else {
        env::args().collect()
    };

    let app = App::new(env!("CARGO_PKG_NAME"))
        .description(env!("CARGO_PKG_DESCRIPTION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .usage(generate_usage())
        .command(split_command());

    app.run(args);
}

fn generate_usage() -> String {
    format!(
        "{command} [action]\n\
        \n\
        \tExample: duplicate the process once and reap the child\n\
        \n\
        \t  {command} split --wait --log-term",
        command = env!("CARGO_PKG_NAME"),
    )
}

fn exit(res: anyhow::Result<()>) -> ! {
    match res {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{e:?}");
            std::process::exit(1);
        }
    }
}

// split

const SPLIT_SUBCOMMAND: &str = "split";

fn split_command() -> Command {
    let usage = format!(
        r##"{command} {subcommand} [flags]

Every resulting process writes exactly one line on standard output:

    fork: parent pid=<PID> child=<CHILD PID>
    fork: child pid=<PID>
    fork: failure

Example: three children, each reaped with a bounded wait

    {command} {subcommand} --count 3 --wait-timeout 5s"##,
        command = env!("CARGO_PKG_NAME"),
        subcommand = SPLIT_SUBCOMMAND,
    );

    let cmd = Command::new(SPLIT_SUBCOMMAND)
        .description("Duplicate the current process and report both branches")
        .alias("s")
        .usage(usage)
        .action(split_action);

    apply_common_flags(apply_split_flags(cmd))
}

fn split_action(c: &Context) {
    let res = SplitArgs::parse(c).and_then(|args| {
        forkat::log::init(args.common.logging)?;

        let cfg = SplitCfg {
            count: args.count,
            wait_mode: args.wait_mode,
        };

        let mut stdout = io::stdout();

        match forkat::split(cfg, &mut stdout).context("split action failed")? {
            SplitOutcome::Child => {}
            SplitOutcome::Parent { registry } => {
                for (pid, record) in registry.iter() {
                    debug!(pid, ordinal = record.ordinal, status = ?record.status, "Spawned child");
                }
            }
        }

        Ok(())
    });
    exit(res);
}

// args parsing

fn parse_env_variable_as_args(env_var_str: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut arg = String::new();
    let mut iter = env_var_str.chars();

    loop {
        match iter.next() {
            Some('"') => loop {
                // read until next "
                match iter.next() {
                    Some('"') | None => break,
                    Some(c) => arg.push(c),
                }
            },
            Some('\'') => loop {
                // read until next '
                match iter.next() {
                    Some('\'') | None => break,
                    Some(c) => arg.push(c),
                }
            },
            Some(' ') => {
                // push current arg
                args.push(std::mem::take(&mut arg));
            }
            Some(c) => arg.push(c),
            None => break,
        }
    }

    if !arg.is_empty() {
        args.push(arg);
    }

    args
}

fn apply_common_flags(cmd: Command) -> Command {
    cmd.flag(Flag::new("log-file", FlagType::String).description("Specify filepath for log file"))
        .flag(Flag::new("log-term", FlagType::Bool).description("Print logs to stderr instead of log file"))
}

struct CommonArgs {
    logging: Logging,
}

impl CommonArgs {
    fn parse(action: &str, c: &Context) -> anyhow::Result<Self> {
        let logging = if c.bool_flag("log-term") {
            Logging::Term
        } else if let Ok(filepath) = c.string_flag("log-file") {
            let filepath = PathBuf::from(filepath);
            Logging::File { filepath }
        } else if let Some(mut filepath) = dirs_next::data_dir() {
            use std::time::{SystemTime, UNIX_EPOCH};
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .context("couldn't retrieve duration since UNIX epoch")?;
            filepath.push("forkat");
            std::fs::create_dir_all(&filepath).context("couldn't create forkat folder")?;
            filepath.push(format!("{}_{}", action, now.as_secs()));
            filepath.set_extension("log");
            Logging::File { filepath }
        } else {
            eprintln!("Couldn't retrieve data directory for log files. Logging to terminal instead.");
            Logging::Term
        };

        Ok(Self { logging })
    }
}

fn apply_split_flags(cmd: Command) -> Command {
    cmd.flag(Flag::new("count", FlagType::Int).description("How many child processes to create [default = 1]"))
        .flag(Flag::new("wait", FlagType::Bool).description("Block until each child terminates"))
        .flag(
            Flag::new("wait-timeout", FlagType::String)
                .description("Wait for each child up to the given duration (e.g.: 5s)"),
        )
}

struct SplitArgs {
    common: CommonArgs,
    count: usize,
    wait_mode: WaitMode,
}

impl SplitArgs {
    fn parse(c: &Context) -> anyhow::Result<Self> {
        let common = CommonArgs::parse(SPLIT_SUBCOMMAND, c)?;

        let count = usize::try_from(c.int_flag("count").unwrap_or(1)).context("Bad count value")?;
        anyhow::ensure!(count >= 1, "count must be at least 1");

        let wait_mode = if let Ok(timeout) = c.string_flag("wait-timeout") {
            let timeout = humantime::parse_duration(&timeout).context("Invalid value for wait-timeout")?;
            WaitMode::Timeout(timeout)
        } else if c.bool_flag("wait") {
            WaitMode::Block
        } else {
            WaitMode::None
        };

        Ok(Self {
            common,
            count,
            wait_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code can panic on errors")]

    use super::*;

    #[test]
    fn env_args_are_split_on_spaces() {
        assert_eq!(parse_env_variable_as_args("split --count 3"), ["split", "--count", "3"]);
    }

    #[test]
    fn env_args_honor_double_quotes() {
        assert_eq!(
            parse_env_variable_as_args(r#"split --log-file "/tmp/forkat logs/run.log""#),
            ["split", "--log-file", "/tmp/forkat logs/run.log"]
        );
    }

    #[test]
    fn env_args_honor_single_quotes() {
        assert_eq!(parse_env_variable_as_args("split '--wait'"), ["split", "--wait"]);
    }

    #[test]
    fn env_args_empty_input_yields_no_args() {
        assert!(parse_env_variable_as_args("").is_empty());
    }
}
