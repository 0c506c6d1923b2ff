use crate::run;
use crate::window::parse_date;
use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::fs;
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fedweek", version)]
#[command(
    about = "Weekly summary of Fedora project activity",
    long_about = "fedweek counts Fedora activity over the last seven days from datagrepper, archives the counts, compares them with the previous week, and writes a blog post plus a trend chart."
)]
#[command(arg_required_else_help = true)]
#[command(after_long_help = "Examples:
  fedweek run
  fedweek run --date 2013-06-17
  fedweek backfill --from 2013-01-07 --jobs 4
  fedweek chart
  fedweek completion zsh > ~/.zsh/completions/_fedweek
  fedweek man > fedweek.1")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    #[arg(
        long,
        value_name = "DIR",
        help = "Blog root holding posts/, data/ and themes/ (default: current directory)"
    )]
    root: Option<PathBuf>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Config file (default: <root>/fedweek.toml, built-in defaults when absent)"
    )]
    config: Option<PathBuf>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Answer queries from a recorded JSON fixture instead of datagrepper"
    )]
    fixture: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Write NDJSON event log to file")]
    log: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Summarize the week before a run date",
        long_about = "Summarize the seven days before the run date (default: today): count every category, rank contributors, archive the counts, append to history, and write the blog post and trend chart."
    )]
    #[command(after_long_help = "Examples:
  fedweek run
  fedweek run --date 2013-06-17 --root ./blog
  fedweek run --no-rankings --log run.ndjson")]
    Run {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(
            long,
            value_name = "DATE",
            value_parser = parse_date,
            help = "Run date (YYYY-MM-DD); the report covers the seven days before it"
        )]
        date: Option<NaiveDate>,
        #[arg(long, help = "Skip the top contributors table")]
        no_rankings: bool,
        #[arg(long, help = "Do not re-render the trend chart")]
        no_chart: bool,
    },
    #[command(
        about = "Process every week from a start date up to today",
        long_about = "Run the weekly pipeline for each run date from --from, stepping seven days, up to --until (default: today). Weeks are processed concurrently on --jobs threads."
    )]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Examples:
  fedweek backfill --from 2013-01-07
  fedweek backfill --from 2013-01-07 --until 2013-06-17 --jobs 4")]
    Backfill {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(
            long,
            value_name = "DATE",
            value_parser = parse_date,
            help = "First run date (YYYY-MM-DD)"
        )]
        from: NaiveDate,
        #[arg(
            long,
            value_name = "DATE",
            value_parser = parse_date,
            help = "Last run date (default: today)"
        )]
        until: Option<NaiveDate>,
        #[arg(
            long,
            default_value_t = 1,
            value_name = "N",
            help = "Weeks processed concurrently"
        )]
        jobs: usize,
        #[arg(long, help = "Skip the top contributors table")]
        no_rankings: bool,
        #[arg(long, help = "Do not re-render the trend chart")]
        no_chart: bool,
    },
    #[command(about = "Re-render the trend chart from stored history")]
    Chart {
        #[command(flatten)]
        common: CommonArgs,
    },
    #[command(about = "Print the stored history series as JSON")]
    History {
        #[command(flatten)]
        common: CommonArgs,
    },
    #[command(
        about = "Generate shell completion script",
        long_about = "Generate shell completion script for your shell. Redirect output to your shell completion directory."
    )]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Examples:
  fedweek completion bash > ~/.local/share/bash-completion/completions/fedweek
  fedweek completion zsh > ~/.zsh/completions/_fedweek
  fedweek completion fish > ~/.config/fish/completions/fedweek.fish")]
    Completion {
        #[arg(value_enum, value_name = "SHELL", help = "Target shell")]
        shell: Shell,
    },
    #[command(
        about = "Generate a man page",
        long_about = "Generate a roff man page for fedweek."
    )]
    #[command(after_long_help = "Examples:
  fedweek man > fedweek.1
  fedweek man --output docs/fedweek.1")]
    Man {
        #[arg(
            long,
            value_name = "PATH",
            help = "Write man page to file (stdout when omitted)"
        )]
        output: Option<PathBuf>,
    },
}

impl CommonArgs {
    fn into_options(self, no_rankings: bool, no_chart: bool) -> run::RunOptions {
        run::RunOptions {
            root: self.root,
            config: self.config,
            fixture: self.fixture,
            log: self.log,
            no_rankings,
            no_chart,
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            common,
            date,
            no_rankings,
            no_chart,
        } => run::execute_run(run::RunCommand {
            options: common.into_options(no_rankings, no_chart),
            date,
        }),
        Commands::Backfill {
            common,
            from,
            until,
            jobs,
            no_rankings,
            no_chart,
        } => run::execute_backfill(run::BackfillCommand {
            options: common.into_options(no_rankings, no_chart),
            from,
            until,
            jobs: jobs.max(1),
        }),
        Commands::Chart { common } => run::render_chart(&common.into_options(false, false)),
        Commands::History { common } => run::show_history(&common.into_options(false, true)),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Man { output } => {
            let man = clap_mangen::Man::new(Cli::command());
            match output {
                Some(path) => {
                    let mut bytes = Vec::new();
                    man.render(&mut bytes)?;
                    fs::write(path, bytes)?;
                }
                None => {
                    man.render(&mut io::stdout())?;
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_backfill_arguments() {
        let cli = Cli::try_parse_from([
            "fedweek",
            "backfill",
            "--from",
            "2013-06-03",
            "--until",
            "2013_06_17",
            "--jobs",
            "3",
            "--fixture",
            "events.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Backfill {
                common,
                from,
                until,
                jobs,
                ..
            } => {
                assert_eq!(from, NaiveDate::from_ymd_opt(2013, 6, 3).unwrap());
                assert_eq!(until, NaiveDate::from_ymd_opt(2013, 6, 17));
                assert_eq!(jobs, 3);
                assert_eq!(common.fixture, Some(PathBuf::from("events.json")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_run_date() {
        let err = Cli::try_parse_from(["fedweek", "run", "--date", "June 17"]).unwrap_err();
        assert!(err.to_string().contains("invalid date"));
    }
}
