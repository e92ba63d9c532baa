use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "viral-script")]
#[command(about = "Analyze a viral video transcript and rewrite it for a new topic")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory for config, history and log files
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the TUI (default)
    Tui,

    /// Show or change the AI provider settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Inspect or edit saved scripts
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Analyze a transcript and generate a script without the TUI
    Run(RunArgs),
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the current provider, model and key status
    Show,
    /// Select a provider and optionally store its key and model
    Set {
        /// gemini, openai or claude
        #[arg(short, long)]
        provider: String,

        #[arg(short = 'k', long)]
        api_key: Option<String>,

        /// Override the provider's default model
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List saved scripts, newest first
    List,
    /// Print one saved script
    Show { id: String },
    /// Delete one saved script
    Remove { id: String },
    /// Delete all saved scripts
    Clear,
}

#[derive(Args)]
pub struct RunArgs {
    /// Transcript file, or `-` for stdin
    #[arg(short, long)]
    pub transcript: String,

    /// 썰채널, 야담, 건강 or 부동산
    #[arg(short, long)]
    pub channel: Option<String>,

    /// 쇼츠, "10분 이내" or 30분
    #[arg(short, long)]
    pub length: Option<String>,

    /// Write about this topic instead of a suggested one
    #[arg(long, conflicts_with = "pick")]
    pub topic: Option<String>,

    /// Use the n-th suggested topic (1-based)
    #[arg(long, default_value = "1")]
    pub pick: usize,

    /// One combined request instead of analyze + generate (requires --topic)
    #[arg(long, requires = "topic")]
    pub single: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_tui() {
        let cli = Cli::parse_from(["viral-script"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::parse_from([
            "viral-script",
            "run",
            "--transcript",
            "-",
            "--channel",
            "건강",
            "--pick",
            "2",
        ]);
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.transcript, "-");
                assert_eq!(args.channel.as_deref(), Some("건강"));
                assert_eq!(args.pick, 2);
                assert!(!args.single);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_single_requires_topic() {
        let result = Cli::try_parse_from(["viral-script", "run", "-t", "a.txt", "--single"]);
        assert!(result.is_err());
    }
}
