use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use viral_script::{
    ai, config, AiConfig, ChannelType, ClaudeClient, FileStore, GeminiClient, HistoryStore,
    KeyValueStore, OpenAIClient, Provider, VideoConfig, VideoLength, Workflow, WorkflowMode,
    WorkflowStep,
};

mod app;
mod cli;
mod handler;
mod tui;
mod ui;

use app::App;
use cli::{Cli, Commands, ConfigAction, HistoryAction, RunArgs};
use tui::EventHandler;

const LOG_FILE: &str = "viral-script.log";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = config::data_dir(cli.data_dir)?;
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&data_dir));

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => {
            init_file_logging(&data_dir)?;
            run_tui(store).await
        }
        Commands::Config { action } => {
            init_stderr_logging();
            run_config(store.as_ref(), action, &data_dir)
        }
        Commands::History { action } => {
            init_stderr_logging();
            run_history(store, action)
        }
        Commands::Run(args) => {
            init_stderr_logging();
            run_headless(store, args).await
        }
    }
}

fn log_builder() -> env_logger::Builder {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
}

/// The TUI owns the terminal, so logs go to a file in the data directory.
fn init_file_logging(data_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Could not create {}", data_dir.display()))?;
    let path = data_dir.join(LOG_FILE);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Could not open log file {}", path.display()))?;

    log_builder()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn init_stderr_logging() {
    log_builder().target(env_logger::Target::Stderr).init();
}

async fn run_tui(store: Arc<dyn KeyValueStore>) -> Result<()> {
    let mut app = App::new(store)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let tx = events.sender();

    log::info!("tui started with provider {}", app.config.provider);

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            let Some(event) = events.next().await else {
                break;
            };
            handler::handle_event(&mut app, event, &tx)?;
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

fn known_models(provider: Provider) -> Vec<String> {
    match provider {
        Provider::Gemini => GeminiClient::list_models(),
        Provider::OpenAI => OpenAIClient::list_models(),
        Provider::Claude => ClaudeClient::list_models(),
    }
}

fn run_config(store: &dyn KeyValueStore, action: ConfigAction, data_dir: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = AiConfig::load_with_env(store)?;
            println!("provider: {} ({})", config.provider.display_name(), config.provider);
            println!("model:    {}", config.model_or_default());
            match config.key_source() {
                Some(source) if config.api_key.is_empty() => {
                    println!("api key:  {} ({})", source.label(), config.provider.env_var());
                }
                Some(source) => println!("api key:  {} ({})", config.masked_key(), source.label()),
                None => println!(
                    "api key:  not set (get one at {} or set {})",
                    config.provider.key_url(),
                    config.provider.env_var()
                ),
            }
            println!("models:   {}", known_models(config.provider).join(", "));
            println!("data dir: {}", data_dir.display());
        }
        ConfigAction::Set { provider, api_key, model } => {
            let provider = Provider::from_str(&provider)
                .ok_or_else(|| anyhow!("unknown provider '{}' (expected gemini, openai or claude)", provider))?;
            let mut config = AiConfig::load(store)?;
            config.set_provider(provider, api_key.as_deref());
            if let Some(model) = model {
                let model = model.trim();
                config.model = (!model.is_empty()).then(|| model.to_string());
            }
            config.save(store)?;
            println!("saved: {} / {}", provider.display_name(), config.model_or_default());
        }
    }
    Ok(())
}

fn run_history(store: Arc<dyn KeyValueStore>, action: HistoryAction) -> Result<()> {
    let mut history = HistoryStore::load(store)?;
    match action {
        HistoryAction::List => {
            if history.is_empty() {
                println!("no saved scripts");
            }
            for item in history.items() {
                println!("{}  {}  {}", item.id, item.date, item.topic);
            }
        }
        HistoryAction::Show { id } => {
            let item = history
                .get(&id)
                .ok_or_else(|| anyhow!("no saved script with id {}", id))?;
            println!("# {}\n{}\n", item.topic, item.date);
            println!("## 분석\n{}\n", item.analysis);
            println!("## 대본\n{}", item.script);
        }
        HistoryAction::Remove { id } => {
            if !history.remove(&id)? {
                bail!("no saved script with id {}", id);
            }
            println!("removed {}", id);
        }
        HistoryAction::Clear => {
            let count = history.len();
            history.clear()?;
            println!("removed {} scripts", count);
        }
    }
    Ok(())
}

fn read_transcript(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Could not read transcript from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(source).with_context(|| format!("Could not read transcript {}", source))
}

fn parse_video_config(args: &RunArgs) -> Result<VideoConfig> {
    let channel_type = match &args.channel {
        Some(s) => ChannelType::parse(s)
            .ok_or_else(|| anyhow!("unknown channel '{}' (expected 썰채널, 야담, 건강 or 부동산)", s))?,
        None => ChannelType::default(),
    };
    let video_length = match &args.length {
        Some(s) => VideoLength::parse(s)
            .ok_or_else(|| anyhow!("unknown length '{}' (expected 쇼츠, 10분 이내 or 30분)", s))?,
        None => VideoLength::default(),
    };
    Ok(VideoConfig { channel_type, video_length })
}

/// `pick` is 1-based.
fn pick_topic(topics: &[String], pick: usize) -> Result<String> {
    pick.checked_sub(1)
        .and_then(|i| topics.get(i))
        .cloned()
        .ok_or_else(|| anyhow!("--pick {} is out of range (1-{})", pick, topics.len()))
}

/// Analyze, pick a topic and generate without the TUI.
async fn run_headless(store: Arc<dyn KeyValueStore>, args: RunArgs) -> Result<()> {
    let config = AiConfig::load_with_env(store.as_ref())?;
    let mut history = HistoryStore::load(store)?;
    let client = ai::create_client(&config);

    let mode = if args.single {
        WorkflowMode::SingleCall
    } else {
        WorkflowMode::TwoStep
    };
    let mut workflow = Workflow::new(mode);
    workflow.transcript = read_transcript(&args.transcript)?;
    workflow.video = Some(parse_video_config(&args)?);

    let topic = if mode == WorkflowMode::SingleCall {
        args.topic.clone().unwrap_or_default()
    } else {
        workflow.analyze(client.as_ref(), &config).await?;
        if workflow.step() != WorkflowStep::TopicSelection {
            bail!("{}", workflow.error().unwrap_or("analysis failed"));
        }

        println!("## 떡상 요인 분석\n{}\n", workflow.analysis_summary().unwrap_or_default());
        println!("## 추천 주제");
        for (i, topic) in workflow.suggested_topics().iter().enumerate() {
            println!("{}. {}", i + 1, topic);
        }
        println!();

        match &args.topic {
            Some(topic) => topic.clone(),
            None => pick_topic(workflow.suggested_topics(), args.pick)?,
        }
    };

    workflow
        .generate(&topic, client.as_ref(), &config, &mut history)
        .await?;
    if workflow.step() != WorkflowStep::Result {
        bail!("{}", workflow.error().unwrap_or("generation failed"));
    }
    if let Some(warning) = workflow.error() {
        eprintln!("warning: {}", warning);
    }

    if mode == WorkflowMode::SingleCall {
        println!("## 떡상 요인 분석\n{}\n", workflow.analysis_summary().unwrap_or_default());
    }
    println!("## 새 대본: {}\n{}", workflow.selected_topic(), workflow.final_script().unwrap_or_default());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> Vec<String> {
        vec!["t1".to_string(), "t2".to_string(), "t3".to_string()]
    }

    #[test]
    fn test_pick_topic_is_one_based() {
        assert_eq!(pick_topic(&topics(), 1).unwrap(), "t1");
        assert_eq!(pick_topic(&topics(), 3).unwrap(), "t3");
    }

    #[test]
    fn test_pick_topic_out_of_range() {
        let err = pick_topic(&topics(), 0).unwrap_err();
        assert_eq!(err.to_string(), "--pick 0 is out of range (1-3)");
        assert!(pick_topic(&topics(), 4).is_err());
        assert!(pick_topic(&[], 1).is_err());
    }
}
