// tdlab command-line interface
// Train, replay and tune tabular agents on the bundled environments

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use tdlab_agent::{
    build_agent, play, train, AgentConfig, AgentKind, Checkpoint, MemorySink, RandomSearch,
    SearchSettings, TabularAgent, Tee, TracingSink,
};
use tdlab_core::VectorObservation;
use tdlab_env::{make_env, EnvConfig, EnvRegistry};

mod logging;

use logging::{init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "tdlab")]
#[command(about = "Tabular temporal-difference agents", version)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EnvArgs {
    /// Registered environment name
    #[arg(short, long, default_value = "CliffWalking")]
    env: String,

    /// Seed of the environment and the agent
    #[arg(long)]
    seed: Option<u64>,

    /// Override the environment's time limit
    #[arg(long)]
    max_steps: Option<usize>,
}

impl EnvArgs {
    fn config(&self) -> EnvConfig {
        EnvConfig {
            seed: self.seed,
            max_steps: self.max_steps,
            ..EnvConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Train an agent
    Train {
        #[command(flatten)]
        env: EnvArgs,

        /// Agent family (td0, tdn, td_lambda, monte_carlo)
        #[arg(short, long)]
        agent: Option<AgentKind>,

        /// JSON agent configuration; defaults to the preset for the environment
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of training episodes
        #[arg(long, default_value = "500")]
        episodes: usize,

        /// Greedy episodes to play after training
        #[arg(long = "play", default_value = "0")]
        play_episodes: usize,

        /// Write a checkpoint here after training
        #[arg(long)]
        save: Option<PathBuf>,

        /// Trailing episodes summarized at the end
        #[arg(long, default_value = "100")]
        window: usize,
    },

    /// Play greedy episodes from a checkpoint
    Play {
        #[command(flatten)]
        env: EnvArgs,

        /// Checkpoint written by `train --save`
        #[arg(long)]
        checkpoint: PathBuf,

        /// Number of episodes
        #[arg(long, default_value = "10")]
        episodes: usize,
    },

    /// Random hyperparameter search
    Search {
        #[command(flatten)]
        env: EnvArgs,

        /// Agent family to tune
        #[arg(short, long, default_value = "td0")]
        agent: AgentKind,

        /// Sampled configurations
        #[arg(long, default_value = "20")]
        trials: usize,

        /// Training episodes per trial
        #[arg(long, default_value = "200")]
        episodes: usize,

        /// Trailing episodes averaged into a trial's score
        #[arg(long, default_value = "20")]
        eval_window: usize,

        /// Write every trial as JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List environments and agent families
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format, Level::INFO);

    match cli.command {
        Commands::Train {
            env,
            agent,
            config,
            episodes,
            play_episodes,
            save,
            window,
        } => {
            let config = resolve_config(agent, config.as_deref(), &env.env).await?;
            run_train(&env, &config, episodes, play_episodes, save.as_deref(), window).await?;
        }

        Commands::Play {
            env,
            checkpoint,
            episodes,
        } => {
            run_play(&env, &checkpoint, episodes).await?;
        }

        Commands::Search {
            env,
            agent,
            trials,
            episodes,
            eval_window,
            output,
        } => {
            let settings = SearchSettings {
                trials,
                episodes,
                eval_window,
                seed: env.seed,
            };
            run_search(&env, agent, settings, output.as_deref()).await?;
        }

        Commands::List => {
            println!("Environments:");
            for name in EnvRegistry::default().list() {
                println!("   {name}");
            }
            println!("Agents:");
            for kind in AgentKind::ALL {
                println!("   {kind}");
            }
        }
    }

    Ok(())
}

/// Config file if given, else the preset of `agent` (TD(0) by default) for `env`
async fn resolve_config(
    agent: Option<AgentKind>,
    path: Option<&Path>,
    env: &str,
) -> Result<AgentConfig> {
    let Some(path) = path else {
        return Ok(AgentConfig::best_for(agent.unwrap_or(AgentKind::Td0), env));
    };

    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let config = AgentConfig::from_json(&json)
        .with_context(|| format!("parsing agent config {}", path.display()))?;
    if let Some(kind) = agent {
        if kind != config.kind() {
            bail!("--agent {kind} contradicts the {} config in {}", config.kind(), path.display());
        }
    }
    Ok(config)
}

async fn run_train(
    env_args: &EnvArgs,
    config: &AgentConfig,
    episodes: usize,
    play_episodes: usize,
    save: Option<&Path>,
    window: usize,
) -> Result<()> {
    let (mut env, discretizer) = make_env(&env_args.env, &env_args.config())
        .with_context(|| format!("creating environment {}", env_args.env))?
        .into_parts();
    let nb_actions = env.action_space().n;
    let mut agent = build_agent::<VectorObservation>(config, discretizer, nb_actions, env_args.seed)
        .context("building agent")?;

    info!(agent = %config.kind(), env = %env_args.env, episodes, "training");
    let mut tracing_sink = TracingSink::new(agent.name());
    let mut trained = MemorySink::new();
    train(
        agent.as_mut(),
        env.as_mut(),
        episodes,
        &mut Tee::new(&mut tracing_sink, &mut trained),
    )
    .await
    .context("training failed")?;
    summarize("train", &trained, window);

    if let Some(path) = save {
        agent
            .save(path)
            .await
            .with_context(|| format!("writing checkpoint {}", path.display()))?;
        info!(path = %path.display(), "checkpoint saved");
    }

    if play_episodes > 0 {
        let mut played = MemorySink::new();
        play(
            agent.as_mut(),
            env.as_mut(),
            play_episodes,
            &mut Tee::new(&mut tracing_sink, &mut played),
        )
        .await
        .context("greedy play failed")?;
        summarize("play", &played, play_episodes);
    }

    env.close().await?;
    Ok(())
}

async fn run_play(env_args: &EnvArgs, checkpoint: &Path, episodes: usize) -> Result<()> {
    let json = tokio::fs::read_to_string(checkpoint)
        .await
        .with_context(|| format!("reading {}", checkpoint.display()))?;
    let saved: Checkpoint = serde_json::from_str(&json)
        .with_context(|| format!("parsing checkpoint {}", checkpoint.display()))?;

    let (mut env, discretizer) = make_env(&env_args.env, &env_args.config())
        .with_context(|| format!("creating environment {}", env_args.env))?
        .into_parts();
    let nb_actions = env.action_space().n;
    let mut agent =
        build_agent::<VectorObservation>(&saved.config, discretizer, nb_actions, env_args.seed)
            .context("building agent")?;
    agent
        .load(checkpoint)
        .await
        .with_context(|| format!("checkpoint does not fit {}", env_args.env))?;

    info!(agent = %saved.config.kind(), episode = saved.episode_id, "playing");
    let mut tracing_sink = TracingSink::new(agent.name());
    let mut played = MemorySink::new();
    play(
        agent.as_mut(),
        env.as_mut(),
        episodes,
        &mut Tee::new(&mut tracing_sink, &mut played),
    )
    .await
    .context("greedy play failed")?;
    summarize("play", &played, episodes);

    env.close().await?;
    Ok(())
}

async fn run_search(
    env_args: &EnvArgs,
    agent: AgentKind,
    settings: SearchSettings,
    output: Option<&Path>,
) -> Result<()> {
    let search = RandomSearch::new(agent, settings)?;
    let env_config = env_args.config();
    info!(agent = %agent, env = %env_args.env, trials = settings.trials, "searching");

    let results = search
        .run(|| Ok(make_env(&env_args.env, &env_config)?.into_parts()))
        .await
        .context("search failed")?;

    for (rank, trial) in results.iter().enumerate().take(5) {
        println!(
            "#{} mean {:.3} std {:.3} [{}]",
            rank + 1,
            trial.mean_score,
            trial.std_score,
            trial.id
        );
        println!("   {}", serde_json::to_string(&trial.config)?);
    }

    if let Some(path) = output {
        tokio::fs::write(path, serde_json::to_string_pretty(&results)?)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "search results saved");
    }
    Ok(())
}

fn summarize(label: &str, sink: &MemorySink, window: usize) {
    let Some((mean, std)) = sink.score_summary(window) else {
        println!("{label}: no episodes");
        return;
    };
    let total = sink.reports().len();
    println!(
        "{label}: {total} episodes, mean score {mean:.3} (std {std:.3}) over the last {}",
        window.min(total)
    );
}
