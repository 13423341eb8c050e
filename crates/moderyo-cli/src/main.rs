use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use moderyo_core::{
    BatchModerationResult, Client, Config, ModerationOptions, ModerationResult, ALL_CATEGORIES,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "moderyo",
    author,
    version,
    about = "Moderyo content moderation CLI"
)]
struct Cli {
    /// API key (defaults to MODERYO_API_KEY)
    #[arg(long, env = "MODERYO_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// API base URL
    #[arg(long, env = "MODERYO_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Per-attempt request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    timeout_secs: Option<u64>,

    /// Retries after the initial attempt for 5xx/connection failures
    #[arg(long, value_name = "N", global = true)]
    max_retries: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Moderate a single text (exit code 2 when the content is blocked)
    Moderate {
        text: String,
        #[command(flatten)]
        flags: ModerateFlags,
        /// Emit the full decoded result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Moderate several texts sequentially, aborting on the first failure
    Batch {
        #[arg(required = true)]
        texts: Vec<String>,
        #[command(flatten)]
        flags: ModerateFlags,
        /// Emit all decoded results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Probe the API health endpoint (exit code 1 when unhealthy)
    Health,
    /// List the 27 supported category identifiers
    Categories {
        /// Emit the identifiers as a JSON list
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone)]
struct ModerateFlags {
    /// Model override for this request
    #[arg(long)]
    model: Option<String>,

    /// Enable sentence-level long-text analysis
    #[arg(long)]
    long_text: bool,

    /// Character threshold for long-text mode
    #[arg(long, value_name = "CHARS")]
    long_text_threshold: Option<u32>,

    #[arg(long)]
    skip_profanity: bool,

    #[arg(long)]
    skip_threat: bool,

    #[arg(long)]
    skip_masked_word: bool,

    /// Policy mode: enforce or shadow
    #[arg(long)]
    mode: Option<String>,

    /// Risk profile: conservative, balanced or aggressive
    #[arg(long)]
    risk: Option<String>,

    /// Ask the service for debug output
    #[arg(long)]
    debug: bool,

    /// Player identifier forwarded for gaming integrations
    #[arg(long)]
    player_id: Option<String>,
}

impl ModerateFlags {
    fn to_options(&self) -> ModerationOptions {
        ModerationOptions {
            model: self.model.clone(),
            long_text_mode: self.long_text,
            long_text_threshold: self.long_text_threshold,
            skip_profanity: self.skip_profanity,
            skip_threat: self.skip_threat,
            skip_masked_word: self.skip_masked_word,
            mode: self.mode.clone(),
            risk: self.risk.clone(),
            debug: self.debug,
            player_id: self.player_id.clone(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Categories { json } => list_categories(*json),
        Commands::Health => {
            let client = build_client(&cli)?;
            if client.health_check().await {
                println!("ok");
            } else {
                println!("unreachable");
                std::process::exit(1);
            }
        }
        Commands::Moderate { text, flags, json } => {
            let client = build_client(&cli)?;
            let result = client
                .moderate(text, &flags.to_options())
                .await
                .context("moderation request failed")?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                render_result(&result);
            }
            if result.is_blocked() {
                std::process::exit(2);
            }
        }
        Commands::Batch { texts, flags, json } => {
            let client = build_client(&cli)?;
            let batch = client
                .moderate_batch(texts, &flags.to_options())
                .await
                .context("batch moderation failed")?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&batch)?);
            } else {
                render_batch(&batch);
            }
        }
    }
    Ok(())
}

fn build_client(cli: &Cli) -> Result<Client> {
    let Some(api_key) = cli.api_key.clone().filter(|key| !key.trim().is_empty()) else {
        bail!("an API key is required: pass --api-key or set MODERYO_API_KEY");
    };
    let mut builder = Config::builder(api_key);
    if let Some(base_url) = &cli.base_url {
        builder = builder.base_url(base_url);
    }
    if let Some(timeout_secs) = cli.timeout_secs {
        builder = builder.timeout_secs(timeout_secs);
    }
    if let Some(max_retries) = cli.max_retries {
        builder = builder.max_retries(max_retries);
    }
    let config = builder.build()?;
    tracing::debug!(
        base_url = %config.base_url,
        max_retries = config.max_retries,
        "client configured"
    );
    Ok(Client::new(config)?)
}

fn list_categories(json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&ALL_CATEGORIES).expect("static list serializes")
        );
        return;
    }
    println!("{} categories supported:", ALL_CATEGORIES.len());
    for (idx, id) in ALL_CATEGORIES.iter().enumerate() {
        println!("{:>3}. {id}", idx + 1);
    }
}

fn render_result(result: &ModerationResult) {
    println!("Flagged: {}", yes_no(result.is_flagged()));
    if let Some(pd) = &result.policy_decision {
        print!("Decision: {}", pd.decision);
        if let Some(reason) = &pd.reason {
            print!(" ({reason})");
        }
        println!();
        if let Some(severity) = &pd.severity {
            println!("Severity: {severity}");
        }
    }
    if let Some(shadow) = &result.shadow_decision {
        println!("Shadow decision: {shadow}");
    }

    let triggered = result.categories.triggered();
    if !triggered.is_empty() {
        println!("Triggered: {}", triggered.join(", "));
    }
    let highest = result.category_scores.highest_category();
    if !highest.is_empty() {
        println!(
            "Highest score: {highest} ({:.4})",
            result.category_scores.highest_score()
        );
    }
    for phrase in &result.detected_phrases {
        println!("Detected: \"{}\" [{}]", phrase.text, phrase.label);
    }
    if let Some(lta) = &result.long_text_analysis {
        println!(
            "Long text: overall {:.3}, max {:.3}, {} sentence(s)",
            lta.overall_toxicity,
            lta.max_toxicity,
            lta.sentences.len()
        );
    }
}

fn render_batch(batch: &BatchModerationResult) {
    println!("Total: {}", batch.len());
    println!("Blocked: {}", batch.blocked().len());
    println!("Flagged: {}", batch.flagged().len());
    for (idx, result) in batch.into_iter().enumerate() {
        let verdict = if result.is_blocked() {
            "BLOCKED"
        } else if result.is_flagged() {
            "FLAGGED"
        } else {
            "allowed"
        };
        println!("{:>3}. {verdict} {}", idx + 1, result.id);
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "YES"
    } else {
        "NO"
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}
