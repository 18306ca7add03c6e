use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use phoneclaw_lib::agent_engine::PhoneAgent;
use phoneclaw_lib::config::{load_config, AgentMode, AppConfig, Lang, ProviderEntry};
use phoneclaw_lib::device::adb::{self, AdbDevice};
use phoneclaw_lib::device::apps::supported_apps;
use phoneclaw_lib::errors::{PhoneClawError, PhoneClawResult};
use phoneclaw_lib::executor::safety::{AutoInteraction, ConsoleInteraction, Interaction};
use phoneclaw_lib::{build_agent, init_tracing};

#[derive(Parser, Debug)]
#[command(name = "phoneclaw", version)]
#[command(about = "Operate an Android phone with vision-language models")]
struct Cli {
    /// Task to run. Starts an interactive prompt when omitted.
    task: Vec<String>,

    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Overrides the active provider's API base.
    #[arg(long, env = "PHONECLAW_BASE_URL")]
    base_url: Option<String>,

    /// Overrides the active provider's model.
    #[arg(long, env = "PHONECLAW_MODEL")]
    model: Option<String>,

    #[arg(long, env = "PHONECLAW_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long)]
    max_steps: Option<u32>,

    #[arg(long, short = 'd', env = "PHONECLAW_DEVICE_ID")]
    device_id: Option<String>,

    #[arg(long, value_enum)]
    lang: Option<Lang>,

    #[arg(long, value_enum)]
    mode: Option<AgentMode>,

    /// Hide streamed model reasoning and per-step details.
    #[arg(long, short)]
    quiet: bool,

    #[arg(long)]
    list_apps: bool,

    #[arg(long)]
    list_devices: bool,

    /// Connect to a device over TCP/IP, e.g. 192.168.1.20:5555.
    #[arg(long, value_name = "ADDR")]
    connect: Option<String>,

    #[arg(long, value_name = "ADDR")]
    disconnect: Option<String>,

    /// Approve sensitive operations and skip takeover prompts.
    #[arg(long, short)]
    yes: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        let active = config.llm.active_provider.clone();
        let needs_entry = self.base_url.is_some() || self.model.is_some() || self.api_key.is_some();
        if needs_entry {
            let entry = config
                .llm
                .providers
                .entry(active)
                .or_insert_with(ProviderEntry::default);
            if let Some(url) = &self.base_url {
                entry.api_base = url.clone();
            }
            if let Some(model) = &self.model {
                entry.model = model.clone();
            }
            if let Some(key) = &self.api_key {
                entry.api_key = Some(key.clone());
            }
        }
        if let Some(steps) = self.max_steps {
            config.agent.max_steps = steps;
        }
        if let Some(id) = self.device_id.as_ref().filter(|id| !id.is_empty()) {
            config.agent.device_id = Some(id.clone());
        }
        if let Some(lang) = self.lang {
            config.agent.lang = lang;
        }
        if let Some(mode) = self.mode {
            config.agent.mode = mode;
        }
        if self.quiet {
            config.agent.verbose = false;
        }
        if self.yes {
            config.agent.auto_confirm = true;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut config);

    let _log_guard = match init_tracing(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("❌ could not set up logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "phoneclaw failed");
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: AppConfig) -> PhoneClawResult<()> {
    config.validate()?;

    if cli.list_apps {
        println!("Supported apps:");
        for app in supported_apps() {
            println!("  - {app}");
        }
        return Ok(());
    }
    if cli.list_devices {
        let devices = adb::list_devices().await?;
        if devices.is_empty() {
            println!("No devices connected.");
        }
        for id in devices {
            println!("  {id}");
        }
        return Ok(());
    }
    if let Some(addr) = &cli.connect {
        println!("{}", adb::connect(addr).await?);
        return Ok(());
    }
    if let Some(addr) = &cli.disconnect {
        println!("{}", adb::disconnect(addr).await?);
        return Ok(());
    }

    let device = Arc::new(
        AdbDevice::new(config.agent.device_id.clone())
            .with_command_timeout(Duration::from_secs(config.agent.device_timeout_secs)),
    );
    preflight(&device).await?;

    let interaction: Arc<dyn Interaction> = if config.agent.auto_confirm {
        Arc::new(AutoInteraction)
    } else {
        Arc::new(ConsoleInteraction)
    };

    let sink = if config.agent.verbose {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
        });
        Some(tx)
    } else {
        None
    };

    let mut agent = build_agent(&config, device, interaction, sink)?;
    print_banner(&config);

    let task = cli.task.join(" ");
    if !task.trim().is_empty() {
        println!("\nTask: {task}\n");
        let result = run_task(&mut agent, &task).await;
        println!("\nResult: {result}");
        return Ok(());
    }

    println!("\nEntering interactive mode. Type 'quit' to exit.\n");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("Enter your task: ");
        let _ = std::io::stdout().flush();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            println!("Goodbye!");
            break;
        }
        println!();
        let result = run_task(&mut agent, input).await;
        println!("\nResult: {result}\n");
    }
    Ok(())
}

/// Runs one task with Ctrl-C wired to the agent's cancellation token.
async fn run_task(agent: &mut PhoneAgent, task: &str) -> String {
    agent.reset();
    let token = agent.cancellation_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling task");
            token.cancel();
        }
    });
    let result = agent.run(task).await;
    watcher.abort();
    result
}

async fn preflight(device: &AdbDevice) -> PhoneClawResult<()> {
    let devices = adb::list_devices().await?;
    if devices.is_empty() {
        return Err(PhoneClawError::Device(
            "no devices connected, check `adb devices`".into(),
        ));
    }
    if let Some(id) = device.device_id() {
        if !devices.iter().any(|d| d == id) {
            tracing::warn!(device = id, connected = ?devices, "configured device is not listed");
        }
    }
    if !device.has_adb_keyboard().await {
        eprintln!("❌ ADB Keyboard is not installed on the device.");
        eprintln!("  1. Download ADBKeyboard.apk from https://github.com/senzhk/ADBKeyBoard");
        eprintln!("  2. Install it: adb install ADBKeyboard.apk");
        eprintln!("  3. Enable it under Settings > System > Languages & Input > Virtual Keyboard");
        return Err(PhoneClawError::Device("ADB Keyboard missing".into()));
    }
    Ok(())
}

fn print_banner(config: &AppConfig) {
    let rule = "=".repeat(49);
    let provider = config.llm.providers.get(&config.llm.active_provider);
    println!("{rule}");
    println!("PhoneClaw - phone automation agent");
    println!("{rule}");
    println!("Provider: {}", config.llm.active_provider);
    if let Some(entry) = provider {
        println!("Model: {}", entry.model);
        println!("Base URL: {}", entry.api_base);
    }
    println!("Mode: {}", config.agent.mode);
    println!("Max Steps: {}", config.agent.max_steps);
    println!("Language: {}", config.agent.lang.as_str());
    println!(
        "Device: {}",
        config.agent.device_id.as_deref().unwrap_or("(default)")
    );
    println!("{rule}");
}
