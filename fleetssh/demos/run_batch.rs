//! Run a command batch across a list of nodes
//!
//! This example reads a node list, logs into every node in parallel, runs
//! the given commands and appends one JSON record per node to a results
//! file.
//!
//! # Node list format
//!
//! One node per line, `name address`; `#` starts a comment.
//!
//! ```text
//! SIU1 10.1.6.1
//! SIU2 10.1.6.2
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --example run_batch -- --nodes nodes.txt --user admin --password secret \
//!     --command uptime --command getAlarmList --workers 8 --output results.jsonl
//! ```
//!
//! Add an elevated session after the standard one:
//! ```bash
//! cargo run --example run_batch -- --nodes nodes.txt --user admin --password secret \
//!     --command uptime --root-password rootpw --root-command "ls /var/log"
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use fleetssh::inventory::{NodeInventory, StaticInventory};
use fleetssh::{
    Credentials, Dispatcher, HostKeyVerification, Job, JsonLinesSink, SessionConfig, SessionProcessor,
    SessionSpec, SshConnector, SshOptions,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    println!("=== fleetssh batch runner ===\n");

    let text = std::fs::read_to_string(&args.nodes)?;
    let nodes = StaticInventory::parse(&text).nodes(&args.exclude);
    println!("{} node(s) from {}", nodes.len(), args.nodes.display());

    let credentials = if let Some(password) = &args.password {
        Credentials::password(&args.user, password)
    } else if let Some(key_path) = &args.key {
        Credentials::private_key(&args.user, key_path)
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    };

    let mut sessions = vec![SessionSpec::new("standard", credentials).with_commands(args.commands.clone())];
    if let Some(root_password) = &args.root_password {
        sessions.push(
            SessionSpec::new("elevated", Credentials::password("root", root_password))
                .with_commands(args.root_commands.clone()),
        );
    }
    let jobs = Job::for_nodes(nodes, &sessions);

    let mut options = SshOptions::default().port(args.port);
    if args.insecure {
        options = options.host_key_verification(HostKeyVerification::Disabled);
    }
    let config = SessionConfig::default().command_timeout(Duration::from_secs(args.timeout));
    let processor = SessionProcessor::new(SshConnector::new(options)).with_config(config);

    let mut sink = JsonLinesSink::append(&args.output)?;
    let summary = Dispatcher::new(args.workers).run(jobs, processor, &mut sink).await?;

    println!(
        "\nWrote {} of {} result(s) to {} using {} worker(s) in {:.1?}",
        summary.written,
        summary.jobs,
        args.output.display(),
        summary.workers,
        summary.elapsed
    );
    Ok(())
}

/// Simple argument parser
struct Args {
    nodes: PathBuf,
    output: PathBuf,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    commands: Vec<String>,
    root_password: Option<String>,
    root_commands: Vec<String>,
    exclude: Vec<String>,
    workers: usize,
    timeout: u64,
    insecure: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut nodes = PathBuf::from("nodes.txt");
        let mut output = PathBuf::from("results.jsonl");
        let mut port = 22u16;
        let mut user = env::var("USER").unwrap_or_else(|_| "admin".to_string());
        let mut password = None;
        let mut key = None;
        let mut commands = Vec::new();
        let mut root_password = None;
        let mut root_commands = Vec::new();
        let mut exclude = Vec::new();
        let mut workers = fleetssh::dispatch::DEFAULT_WORKERS;
        let mut timeout = 15u64;
        let mut insecure = false;

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--nodes" | "-n" => {
                    if let Some(v) = value {
                        nodes = PathBuf::from(v);
                    }
                    i += 1;
                }
                "--output" | "-o" => {
                    if let Some(v) = value {
                        output = PathBuf::from(v);
                    }
                    i += 1;
                }
                "--port" | "-p" => {
                    if let Some(v) = value {
                        port = v.parse().unwrap_or(22);
                    }
                    i += 1;
                }
                "--user" | "-u" => {
                    if let Some(v) = value {
                        user = v;
                    }
                    i += 1;
                }
                "--password" | "-P" => {
                    password = value;
                    i += 1;
                }
                "--key" | "-k" => {
                    key = value.map(PathBuf::from);
                    i += 1;
                }
                "--command" | "-c" => {
                    commands.extend(value);
                    i += 1;
                }
                "--root-password" => {
                    root_password = value;
                    i += 1;
                }
                "--root-command" => {
                    root_commands.extend(value);
                    i += 1;
                }
                "--exclude" | "-x" => {
                    exclude.extend(value);
                    i += 1;
                }
                "--workers" | "-w" => {
                    if let Some(v) = value {
                        workers = v.parse().unwrap_or(workers);
                    }
                    i += 1;
                }
                "--timeout" | "-t" => {
                    if let Some(v) = value {
                        timeout = v.parse().unwrap_or(15);
                    }
                    i += 1;
                }
                "--insecure" => insecure = true,
                "--help" => {
                    println!("Usage: run_batch [OPTIONS]");
                    println!();
                    println!("Options:");
                    println!("  -n, --nodes <FILE>          Node list [default: nodes.txt]");
                    println!("  -o, --output <FILE>         Results file [default: results.jsonl]");
                    println!("  -p, --port <PORT>           SSH port [default: 22]");
                    println!("  -u, --user <USER>           Username [default: $USER]");
                    println!("  -P, --password <PASSWORD>   Password");
                    println!("  -k, --key <PATH>            Private key path");
                    println!("  -c, --command <CMD>         Command to run (repeatable)");
                    println!("      --root-password <PW>    Also run an elevated session as root");
                    println!("      --root-command <CMD>    Command for the elevated session (repeatable)");
                    println!("  -x, --exclude <NAME>        Skip this node (repeatable)");
                    println!("  -w, --workers <N>           Parallel workers [default: 40]");
                    println!("  -t, --timeout <SECS>        Per-command timeout [default: 15]");
                    println!("      --insecure              Skip host key verification");
                    std::process::exit(0);
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            nodes,
            output,
            port,
            user,
            password,
            key,
            commands,
            root_password,
            root_commands,
            exclude,
            workers,
            timeout,
            insecure,
        }
    }
}
