use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::Context;
use clap::{Parser, Subcommand};
use http::{HeaderName, HeaderValue};
use warden_api::{AuthenticationProperties, RequestContext};
use warden_core::{
    CONFIG_FILE_NAME, WardenConfig, default_config_dir, demo_config, load_config_from_dir,
    write_default_config_files,
};
use warden_runtime::WardenRuntime;

#[derive(Debug, Parser)]
#[command(name = "warden", about = "Warden CLI: inspect and exercise authentication policies")]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Load the configuration and build every handler
    Validate,
    Schemes {
        #[command(subcommand)]
        command: ListCommands,
    },
    Policies {
        #[command(subcommand)]
        command: ListCommands,
    },
    /// Run a policy against a synthetic request
    Check {
        #[arg(long)]
        policy: String,
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(HeaderName, HeaderValue)>,
        #[arg(long, default_value = "/")]
        path: String,
        #[arg(long)]
        https: bool,
    },
    /// Print the Set-Cookie header a remote sign-in would emit
    CorrelationCookie {
        #[arg(long)]
        scheme: String,
        #[arg(long, default_value = "")]
        path_base: String,
        #[arg(long)]
        https: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ListCommands {
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);

    if let Commands::Init { force } = cli.command {
        let path = cfg_dir.join(CONFIG_FILE_NAME);
        if force && path.exists() {
            fs::remove_file(&path)?;
        }
        write_default_config_files(&cfg_dir)?;
        return pout(
            cli.json,
            serde_json::json!({"message":"init complete","config_dir":cfg_dir}),
            "Init complete",
        );
    }

    let config = load_config(&cfg_dir)?;

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Validate => {
            let runtime = WardenRuntime::from_config(config)?;
            let config = runtime.config();
            pout(
                cli.json,
                serde_json::json!({
                    "ok": true,
                    "schemes": config.schemes.keys().collect::<Vec<_>>(),
                    "policies": config.policies.keys().collect::<Vec<_>>(),
                    "remote": config.remote.keys().collect::<Vec<_>>(),
                }),
                &format!(
                    "Configuration valid: {} schemes, {} policies, {} remote schemes",
                    config.schemes.len(),
                    config.policies.len(),
                    config.remote.len()
                ),
            )?;
        }
        Commands::Schemes {
            command: ListCommands::List,
        } => {
            let schemes: Vec<_> = config
                .schemes
                .values()
                .map(|s| serde_json::json!({"name": s.name, "kind": s.kind}))
                .collect();
            let names: Vec<_> = config.schemes.keys().map(String::as_str).collect();
            pout(cli.json, serde_json::to_value(schemes)?, &names.join("\n"))?;
        }
        Commands::Policies {
            command: ListCommands::List,
        } => {
            let policies: Vec<_> = config
                .policies
                .iter()
                .map(|(name, p)| serde_json::json!({"name": name, "policy": p.to_policy()}))
                .collect();
            let names: Vec<_> = config.policies.keys().map(String::as_str).collect();
            pout(cli.json, serde_json::to_value(policies)?, &names.join("\n"))?;
        }
        Commands::Check {
            policy,
            headers,
            path,
            https,
        } => {
            let runtime = WardenRuntime::from_config(config)?;
            let mut ctx = RequestContext::new(path).with_https(https);
            for (name, value) in headers {
                ctx = ctx.with_header(name, value);
            }

            let check = runtime.check(&policy, &mut ctx).await?;
            let text = format!(
                "{policy}: {:?} (user: {})",
                check.authorization.action(),
                ctx.user.name().unwrap_or("anonymous")
            );
            let mut value = serde_json::to_value(&check)?;
            value["status"] = serde_json::json!(
                check.authorization.status_hint().map(|s| s.as_u16())
            );
            pout(cli.json, value, &text)?;
        }
        Commands::CorrelationCookie {
            scheme,
            path_base,
            https,
        } => {
            let runtime = WardenRuntime::from_config(config)?;
            let options = runtime.remote(&scheme)?;
            let mut ctx = RequestContext::new(options.callback_path.clone())
                .with_path_base(path_base)
                .with_https(https);
            let mut properties = AuthenticationProperties::default();
            let correlation_id = options.generate_correlation_id(
                &scheme,
                &mut ctx,
                &mut properties,
                SystemTime::now(),
            )?;
            let set_cookie = ctx
                .response_cookies()
                .first()
                .cloned()
                .context("no correlation cookie was emitted")?;
            pout(
                cli.json,
                serde_json::json!({"correlation_id": correlation_id, "set_cookie": set_cookie}),
                &format!("Set-Cookie: {set_cookie}"),
            )?;
        }
    }

    Ok(())
}

/// Configured file when present, the built-in demo otherwise.
fn load_config(cfg_dir: &std::path::Path) -> anyhow::Result<WardenConfig> {
    if cfg_dir.join(CONFIG_FILE_NAME).exists() {
        Ok(load_config_from_dir(cfg_dir)?)
    } else {
        Ok(demo_config())
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_header(s: &str) -> Result<(HeaderName, HeaderValue), String> {
    let pos = s.find(':').ok_or_else(|| "must be NAME:VALUE".to_string())?;
    let name = HeaderName::from_bytes(s[..pos].trim().as_bytes()).map_err(|e| e.to_string())?;
    let value = HeaderValue::from_str(s[pos + 1..].trim()).map_err(|e| e.to_string())?;
    Ok((name, value))
}

pub fn pout(json_mode: bool, value: serde_json::Value, text: &str) -> anyhow::Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}
