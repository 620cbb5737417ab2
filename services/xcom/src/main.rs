//! Xcom command line client
//!
//! Reads and writes parameters of Studer devices through the transport
//! configured in the config file / `XCOM_` environment.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use errors::XcomError;
use tracing::{debug, error};
use xcom::{Transport, TransportFactory, XcomClient, XcomConfig};
use xcom_model::{DataType, Datapoint};
use xcom_protocol::{PropertyId, QspLevel, Value, ERROR_CODES};

/// Studer Xcom protocol client
#[derive(Parser, Debug)]
#[command(name = "xcom")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (yaml, toml or json)
    #[arg(short, long, global = true, env = "XCOM_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Print readings as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Addressing options shared by read and write
#[derive(clap::Args, Debug)]
struct Target {
    /// Parameter id or symbolic name (e.g. 3011 or AC_VOLTAGE_IN)
    key: String,

    /// Value type, required for ids missing from the parameter table
    #[arg(short = 't', long = "type")]
    data_type: Option<DataType>,

    /// Destination address (default from the session config)
    #[arg(short, long)]
    dst: Option<u32>,

    /// Property (VALUE, MIN, MAX, LEVEL, UNSAVED_VALUE or a number)
    #[arg(short, long, default_value = "UNSAVED_VALUE")]
    property: PropertyId,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read a parameter or info value
    Read(Target),

    /// Write a parameter
    Write {
        #[command(flatten)]
        target: Target,

        /// New value, parsed according to the parameter type
        value: String,
    },

    /// Show or change the access level of a parameter
    Level {
        /// Parameter id or symbolic name
        key: String,

        /// New level (VIEW_ONLY, BASIC, EXPERT, INSTALLER, QSP); omit to show it
        level: Option<QspLevel>,

        /// Destination address (default from the session config)
        #[arg(short, long)]
        dst: Option<u32>,
    },

    /// List the known parameter table
    List,

    /// List the device error codes
    Errors,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::List => {
            print_table();
            return Ok(());
        },
        Commands::Errors => {
            print_error_codes();
            return Ok(());
        },
        Commands::Read(_) | Commands::Write { .. } | Commands::Level { .. } => {},
    }

    let mut config =
        XcomConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.no_color {
        config.logging.ansi = false;
    }
    let _guard = common::init_logging(&config.logging)?;
    debug!(?config, "Configuration loaded");

    let transport = TransportFactory::create(&config.transport).await?;
    let client = XcomClient::new(transport, config.session.clone());

    let result = run(&client, cli.command, cli.json).await;
    if let Err(e) = client.close().await {
        error!("Failed to close transport: {e}");
    }
    result
}

async fn run<T: Transport>(client: &XcomClient<T>, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Read(target) => {
            let point = resolve(client, &target)?;
            let dst = target.dst.unwrap_or(client.session().dst_addr);
            let value = client
                .read_parameter(point.id, point.data_type, dst, target.property)
                .await
                .with_context(|| format!("reading {}", describe(&point)))?;
            if json {
                print_json(client, &point, &value)?;
            } else {
                print_value(client, &point, &value);
            }
        },
        Commands::Write { target, value } => {
            let point = resolve(client, &target)?;
            if !point.writable {
                return Err(XcomError::ReadOnlyParameter(point.id).into());
            }
            let value = Value::parse(point.data_type, &value)?;
            let dst = target.dst.unwrap_or(client.session().dst_addr);
            client
                .write_parameter(point.id, point.data_type, &value, dst, target.property)
                .await
                .with_context(|| format!("writing {}", describe(&point)))?;
            println!("{} <- {value}", describe(&point));
        },
        Commands::Level { key, level, dst } => {
            let point = client.dataset().resolve(&key)?.clone();
            let dst = dst.unwrap_or(client.session().dst_addr);
            match level {
                Some(level) => {
                    client
                        .set_level(point.id, level, dst)
                        .await
                        .with_context(|| format!("setting level of {}", describe(&point)))?;
                    println!("{} level <- {level}", describe(&point));
                },
                None => {
                    let level = client
                        .read_level(point.id, dst)
                        .await
                        .with_context(|| format!("reading level of {}", describe(&point)))?;
                    println!("{} level = {level}", describe(&point));
                },
            }
        },
        Commands::List | Commands::Errors => {},
    }
    Ok(())
}

/// Table entry for the key, or an anonymous point when `--type` is given
fn resolve<T: Transport>(client: &XcomClient<T>, target: &Target) -> Result<Datapoint> {
    match (client.dataset().resolve(&target.key), target.data_type) {
        (Ok(point), None) => Ok(point.clone()),
        (Ok(point), Some(data_type)) => Ok(Datapoint {
            data_type,
            ..point.clone()
        }),
        (Err(e), Some(data_type)) => match target.key.trim().parse::<u32>() {
            Ok(id) => Ok(Datapoint::anonymous(id, data_type)),
            Err(_) => Err(e.into()),
        },
        (Err(e), None) => {
            Err(anyhow::Error::from(e).context("use --type to read an id missing from the table"))
        },
    }
}

fn describe(point: &Datapoint) -> String {
    if point.name.is_empty() {
        point.id.to_string()
    } else {
        format!("{} ({})", point.name, point.id)
    }
}

fn print_value<T: Transport>(client: &XcomClient<T>, point: &Datapoint, value: &Value) {
    let mut line = format!("{} = {value}", describe(point));
    if let Some(unit) = &point.unit {
        line.push(' ');
        line.push_str(unit);
    }
    if let Some(label) = client.enum_label(point, value) {
        line.push_str(&format!(" [{}]", label.label));
    }
    println!("{line}");
}

fn print_json<T: Transport>(client: &XcomClient<T>, point: &Datapoint, value: &Value) -> Result<()> {
    let reading = serde_json::json!({
        "id": point.id,
        "name": point.name,
        "type": point.data_type,
        "value": value,
        "unit": point.unit,
        "label": client.enum_label(point, value).map(|t| t.label),
    });
    println!("{}", serde_json::to_string(&reading)?);
    Ok(())
}

fn print_table() {
    let dataset = xcom_model::Dataset::standard();
    println!("{:>6}  {:<28} {:<11} {:<5} access", "id", "name", "type", "unit");
    for point in dataset.iter() {
        println!(
            "{:>6}  {:<28} {:<11} {:<5} {}",
            point.id,
            point.name,
            point.data_type.as_str(),
            point.unit.as_deref().unwrap_or("-"),
            if point.writable { "rw" } else { "ro" }
        );
    }
}

fn print_error_codes() {
    for entry in ERROR_CODES {
        println!("0x{:04X}  {}", entry.code, entry.label);
    }
}
