use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use errslice::builts::{AttributeRecord, GroupRecord};
use errslice::config::EngineConfig;
use errslice::eval::test_one;
use errslice::instance::Dataset;
use errslice::{
    ApiResponse, Attribute, CompiledExpression, CreateOptions, EngineError, EngineResult, Group,
    RegistryContext, Value,
};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to an engine config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model whose predictions `ANCHOR` and `prediction` refer to
    #[arg(short, long)]
    model: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct DataArgs {
    /// Dataset JSON file
    #[arg(short, long)]
    data: PathBuf,

    /// Attribute definitions to load before running
    #[arg(long)]
    attrs: Option<PathBuf>,

    /// Group definitions to load before running
    #[arg(long)]
    groups: Option<PathBuf>,
}

#[derive(Args)]
struct CreateArgs {
    #[command(flatten)]
    data: DataArgs,

    #[arg(short, long)]
    name: String,

    #[arg(long, default_value = "")]
    description: String,

    /// Evaluate on at most this many instance groups
    #[arg(long)]
    test_size: Option<usize>,

    /// Recompute even when an equivalent block exists
    #[arg(long)]
    force: bool,

    cmd: String,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate an expression against one instance group
    Eval {
        #[command(flatten)]
        data: DataArgs,

        #[arg(short, long)]
        qid: String,

        cmd: String,
    },
    /// Create an attribute and print its summary
    Attr(CreateArgs),
    /// Create a group and print its summary
    Group(CreateArgs),
    /// List the registered function signatures
    Functions,
}

fn load(args: &DataArgs, ctx: &RegistryContext) -> EngineResult<Dataset> {
    let dataset = Dataset::from_file(&args.data)?;
    info!("dataset loaded: {} instance groups", dataset.len());
    ctx.load_frequencies(&dataset);
    if let Some(path) = &args.attrs {
        ctx.attributes
            .import_json(&read(path)?, &dataset, ctx)?;
    }
    if let Some(path) = &args.groups {
        ctx.groups.import_json(&read(path)?, &dataset, ctx)?;
    }
    Ok(dataset)
}

fn read(path: &Path) -> EngineResult<String> {
    Ok(std::fs::read_to_string(path)?)
}

fn options(args: &CreateArgs) -> CreateOptions {
    CreateOptions {
        test_size: args.test_size,
        force_recompute: args.force,
        ..CreateOptions::default()
    }
}

fn eval(data: &DataArgs, qid: &str, cmd: &str, ctx: &RegistryContext) -> EngineResult<Value> {
    let dataset = load(data, ctx)?;
    let expression = CompiledExpression::compile(cmd, ctx)?;
    debug!("evaluating [ {} ] on {}", expression.root, qid);
    let group = dataset
        .group(qid)
        .ok_or_else(|| EngineError::configuration(format!("unknown qid {}", qid)))?;
    Ok(test_one(&expression.root, group, ctx)?)
}

fn attr(args: &CreateArgs, ctx: &RegistryContext) -> EngineResult<AttributeRecord> {
    let dataset = load(&args.data, ctx)?;
    let attribute = Attribute::create(
        &args.name,
        &args.description,
        &args.cmd,
        &dataset,
        ctx,
        options(args),
    )?;
    Ok(attribute.serialize(&dataset, ctx, None))
}

fn group(args: &CreateArgs, ctx: &RegistryContext) -> EngineResult<GroupRecord> {
    let dataset = load(&args.data, ctx)?;
    let group = Group::create(
        &args.name,
        &args.description,
        &args.cmd,
        &dataset,
        ctx,
        options(args),
    )?;
    Ok(group.serialize(&dataset, ctx))
}

fn print<T: Serialize>(result: EngineResult<T>) -> bool {
    let response = ApiResponse::from(result);
    let ok = response.is_ok();
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: {}", e),
    }
    ok
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let owned;
    let ctx: &RegistryContext = match &cli.config {
        Some(path) => match EngineConfig::from_file(path).and_then(|c| c.validate().map(|_| c)) {
            Ok(config) => {
                info!("config loaded.");
                owned = RegistryContext::new(config);
                &owned
            }
            Err(e) => {
                print::<()>(Err(e));
                std::process::exit(1);
            }
        },
        None => RegistryContext::global(),
    };
    if cli.model.is_some() {
        ctx.set_default_model(cli.model.clone());
    }

    let ok = match &cli.command {
        Command::Eval { data, qid, cmd } => print(eval(data, qid, cmd, ctx)),
        Command::Attr(args) => print(attr(args, ctx)),
        Command::Group(args) => print(group(args, ctx)),
        Command::Functions => print::<BTreeMap<String, Vec<String>>>(Ok(ctx
            .functions
            .signatures())),
    };
    if !ok {
        std::process::exit(1);
    }
}
