use anyhow::bail;
use clap::{ArgAction, Parser};
use itemcheck::{
    DispatchResult, Dispatcher,
    config::{AgentConfig, read_config_file},
    item_key::make_key,
};
use tracing::{level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(name = "itemcheck")]
#[command(about = "Run monitoring item checks from the command line", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Test a complete item key, e.g. `net.tcp.port[127.0.0.1,80]`
    #[arg(short, long, value_name = "KEY", conflicts_with_all = ["print", "metric"])]
    test: Option<String>,

    /// Test every supported item with default parameters
    #[arg(short, long, conflicts_with = "metric")]
    print: bool,

    /// Increase log verbosity
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Metric key
    metric: Option<String>,

    /// Metric parameters
    params: Vec<String>,
}

fn init(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = filter::Targets::new().with_targets(vec![("itemcheck", level)]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn format_outcome(key: &str, outcome: &DispatchResult<Option<String>>) -> String {
    match outcome {
        Ok(value) => format!("{key:<40}[s|{}]", value.as_deref().unwrap_or_default()),
        Err(e) => format!("{key:<40}[m|ZBX_NOTSUPPORTED] [{e}]"),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = match &args.config {
        Some(path) => read_config_file(path)?,
        None => AgentConfig::default(),
    };
    let dispatcher = Dispatcher::from_config(&config)?;

    if args.print {
        for metric in dispatcher.supported_keys() {
            let params = metric.test_params();
            let outcome = dispatcher.execute(metric.as_str(), params);
            println!("{}", format_outcome(&make_key(metric.as_str(), params), &outcome));
        }
    } else if let Some(text) = &args.test {
        println!("{}", format_outcome(text, &dispatcher.execute_key(text)));
    } else if let Some(metric) = &args.metric {
        let outcome = dispatcher.execute(metric, &args.params);
        println!("{}", format_outcome(&make_key(metric, &args.params), &outcome));
    } else {
        bail!("nothing to check: pass a metric key, --test or --print");
    }

    Ok(())
}
