use std::path::PathBuf;

use anyhow::{Context, Result};
use svgbridge::bridge::{ScriptSession, WrapperRegistry};
use svgbridge::config::BridgeConfig;
use svgbridge::js::ScriptEnvironment;
use svgbridge::model::Document;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: svgbridge <drawing.svg> [script.js]";

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(svg_path) = args.next().map(PathBuf::from) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    let script_path = args.next().map(PathBuf::from);

    let config_path = std::env::var("SVGBRIDGE_CONFIG").ok().map(PathBuf::from);
    let config = BridgeConfig::load(config_path).unwrap_or_else(|err| {
        eprintln!("Failed to load bridge configuration: {err}. Using defaults.");
        BridgeConfig::default()
    });

    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    if let Err(err) = run(&config, svg_path, script_path) {
        eprintln!("svgbridge failed: {err:#}");
        std::process::exit(1);
    }
}

fn run(config: &BridgeConfig, svg_path: PathBuf, script_path: Option<PathBuf>) -> Result<()> {
    let markup = std::fs::read_to_string(&svg_path)
        .with_context(|| format!("failed to read {}", svg_path.display()))?;
    let document = Document::parse_svg(&markup)
        .with_context(|| format!("failed to parse {}", svg_path.display()))?;

    let session =
        ScriptSession::with_registry(document, WrapperRegistry::shared(), config.cache.clone());
    let environment = ScriptEnvironment::with_session(session, config.script.clone())?;
    environment.run_inline_scripts()?;

    if let Some(path) = script_path {
        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        environment.eval(&source, &path.display().to_string())?;
    }

    println!("{}", environment.document_svg()?);
    tracing::info!(
        target = "svgbridge",
        live_proxies = environment.session().live_proxy_count(),
        "done"
    );
    environment.teardown()?;
    Ok(())
}
