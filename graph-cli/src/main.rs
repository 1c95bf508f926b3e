use anyhow::Result;
use clap::Parser;
use graph_cli::args::Args;
use graph_cli::settings::Settings;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // 日志写到 stderr，stdout 留给 dot 输出
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("graph_cli=info".parse()?)
                .add_directive("graph_engine=info".parse()?)
                .add_directive("graph_eval=info".parse()?),
        )
        .init();

    let settings = Settings::from_args(Args::parse())?;
    info!("chessgraph starting from {}", settings.run.root_fen);

    let graph = graph_cli::run(&settings).await?;
    let content = graph_cli::render(&graph, &settings)?;
    graph_cli::write_output(&content, settings.output.as_deref())?;

    Ok(())
}
