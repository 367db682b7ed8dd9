mod config;
mod llm;
mod ollama;
mod repl;
mod speech;
#[cfg(test)]
mod test_buffer;

use anyhow::Result;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Diagnostics go to stderr so they never interleave with the chat on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::Config::from_env()?;
    tracing::info!(model = %config.model, host = %config.host, "starting chat");

    let backend = ollama::Ollama::new(&config.host)?;
    let mut chatbot = llm::Chatbot::new(Box::new(backend), &config.model, &config.system_prompt);

    let mut repl = repl::Repl::new(
        Box::new(std::io::stdin().lock()),
        Box::new(std::io::stdout()),
        speech::default_voice(),
    );

    repl.run(&mut chatbot)
}
