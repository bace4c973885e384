use std::process::ExitCode;

use resume_assistant::app::ChatAppShell;
use resume_assistant::interrupt::Interrupts;
use resume_assistant::runtime::LocalRuntime;
use resume_assistant::settings::SettingsStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so they never interleave with streamed replies on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = SettingsStore::load();
    let adapter_config = settings.settings().adapter_config();
    tracing::info!(
        base_url = %adapter_config.base_url(),
        config_path = ?settings.config_path(),
        "starting resume assistant"
    );

    let adapter = match resume_llm::create_adapter(adapter_config) {
        Ok(adapter) => adapter,
        Err(error) => {
            tracing::error!(error = %error, "failed to create chat adapter");
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    };

    let mut shell = ChatAppShell::new(
        LocalRuntime::new(adapter),
        settings,
        Interrupts::ctrl_c(),
        std::io::stdout(),
    );
    let input = tokio::io::BufReader::new(tokio::io::stdin());

    if let Err(error) = shell.run(input).await {
        tracing::error!(error = %error, "terminal i/o failed");
        eprintln!("error: {error}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
