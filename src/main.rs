use std::io::{self, IsTerminal};
use std::sync::Arc;

use eyre::{Context, Result};
use tokio_util::sync::CancellationToken;

use tracechat::app::services::InputService;
use tracechat::app::{App, InitProps};
use tracechat::backend::{check_health, fetch_models, new_backend};
use tracechat::cli::Command;
use tracechat::config::{Configuration, init_logger, verbose};
use tracechat::models::Catalog;
use tracechat::storage::new_storage;
use tracechat::store::Repository;

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Command::new();
    if cmd.version() {
        cmd.print_version();
        return Ok(());
    }

    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let config = cmd.get_config()?;
    Configuration::init(config.clone())?;
    init_logger(&config.log)?;
    verbose!("[+] Logger initialized");

    verbose!("[+] Initializing storage...");
    let storage = new_storage(&config.storage)
        .await
        .wrap_err("initializing storage")?;
    verbose!("[+] Storage initialized");

    verbose!("[+] Connecting to {}...", config.backend.endpoint);
    let backend = new_backend(&config.backend);
    check_health(&backend).await;

    verbose!("[+] Fetching models...");
    let mut catalog = Catalog::new(fetch_models(&backend).await);
    if let Some(mode) = config.backend.default_mode.as_deref() {
        catalog = catalog.with_default_mode(mode);
    }
    if let Some(model) = config.backend.default_model.as_deref() {
        catalog = catalog.with_default_model(model);
    }

    verbose!("[+] Loading conversations...");
    let repository = Repository::new(storage);
    let store = repository.restore(catalog).await;
    verbose!("[+] Loaded {} conversations", store.len());

    let mut app = App::new(
        InitProps {
            store,
            repository,
            backend,
            colored: io::stdout().is_terminal(),
        },
        io::stdout(),
    );

    let token = CancellationToken::new();
    let input = InputService::new(Arc::new(app.event_tx()), token.clone()).start();

    let code = match app.run().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            1
        }
    };

    token.cancel();
    input.abort();
    // A pending stdin read holds a blocking thread the runtime would wait on.
    std::process::exit(code);
}
