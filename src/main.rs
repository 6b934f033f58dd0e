//! lukscrypt - format, open and close LUKS2 encrypted drives
//!
//! Usage:
//!   lukscrypt -encrypt <device>             - Format a drive and set its password
//!   lukscrypt -open <device> -name <name>   - Unlock a drive as /dev/mapper/<name>
//!   lukscrypt -close <name>                 - Close an unlocked drive
//!   lukscrypt -v ...                        - Print libcryptsetup messages

use lukscrypt::{
    cli::{write_usage, Cli, Operation},
    config::{exit, LOG_ENV},
    dispatch::Dispatcher,
    passphrase::TerminalPrompt,
    volume::{CryptsetupLibrary, LibraryLog},
    SecurityPolicy,
};
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() {
    let cli = Cli::parse_normalized(std::env::args_os());

    init_logging(cli.verbose);

    let Some(operation) = cli.operation() else {
        if let Some(missing) = cli.incomplete_open() {
            warn!("-open and -name must be used together (missing {})", missing);
        }
        // Usage goes to stderr
        if let Err(e) = write_usage(&mut std::io::stderr()) {
            eprintln!("Error: {}", e);
        }
        std::process::exit(exit::SUCCESS);
    };

    // Only formatting consults the policy
    let policy = match operation {
        Operation::Encrypt { .. } => match SecurityPolicy::resolve() {
            Ok(policy) => policy,
            Err(e) => {
                let _ = e.report(&mut std::io::stderr());
                std::process::exit(e.exit_code());
            }
        },
        _ => SecurityPolicy::default(),
    };

    let library = CryptsetupLibrary::new(LibraryLog::from_verbose(cli.verbose));
    let mut dispatcher = Dispatcher::new(library, TerminalPrompt::new(), std::io::stdout(), policy);
    debug!("Running {:?}", operation);

    if let Err(e) = dispatcher.run(&operation) {
        let _ = e.report(&mut std::io::stderr());
        std::process::exit(e.exit_code());
    }
}

/// Own diagnostics go to stderr; `LUKSCRYPT_LOG` overrides the level
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };

    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new(default_filter));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: logging already initialized");
    }
}
