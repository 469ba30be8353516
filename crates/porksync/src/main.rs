// # porksync
//
// One-shot reconciler: loads the catalogue, compares every managed A record
// at Porkbun with the address it should carry, corrects the stale ones and
// refreshes certificates near expiry. Meant to be run from cron or a
// systemd timer.
//
// This binary is a thin integration layer. Reconciliation logic lives in
// porksync-core, the wire protocol in porksync-provider-porkbun.
//
// ## Configuration
//
// A `.env` file in the working directory is loaded first; variables already
// set in the environment win.
//
// - `PORKSYNC_CONF_PATH`: Catalogue file or directory (default
//   `/etc/porksync/` on Linux, `./porksync/` elsewhere)
// - `PORKSYNC_LOG_PATH`: Directory for `porksync.log` (default `/var/log`
//   on Linux, `.` elsewhere)
// - `PORKSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `PORKSYNC_SK`, `PORKSYNC_PK`: API keys for catalogues that omit them
//
// ## Example
//
// ```bash
// export PORKSYNC_CONF_PATH=/etc/porksync/
// porksync --dry
// ```

mod logging;
mod settings;

use clap::Parser;
use porksync_core::{
    AddressResolver, CertificateRefresher, Reconciler, RunReport, load_catalogues,
};
use porksync_provider_porkbun::PorkbunRegistrar;
use settings::{CONF_PATH_ENV, Settings};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info};

/// Exit codes
///
/// - 0: Run completed (skipped entries and domains included)
/// - 1: Configuration, provider or network failure
/// - 2: Malformed IPv4 address from the registrar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PorksyncExitCode {
    /// Run completed
    Success = 0,
    /// Fatal configuration, provider or network error
    Fatal = 1,
    /// Registrar returned a malformed address
    MalformedAddress = 2,
}

impl From<PorksyncExitCode> for ExitCode {
    fn from(code: PorksyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<&porksync_core::Error> for PorksyncExitCode {
    fn from(error: &porksync_core::Error) -> Self {
        if error.is_parse() {
            PorksyncExitCode::MalformedAddress
        } else {
            PorksyncExitCode::Fatal
        }
    }
}

/// Keep Porkbun A records pointed at the right addresses
#[derive(Debug, Parser)]
#[command(name = "porksync", version, about)]
struct Args {
    /// Log intended changes without sending them or writing certificates
    #[arg(short, long)]
    dry: bool,

    /// Catalogue file or directory
    #[arg(long, value_name = "PATH", env = CONF_PATH_ENV)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let args = Args::parse();

    let settings = Settings::from_env(args.config.clone());
    if let Err(e) = settings.validate() {
        eprintln!("Configuration error: {:#}", e);
        return PorksyncExitCode::Fatal.into();
    }

    let _logging = match logging::init(&settings.log_file, &settings.log_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {:#}", e);
            return PorksyncExitCode::Fatal.into();
        }
    };

    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env loaded: {}", e),
    }

    info!("Starting porksync {}", env!("CARGO_PKG_VERSION"));
    debug!("Settings: {:?}", settings);

    // Everything runs in program order, so one thread is enough
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return PorksyncExitCode::Fatal.into();
        }
    };

    let code = rt.block_on(async {
        match run(&settings, args.dry).await {
            Ok(report) => {
                debug!("Run report: {:?}", report);
                PorksyncExitCode::Success
            }
            Err(e) => {
                error!("{}", e);
                PorksyncExitCode::from(&e)
            }
        }
    });

    code.into()
}

/// Load the catalogues and run one reconciliation pass
async fn run(settings: &Settings, dry_run: bool) -> porksync_core::Result<RunReport> {
    let catalogues = load_catalogues(&settings.conf_path, &settings.credentials)?;
    info!(
        "Loaded {} catalogue(s) from {}",
        catalogues.len(),
        settings.conf_path.display()
    );

    let registrar = PorkbunRegistrar::new(dry_run)?;
    let reconciler = Reconciler::new(Box::new(registrar), AddressResolver::system())
        .with_certificates(CertificateRefresher::x509(dry_run));

    reconciler.run(&catalogues).await
}
