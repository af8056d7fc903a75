//! 🚀 esmv-cli — the front door, the bouncer, the maitre d' of esmv.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary loads config, sets up logging, wires Ctrl-C to the cancel button,
//! and lets the library do the heavy lifting. Like a manager. 🦆

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "esmv.toml";

/// 🚀 main() — where it all begins. The "I pressed Enter and held my breath" moment.
///
/// 🔧 Steps:
/// 1. Init tracing
/// 2. Find the config file (first argument, which must exist, or `esmv.toml` if it does)
/// 3. Load config
/// 4. Arm Ctrl-C
/// 5. Run, print the receipt, exit with its code
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_file_path_which_is_validated_to_exist =
        find_config_file(args.get(1).map(String::as_str), Path::new(DEFAULT_CONFIG_FILE))?;

    let app_config = esmv::app_config::load_config(config_file_path_which_is_validated_to_exist.as_deref())
        .context("💀 In esmv-cli, main, we couldn't load the config. Take a look at the file and the ESMV_* variables, make sure you didn't forget something obvious")?;

    // 🛑 the big red button: first Ctrl-C stops new work, lets the current task wind down
    let cancel = CancellationToken::new();
    let cancel_on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Ctrl-C: cancelling the current reindex and skipping whatever is left");
            cancel_on_ctrl_c.cancel();
        }
    });

    let result = esmv::run(app_config, cancel).await;

    match result {
        Ok(report) => {
            println!("{}", report.render());
            let code = report.exit_code();
            info!("🏁 exiting with {}", code);
            std::process::exit(code);
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion of sadness, one layer at a time
            let mut the_vibes_are_giving_connection_issues = false;
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
                let cause_str = cause.to_string();
                if cause_str.contains("error sending request")
                    || cause_str.contains("connection refused")
                    || cause_str.contains("Connection refused")
                    || cause_str.contains("tcp connect error")
                    || cause_str.contains("dns error")
                    || cause_str.contains("nobody answered")
                {
                    the_vibes_are_giving_connection_issues = true;
                }
            }

            if the_vibes_are_giving_connection_issues {
                error!(
                    "🔧 hint: looks like a cluster isn't reachable. \
                    Double-check both URLs, that the clusters are actually running, \
                    and that this machine can reach them. If you're using Docker, try \
                    `docker ps` to see what's up. Even clusters need a nudge sometimes. ☕"
                );
            }

            std::process::exit(1);
        }
    }
}

/// 🔍 Which config file to load, if any.
///
/// A path given on the command line must exist. Without one, `fallback` is used when it
/// exists and the ESMV_* environment variables carry everything when it doesn't.
fn find_config_file(path_arg: Option<&str>, fallback: &Path) -> Result<Option<PathBuf>> {
    let config_file = path_arg.map(Path::new).unwrap_or(fallback);
    let exists = config_file.try_exists().with_context(|| {
        format!("💀 Couldn't check for the configuration file at '{}'", config_file.display())
    })?;
    match (exists, path_arg) {
        (true, _) => Ok(Some(config_file.to_path_buf())),
        // -- 📍 asked for by name: it had better be there
        (false, Some(_)) => bail!(
            "💀 Configuration file may not exist, couldn't find it. Double check that it exists, or maybe, it's an issue with pwd/cwd and relative paths. In that case, use an absolute path. Was checking here: '{}'",
            config_file.display()
        ),
        (false, None) => {
            warn!("🔧 No config file at '{}', going with ESMV_* environment variables only", config_file.display());
            Ok(None)
        }
    }
}
