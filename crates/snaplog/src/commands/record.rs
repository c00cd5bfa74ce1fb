//! `snaplog record`: sample the simulated device until stopped.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use snaplog_core::config::secs_to_duration;
use snaplog_core::{DataLogger, Producer, Snapshot};

use crate::cli::{GlobalOpts, RecordArgs};
use crate::error::CliError;
use crate::output;
use crate::sim::{self, SimDevice};

pub fn handle(args: RecordArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = snaplog_config::load_config(global.config.as_deref())?;

    let mut logger_config = cfg.logger_config(args.log.as_deref())?;
    if let Some(secs) = args.refresh {
        logger_config.refresh_interval = secs_to_duration("refresh", secs)?;
    }
    if let Some(secs) = args.persist {
        logger_config.persist_interval = secs_to_duration("persist", secs)?;
    }

    let latency = Duration::from_millis(args.latency_ms.unwrap_or(cfg.device.latency_ms));
    let channels = if args.channels.is_empty() {
        cfg.device.channels
    } else {
        args.channels
    };

    let device = Arc::new(SimDevice::new(latency));
    let producers = channels
        .iter()
        .map(|name| {
            sim::producer(&device, name)
                .map(|p| (name.clone(), p))
                .ok_or_else(|| CliError::UnknownChannel {
                    name: name.clone(),
                    available: sim::CHANNELS.join(", "),
                })
        })
        .collect::<Result<Vec<(String, Producer)>, _>>()?;

    let logger = DataLogger::new(Arc::clone(&device), logger_config);
    logger.register(producers)?;
    logger.add_callback(|snapshot: &Snapshot| {
        let values = serde_json::to_string(snapshot.as_map())?;
        debug!(cycle = snapshot.cycle(), %values, "snapshot");
        Ok(())
    });

    let output_path = logger.config().output.clone();
    info!(output = %output_path.display(), ?channels, "recording");
    if !global.quiet {
        eprintln!(
            "Recording {} to {} (Ctrl-C to stop)",
            channels.join(", "),
            output_path.display()
        );
    }

    let session = logger.session()?;
    wait_for_stop(args.duration)?;
    let report = session.close()?;

    let color = output::should_color(&global.color);
    let rendered = output::render_report(&global.output, &report, device.round_trips(), color)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

/// Block until Ctrl-C or, when given, until `duration` elapses.
fn wait_for_stop(duration: Option<Duration>) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match duration {
            Some(limit) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => result,
                    () = tokio::time::sleep(limit) => Ok(()),
                }
            }
            None => tokio::signal::ctrl_c().await,
        }
    })?;
    debug!("stop requested");
    Ok(())
}
