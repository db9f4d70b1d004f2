use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use robolink_bridge::{BridgeConfig, BridgeListener, StaticIdentity};
use robolink_telemetry::TelemetryLog;
use robolink_transport::{MemoryUart, SerialUart, UartConfig, UartHandle};
use tracing::{info, warn};

use crate::cmd::{parse_duration, ServeArgs};
use crate::exit::{bridge_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_snapshot, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat, telemetry: Arc<TelemetryLog>) -> CliResult<i32> {
    let config = bridge_config(&args)?;
    let mac = StaticIdentity::parse_mac(&args.mac).map_err(|err| bridge_error("--mac", err))?;
    let identity = StaticIdentity::new(args.ssid.clone(), mac);
    let report_every = args
        .report_every
        .as_deref()
        .map(parse_duration)
        .transpose()?;
    let uart = open_uart(&args)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(shutdown.clone())?;

    let listener = BridgeListener::bind(&args.bind, uart, telemetry.clone())
        .map_err(|err| bridge_error("bind failed", err))?
        .with_config(config)
        .with_identity(Arc::new(identity))
        .with_shutdown(shutdown.clone());

    let poller = listener
        .poller()
        .spawn()
        .map_err(|err| bridge_error("poller failed to start", err))?;
    let reporter = report_every
        .map(|every| spawn_reporter(telemetry.clone(), shutdown.clone(), every, format))
        .transpose()?;

    let served = listener.serve();
    shutdown.store(true, Ordering::SeqCst);

    if poller.join().is_err() {
        warn!("uart poller panicked");
    }
    if let Some(reporter) = reporter {
        if reporter.join().is_err() {
            warn!("telemetry reporter panicked");
        }
    }

    let reports = served.map_err(|err| bridge_error("accept loop failed", err))?;
    info!(links = reports.len(), "bridge stopped");
    Ok(SUCCESS)
}

fn bridge_config(args: &ServeArgs) -> CliResult<BridgeConfig> {
    Ok(BridgeConfig {
        heartbeat_interval: parse_duration(&args.heartbeat_interval)?,
        heartbeat_threshold: args.heartbeat_threshold,
        max_frame_size: args.max_frame,
        strip_socket_spaces: args.strip_spaces,
        ..BridgeConfig::default()
    })
}

fn open_uart(args: &ServeArgs) -> CliResult<UartHandle> {
    if args.mock_uart {
        info!("using in-memory uart");
        return Ok(UartHandle::new(MemoryUart::new()));
    }

    let device = args
        .uart
        .as_deref()
        .ok_or_else(|| CliError::usage("--uart DEVICE (or --mock-uart) is required"))?;
    let config = UartConfig {
        baud_rate: args.baud,
        ..UartConfig::new(device)
    };
    let port = SerialUart::open(&config).map_err(|err| transport_error("uart open failed", err))?;
    info!(device, baud = config.baud_rate, "uart opened");
    Ok(UartHandle::new(port))
}

fn spawn_reporter(
    telemetry: Arc<TelemetryLog>,
    shutdown: Arc<AtomicBool>,
    every: Duration,
    format: OutputFormat,
) -> CliResult<JoinHandle<()>> {
    let capacity = telemetry.config().capacity;
    std::thread::Builder::new()
        .name("telemetry-reporter".to_string())
        .spawn(move || {
            let mut next = Instant::now() + every;
            while !shutdown.load(Ordering::SeqCst) {
                if Instant::now() < next {
                    std::thread::sleep(Duration::from_millis(50).min(every));
                    continue;
                }
                next += every;
                let snapshot = telemetry.snapshot_and_clear(capacity, capacity);
                if !snapshot.is_empty() {
                    print_snapshot(&snapshot, format);
                }
            }
        })
        .map_err(|err| CliError::new(INTERNAL, format!("reporter failed to start: {err}")))
}

fn install_ctrlc_handler(shutdown: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
