use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("robolink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: robolink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("ROBOLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "defaults: port={} baud={} max_frame={} heartbeat_threshold={}",
        robolink_transport::DEFAULT_PORT,
        robolink_transport::DEFAULT_BAUD_RATE,
        robolink_frame::DEFAULT_MAX_FRAME_SIZE,
        robolink_bridge::DEFAULT_HEARTBEAT_THRESHOLD
    );
    println!("features: bridge={}, cli=true", cfg!(feature = "bridge"));

    Ok(SUCCESS)
}
