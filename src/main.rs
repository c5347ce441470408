use blockpatch::lookup::segment::SEGMENTS;
use blockpatch::LookupConfig;
use log::{error, info, LevelFilter};
use std::process::ExitCode;

/// Checks a lookup config and reports which sections it remaps.
fn main() -> ExitCode {
    if let Err(e) = blockpatch::logger::init(LevelFilter::Info) {
        eprintln!("Failed to install logger: {}", e);
    }

    let Some(path) = std::env::args().nth(1) else {
        error!("Usage: blockpatch <lookup.json>");
        return ExitCode::FAILURE;
    };

    match LookupConfig::from_path(&path).and_then(|config| config.into_segment_lookup()) {
        Ok(lookup) => {
            let remapped = (0..SEGMENTS)
                .filter(|&segment| !lookup.segment_view(segment).is_identity())
                .count();
            info!("{} is valid, {} of {} sections remap blocks", path, remapped, SEGMENTS);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Invalid lookup config {}: {}", path, e);
            ExitCode::FAILURE
        }
    }
}
