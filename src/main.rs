// SPDX-License-Identifier: MPL-2.0
use std::process::ExitCode;

use cineview::{Controls, NullRenderer, Outcome, Player, Volume};

const USAGE: &str = "usage: cineview <media-file> [--loop] [--mute] [--volume <0..1>]";

fn main() -> ExitCode {
    env_logger::init();

    let mut args = pico_args::Arguments::from_env();
    let loop_enabled = args.contains("--loop");
    let mute = args.contains("--mute");
    let volume: Option<f32> = match args.opt_value_from_str("--volume") {
        Ok(value) => value,
        Err(e) => {
            eprintln!("cineview: {e}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let Some(path) = args
        .finish()
        .into_iter()
        .next()
        .and_then(|s| s.into_string().ok())
    else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };

    let controls = Controls {
        play: true,
        mute,
        loop_enabled,
        volume: volume.map_or_else(Volume::default, Volume::new),
        seek_to: None,
        ..Controls::default()
    };

    match run(&path, &controls) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("cineview: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Plays the file to completion (or forever, when looping) without a
/// display attached.
fn run(path: &str, controls: &Controls) -> cineview::Result<()> {
    let mut player = Player::open(path)?;
    let (width, height) = player.dimensions();
    log::info!(
        "playing {path}: {width}x{height}, {:.2}s, audio: {}",
        player.duration_secs(),
        if player.has_audio() { "yes" } else { "no" }
    );

    let mut renderer = NullRenderer::default();
    loop {
        if player.advance(controls, &mut renderer)? == Outcome::Finished {
            break;
        }
    }

    log::info!("presented {} frames", renderer.frames_presented);
    player.close();
    Ok(())
}
