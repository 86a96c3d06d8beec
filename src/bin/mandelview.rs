// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::{App, Arg, ArgMatches};
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mandelview::buffer::PixelFormat;
use mandelview::run::worker_count;
use mandelview::{
    ComputeEngine, ConfigHandle, EngineOptions, ImageSurface, MandelviewError, RenderConfig,
    Resolution, Vec2,
};

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const CENTER: &str = "center";
const ZOOM: &str = "zoom";
const WHEEL: &str = "wheel";
const ITERATIONS: &str = "iterations";
const THRESHOLD: &str = "threshold";
const THREADS: &str = "threads";
const MONO: &str = "mono";
const ALPHA: &str = "alpha";

fn args<'a>() -> ArgMatches<'a> {
    let max_threads = num_cpus::get();

    App::new("mandelview")
        .version("0.1.0")
        .about("Renders one Mandelbrot frame through the background compute engine")
        .arg(
            Arg::with_name(OUTPUT)
                .required(true)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .help("Output file (binary PPM)"),
        )
        .arg(
            Arg::with_name(SIZE)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("800x600")
                .validator(|s| validate_pair::<u16>(&s, 'x', "Could not parse output image size"))
                .help("Size of output image"),
        )
        .arg(
            Arg::with_name(CENTER)
                .long(CENTER)
                .short("c")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("0,0")
                .validator(|s| validate_pair::<f32>(&s, ',', "Could not parse the center"))
                .help("Position of the view; the point shown in the middle is its negation"),
        )
        .arg(
            Arg::with_name(ZOOM)
                .long(ZOOM)
                .short("z")
                .takes_value(true)
                .default_value("1")
                .validator(|s| {
                    validate_range(
                        &s,
                        std::f32::MIN,
                        std::f32::MAX,
                        "Could not parse zoom",
                        "Zoom out of range",
                    )
                })
                .help("Zoom factor; anything below 1 is raised to 1"),
        )
        .arg(
            Arg::with_name(WHEEL)
                .long(WHEEL)
                .short("w")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("0")
                .validator(|s| {
                    validate_range(
                        &s,
                        -1000,
                        1000,
                        "Could not parse wheel notches",
                        "Wheel notches must be between -1000 and 1000",
                    )
                })
                .help("Mouse wheel notches applied after the zoom, 11% each"),
        )
        .arg(
            Arg::with_name(ITERATIONS)
                .long(ITERATIONS)
                .short("i")
                .takes_value(true)
                .default_value("512")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        1_000_000,
                        "Could not parse iteration count",
                        "Iteration count must be between 1 and 1000000",
                    )
                })
                .help("Maximum iterations per point"),
        )
        .arg(
            Arg::with_name(THRESHOLD)
                .long(THRESHOLD)
                .short("b")
                .takes_value(true)
                .default_value("65535")
                .validator(|s| {
                    validate_range(
                        &s,
                        std::f32::MIN_POSITIVE,
                        std::f32::MAX,
                        "Could not parse threshold",
                        "Threshold must be positive",
                    )
                })
                .help("Squared-magnitude bailout"),
        )
        .arg(
            Arg::with_name(THREADS)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        max_threads,
                        "Could not parse thread count",
                        &format!("Thread count must be between 1 and {}", max_threads),
                    )
                })
                .help("Number of worker threads per run [default: all but one]"),
        )
        .arg(
            Arg::with_name(MONO)
                .long(MONO)
                .short("m")
                .help("Green escape-count ramp instead of the palette"),
        )
        .arg(
            Arg::with_name(ALPHA)
                .long(ALPHA)
                .short("a")
                .help("Compute into an RGBA buffer"),
        )
        .get_matches()
}

// Validators have already run, so parse failures only happen for
// values clap supplied itself.
fn value<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T, MandelviewError> {
    matches
        .value_of(name)
        .and_then(|s| T::from_str(s).ok())
        .ok_or_else(|| MandelviewError::InvalidConfig(format!("bad value for --{}", name)))
}

fn pair<T: FromStr>(matches: &ArgMatches, name: &str, sep: char) -> Result<(T, T), MandelviewError> {
    matches
        .value_of(name)
        .and_then(|s| parse_pair(s, sep))
        .ok_or_else(|| MandelviewError::InvalidConfig(format!("bad value for --{}", name)))
}

fn run(matches: &ArgMatches) -> Result<(), MandelviewError> {
    let (width, height) = pair::<usize>(matches, SIZE, 'x')?;
    let (x, y) = pair::<f32>(matches, CENTER, ',')?;

    let handle = ConfigHandle::new(RenderConfig {
        window_size: Resolution::new(width, height),
        position: Vec2::new(x, y),
        max_iterations: value(matches, ITERATIONS)?,
        threshold: value(matches, THRESHOLD)?,
        color_enabled: !matches.is_present(MONO),
        ..RenderConfig::default()
    });
    let zoom: f32 = value(matches, ZOOM)?;
    let notches: i32 = value(matches, WHEEL)?;
    handle.modify(|config| {
        config.set_zoom(zoom);
        config.zoom_by_wheel(notches as f32);
    });

    let config = handle.snapshot();
    config.validate()?;

    let options = EngineOptions {
        workers: match matches.value_of(THREADS) {
            Some(_) => value(matches, THREADS)?,
            None => worker_count(),
        },
        format: if matches.is_present(ALPHA) {
            PixelFormat::Rgba
        } else {
            PixelFormat::Rgb
        },
    };
    let engine = ComputeEngine::new(options);
    info!(
        "rendering {}x{} at zoom {} on {} workers",
        width, height, config.zoom, options.workers
    );

    engine.update(Some(config));
    engine.wait();
    engine.update(Some(handle.snapshot()));

    let mut surface = ImageSurface::new();
    engine.render(&mut surface);
    let output = matches.value_of(OUTPUT).unwrap_or("mandelbrot.ppm");
    surface.save_ppm(output)?;
    info!("wrote {}", output);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = args();
    if let Err(e) = run(&matches) {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
