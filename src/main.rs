use clap::Parser;

use two_input_compositor::interactive::{ViewerConfig, run_gpu_viewer};
use two_input_compositor::{CompositorConfig, Rotation, RotationConfig};

// Devices may still report a lower texture limit; the viewer clamps again
const MAX_FRAME_DIMENSION: i64 = 8192;

/// Live preview of the two-input compositor
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Synthetic camera width in pixels
    #[arg(long, default_value_t = 640, value_parser = clap::value_parser!(u32).range(1..=MAX_FRAME_DIMENSION))]
    width: u32,

    /// Synthetic camera height in pixels
    #[arg(long, default_value_t = 480, value_parser = clap::value_parser!(u32).range(1..=MAX_FRAME_DIMENSION))]
    height: u32,

    /// Overlay rotation in degrees (0, 90, 180 or 270)
    #[arg(long, default_value_t = 90)]
    rotation: u32,

    #[arg(long)]
    flip_horizontal: bool,

    #[arg(long)]
    flip_vertical: bool,

    /// Scale decrement per frame
    #[arg(long, default_value_t = 0.04)]
    scale_step: f32,

    /// Scale at which the overlay refreshes
    #[arg(long, default_value_t = 0.1)]
    scale_floor: f32,

    /// Checkerboard cell size of the generated overlay
    #[arg(long, default_value_t = 32)]
    overlay_cell: u32,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let Some(rotation) = Rotation::from_degrees(args.rotation) else {
        eprintln!("Error: rotation must be 0, 90, 180 or 270 (got {})", args.rotation);
        std::process::exit(2);
    };

    let config = ViewerConfig {
        frame_size: (args.width, args.height),
        overlay_cell: args.overlay_cell,
        compositor: CompositorConfig {
            scale_step: args.scale_step,
            scale_floor: args.scale_floor,
            rotation: RotationConfig::new(rotation, args.flip_horizontal, args.flip_vertical),
            ..CompositorConfig::default()
        },
        ..ViewerConfig::default()
    };

    if let Err(e) = run_gpu_viewer(config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
