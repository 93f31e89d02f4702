//! Counts objects in a synthetic video with crowds of overlapping detections.
//!
//! Usage: `synthetic_video [<threshold>]`. The bandwidth selection method can be changed with the
//! `DENSECOUNT_BANDWIDTH` environment variable.

use densecount::{detection::column, AdaptiveCounter, CountParams, FrameAggregator};
use ndarray::Array2;

const FRAMES: usize = 40;
const MAX_FRAMES: usize = 30;
const OBJECTS: usize = 25;

/// Generates a frame with `OBJECTS` true objects, half of them packed into a crowd, plus
/// scattered false positives.
fn synthetic_frame(rng: &mut fastrand::Rng) -> Array2<f64> {
    let mut rows = Vec::new();
    for i in 0..OBJECTS {
        let crowded = i % 2 == 0;
        let (x, y, p) = if crowded {
            // Overlapping objects get lower scores.
            (200.0 + rng.f64() * 40.0, 120.0 + rng.f64() * 30.0, 0.3 + rng.f64() * 0.3)
        } else {
            (rng.f64() * 640.0, rng.f64() * 480.0, 0.55 + rng.f64() * 0.45)
        };
        rows.push([x, y, x + 24.0, y + 48.0, p]);
    }
    for _ in 0..rng.usize(3..10) {
        let (x, y) = (rng.f64() * 640.0, rng.f64() * 480.0);
        rows.push([x, y, x + 24.0, y + 48.0, rng.f64() * 0.5]);
    }
    rng.shuffle(&mut rows);

    let mut table = Array2::zeros((rows.len(), column::COUNT));
    for (mut dest, row) in table.rows_mut().into_iter().zip(&rows) {
        dest.assign(&ndarray::aview1(row));
    }
    table
}

fn main() -> anyhow::Result<()> {
    densecount::init_logger!();

    let threshold = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 0.5,
    };
    let params = CountParams::from_env(threshold)?;
    log::info!("counting with {params:?}");

    let mut rng = fastrand::Rng::with_seed(0);
    let frames = (0..FRAMES)
        .map(|_| synthetic_frame(&mut rng))
        .collect::<Vec<_>>();

    let counter = AdaptiveCounter::new(params.clone())?;
    for (index, frame) in frames.iter().take(MAX_FRAMES).enumerate() {
        let report = counter.report(frame)?;
        let naive = frame
            .column(column::CONFIDENCE)
            .iter()
            .filter(|&&p| p > threshold)
            .count();
        println!(
            "frame {index:2}: {:2} objects (plain threshold: {naive:2}, fallback: {:?})",
            report.count, report.fallback
        );
    }

    let aggregator = FrameAggregator::new(params, MAX_FRAMES)?;
    let average = aggregator.average_par(&frames)?;
    println!("average over {MAX_FRAMES} frames: {average:.2} objects ({OBJECTS} present)");

    Ok(())
}
