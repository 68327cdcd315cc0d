use std::{env, path::PathBuf, time::SystemTime};

use geocalib::{
    write_report, CalibrationSession, ModelKind, SessionConfig, SessionError, SolveRequest,
    TransformError,
};

#[cfg(not(feature = "tracing"))]
use log::{info, warn, LevelFilter};

#[cfg(feature = "tracing")]
use tracing::{info, warn};

#[cfg(feature = "tracing")]
use geocalib::core::init_tracing;
#[cfg(not(feature = "tracing"))]
use geocalib::core::init_from_env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(not(feature = "tracing"))]
    init_from_env(LevelFilter::Info)?;

    #[cfg(feature = "tracing")]
    init_tracing(false);

    run()
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "info"))]
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let request_path = parse_request_path();
    let request = SolveRequest::load_json(&request_path)?;
    info!(
        "{} reference points from {}",
        request.reference_points.len(),
        request_path.display()
    );

    let config = SessionConfig {
        ransac: request.ransac.clone(),
        ..SessionConfig::default()
    };
    let mut session = CalibrationSession::new(config)?;
    for p in &request.reference_points {
        session.add_point(p.clone());
    }

    let kind = solve(&mut session, &request)?;
    let global = session.project(request.target)?;
    println!(
        "{:?}: ({}, {}) -> ({:.6}, {:.6})",
        kind, request.target[0], request.target[1], global[0], global[1]
    );

    if let Some(fit) = session.homography_fit() {
        for (i, (&inlier, err)) in fit.inlier_mask.iter().zip(&fit.errors_px).enumerate() {
            if !inlier {
                warn!("reference point {i} rejected, reprojection error {err:.2} px");
            }
        }
    }

    let Some(known) = request.known_target else {
        return Ok(());
    };
    let report = session.analyze(request.target, known)?;
    println!(
        "deviation {:.3e}, pixel length {:.3e}, ratio {:.2}",
        report.deviation, report.width_pixel, report.deviation_to_pixel_ratio
    );

    let unix_secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let path = write_report(&report, request.output_dir(), unix_secs)?;
    info!("analysis written to {}", path.display());
    Ok(())
}

fn parse_request_path() -> PathBuf {
    env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("testdata/solve_request.json"))
}

/// Solve the requested model; fall back to affine only when the request
/// allows it and the homography failed for lack of usable points.
fn solve(session: &mut CalibrationSession, request: &SolveRequest) -> Result<ModelKind, SessionError> {
    match session.solve(request.model) {
        Ok(model) => Ok(model.kind()),
        Err(SessionError::Transform(
            e @ (TransformError::InsufficientPoints { .. }
            | TransformError::DegenerateConfiguration
            | TransformError::InsufficientInliers { .. }),
        )) if request.model == ModelKind::Homography && request.allow_affine_fallback => {
            warn!("homography failed ({e}), using affine approximation");
            Ok(session.solve(ModelKind::Affine)?.kind())
        }
        Err(e) => Err(e),
    }
}
