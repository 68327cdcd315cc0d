/// Errors returned by the coordinate transform engine and analytics.
///
/// Every variant is recoverable by the caller: nothing is mutated when one of
/// these is returned, so the caller can add points or pick another model.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("need at least {needed} reference points, got {got}")]
    InsufficientPoints { needed: usize, got: usize },
    #[error("reference points are collinear or coincident")]
    DegenerateConfiguration,
    #[error("projection is singular (homogeneous scale near zero)")]
    SingularProjection,
    #[error("reference point {index} has no global coordinates")]
    MissingCoordinates { index: usize },
    #[error("robust fit found {found} inliers, need {needed}")]
    InsufficientInliers { needed: usize, found: usize },
    #[error("robust fit cancelled after {trials} trials without a model")]
    Cancelled { trials: usize },
}
