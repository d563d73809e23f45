use stitch3d_cloud::transforms::RigidTransform;

/// Criterion that stopped a converged alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// The RMS error fell below the absolute threshold.
    RmsErrorThreshold,
    /// The relative RMS improvement fell below the relative threshold.
    RmsErrorRelativeThreshold,
}

/// Outcome of an alignment that produced a transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Registration {
    /// Transform mapping moving points into the fixed frame.
    pub transform: RigidTransform,
    /// RMS distance of the pairs kept at the last iteration.
    pub rms_error: f64,
    /// Number of iterations performed.
    pub num_iterations: usize,
    /// Number of pairs kept at the last iteration.
    pub num_pairs: usize,
}

/// Result of a pairwise alignment.
///
/// Only [`RegistrationResult::MaxIterationsReached`] and
/// [`RegistrationResult::Converged`] carry a transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegistrationResult {
    /// One of the clouds held no valid point.
    NotInitialized,
    /// An iteration kept fewer pairs than required.
    NotEnoughPointPairs {
        /// Pairs kept.
        pairs: usize,
        /// Pairs required.
        required: usize,
    },
    /// The iteration budget ran out before convergence.
    MaxIterationsReached(Registration),
    /// The alignment converged.
    Converged {
        /// Criterion that stopped the iterations.
        criterion: Convergence,
        /// The final estimate.
        registration: Registration,
    },
}

/// Plain status of a [`RegistrationResult`], for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// See [`RegistrationResult::NotInitialized`].
    NotInitialized,
    /// See [`RegistrationResult::NotEnoughPointPairs`].
    NotEnoughPointPairs,
    /// See [`RegistrationResult::MaxIterationsReached`].
    MaxIterationsReached,
    /// Converged on [`Convergence::RmsErrorThreshold`].
    RmsErrorThresholdReached,
    /// Converged on [`Convergence::RmsErrorRelativeThreshold`].
    RmsErrorRelativeThresholdReached,
}

impl RegistrationStatus {
    /// Whether the status comes with a transform.
    pub fn has_transform(&self) -> bool {
        !matches!(
            self,
            RegistrationStatus::NotInitialized | RegistrationStatus::NotEnoughPointPairs
        )
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RegistrationStatus::NotInitialized => "not initialized",
            RegistrationStatus::NotEnoughPointPairs => "not enough point pairs",
            RegistrationStatus::MaxIterationsReached => "maximum number of iterations reached",
            RegistrationStatus::RmsErrorThresholdReached => "RMS error threshold reached",
            RegistrationStatus::RmsErrorRelativeThresholdReached => {
                "RMS error relative threshold reached"
            }
        };
        f.write_str(s)
    }
}

impl RegistrationResult {
    /// The plain status.
    pub fn status(&self) -> RegistrationStatus {
        match self {
            RegistrationResult::NotInitialized => RegistrationStatus::NotInitialized,
            RegistrationResult::NotEnoughPointPairs { .. } => {
                RegistrationStatus::NotEnoughPointPairs
            }
            RegistrationResult::MaxIterationsReached(_) => RegistrationStatus::MaxIterationsReached,
            RegistrationResult::Converged {
                criterion: Convergence::RmsErrorThreshold,
                ..
            } => RegistrationStatus::RmsErrorThresholdReached,
            RegistrationResult::Converged {
                criterion: Convergence::RmsErrorRelativeThreshold,
                ..
            } => RegistrationStatus::RmsErrorRelativeThresholdReached,
        }
    }

    /// The estimate, if the alignment produced one.
    pub fn registration(&self) -> Option<&Registration> {
        match self {
            RegistrationResult::MaxIterationsReached(registration)
            | RegistrationResult::Converged { registration, .. } => Some(registration),
            _ => None,
        }
    }

    /// The transform, if the alignment produced one.
    pub fn transform(&self) -> Option<&RigidTransform> {
        self.registration().map(|r| &r.transform)
    }

    /// Whether the alignment converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, RegistrationResult::Converged { .. })
    }
}
