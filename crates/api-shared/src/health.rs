use crate::types::HealthRes;

/// Simple health service for the save API
///
/// Provides a standardised way to check the health status of the PV save service.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    /// Static method to check health without creating an instance
    ///
    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "PV save service is alive".into(),
        }
    }
}
