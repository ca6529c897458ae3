//! Alert aggregation

use surfacemap_core::AttackSurface;
use surfacemap_transport::AlertRecord;

/// Copy the attack-surface fields of one alert
pub fn to_attack_surface(alert: &AlertRecord) -> AttackSurface {
    AttackSurface {
        url: alert.url.clone(),
        param: alert.param.clone(),
        attack: alert.attack.clone(),
        evidence: alert.evidence.clone(),
        risk: alert.risk.clone(),
        confidence: alert.confidence.clone(),
        description: alert.description.clone(),
        solution: alert.solution.clone(),
    }
}

/// One attack surface per alert, in report order.
///
/// Repeated alerts are kept; the same URL legitimately shows up once per
/// vulnerable parameter.
pub fn aggregate(alerts: &[AlertRecord]) -> Vec<AttackSurface> {
    alerts.iter().map(to_attack_surface).collect()
}
