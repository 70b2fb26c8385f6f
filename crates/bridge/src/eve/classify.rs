//! Classify — priority mapping, brute-force heuristic, IOC extraction.

use std::collections::HashMap;
use std::net::IpAddr;

use super::model::{EveEnvelope, EventDetail};

/// Default priority for everything that is not an alert.
pub const DEFAULT_PRIORITY: i32 = 3;

/// Case-insensitive signature keywords marking credential attacks.
const BRUTE_FORCE_KEYWORDS: [&str; 5] = ["ssh", "brute", "login", "authentication", "failed"];

/// Indicator-of-compromise kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IocKind {
    Ip,
    Domain,
}

/// Priority of an event: alert severity verbatim, low otherwise.
/// The presence of the alert record decides, not the type tag, the
/// same way normalization copies alert fields.
pub fn priority(envelope: &EveEnvelope) -> i32 {
    match &envelope.alert {
        Some(alert) => alert.severity,
        None => DEFAULT_PRIORITY,
    }
}

/// Heuristic: does this alert's signature look like a credential /
/// brute-force attack? Only a tagged alert can match, so the check
/// goes through [`EveEnvelope::detail`].
pub fn is_brute_force(envelope: &EveEnvelope) -> bool {
    let EventDetail::Alert(alert) = envelope.detail() else {
        return false;
    };
    let signature = alert.signature.to_lowercase();
    BRUTE_FORCE_KEYWORDS.iter().any(|kw| signature.contains(kw))
}

/// Extract indicators of compromise from an envelope.
///
/// Valid src/dest IP literals land under [`IocKind::Ip`]; the HTTP
/// hostname and DNS query name land under [`IocKind::Domain`]. Values
/// within a kind are not deduplicated.
pub fn extract_iocs(envelope: &EveEnvelope) -> HashMap<IocKind, Vec<String>> {
    let mut iocs: HashMap<IocKind, Vec<String>> = HashMap::new();

    for ip in [&envelope.src_ip, &envelope.dest_ip] {
        if ip.parse::<IpAddr>().is_ok() {
            iocs.entry(IocKind::Ip).or_default().push(ip.clone());
        }
    }

    if let Some(http) = &envelope.http {
        if !http.hostname.is_empty() {
            iocs.entry(IocKind::Domain).or_default().push(http.hostname.clone());
        }
    }

    if let Some(dns) = &envelope.dns {
        if !dns.rrname.is_empty() {
            iocs.entry(IocKind::Domain).or_default().push(dns.rrname.clone());
        }
    }

    iocs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eve::model::{AlertData, DnsData, HttpData};

    fn alert_envelope(signature: &str, severity: i32) -> EveEnvelope {
        EveEnvelope {
            event_type: "alert".to_string(),
            alert: Some(AlertData {
                signature: signature.to_string(),
                severity,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_priority_alert_uses_severity() {
        assert_eq!(priority(&alert_envelope("sig", 1)), 1);
        assert_eq!(priority(&alert_envelope("sig", 4)), 4);
    }

    #[test]
    fn test_priority_non_alert_defaults_low() {
        let env = EveEnvelope { event_type: "dns".to_string(), ..Default::default() };
        assert_eq!(priority(&env), DEFAULT_PRIORITY);
    }

    #[test]
    fn test_priority_alert_without_record_defaults_low() {
        let env = EveEnvelope { event_type: "alert".to_string(), ..Default::default() };
        assert_eq!(priority(&env), DEFAULT_PRIORITY);
    }

    #[test]
    fn test_priority_uses_alert_record_under_any_tag() {
        // Some rulesets attach alert data to flow-tagged events; the
        // record, not the tag, carries the severity.
        let mut env = alert_envelope("sig", 1);
        env.event_type = "flow".to_string();
        assert_eq!(priority(&env), 1);
    }

    #[test]
    fn test_brute_force_keyword_match_is_case_insensitive() {
        assert!(is_brute_force(&alert_envelope("ET SCAN SSH BruteForce", 2)));
        assert!(is_brute_force(&alert_envelope("Possible FAILED Login", 2)));
        assert!(is_brute_force(&alert_envelope("authentication bypass", 2)));
    }

    #[test]
    fn test_brute_force_no_keyword() {
        assert!(!is_brute_force(&alert_envelope("ET MALWARE Win32 CnC beacon", 1)));
    }

    #[test]
    fn test_brute_force_never_matches_non_alerts() {
        let env = EveEnvelope {
            event_type: "ssh".to_string(),
            alert: Some(AlertData {
                signature: "ssh brute force".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!is_brute_force(&env));
    }

    #[test]
    fn test_extract_iocs_valid_ips() {
        let env = EveEnvelope {
            src_ip: "203.0.113.7".to_string(),
            dest_ip: "2001:db8::1".to_string(),
            ..Default::default()
        };
        let iocs = extract_iocs(&env);
        assert_eq!(
            iocs.get(&IocKind::Ip).unwrap(),
            &vec!["203.0.113.7".to_string(), "2001:db8::1".to_string()]
        );
        assert!(iocs.get(&IocKind::Domain).is_none());
    }

    #[test]
    fn test_extract_iocs_skips_invalid_ip_literals() {
        let env = EveEnvelope {
            src_ip: "not-an-ip".to_string(),
            dest_ip: String::new(),
            ..Default::default()
        };
        assert!(extract_iocs(&env).get(&IocKind::Ip).is_none());
    }

    #[test]
    fn test_extract_iocs_domains_from_http_and_dns() {
        let env = EveEnvelope {
            http: Some(HttpData { hostname: "evil.example".to_string(), ..Default::default() }),
            dns: Some(DnsData { rrname: "evil.example".to_string(), ..Default::default() }),
            ..Default::default()
        };
        let iocs = extract_iocs(&env);
        // duplicates across sources are kept
        assert_eq!(iocs.get(&IocKind::Domain).unwrap().len(), 2);
    }
}
