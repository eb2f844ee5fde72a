use crate::dto::HealthRes;
use namaste_core::TerminologyIndex;

/// Health check shared by the REST API and the CLI.
///
/// Reports liveness together with the size of the loaded terminology index, so an empty or
/// half-configured deployment is visible at a glance.
#[derive(Clone)]
pub struct HealthService;

impl HealthService {
    /// Static method to check health without creating an instance.
    pub fn check_health(index: &TerminologyIndex) -> HealthRes {
        let stats = index.stats();
        let ok = stats.namaste_entries > 0 && stats.icd_entries > 0;
        HealthRes {
            ok,
            message: if ok {
                "NAMASTE terminology service is alive".into()
            } else {
                "terminology index is empty".into()
            },
            namaste_entries: stats.namaste_entries,
            icd_entries: stats.icd_entries,
            mappings: stats.mappings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use namaste_core::TerminologyData;

    #[test]
    fn empty_index_is_not_ok() {
        let res = HealthService::check_health(&TerminologyIndex::new());
        assert!(!res.ok);
        assert_eq!(res.mappings, 0);
    }

    #[test]
    fn seeded_index_reports_counts() {
        let data = TerminologyData::seed().expect("seed");
        let index = TerminologyIndex::with_data(data.entries, data.mappings).expect("index");
        let res = HealthService::check_health(&index);
        assert!(res.ok);
        assert!(res.namaste_entries > 0);
        assert!(res.mappings > 0);
    }
}
