//! 审计日志：记录结构、写入器与统计

pub mod record;
pub mod writer;

use serde::Serialize;

pub use record::{AuditFilter, AuditLevel, AuditRecord, AuditStatus, AuditTarget};
pub use writer::{AuditWriter, OpenAudit};

/// 审计统计：成功率为百分比，平均耗时为毫秒
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub success_rate: f64,
    pub avg_duration: f64,
}

impl AuditStats {
    pub fn from_records(records: &[AuditRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        let total = records.len();
        let success_count = records
            .iter()
            .filter(|r| r.status == AuditStatus::Completed)
            .count();
        let failure_count = records
            .iter()
            .filter(|r| r.status == AuditStatus::Failed)
            .count();
        let avg_duration = records.iter().map(|r| r.duration as f64).sum::<f64>() / total as f64;
        Self {
            total,
            success_count,
            failure_count,
            success_rate: success_count as f64 / total as f64 * 100.0,
            avg_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: AuditStatus, duration: u64) -> AuditRecord {
        let mut r = AuditRecord::started(&AuditTarget::Agent("a1".into()), "u1", "process_query", serde_json::json!({}));
        r.status = status;
        r.duration = duration;
        r
    }

    #[test]
    fn test_stats() {
        let stats = AuditStats::from_records(&[
            record(AuditStatus::Completed, 10),
            record(AuditStatus::Completed, 30),
            record(AuditStatus::Failed, 20),
            record(AuditStatus::Started, 0),
        ]);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.success_rate, 50.0);
        assert_eq!(stats.avg_duration, 15.0);

        assert_eq!(AuditStats::from_records(&[]), AuditStats::default());
    }
}
