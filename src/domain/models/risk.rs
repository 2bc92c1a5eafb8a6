use serde::{Deserialize, Serialize};

/// Ordered risk classification: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Risk from the number of dependents alone.
    pub fn from_dependent_count(count: usize) -> Self {
        match count {
            0..=5 => RiskLevel::Low,
            6..=15 => RiskLevel::Medium,
            16..=30 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    /// Risk boost from the complexity of the dependents.
    pub fn from_complexity(avg: f64, max: u32) -> Self {
        if avg > 15.0 || max > 25 {
            RiskLevel::Critical
        } else if avg > 10.0 || max > 20 {
            RiskLevel::High
        } else if avg > 6.0 || max > 15 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_dependent_count_boundaries() {
        assert_eq!(RiskLevel::from_dependent_count(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_dependent_count(5), RiskLevel::Low);
        assert_eq!(RiskLevel::from_dependent_count(6), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_dependent_count(15), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_dependent_count(16), RiskLevel::High);
        assert_eq!(RiskLevel::from_dependent_count(30), RiskLevel::High);
        assert_eq!(RiskLevel::from_dependent_count(31), RiskLevel::Critical);
    }

    #[test]
    fn test_complexity_boost_boundaries() {
        assert_eq!(RiskLevel::from_complexity(2.0, 5), RiskLevel::Low);
        assert_eq!(RiskLevel::from_complexity(6.5, 5), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_complexity(2.0, 16), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_complexity(10.5, 5), RiskLevel::High);
        assert_eq!(RiskLevel::from_complexity(2.0, 21), RiskLevel::High);
        assert_eq!(RiskLevel::from_complexity(15.5, 5), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_complexity(2.0, 26), RiskLevel::Critical);
    }

    #[test]
    fn test_monotonicity_under_added_dependents() {
        // Adding a dependent never lowers the count-based level.
        let mut previous = RiskLevel::Low;
        for count in 0..40 {
            let level = RiskLevel::from_dependent_count(count);
            assert!(level >= previous);
            previous = level;
        }
    }
}
