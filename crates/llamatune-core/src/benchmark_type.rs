use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BenchmarkType {
    #[default]
    Standard,
    Comparison,
    StressTest,
}

impl BenchmarkType {
    pub fn label(&self) -> &'static str {
        match self {
            BenchmarkType::Standard => "Standard",
            BenchmarkType::Comparison => "Comparison",
            BenchmarkType::StressTest => "Stress Test",
        }
    }

    pub fn all() -> &'static [BenchmarkType] {
        &[
            BenchmarkType::Standard,
            BenchmarkType::Comparison,
            BenchmarkType::StressTest,
        ]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StressTestType {
    LongContext,
    #[default]
    RapidRequests,
    ComplexReasoning,
}

impl StressTestType {
    pub fn label(&self) -> &'static str {
        match self {
            StressTestType::LongContext => "Long Context",
            StressTestType::RapidRequests => "Rapid Requests",
            StressTestType::ComplexReasoning => "Complex Reasoning",
        }
    }

    pub fn all() -> &'static [StressTestType] {
        &[
            StressTestType::LongContext,
            StressTestType::RapidRequests,
            StressTestType::ComplexReasoning,
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressOptions {
    pub test_type: StressTestType,
    pub target_token_count: u32,
}

impl Default for StressOptions {
    fn default() -> Self {
        Self {
            test_type: StressTestType::default(),
            target_token_count: 2048,
        }
    }
}

/// Which parameter configuration a step runs under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Primary,
    Comparison,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Primary => "Primary",
            Phase::Comparison => "Comparison",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(BenchmarkType::StressTest.label(), "Stress Test");
        assert_eq!(StressTestType::LongContext.label(), "Long Context");
        assert_eq!(BenchmarkType::all().len(), 3);
    }

    #[test]
    fn test_serde_names_are_stable() {
        let json = serde_json::to_string(&BenchmarkType::Comparison).unwrap();
        assert_eq!(json, "\"Comparison\"");
        let parsed: StressTestType = serde_json::from_str("\"ComplexReasoning\"").unwrap();
        assert_eq!(parsed, StressTestType::ComplexReasoning);
    }
}
