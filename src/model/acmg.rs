use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::variant::Variant;

/// Five-tier clinical significance, ordered from most to least pathogenic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Classification {
    #[serde(rename = "Pathogenic")]
    Pathogenic,
    #[serde(rename = "Likely Pathogenic")]
    LikelyPathogenic,
    #[serde(rename = "Uncertain Significance")]
    UncertainSignificance,
    #[serde(rename = "Likely Benign")]
    LikelyBenign,
    #[serde(rename = "Benign")]
    Benign,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Pathogenic => "Pathogenic",
            Classification::LikelyPathogenic => "Likely Pathogenic",
            Classification::UncertainSignificance => "Uncertain Significance",
            Classification::LikelyBenign => "Likely Benign",
            Classification::Benign => "Benign",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Evidence strength of a criterion.
///
/// Standalone exists only on the benign side (BA1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStrength {
    VeryStrong,
    Strong,
    Moderate,
    Supporting,
    Standalone,
}

impl EvidenceStrength {
    /// Unsigned weight used for scoring
    pub fn magnitude(&self) -> i32 {
        match self {
            EvidenceStrength::VeryStrong | EvidenceStrength::Standalone => 8,
            EvidenceStrength::Strong => 4,
            EvidenceStrength::Moderate => 2,
            EvidenceStrength::Supporting => 1,
        }
    }
}

/// Direction of the evidence a criterion contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceDirection {
    Pathogenic,
    Benign,
}

/// ACMG/AMP evidence codes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AcmgCriterion {
    Pvs1,
    Ps1,
    Ps2,
    Ps3,
    Ps4,
    Pm1,
    Pm2,
    Pm3,
    Pm4,
    Pm5,
    Pm6,
    Pp1,
    Pp2,
    Pp3,
    Pp4,
    Pp5,
    Ba1,
    Bs1,
    Bs2,
    Bs3,
    Bs4,
    Bp1,
    Bp2,
    Bp3,
    Bp4,
    Bp5,
    Bp6,
    Bp7,
}

impl AcmgCriterion {
    /// Every criterion in evaluation order: pathogenic codes first, then benign
    pub const ALL: [AcmgCriterion; 28] = [
        AcmgCriterion::Pvs1,
        AcmgCriterion::Ps1,
        AcmgCriterion::Ps2,
        AcmgCriterion::Ps3,
        AcmgCriterion::Ps4,
        AcmgCriterion::Pm1,
        AcmgCriterion::Pm2,
        AcmgCriterion::Pm3,
        AcmgCriterion::Pm4,
        AcmgCriterion::Pm5,
        AcmgCriterion::Pm6,
        AcmgCriterion::Pp1,
        AcmgCriterion::Pp2,
        AcmgCriterion::Pp3,
        AcmgCriterion::Pp4,
        AcmgCriterion::Pp5,
        AcmgCriterion::Ba1,
        AcmgCriterion::Bs1,
        AcmgCriterion::Bs2,
        AcmgCriterion::Bs3,
        AcmgCriterion::Bs4,
        AcmgCriterion::Bp1,
        AcmgCriterion::Bp2,
        AcmgCriterion::Bp3,
        AcmgCriterion::Bp4,
        AcmgCriterion::Bp5,
        AcmgCriterion::Bp6,
        AcmgCriterion::Bp7,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            AcmgCriterion::Pvs1 => "PVS1",
            AcmgCriterion::Ps1 => "PS1",
            AcmgCriterion::Ps2 => "PS2",
            AcmgCriterion::Ps3 => "PS3",
            AcmgCriterion::Ps4 => "PS4",
            AcmgCriterion::Pm1 => "PM1",
            AcmgCriterion::Pm2 => "PM2",
            AcmgCriterion::Pm3 => "PM3",
            AcmgCriterion::Pm4 => "PM4",
            AcmgCriterion::Pm5 => "PM5",
            AcmgCriterion::Pm6 => "PM6",
            AcmgCriterion::Pp1 => "PP1",
            AcmgCriterion::Pp2 => "PP2",
            AcmgCriterion::Pp3 => "PP3",
            AcmgCriterion::Pp4 => "PP4",
            AcmgCriterion::Pp5 => "PP5",
            AcmgCriterion::Ba1 => "BA1",
            AcmgCriterion::Bs1 => "BS1",
            AcmgCriterion::Bs2 => "BS2",
            AcmgCriterion::Bs3 => "BS3",
            AcmgCriterion::Bs4 => "BS4",
            AcmgCriterion::Bp1 => "BP1",
            AcmgCriterion::Bp2 => "BP2",
            AcmgCriterion::Bp3 => "BP3",
            AcmgCriterion::Bp4 => "BP4",
            AcmgCriterion::Bp5 => "BP5",
            AcmgCriterion::Bp6 => "BP6",
            AcmgCriterion::Bp7 => "BP7",
        }
    }

    pub fn strength(&self) -> EvidenceStrength {
        use AcmgCriterion::*;
        match self {
            Pvs1 => EvidenceStrength::VeryStrong,
            Ps1 | Ps2 | Ps3 | Ps4 | Bs1 | Bs2 | Bs3 | Bs4 => EvidenceStrength::Strong,
            Pm1 | Pm2 | Pm3 | Pm4 | Pm5 | Pm6 => EvidenceStrength::Moderate,
            Pp1 | Pp2 | Pp3 | Pp4 | Pp5 => EvidenceStrength::Supporting,
            Bp1 | Bp2 | Bp3 | Bp4 | Bp5 | Bp6 | Bp7 => EvidenceStrength::Supporting,
            Ba1 => EvidenceStrength::Standalone,
        }
    }

    pub fn direction(&self) -> EvidenceDirection {
        if self.code().starts_with('P') {
            EvidenceDirection::Pathogenic
        } else {
            EvidenceDirection::Benign
        }
    }

    /// Signed score contribution when the criterion is satisfied
    pub fn weight(&self) -> i32 {
        let magnitude = self.strength().magnitude();
        match self.direction() {
            EvidenceDirection::Pathogenic => magnitude,
            EvidenceDirection::Benign => -magnitude,
        }
    }
}

impl fmt::Display for AcmgCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of evaluating one criterion against one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CriterionResult {
    pub criterion: AcmgCriterion,
    pub satisfied: bool,
    pub strength: EvidenceStrength,
    pub reasoning: String,
    /// Snapshot of the variant fields the rule looked at
    #[schema(value_type = Object)]
    pub evidence: serde_json::Value,
}

impl CriterionResult {
    pub fn new(
        criterion: AcmgCriterion,
        satisfied: bool,
        reasoning: impl Into<String>,
        evidence: serde_json::Value,
    ) -> Self {
        Self {
            criterion,
            satisfied,
            strength: criterion.strength(),
            reasoning: reasoning.into(),
            evidence,
        }
    }
}

/// Terminal classification attached to a variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AcmgAssessment {
    pub classification: Classification,
    pub criteria: Vec<AcmgCriterion>,
    pub score: i32,
    pub reasoning: String,
    /// Always within [0, 1]
    pub confidence: f64,
}

/// Classification result handed to downstream consumers
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClassificationResult {
    pub variant: Variant,
    pub classification: Classification,
    /// Satisfied criteria, in evaluation order
    pub criteria: Vec<AcmgCriterion>,
    /// Every evaluated criterion, satisfied or not
    pub evaluations: Vec<CriterionResult>,
    pub score: i32,
    pub reasoning: String,
    pub confidence: f64,
    pub classified_at: DateTime<Utc>,
}
