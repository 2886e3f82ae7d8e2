//! Conversation phase machine
//!
//! A run moves through four ordered phases, each gating which tools are
//! offered to the model. The phase is an explicit state value advanced by a
//! pure transition function over the set of completed tool names, so the
//! machine can be tested independently of the model loop. Transitions are
//! monotone: a run never moves backward.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Wire names of the tools the phase machine and catalog refer to.
///
/// The statistics tools live in `sift-eda`; the SQL-catalog and reporting
/// tools are registered by the embedding application. Either way the names
/// are catalog data and belong here.
pub mod tool_names {
    // Planning: catalog/schema exploration
    pub const SEARCH_CATALOG: &str = "SearchCatalog";
    pub const SEARCH_SCHEMA: &str = "SearchSchema";
    pub const READ_ENTITY_YAML_RAW: &str = "ReadEntityYamlRaw";
    pub const LOAD_ENTITIES_BULK: &str = "LoadEntitiesBulk";
    pub const SCAN_ENTITY_PROPERTIES: &str = "ScanEntityProperties";
    pub const ASSESS_ENTITY_COVERAGE: &str = "AssessEntityCoverage";
    pub const CLARIFY_INTENT: &str = "ClarifyIntent";
    pub const FINALIZE_PLAN: &str = "FinalizePlan";
    pub const FINALIZE_NO_DATA: &str = "FinalizeNoData";

    // Building
    pub const BUILD_SQL: &str = "BuildSql";
    pub const VALIDATE_SQL: &str = "ValidateSql";
    pub const FINALIZE_BUILD: &str = "FinalizeBuild";

    // Execution
    pub const ESTIMATE_COST: &str = "EstimateCost";
    pub const EXECUTE_SQL_WITH_REPAIR: &str = "ExecuteSqlWithRepair";

    // Reporting
    pub const SANITY_CHECK: &str = "SanityCheck";
    pub const FORMAT_RESULTS: &str = "FormatResults";
    pub const EXPLAIN_RESULTS: &str = "ExplainResults";
    pub const FINALIZE_REPORT: &str = "FinalizeReport";

    // Statistics engine
    pub const DESCRIBE_DATASET: &str = "DescribeDataset";
    pub const SUMMARIZE_COLUMNS: &str = "SummarizeColumns";
    pub const VALUE_COUNTS: &str = "ValueCounts";
    pub const TIME_SERIES_SLICE: &str = "TimeSeriesSlice";
    pub const CORRELATION_MATRIX: &str = "CorrelationMatrix";
    pub const TARGET_ANALYSIS: &str = "TargetAnalysis";
    pub const GROUPED_SUMMARY: &str = "GroupedSummary";
    pub const TOP_SEGMENTS: &str = "TopSegments";
    pub const RELATIONSHIP_DRILLDOWN: &str = "RelationshipDrilldown";
    pub const MISSING_VALUES_SUMMARY: &str = "MissingValuesSummary";
    pub const GENERATE_EDA_REPORT: &str = "GenerateEdaReport";

    /// The eleven statistics tools, offered together during planning
    pub const STATISTICS_TOOLS: [&str; 11] = [
        DESCRIBE_DATASET,
        SUMMARIZE_COLUMNS,
        VALUE_COUNTS,
        TIME_SERIES_SLICE,
        CORRELATION_MATRIX,
        TARGET_ANALYSIS,
        GROUPED_SUMMARY,
        TOP_SEGMENTS,
        RELATIONSHIP_DRILLDOWN,
        MISSING_VALUES_SUMMARY,
        GENERATE_EDA_REPORT,
    ];

    /// Tools whose completion ends the run
    pub const TERMINAL_TOOLS: [&str; 3] = [FINALIZE_REPORT, FINALIZE_NO_DATA, CLARIFY_INTENT];
}

/// One of the four ordered stages of a conversation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Planning,
    Building,
    Execution,
    Reporting,
}

impl Phase {
    /// The initial phase of every run
    pub fn initial() -> Self {
        Phase::Planning
    }

    /// Whether this is the terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Reporting)
    }

    /// Lowercase label, as used in logs and rejection messages
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Planning => "planning",
            Phase::Building => "building",
            Phase::Execution => "execution",
            Phase::Reporting => "reporting",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Pure phase transition over the completed tool names of a run.
///
/// The derived phase is the furthest stage whose entry condition is
/// satisfied by the completions seen so far:
/// - `ExecuteSqlWithRepair` completed -> reporting
/// - `FinalizeBuild` completed -> execution (also the planning shortcut
///   for cached-query matches)
/// - `FinalizePlan` completed -> building
///
/// The result is the max of the current phase and the derived phase, so
/// the machine never regresses regardless of completion interleaving, and
/// completion order within a step is irrelevant.
pub fn next_phase(current: Phase, completed: &HashSet<String>) -> Phase {
    let derived = if completed.contains(tool_names::EXECUTE_SQL_WITH_REPAIR) {
        Phase::Reporting
    } else if completed.contains(tool_names::FINALIZE_BUILD) {
        Phase::Execution
    } else if completed.contains(tool_names::FINALIZE_PLAN) {
        Phase::Building
    } else {
        Phase::Planning
    };
    current.max(derived)
}

/// Fixed mapping from phase to the tool names permitted to be offered.
///
/// Offering is capacity control for the model; execution is additionally
/// guarded: the run loop refuses to execute an invocation whose name is not
/// permitted in the current phase, returning a structured rejection.
pub struct PhaseCatalog {
    allowed: HashMap<Phase, Vec<String>>,
}

impl PhaseCatalog {
    /// The standard catalog for the analyst workflow
    pub fn standard() -> Self {
        use tool_names::*;

        let mut planning: Vec<String> = vec![
            READ_ENTITY_YAML_RAW.to_string(),
            LOAD_ENTITIES_BULK.to_string(),
            SCAN_ENTITY_PROPERTIES.to_string(),
            ASSESS_ENTITY_COVERAGE.to_string(),
            CLARIFY_INTENT.to_string(),
            SEARCH_CATALOG.to_string(),
            SEARCH_SCHEMA.to_string(),
        ];
        planning.extend(STATISTICS_TOOLS.iter().map(|s| s.to_string()));
        planning.extend([
            FINALIZE_PLAN.to_string(),
            FINALIZE_BUILD.to_string(),
            FINALIZE_NO_DATA.to_string(),
        ]);

        let mut allowed = HashMap::new();
        allowed.insert(Phase::Planning, planning);
        allowed.insert(
            Phase::Building,
            vec![
                BUILD_SQL.to_string(),
                VALIDATE_SQL.to_string(),
                FINALIZE_BUILD.to_string(),
            ],
        );
        allowed.insert(
            Phase::Execution,
            vec![
                ESTIMATE_COST.to_string(),
                EXECUTE_SQL_WITH_REPAIR.to_string(),
            ],
        );
        allowed.insert(
            Phase::Reporting,
            vec![
                SANITY_CHECK.to_string(),
                FORMAT_RESULTS.to_string(),
                EXPLAIN_RESULTS.to_string(),
                FINALIZE_REPORT.to_string(),
            ],
        );

        Self { allowed }
    }

    /// Tool names offered in the given phase
    pub fn allowed(&self, phase: Phase) -> &[String] {
        self.allowed
            .get(&phase)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether a tool may execute in the given phase
    pub fn permits(&self, phase: Phase, tool: &str) -> bool {
        self.allowed(phase).iter().any(|name| name == tool)
    }
}

impl Default for PhaseCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
