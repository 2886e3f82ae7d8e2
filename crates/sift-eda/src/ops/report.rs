//! GenerateEdaReport operation

use serde::Serialize;

use sift_core::Dataset;

/// Dataset overview for the report header
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOverview {
    pub name: String,
    pub row_count: usize,
    pub column_count: usize,
}

/// One report section with guidance for the model
#[derive(Debug, Clone, Serialize)]
pub struct ReportSection {
    pub id: String,
    pub title: String,
    pub description: String,
}

/// GenerateEdaReport result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdaReport {
    pub dataset_id: String,
    pub overview: ReportOverview,
    pub sections: Vec<ReportSection>,
}

/// Fixed-shape report scaffold.
///
/// Computes nothing itself: it is the structural anchor the model composes
/// with the other operations' outputs when asked for a full EDA report.
pub fn generate_eda_report(dataset: &Dataset) -> EdaReport {
    let section = |id: &str, title: &str, description: &str| ReportSection {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
    };

    EdaReport {
        dataset_id: dataset.id.clone(),
        overview: ReportOverview {
            name: dataset.name.clone(),
            row_count: dataset.row_count,
            column_count: dataset.columns.len(),
        },
        sections: vec![
            section(
                "columns",
                "Columns",
                "Use SummarizeColumns to get per-column statistics, then describe key findings to the user.",
            ),
            section(
                "distributions",
                "Distributions",
                "Use ValueCounts for categorical columns and appropriate charts to visualize distributions.",
            ),
            section(
                "relationships",
                "Relationships",
                "Use CorrelationMatrix and TimeSeriesSlice to highlight relationships and trends.",
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::dataset;
    use serde_json::json;

    #[test]
    fn test_report_scaffold_shape() {
        let ds = dataset(
            "report.csv",
            vec![json!({"x": 1, "y": "a"}), json!({"x": 2, "y": "b"})],
        );
        let report = generate_eda_report(&ds);

        assert_eq!(report.overview.name, "report.csv");
        assert_eq!(report.overview.row_count, 2);
        assert_eq!(report.overview.column_count, 2);

        let ids: Vec<&str> = report.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["columns", "distributions", "relationships"]);
    }
}
