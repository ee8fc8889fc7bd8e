//! Report descriptors.
//!
//! Both reports run through the same fetch → normalize → write pipeline. Everything that
//! differs between them (requested metrics and breakdowns, dimension columns, destination
//! layout and write policy) lives in a [`Report`].

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    /// Fetch order of a run.
    pub const ALL: [Platform; 2] = [Platform::Ios, Platform::Android];

    pub fn label(&self) -> &'static str {
        match self {
            Platform::Ios => "iOS",
            Platform::Android => "Android",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a run does when one platform's credential exchange or fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FailurePolicy {
    /// Fail the whole run before anything is written.
    Abort,
    /// Log a warning and carry on with no rows for that platform.
    #[value(name = "skip")]
    SkipAndContinue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Add rows below the last populated row and commit the watermark afterwards.
    Append,
    /// Clear the layout rectangle, then write header and rows in one batch.
    Overwrite,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    /// Field name in the API payload.
    pub field: &'static str,
    /// Header shown in the destination.
    pub header: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct SheetLayout {
    pub tab: &'static str,
    pub first_column: &'static str,
    pub last_column: &'static str,
    /// Column holding each data row's date. Counted to find the next free row.
    pub key_column: &'static str,
    pub header_row: Option<usize>,
    pub first_data_row: usize,
    /// Cell holding the last fully synced date, for append reports.
    pub marker_cell: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct Report {
    pub name: &'static str,
    /// Text of the hyperlink written to the run summary.
    pub link_label: &'static str,
    pub breakdowns: &'static str,
    pub dimensions: &'static [Column],
    pub metrics: &'static [Column],
    pub layout: SheetLayout,
    pub write_policy: WritePolicy,
    pub default_failure_policy: FailurePolicy,
}

/// Dimension field that carries the platform tag.
pub const APP_NAME_FIELD: &str = "appName";

pub const REVENUE: Report = Report {
    name: "daily revenue",
    link_label: "Performance",
    breakdowns: "date,app",
    dimensions: &[Column {
        field: APP_NAME_FIELD,
        header: "App Name",
    }],
    metrics: &[
        Column { field: "revenue", header: "Revenue" },
        Column { field: "eCPM", header: "eCPM" },
        Column { field: "appFillRate", header: "Fill Rate" },
        Column { field: "appRequests", header: "Requests" },
        Column { field: "impressions", header: "Impressions" },
        Column { field: "activeUsers", header: "DAU" },
        Column { field: "engagedUsers", header: "DEU" },
        Column { field: "revenuePerActiveUser", header: "ARPDAU" },
        Column { field: "revenuePerEngagedUser", header: "ARPDEU" },
    ],
    layout: SheetLayout {
        tab: "Raw Data",
        first_column: "A",
        last_column: "K",
        key_column: "A",
        header_row: None,
        first_data_row: 2,
        marker_cell: Some("M1"),
    },
    write_policy: WritePolicy::Append,
    default_failure_policy: FailurePolicy::Abort,
};

pub const FILL_RATE: Report = Report {
    name: "placement fill rate",
    link_label: "Placement Fill Rate",
    breakdowns: "date,adSource,instance,app,adUnits",
    dimensions: &[
        Column { field: "providerName", header: "Ad Source" },
        Column { field: "instanceName", header: "Instance" },
        Column { field: APP_NAME_FIELD, header: "App Name" },
        Column { field: "adUnits", header: "Ad Unit" },
    ],
    metrics: &[
        Column { field: "revenue", header: "Revenue" },
        Column { field: "eCPM", header: "eCPM" },
        Column { field: "impressions", header: "Impressions" },
        Column { field: "adSourceAvailabilityRate", header: "Availability Rate" },
    ],
    layout: SheetLayout {
        tab: "Placement Fill Rate",
        first_column: "B",
        last_column: "J",
        key_column: "B",
        header_row: Some(1),
        first_data_row: 2,
        marker_cell: None,
    },
    write_policy: WritePolicy::Overwrite,
    default_failure_policy: FailurePolicy::SkipAndContinue,
};

impl Report {
    /// Number of destination columns: date, dimensions, metrics.
    pub fn width(&self) -> usize {
        1 + self.dimensions.len() + self.metrics.len()
    }

    /// Comma separated `metrics` query parameter.
    pub fn metric_param(&self) -> String {
        self.metrics
            .iter()
            .map(|m| m.field)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn header(&self) -> Vec<String> {
        std::iter::once("Date")
            .chain(self.dimensions.iter().map(|d| d.header))
            .chain(self.metrics.iter().map(|m| m.header))
            .map(str::to_string)
            .collect()
    }
}
