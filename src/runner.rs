use crate::api_client::MediationApi;
use crate::config::SourceConfig;
use crate::data::{normalize, row_fingerprint, Fingerprint, MetricRecord};
use crate::error::Error;
use crate::report::{FailurePolicy, Platform, Report};
use crate::store::{count_populated, RowStore};
use crate::summary::link;
use crate::watermark::{
    parse_sheet_date, parse_watermark, resolve_window, SyncWindow, MARKER_FORMAT,
};
use chrono::NaiveDate;
use log::{error, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

pub struct SyncSettings {
    pub app_key_ios: String,
    pub app_key_android: String,
    /// Overrides the report's default policy when set.
    pub failure_policy: Option<FailurePolicy>,
    pub sheet_url: String,
}

impl SyncSettings {
    pub fn new(
        source: &SourceConfig,
        failure_policy: Option<FailurePolicy>,
        sheet_url: String,
    ) -> Self {
        SyncSettings {
            app_key_ios: source.app_key_ios.clone(),
            app_key_android: source.app_key_android.clone(),
            failure_policy,
            sheet_url,
        }
    }

    fn app_key(&self, platform: Platform) -> &str {
        match platform {
            Platform::Ios => &self.app_key_ios,
            Platform::Android => &self.app_key_android,
        }
    }

    fn policy(&self, report: &Report) -> FailurePolicy {
        self.failure_policy
            .unwrap_or(report.default_failure_policy)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunSummary {
    UpToDate {
        through: NaiveDate,
    },
    Synced {
        window: SyncWindow,
        rows_written: usize,
        rows_skipped: usize,
        /// New watermark, `None` when the API had nothing for the window yet.
        committed: Option<NaiveDate>,
        link: String,
    },
    Refilled {
        day: NaiveDate,
        rows_written: usize,
        link: String,
    },
    NothingToWrite {
        day: NaiveDate,
    },
}

impl RunSummary {
    /// Line for the run summary artifact, if the run produced anything worth linking.
    pub fn summary_line(&self) -> Option<&str> {
        match self {
            RunSummary::Synced { link, .. } | RunSummary::Refilled { link, .. } => {
                Some(link.as_str())
            }
            RunSummary::UpToDate { .. } | RunSummary::NothingToWrite { .. } => None,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunSummary::UpToDate { through } => {
                write!(f, "already up to date through {}", through)
            }
            RunSummary::Synced {
                window,
                rows_written,
                rows_skipped,
                committed,
                ..
            } => {
                write!(
                    f,
                    "synced {}: {} rows appended, {} already present",
                    window, rows_written, rows_skipped
                )?;
                match committed {
                    Some(date) => write!(f, ", watermark at {}", date),
                    None => write!(f, ", watermark unchanged"),
                }
            }
            RunSummary::Refilled {
                day, rows_written, ..
            } => write!(f, "refilled {} with {} rows", day, rows_written),
            RunSummary::NothingToWrite { day } => write!(f, "no data for {}", day),
        }
    }
}

/// One platform's normalized records. `skipped` marks a source failure absorbed by the
/// failure policy, in which case `records` is empty.
struct PlatformBatch {
    platform: Platform,
    records: Vec<MetricRecord>,
    skipped: bool,
}

/// Fetches and normalizes every platform before anything is written, so an aborted run
/// leaves the destination untouched.
async fn collect_platforms(
    api: &dyn MediationApi,
    settings: &SyncSettings,
    report: &Report,
    window: &SyncWindow,
) -> Result<Vec<PlatformBatch>, Error> {
    let policy = settings.policy(report);
    let mut batches = Vec::with_capacity(Platform::ALL.len());

    for platform in Platform::ALL {
        let app_key = settings.app_key(platform);
        match api.fetch(app_key, &window.start, &window.end, report).await {
            Ok(raw) => {
                let records = normalize(&raw, platform, report);
                info!(
                    "{} {}: {} groups normalized into {} rows",
                    report.name,
                    platform,
                    raw.len(),
                    records.len()
                );
                batches.push(PlatformBatch {
                    platform,
                    records,
                    skipped: false,
                });
            }
            Err(err) if policy == FailurePolicy::SkipAndContinue && err.is_source_failure() => {
                warn!(
                    "Skipping {} data for {}, continuing without it: {}",
                    platform, report.name, err
                );
                batches.push(PlatformBatch {
                    platform,
                    records: vec![],
                    skipped: true,
                });
            }
            Err(err) => {
                error!("Failed to fetch {} data for {}: {}", platform, report.name, err);
                return Err(err);
            }
        }
    }

    Ok(batches)
}

/// Latest date every platform is complete through: the earliest of the per-platform latest
/// dates. `None` when a platform was skipped or returned no rows.
fn committable_watermark(batches: &[PlatformBatch]) -> Option<NaiveDate> {
    let mut committed: Option<NaiveDate> = None;
    for batch in batches {
        if batch.skipped {
            return None;
        }
        let latest = batch.records.iter().map(|r| r.date).max()?;
        committed = Some(committed.map_or(latest, |c| c.min(latest)));
    }
    committed
}

/// Row of the first key cell dated inside `window`, if any.
fn first_row_in_window(
    keys: &[String],
    first_data_row: usize,
    window: &SyncWindow,
) -> Option<usize> {
    keys.iter()
        .enumerate()
        .skip(first_data_row.saturating_sub(1))
        .find(|(_, key)| parse_sheet_date(key.trim()).is_ok_and(|date| window.contains(&date)))
        .map(|(i, _)| i + 1)
}

/// Incremental sync of an append report.
///
/// Reads the watermark, fetches everything after it through yesterday, appends rows not
/// already present and finally advances the marker cell to the last date every platform
/// has delivered.
pub async fn sync_incremental(
    api: &dyn MediationApi,
    store: &dyn RowStore,
    report: &Report,
    settings: &SyncSettings,
    today: NaiveDate,
) -> Result<RunSummary, Error> {
    let layout = &report.layout;
    let marker = layout
        .marker_cell
        .ok_or_else(|| Error::schema(format!("{} has no watermark cell", report.name)))?;

    let raw_watermark = store.read_cell(layout.tab, marker).await?;
    let watermark = parse_watermark(marker, raw_watermark.as_deref())?;
    info!("Retrieved date from cell {}: {}", marker, watermark);

    let window = resolve_window(watermark, today);
    if window.is_empty() {
        info!(
            "Data is already up to date until {}. No new data to fetch.",
            window.end
        );
        return Ok(RunSummary::UpToDate { through: watermark });
    }

    let batches = collect_platforms(api, settings, report, &window).await?;
    let committed = committable_watermark(&batches);

    let keys = store.read_column(layout.tab, layout.key_column).await?;
    let populated = count_populated(&keys);

    // Rows inside the window were appended by runs that did not advance the watermark past
    // them. Only the tail starting at the first such row is read back.
    let mut present: HashMap<Fingerprint, usize> = HashMap::new();
    if let Some(from_row) = first_row_in_window(&keys, layout.first_data_row, &window) {
        for row in store.read_rows(layout, from_row).await? {
            if let Some(fingerprint) = row_fingerprint(&row, report) {
                if window.contains(&fingerprint.0) {
                    *present.entry(fingerprint).or_default() += 1;
                }
            }
        }
    }

    let mut next_row = (populated + 1).max(layout.first_data_row);
    let mut rows_written = 0;
    let mut rows_skipped = 0;

    for batch in &batches {
        let mut rows: Vec<Vec<Value>> = Vec::with_capacity(batch.records.len());
        for record in &batch.records {
            match present.get_mut(&record.fingerprint()) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    rows_skipped += 1;
                }
                _ => rows.push(record.to_row(report)),
            }
        }

        if rows.len() < batch.records.len() {
            warn!(
                "Skipping {} {} rows already present in {}",
                batch.records.len() - rows.len(),
                batch.platform,
                layout.tab
            );
        }
        if rows.is_empty() {
            continue;
        }

        store.write_rows(layout, next_row, &rows).await?;
        next_row += rows.len();
        rows_written += rows.len();
        info!("Data successfully inserted for {}", batch.platform);
    }

    match committed {
        Some(date) => {
            store
                .write_cell(layout.tab, marker, &date.format(MARKER_FORMAT).to_string())
                .await?;
            info!("Watermark committed at {}", date);
        }
        None => warn!(
            "Watermark left at {}: not every platform returned {} data for {}",
            watermark, report.name, window
        ),
    }

    Ok(RunSummary::Synced {
        window,
        rows_written,
        rows_skipped,
        committed,
        link: link(&settings.sheet_url, report.link_label),
    })
}

/// Rewrites an overwrite report's rectangle with a full snapshot of `day`.
///
/// When no platform produced rows the destination is left as it is.
pub async fn refill(
    api: &dyn MediationApi,
    store: &dyn RowStore,
    report: &Report,
    settings: &SyncSettings,
    day: NaiveDate,
) -> Result<RunSummary, Error> {
    let layout = &report.layout;
    let window = SyncWindow { start: day, end: day };

    let batches = collect_platforms(api, settings, report, &window).await?;
    let rows: Vec<Vec<Value>> = batches
        .iter()
        .flat_map(|batch| batch.records.iter().map(|r| r.to_row(report)))
        .collect();

    if rows.is_empty() {
        warn!("No data to insert into {}", layout.tab);
        return Ok(RunSummary::NothingToWrite { day });
    }

    let rows_written = rows.len();
    store.clear(layout).await?;

    match layout.header_row {
        Some(header_row) if header_row + 1 == layout.first_data_row => {
            let mut batch: Vec<Vec<Value>> = Vec::with_capacity(rows.len() + 1);
            batch.push(report.header().into_iter().map(Value::String).collect());
            batch.extend(rows);
            store.write_rows(layout, header_row, &batch).await?;
        }
        Some(header_row) => {
            let header: Vec<Vec<Value>> =
                vec![report.header().into_iter().map(Value::String).collect()];
            store.write_rows(layout, header_row, &header).await?;
            store.write_rows(layout, layout.first_data_row, &rows).await?;
        }
        None => store.write_rows(layout, layout.first_data_row, &rows).await?,
    }
    info!("Refilled {} with {} rows for {}", layout.tab, rows_written, day);

    Ok(RunSummary::Refilled {
        day,
        rows_written,
        link: link(&settings.sheet_url, report.link_label),
    })
}
