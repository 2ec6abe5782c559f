//! Positional extraction of chart rows into named record fields.

use crate::metrics::{Chart, ChartData};
use crate::poller::RawHostPayload;
use crate::record::MetricFields;

/// Map every chart present in `payload` onto the record fields.
///
/// Pure and infallible: a chart that is absent, has no rows, or has a row
/// shorter than its mapping simply leaves the affected fields unset.
pub fn normalize(payload: &RawHostPayload) -> MetricFields {
    let mut fields = MetricFields::default();
    for chart in Chart::ALL {
        if let Some(data) = payload.chart(chart) {
            apply_chart(&mut fields, chart, data);
        }
    }
    fields
}

fn apply_chart(fields: &mut MetricFields, chart: Chart, data: &ChartData) {
    let Some(row) = data.first_row() else {
        return;
    };
    for entry in chart.mapping() {
        fields.set(entry.field, row.get(entry.index).copied().flatten());
    }
}
