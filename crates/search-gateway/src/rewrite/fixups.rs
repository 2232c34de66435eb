//! Field-name repairs for queries built from templates with a blank time
//! field

use serde_json::{Map, Value};

/// Rename the empty field key of `range` clauses to `time_field`. Returns the
/// number of clauses repaired.
pub fn fix_range_clauses(filter: &mut Value, time_field: &str) -> usize {
    match filter {
        Value::Array(clauses) => clauses
            .iter_mut()
            .map(|clause| fix_range_clause(clause, time_field))
            .filter(|fixed| *fixed)
            .count(),
        Value::Object(_) => usize::from(fix_range_clause(filter, time_field)),
        _ => 0,
    }
}

fn fix_range_clause(clause: &mut Value, time_field: &str) -> bool {
    let Some(range) = clause
        .as_object_mut()
        .and_then(|c| c.get_mut("range"))
        .and_then(Value::as_object_mut)
    else {
        return false;
    };

    if range.len() != 1 {
        return false;
    }
    let Some(bounds) = range.remove("") else {
        return false;
    };
    range.insert(time_field.to_string(), bounds);
    true
}

/// Point `date_histogram` aggregations with an empty `field` at
/// `time_field`, descending into sub-aggregations. Returns the number of
/// aggregations repaired.
pub fn fix_date_histograms(aggs: &mut Map<String, Value>, time_field: &str) -> usize {
    let mut fixed = 0;
    for agg in aggs.values_mut() {
        let Some(agg) = agg.as_object_mut() else {
            continue;
        };

        if let Some(histogram) = agg.get_mut("date_histogram").and_then(Value::as_object_mut)
            && histogram.get("field").and_then(Value::as_str) == Some("")
        {
            histogram.insert("field".into(), Value::String(time_field.to_string()));
            fixed += 1;
        }

        for key in ["aggs", "aggregations"] {
            if let Some(sub) = agg.get_mut(key).and_then(Value::as_object_mut) {
                fixed += fix_date_histograms(sub, time_field);
            }
        }
    }
    fixed
}
