mod common;

use chrono::NaiveDate;
use common::{dataset, reading};
use stocklab::{
    aggregate::{AggregationSpec, aggregate},
    data::{Dataset, Value},
    export::{UTF8_BOM, write_aggregated_rows, write_columns, write_recommendations},
    inventory::summarize,
    policy::RecommendationPolicy,
    recommend::recommend_as_of,
    script::{ChartKind, ScriptOptions, render_script},
};

fn to_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).expect("utf-8 output")
}

#[test]
fn aggregated_rows_are_written_with_bom() {
    let data = dataset(&[
        &[("region", Value::from("north")), ("units", Value::from(2.5))],
        &[("region", Value::from("south, east")), ("units", Value::from(3.0))],
    ]);
    let spec = AggregationSpec::new("region", vec!["units".into()]);
    let rows = aggregate(&data, &spec);
    let mut out = Vec::new();
    write_aggregated_rows(&mut out, &spec, &rows).expect("write");
    let text = to_string(out);
    assert!(text.starts_with(UTF8_BOM));
    assert_eq!(
        text.trim_start_matches(UTF8_BOM),
        "region,units,count\nnorth,2.5,1\n\"south, east\",3,1\n"
    );
}

#[test]
fn recommendations_use_fixed_headers() {
    let inventory: Dataset = [
        reading("Widget", 1, 200.0, 100.0, 0.0),
        reading("Widget", 2, 200.0, 100.0, 0.0),
        reading("Widget", 3, 200.0, 40.0, 0.0),
        reading("Widget", 4, 200.0, 100.0, 0.0),
        reading("Sprocket", 1, 100.0, 50.0, 0.0),
        reading("Sprocket", 2, 90.0, 50.0, 0.0),
    ]
    .into_iter()
    .collect();
    let today = NaiveDate::from_ymd_opt(2024, 2, 28).expect("date");
    let recs = recommend_as_of(&summarize(&inventory), today, &RecommendationPolicy::default());
    let mut out = Vec::new();
    write_recommendations(&mut out, &recs).expect("write");
    let text = to_string(out);
    let lines: Vec<&str> = text.trim_start_matches(UTF8_BOM).lines().collect();
    assert_eq!(
        lines,
        vec![
            "product,current_stock,min_available,recommended_order,priority,estimated_delivery,reason,trend",
            "Widget,200,40,62,high,2024-03-01,Available stock dropping sharply,0.0%",
            "Sprocket,95,50,50,high,2024-03-01,Stock trending down,-10.0%",
        ]
    );
}

#[test]
fn selected_columns_leave_absent_cells_empty() {
    let data = dataset(&[
        &[("a", Value::from(1.0)), ("b", Value::from("x"))],
        &[("a", Value::from(2.0))],
    ]);
    let mut out = Vec::new();
    write_columns(&mut out, &data, &["b".to_string(), "a".to_string()]).expect("write");
    assert_eq!(
        to_string(out).trim_start_matches(UTF8_BOM),
        "b,a\nx,1\n,2\n"
    );
}

#[test]
fn script_reproduces_the_aggregation() {
    let spec = AggregationSpec::new("region", vec!["units".into()])
        .with_sort("axis".parse().expect("sort key"), "desc".parse().expect("order"));
    let script = render_script(
        &spec,
        &ScriptOptions {
            data_file: "stock.csv".into(),
            selected_columns: vec!["region".into(), "units".into()],
            chart: ChartKind::Line,
        },
    );
    assert!(script.starts_with("import pandas as pd\n"));
    assert!(script.contains("selected_df = df[['region', 'units']]"));
    assert!(script.contains("sort_column = 'region'"));
    assert!(script.contains("grouped_df.plot(x='region', y='units', kind='line', ax=plt.gca())"));
    assert!(script.contains("plt.title('Aggregation result (SUM)')"));
}
