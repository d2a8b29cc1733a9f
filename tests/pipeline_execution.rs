use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use rust_data_pipeline::consumer::{Consumer, Flow, Output};
use rust_data_pipeline::function::{all, any, col, lit, max, EvalFunction, Expr};
use rust_data_pipeline::pipeline::Pipeline;
use rust_data_pipeline::processing;
use rust_data_pipeline::processor::{Insert, Opened, Processor};
use rust_data_pipeline::source::{IterSource, RowSource, RowStream};
use rust_data_pipeline::types::{DataSet, DataType, Field, Row, Schema, Value};
use rust_data_pipeline::PipelineError;

fn numbers(n: i64) -> DataSet {
    DataSet::new(
        Schema::new(vec![Field::new("n", DataType::Int64)]),
        (0..n).map(|i| vec![Value::Int64(i)]).collect(),
    )
}

fn boroughs() -> DataSet {
    DataSet::new(
        Schema::from_names(["Borough", "Street"]).unwrap(),
        vec![
            vec![Value::from("Brooklyn"), Value::from("Atlantic Ave")],
            vec![Value::from("Bronx"), Value::from("Grand Concourse")],
        ],
    )
}

/// Source that counts how many rows were pulled from it.
#[derive(Debug)]
struct CountingSource {
    inner: DataSet,
    pulled: Arc<AtomicUsize>,
}

impl RowSource for CountingSource {
    fn schema(&self) -> Result<Schema, PipelineError> {
        Ok(self.inner.schema.clone())
    }

    fn open(&self) -> Result<RowStream<'_>, PipelineError> {
        let pulled = Arc::clone(&self.pulled);
        Ok(Box::new(self.inner.iter_rows().map(move |row| {
            pulled.fetch_add(1, Ordering::SeqCst);
            Ok(row)
        })))
    }
}

/// Collector that records forwarded rows and close calls.
#[derive(Debug, Default)]
struct Probe {
    received: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

struct ProbeConsumer {
    received: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl Processor for Probe {
    fn open(&self, _schema: &Schema) -> Result<Opened, PipelineError> {
        Ok(Opened::Collector(Box::new(ProbeConsumer {
            received: Arc::clone(&self.received),
            closed: Arc::clone(&self.closed),
        })))
    }
}

impl Consumer for ProbeConsumer {
    fn consume(&mut self, _row: Row) -> Result<Flow, PipelineError> {
        self.received.fetch_add(1, Ordering::SeqCst);
        Ok(Flow::Continue)
    }

    fn close(&mut self) -> Result<Option<Output>, PipelineError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

#[test]
fn schema_is_threaded_through_every_step() {
    let p = Pipeline::from_dataset(boroughs())
        .select(["Street", "Borough"])
        .insert(Insert::new(vec!["Zip".to_string()]).at(1))
        .rename(["Borough"], ["borough"]);
    let schema = p.output_schema().unwrap();
    assert_eq!(
        schema.field_names().collect::<Vec<_>>(),
        vec!["Street", "Zip", "borough"]
    );

    let ds = p.to_dataset().unwrap();
    assert_eq!(ds.schema, schema);
    assert_eq!(
        ds.rows[0],
        vec![Value::from("Atlantic Ave"), Value::Null, Value::from("Brooklyn")]
    );
}

#[test]
fn unknown_columns_fail_before_any_row_is_read() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let source = CountingSource {
        inner: numbers(10),
        pulled: Arc::clone(&pulled),
    };
    let err = Pipeline::new(source)
        .filter(col("missing").is_null())
        .run()
        .unwrap_err();
    assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    assert_eq!(pulled.load(Ordering::SeqCst), 0);
}

#[test]
fn rows_are_read_once_and_keep_their_order() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let source = CountingSource {
        inner: numbers(20),
        pulled: Arc::clone(&pulled),
    };
    let rows = Pipeline::new(source)
        .update(["n"], col("n") * lit(2))
        .collect_rows()
        .unwrap();
    assert_eq!(pulled.load(Ordering::SeqCst), 20);
    let ids: Vec<usize> = rows.iter().map(Row::id).collect();
    assert_eq!(ids, (0..20).collect::<Vec<_>>());
    assert_eq!(rows[7].values(), &[Value::Int64(14)]);
}

#[test]
fn collector_sees_exactly_what_the_last_producer_emits() {
    let p = Pipeline::from_dataset(numbers(10)).filter(col("n").lt(lit(4)));
    let probe = Probe::default();
    let received = Arc::clone(&probe.received);
    let closed = Arc::clone(&probe.closed);

    assert!(p.run_with(probe).unwrap().is_none());
    assert_eq!(received.load(Ordering::SeqCst), 4);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(p.to_dataset().unwrap().row_count(), 4);
}

#[test]
fn rerunning_a_pipeline_gives_the_same_result() {
    let p = Pipeline::from_dataset(boroughs()).update(["Borough"], col("Borough").upper());
    let expected = vec![Value::from("BROOKLYN"), Value::from("BRONX")];
    for _ in 0..2 {
        let ds = p.to_dataset().unwrap();
        let got: Vec<Value> = ds.column("Borough").unwrap().into_iter().cloned().collect();
        assert_eq!(got, expected);
    }
}

#[test]
fn not_empty_filter_drops_empty_values() {
    let ds = DataSet::new(
        Schema::from_names(["Borough"]).unwrap(),
        ["BROOKLYN", "", "QUEENS"]
            .into_iter()
            .map(|b| vec![Value::from(b)])
            .collect(),
    );
    let values = Pipeline::from_dataset(ds)
        .filter(col("Borough").is_not_empty())
        .distinct_values("Borough")
        .unwrap();
    assert_eq!(values, vec![Value::from("BROOKLYN"), Value::from("QUEENS")]);
}

#[test]
fn aggregates_are_rejected_on_streams_but_evaluate_eagerly() {
    let ds = numbers(5);
    let is_max = col("n").eq(max("n"));

    let err = Pipeline::from_dataset(ds.clone())
        .filter(is_max.clone())
        .run()
        .unwrap_err();
    assert!(matches!(err, PipelineError::NotStreamable { .. }));

    let kept = processing::filter(&ds, &is_max).unwrap();
    assert_eq!(kept.rows, vec![vec![Value::Int64(4)]]);
}

#[test]
fn early_termination_stops_pulling_and_closes_once() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let source = CountingSource {
        inner: numbers(100),
        pulled: Arc::clone(&pulled),
    };
    let probe = Probe::default();
    let received = Arc::clone(&probe.received);
    let closed = Arc::clone(&probe.closed);

    Pipeline::new(source)
        .filter_limit(col("n").gt_eq(lit(50)), 2)
        .run_with(probe)
        .unwrap();

    assert!(pulled.load(Ordering::SeqCst) <= 100);
    assert_eq!(pulled.load(Ordering::SeqCst), 52);
    assert_eq!(received.load(Ordering::SeqCst), 2);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn head_and_sort_compose() {
    let p = Pipeline::from_dataset(numbers(10)).sort(["n"], true);
    let top = p.head(3).unwrap();
    assert_eq!(
        top.rows,
        vec![
            vec![Value::Int64(9)],
            vec![Value::Int64(8)],
            vec![Value::Int64(7)],
        ]
    );
}

#[test]
fn seeded_samples_repeat() {
    let p = Pipeline::from_dataset(numbers(50)).sample(5, Some(7));
    let first = p.to_dataset().unwrap();
    assert_eq!(first.row_count(), 5);
    assert_eq!(first, p.to_dataset().unwrap());
}

#[test]
fn single_pass_sources_cannot_be_rerun() {
    let schema = Schema::from_names(["a"]).unwrap();
    let source = IterSource::new(schema, (0..3).map(|i| vec![Value::Int64(i)]));
    let p = Pipeline::new(source);
    assert_eq!(p.count().unwrap(), 3);
    assert!(matches!(
        p.count().unwrap_err(),
        PipelineError::SourceExhausted
    ));
}

#[test]
fn evaluation_errors_abort_the_run() {
    let p = Pipeline::from_dataset(numbers(3)).update(["n"], col("n") / lit(0));
    let err = p.to_dataset().unwrap_err();
    assert!(matches!(err, PipelineError::Evaluation { .. }));
}

#[test]
fn rows_narrower_than_the_schema_fail_the_run() {
    let short = || {
        IterSource::new(
            Schema::from_names(["a", "b"]).unwrap(),
            vec![vec![Value::from("x")]],
        )
    };

    let err = Pipeline::new(short()).select(["b"]).to_dataset().unwrap_err();
    assert!(matches!(err, PipelineError::SchemaMismatch { .. }));

    let err = Pipeline::new(short()).to_dataset().unwrap_err();
    assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    assert!(err.to_string().contains("row has 1 values but the schema has 2 columns"));
}

#[test]
fn rows_wider_than_the_schema_fail_the_run() {
    let source = IterSource::new(
        Schema::from_names(["a"]).unwrap(),
        vec![vec![Value::from("x"), Value::from("y")]],
    );
    let err = Pipeline::new(source).count().unwrap_err();
    assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
}

#[test]
fn iter_rows_pulls_only_what_is_consumed() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let source = CountingSource {
        inner: numbers(100),
        pulled: Arc::clone(&pulled),
    };
    let p = Pipeline::new(source).filter(col("n").gt_eq(lit(10)));

    let mut rows = p.iter_rows().unwrap();
    assert_eq!(rows.next().unwrap().unwrap().values(), &[Value::Int64(10)]);
    assert_eq!(pulled.load(Ordering::SeqCst), 11);
    drop(rows);

    pulled.store(0, Ordering::SeqCst);
    let limited: Vec<Row> = p
        .limit(3)
        .iter_rows()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(limited.iter().map(Row::id).collect::<Vec<_>>(), vec![10, 11, 12]);
    assert_eq!(pulled.load(Ordering::SeqCst), 13);
}

#[test]
fn iter_rows_yields_buffered_rows_after_the_stream_ends() {
    let p = Pipeline::from_dataset(numbers(5)).sort(["n"], true).limit(2);
    let values: Vec<Value> = p
        .iter_rows()
        .unwrap()
        .map(|row| row.unwrap().values()[0].clone())
        .collect();
    assert_eq!(values, vec![Value::Int64(4), Value::Int64(3)]);
}

#[test]
fn iter_rows_ends_after_an_error() {
    let p = Pipeline::from_dataset(numbers(3)).update(["n"], lit(6) / col("n"));
    let mut rows = p.iter_rows().unwrap();
    assert!(matches!(
        rows.next(),
        Some(Err(PipelineError::Evaluation { .. }))
    ));
    assert!(rows.next().is_none());
    assert_eq!(p.metrics().snapshot().failed_runs, 1);
}

#[test]
fn delete_and_move_columns_reshape_the_stream() {
    let p = Pipeline::from_dataset(boroughs())
        .delete(col("Borough").eq(lit("Bronx")))
        .move_columns(["Street"], 0);
    let ds = p.to_dataset().unwrap();
    assert_eq!(
        ds.schema.field_names().collect::<Vec<_>>(),
        vec!["Street", "Borough"]
    );
    assert_eq!(
        ds.rows,
        vec![vec![Value::from("Atlantic Ave"), Value::from("Brooklyn")]]
    );

    let eager = processing::delete(&boroughs(), &col("Borough").eq(lit("Bronx"))).unwrap();
    assert_eq!(eager.row_count(), 1);
}

fn table(values: &[(i64, String)]) -> DataSet {
    DataSet::new(
        Schema::new(vec![
            Field::new("n", DataType::Int64),
            Field::new("s", DataType::Utf8),
        ]),
        values
            .iter()
            .map(|(n, s)| vec![Value::Int64(*n), Value::from(s.as_str())])
            .collect(),
    )
}

fn sample_expr() -> Expr {
    (col("n") * lit(3)).gt(lit(10)) & col("s").trim().is_not_empty()
}

/// Guards that only hold up if evaluation stops at the first deciding operand.
fn guarded_exprs() -> Vec<Expr> {
    vec![
        all([col("n").neq(lit(0)), (lit(10) / col("n")).gt(lit(1))]),
        any([col("n").eq(lit(0)), (lit(100) / col("n")).lt(lit(0))]),
    ]
}

proptest! {
    #[test]
    fn prepared_and_eager_evaluation_agree(
        values in prop::collection::vec((-1_000i64..1_000, "[ab ]{0,3}"), 0..40)
    ) {
        let ds = table(&values);
        let expr = sample_expr();

        let eager = expr.eval(&ds).unwrap();
        let evaluator = expr.prepare(&ds.schema).unwrap();
        let streamed: Vec<Value> = ds
            .iter_rows()
            .map(|row| evaluator.eval(&row).unwrap())
            .collect();
        prop_assert_eq!(eager, streamed);
    }

    #[test]
    fn guarded_expressions_agree_in_both_modes(
        values in prop::collection::vec((-3i64..3, "[ab]{0,1}"), 0..20)
    ) {
        let ds = table(&values);
        for expr in guarded_exprs() {
            let eager = expr.eval(&ds).unwrap();
            let evaluator = expr.prepare(&ds.schema).unwrap();
            let streamed: Vec<Value> = ds
                .iter_rows()
                .map(|row| evaluator.eval(&row).unwrap())
                .collect();
            prop_assert_eq!(eager, streamed);
        }
    }

    #[test]
    fn stream_filter_matches_eager_filter(
        values in prop::collection::vec((-1_000i64..1_000, "[ab ]{0,3}"), 0..40)
    ) {
        let ds = table(&values);
        let eager = processing::filter(&ds, &sample_expr()).unwrap();
        let streamed = Pipeline::from_dataset(ds).filter(sample_expr()).to_dataset().unwrap();
        prop_assert_eq!(eager, streamed);
    }
}
