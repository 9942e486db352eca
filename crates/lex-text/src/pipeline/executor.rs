//! Pipeline executor.
//!
//! Runs a [`ValidatedPipeline`] over a [`ColumnStore`]. Steps are grouped
//! into segments split at column-wide steps; each segment runs batch-major,
//! applying every step of the segment to one batch before moving to the
//! next. A column-wide step at the head of a segment is fitted over all
//! batches of its input first.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ExecutionError;
use crate::pipeline::plan::{PlannedStep, StepOp, ValidatedPipeline, batch_ranges};
use crate::pipeline::progress::{PipelineStage, ProgressReporter, ProgressUpdate};
use crate::store::{ColumnLineage, ColumnStore};
use crate::transforms::{self, FittedVectorizer, Vectorizer};

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub store: ColumnStore,
    /// Fitted vocabulary per vectorized output column.
    pub vocabularies: BTreeMap<String, Vec<String>>,
    pub batches: usize,
}

/// Counts work units across fit and transform passes so progress is
/// monotonic over the whole run.
struct Tracker<'a> {
    reporter: Option<&'a dyn ProgressReporter>,
    done: usize,
    total: usize,
    rows: usize,
    processed_rows: usize,
}

impl Tracker<'_> {
    fn advance(&mut self, sub_stage: String, message: String) {
        self.done += 1;
        if let Some(reporter) = self.reporter {
            let fraction = if self.total == 0 {
                1.0
            } else {
                self.done as f32 / self.total as f32
            };
            reporter.report(
                ProgressUpdate::with_sub_stage(PipelineStage::Executing, sub_stage, fraction, message)
                    .with_rows(self.processed_rows, self.rows),
            );
        }
    }
}

/// Executes validated pipelines.
#[derive(Default, Clone)]
pub struct PipelineExecutor {
    reporter: Option<Arc<dyn ProgressReporter>>,
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}

impl PipelineExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report progress after every batch of every pass.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Run `plan` over `store`.
    ///
    /// On error the partially transformed store is dropped.
    pub fn run(
        &self,
        mut store: ColumnStore,
        plan: &ValidatedPipeline,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let rows = store.rows();
        check_input_column(&store, &plan.input_column)?;

        let segments = plan.segments();
        let batches = batch_ranges(rows, plan.batch_size);
        let total = segments
            .iter()
            .map(|segment| {
                let fits = segment
                    .first()
                    .filter(|step| step.op.is_column_wide())
                    .map_or(0, |step| step.bindings.len());
                batches.len() * (1 + fits)
            })
            .sum();

        info!(
            "Executing {} steps in {} segments over {} rows ({} batches of up to {})",
            plan.steps.len(),
            segments.len(),
            rows,
            batches.len(),
            plan.batch_size
        );

        let mut tracker = Tracker {
            reporter: self.reporter.as_deref(),
            done: 0,
            total,
            rows,
            processed_rows: 0,
        };
        let mut vocabularies = BTreeMap::new();

        for (segment_index, segment) in segments.iter().enumerate() {
            let is_last = segment_index + 1 == segments.len();
            let models = match segment.first() {
                Some(head) => fit_head(&store, head, &batches, &mut tracker, &mut vocabularies)?,
                None => HashMap::new(),
            };

            for (batch_index, range) in batches.iter().enumerate() {
                for step in segment.iter() {
                    for binding in &step.bindings {
                        let model = if step.op.is_column_wide() {
                            models.get(&binding.input)
                        } else {
                            None
                        };
                        let data =
                            transforms::apply(&step.op, &store, &binding.input, range.clone(), model)?;
                        store.write_range(
                            &binding.output,
                            range.start,
                            data,
                            ColumnLineage {
                                source: binding.input.clone(),
                                step: step.index,
                                transformation: step.kind(),
                            },
                        )?;
                    }
                }

                if is_last {
                    tracker.processed_rows = range.end;
                }
                debug!(
                    "Segment {}/{}: batch {}/{} done (rows {}..{})",
                    segment_index + 1,
                    segments.len(),
                    batch_index + 1,
                    batches.len(),
                    range.start,
                    range.end
                );
                tracker.advance(
                    format!("Segment {}/{}", segment_index + 1, segments.len()),
                    segment_message(segment),
                );
            }
        }

        if let Some(name) = &plan.output_column
            && let Some(binding) = plan.steps.last().and_then(|step| step.bindings.first())
        {
            store.rename(&binding.output, name)?;
            if let Some(vocabulary) = vocabularies.remove(&binding.output) {
                vocabularies.insert(name.clone(), vocabulary);
            }
            debug!("Renamed '{}' to '{}'", binding.output, name);
        }

        store.check_complete()?;
        info!("Pipeline finished: {} rows, {} columns", rows, store.columns().len());

        Ok(ExecutionOutcome {
            store,
            vocabularies,
            batches: batches.len(),
        })
    }
}

/// A null cell in the declared input column is fatal.
fn check_input_column(store: &ColumnStore, input_column: &str) -> Result<(), ExecutionError> {
    let cells = store.text_range(input_column, 0..store.rows())?;
    match cells.iter().position(Option::is_none) {
        Some(row) => Err(ExecutionError::NullInputText {
            column: input_column.to_string(),
            row,
        }),
        None => Ok(()),
    }
}

/// Fit the segment head if it is column-wide. Returns one model per input column.
fn fit_head(
    store: &ColumnStore,
    head: &PlannedStep,
    batches: &[std::ops::Range<usize>],
    tracker: &mut Tracker<'_>,
    vocabularies: &mut BTreeMap<String, Vec<String>>,
) -> Result<HashMap<String, FittedVectorizer>, ExecutionError> {
    let StepOp::Vectorize(params) = &head.op else {
        return Ok(HashMap::new());
    };

    let mut models = HashMap::new();
    for binding in &head.bindings {
        let mut vectorizer = Vectorizer::new(params.clone());
        for range in batches {
            vectorizer.observe(store.tokens_range(&binding.input, range.clone())?);
            tracker.advance(
                format!("Step {}: fit", head.index),
                format!("Building vocabulary for '{}'", binding.input),
            );
        }

        let documents = vectorizer.documents();
        let model = vectorizer.finalize().ok_or_else(|| ExecutionError::EmptyVocabulary {
            step: head.index,
            column: binding.input.clone(),
        })?;
        debug!(
            "Step {}: vocabulary of {} terms over {} documents for '{}'",
            head.index,
            model.vocabulary().len(),
            documents,
            binding.input
        );
        vocabularies.insert(binding.output.clone(), model.vocabulary().to_vec());
        models.insert(binding.input.clone(), model);
    }
    Ok(models)
}

fn segment_message(segment: &[PlannedStep]) -> String {
    let names: Vec<&str> = segment.iter().map(|step| step.kind().display_name()).collect();
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::plan::ColumnBinding;
    use crate::pipeline::progress::ClosureProgressReporter;
    use crate::store::{ColumnData, RowError};
    use crate::transforms::{VectorizeMethod, VectorizeParams};
    use parking_lot::Mutex;

    fn bind(input: &str, output: &str) -> Vec<ColumnBinding> {
        vec![ColumnBinding {
            input: input.to_string(),
            output: output.to_string(),
            overwrite: false,
        }]
    }

    fn store(texts: &[&str]) -> ColumnStore {
        ColumnStore::from_text_columns([(
            "text",
            texts.iter().map(|t| Some(t.to_string())).collect(),
        )])
        .unwrap()
    }

    fn plan(steps: Vec<PlannedStep>, batch_size: usize) -> ValidatedPipeline {
        ValidatedPipeline {
            input_column: "text".to_string(),
            output_column: None,
            batch_size,
            steps,
        }
    }

    fn tokenize_then_vectorize(max_features: usize) -> Vec<PlannedStep> {
        let mut params = VectorizeParams::new(VectorizeMethod::Tfidf);
        params.max_features = max_features;
        vec![
            PlannedStep {
                index: 0,
                op: StepOp::Tokenize { lowercase: true },
                bindings: bind("text", "text_tokens"),
            },
            PlannedStep {
                index: 1,
                op: StepOp::Vectorize(params),
                bindings: bind("text_tokens", "text_tokens_tfidf"),
            },
        ]
    }

    #[test]
    fn test_progress_monotonic_and_complete() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = updates.clone();
        let executor = PipelineExecutor::new().with_reporter(Arc::new(
            ClosureProgressReporter::new(move |update| sink.lock().push(update)),
        ));

        let store = store(&["a b a", "b c", "c d", "d a", "b"]);
        let outcome = executor.run(store, &plan(tokenize_then_vectorize(2), 2)).unwrap();
        assert_eq!(outcome.batches, 3);

        let updates = updates.lock();
        // Segment 1 (tokenize): 3 batches; segment 2: 3 fit + 3 transform.
        assert_eq!(updates.len(), 9);
        let counters: Vec<usize> = updates.iter().filter_map(|u| u.processed_rows).collect();
        assert!(counters.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(counters.last(), Some(&5));
        assert!(updates.windows(2).all(|w| w[0].progress <= w[1].progress));
        assert!(updates[..3].iter().all(|u| u.processed_rows == Some(0)));
    }

    #[test]
    fn test_vectors_fixed_length_and_vocabulary_recorded() {
        let store = store(&["a b a", "b c"]);
        let outcome = PipelineExecutor::new()
            .run(store, &plan(tokenize_then_vectorize(2), 1))
            .unwrap();

        assert_eq!(
            outcome.vocabularies.get("text_tokens_tfidf"),
            Some(&vec!["a".to_string(), "b".to_string()])
        );
        let column = outcome.store.column("text_tokens_tfidf").unwrap();
        let ColumnData::Vectors(cells) = &column.data else {
            panic!("expected vectors");
        };
        assert!(cells.iter().all(|c| c.as_ref().unwrap().len() == 2));
        assert_eq!(column.lineage.as_ref().map(|l| l.step), Some(1));
    }

    #[test]
    fn test_null_input_is_fatal_with_row() {
        let store = ColumnStore::from_text_columns([(
            "text",
            vec![Some("ok".to_string()), Some("fine".to_string()), None],
        )])
        .unwrap();
        let err = PipelineExecutor::new()
            .run(store, &plan(tokenize_then_vectorize(10), 2))
            .unwrap_err();
        assert_eq!(
            err,
            ExecutionError::NullInputText {
                column: "text".to_string(),
                row: 2
            }
        );
    }

    #[test]
    fn test_null_in_other_column_is_row_error() {
        let store = ColumnStore::from_text_columns([
            ("text", vec![Some("one".to_string()), Some("two".to_string())]),
            ("note", vec![None, Some("hi there".to_string())]),
        ])
        .unwrap();
        let steps = vec![PlannedStep {
            index: 0,
            op: StepOp::Tokenize { lowercase: false },
            bindings: bind("note", "note_tokens"),
        }];

        let outcome = PipelineExecutor::new().run(store, &plan(steps, 1)).unwrap();
        let ColumnData::Tokens(cells) = &outcome.store.column("note_tokens").unwrap().data else {
            panic!("expected tokens");
        };
        assert_eq!(cells[0], Err(RowError::new(0, "null text")));
        assert_eq!(cells[1], Ok(vec!["hi".to_string(), "there".to_string()]));
    }

    #[test]
    fn test_empty_vocabulary_is_fatal() {
        let store = store(&["   ", ""]);
        let err = PipelineExecutor::new()
            .run(store, &plan(tokenize_then_vectorize(10), 10))
            .unwrap_err();
        assert_eq!(
            err,
            ExecutionError::EmptyVocabulary {
                step: 1,
                column: "text_tokens".to_string()
            }
        );
    }

    #[test]
    fn test_output_column_renames_last_output() {
        let store = store(&["x y"]);
        let mut plan = plan(tokenize_then_vectorize(10), 10);
        plan.output_column = Some("features".to_string());

        let outcome = PipelineExecutor::new().run(store, &plan).unwrap();
        assert!(outcome.store.column("features").is_some());
        assert!(outcome.store.column("text_tokens_tfidf").is_none());
        assert!(outcome.vocabularies.contains_key("features"));
    }

    #[test]
    fn test_batch_size_does_not_change_output() {
        let texts = ["the cat sat", "a dog ran", "the dog sat", "cats and dogs"];
        let small = PipelineExecutor::new()
            .run(store(&texts), &plan(tokenize_then_vectorize(5), 1))
            .unwrap();
        let large = PipelineExecutor::new()
            .run(store(&texts), &plan(tokenize_then_vectorize(5), 100))
            .unwrap();

        for row in 0..texts.len() {
            let a = small.store.column("text_tokens_tfidf").unwrap().data.cell_json(row).unwrap();
            let b = large.store.column("text_tokens_tfidf").unwrap().data.cell_json(row).unwrap();
            assert_eq!(a, b);
        }
    }
}
