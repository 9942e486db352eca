//! Validated execution plan.
//!
//! The validator resolves every raw step into a [`PlannedStep`] carrying a
//! closed [`StepOp`] with checked parameters and concrete column bindings.
//! Nothing downstream of validation looks at type strings again.

use serde::Serialize;
use std::collections::BTreeSet;
use std::ops::Range;

use crate::transforms::{EntityType, VectorizeParams};
use crate::types::TransformationKind;

/// A transformation with its parameters already checked.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOp {
    Tokenize { lowercase: bool },
    RemoveStopwords { language: &'static str },
    Lemmatize,
    Stem,
    TagPartsOfSpeech,
    Vectorize(VectorizeParams),
    ExtractEntities { entity_types: BTreeSet<EntityType> },
}

impl StepOp {
    pub fn kind(&self) -> TransformationKind {
        match self {
            Self::Tokenize { .. } => TransformationKind::Tokenization,
            Self::RemoveStopwords { .. } => TransformationKind::StopwordRemoval,
            Self::Lemmatize => TransformationKind::Lemmatization,
            Self::Stem => TransformationKind::Stemming,
            Self::TagPartsOfSpeech => TransformationKind::PosTagging,
            Self::Vectorize(_) => TransformationKind::TextVectorization,
            Self::ExtractEntities { .. } => TransformationKind::NamedEntityRecognition,
        }
    }

    pub fn is_column_wide(&self) -> bool {
        matches!(self, Self::Vectorize(_))
    }
}

/// One input column of a step and the column it writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnBinding {
    pub input: String,
    pub output: String,
    /// The output replaces a column that already existed.
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    /// Zero-based position in the submitted `transformations` list.
    pub index: usize,
    pub op: StepOp,
    pub bindings: Vec<ColumnBinding>,
}

impl PlannedStep {
    pub fn kind(&self) -> TransformationKind {
        self.op.kind()
    }
}

/// A pipeline that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPipeline {
    pub input_column: String,
    pub output_column: Option<String>,
    pub batch_size: usize,
    pub steps: Vec<PlannedStep>,
}

impl ValidatedPipeline {
    /// Split the steps into segments. A new segment starts at every
    /// column-wide step so its fit pass sees all upstream output.
    pub fn segments(&self) -> Vec<&[PlannedStep]> {
        let mut segments = Vec::new();
        let mut start = 0;
        for (i, step) in self.steps.iter().enumerate() {
            if step.op.is_column_wide() && i > start {
                segments.push(&self.steps[start..i]);
                start = i;
            }
        }
        if start < self.steps.len() {
            segments.push(&self.steps[start..]);
        }
        segments
    }

    /// Names of every column the plan derives, in step order.
    pub fn outputs(&self) -> impl Iterator<Item = &ColumnBinding> {
        self.steps.iter().flat_map(|step| step.bindings.iter())
    }
}

/// Consecutive row ranges of at most `size` rows covering `0..rows`.
pub fn batch_ranges(rows: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..rows)
        .step_by(size)
        .map(|start| start..(start + size).min(rows))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::VectorizeMethod;

    fn step(index: usize, op: StepOp) -> PlannedStep {
        PlannedStep {
            index,
            op,
            bindings: Vec::new(),
        }
    }

    #[test]
    fn test_batch_ranges() {
        assert_eq!(batch_ranges(5, 2), vec![0..2, 2..4, 4..5]);
        assert_eq!(batch_ranges(4, 4), vec![0..4]);
        assert!(batch_ranges(0, 10).is_empty());
    }

    #[test]
    fn test_segments_split_at_column_wide_steps() {
        let plan = ValidatedPipeline {
            input_column: "text".to_string(),
            output_column: None,
            batch_size: 10,
            steps: vec![
                step(0, StepOp::Tokenize { lowercase: true }),
                step(1, StepOp::Stem),
                step(2, StepOp::Vectorize(VectorizeParams::new(VectorizeMethod::Tfidf))),
                step(3, StepOp::Lemmatize),
                step(4, StepOp::Vectorize(VectorizeParams::new(VectorizeMethod::Count))),
            ],
        };

        let lengths: Vec<Vec<usize>> = plan
            .segments()
            .iter()
            .map(|segment| segment.iter().map(|s| s.index).collect())
            .collect();
        assert_eq!(lengths, vec![vec![0, 1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn test_leading_column_wide_step() {
        let plan = ValidatedPipeline {
            input_column: "text".to_string(),
            output_column: None,
            batch_size: 10,
            steps: vec![step(0, StepOp::Vectorize(VectorizeParams::new(VectorizeMethod::Count)))],
        };
        assert_eq!(plan.segments().len(), 1);
    }
}
