//! Property-based tests for the analysis pipeline using proptest.
//!
//! These tests check the structural guarantees every result must satisfy
//! regardless of input:
//!
//! - Analysis terminates and is deterministic
//! - Steps cover the input without gaps or overlaps
//! - Every id referenced by an assumption, flag or edge exists
//! - Consecutive steps are chained by sequential edges

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::collections::HashSet;

    use crate::pipeline::analyze_proof;
    use crate::segment::segment;
    use crate::types::{AnalysisResult, EdgeKind, NodeId, StepId};

    // Sentences drawn from the shapes the analyzer recognizes
    fn sentence() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("Let $x$ be a real number."),
            Just("Let G be a finite group."),
            Just("Suppose that $n$ is odd."),
            Just("Fix $\\epsilon > 0$."),
            Just("Define $f(x) = x^2$."),
            Just("Then $x + y > 0$."),
            Just("Hence $n^2$ is odd."),
            Just("By Theorem 3, $x^2 \\geq 0$."),
            Just("By Zorn's lemma, a maximal element exists."),
            Just("Case 1: assume $k$ is even."),
            Just("In all cases, $m$ divides $n$."),
            Just("By Step 1, $x$ is positive."),
            Just("$$\\sum_{i=1}^n i = \\frac{n(n+1)}{2}.$$"),
            Just("\\begin{proof}"),
            Just("\\end{proof}"),
            Just("so the claim follows."),
        ]
    }

    fn separator() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just(" "),
            Just("\n"),
            Just("\n\n"),
            Just("\n\\item "),
            Just("\n1. "),
        ]
    }

    fn proof_text() -> impl Strategy<Value = String> {
        prop::collection::vec((sentence(), separator()), 0..12).prop_map(|parts| {
            parts
                .into_iter()
                .map(|(sentence, sep)| format!("{}{}", sentence, sep))
                .collect()
        })
    }

    fn any_text() -> impl Strategy<Value = String> {
        prop_oneof![proof_text(), "[ -~\n]{0,200}", any::<String>()]
    }

    fn assert_referential_integrity(result: &AnalysisResult) -> Result<(), TestCaseError> {
        let steps: HashSet<StepId> = result.steps.iter().map(|s| s.id).collect();
        for assumption in &result.assumptions {
            prop_assert!(steps.contains(&assumption.step_id));
        }
        for flag in &result.flags {
            prop_assert!(steps.contains(&flag.step_id));
        }
        let nodes: HashSet<NodeId> = result.graph.nodes.iter().map(|n| n.id).collect();
        for edge in &result.graph.edges {
            prop_assert!(nodes.contains(&edge.source), "dangling source {}", edge.source);
            prop_assert!(nodes.contains(&edge.target), "dangling target {}", edge.target);
        }
        Ok(())
    }

    proptest! {
        /// Analysis returns for any input and repeats itself exactly.
        #[test]
        fn analysis_is_deterministic(text in any_text()) {
            let first = analyze_proof(&text);
            let second = analyze_proof(&text);
            prop_assert_eq!(first.fingerprint(), second.fingerprint());
        }

        /// No id in the result points at something that does not exist.
        #[test]
        fn ids_are_referentially_intact(text in any_text()) {
            let result = analyze_proof(&text);
            assert_referential_integrity(&result)?;
        }

        /// Flag ids are dense and ordered.
        #[test]
        fn flag_ids_are_sequential(text in proof_text()) {
            let result = analyze_proof(&text);
            for (index, flag) in result.flags.iter().enumerate() {
                prop_assert_eq!(flag.id.index(), index);
            }
        }

        /// Stitching steps back together with the whitespace between them
        /// reproduces the input.
        #[test]
        fn steps_cover_input(text in proof_text()) {
            let segments = segment(&text);
            let mut cursor = 0;
            for segment in &segments {
                prop_assert!(segment.span.start >= cursor);
                prop_assert!(text[cursor..segment.span.start].trim().is_empty());
                prop_assert_eq!(&text[segment.span.clone()], segment.text.as_str());
                cursor = segment.span.end;
            }
            prop_assert!(text[cursor..].trim().is_empty());
            prop_assert_eq!(segments.is_empty(), text.trim().is_empty());
        }

        /// Steps are numbered S1..Sn and chained S_i -> S_{i+1}.
        #[test]
        fn steps_form_sequential_chain(text in proof_text()) {
            let result = analyze_proof(&text);
            prop_assert!(result.errors.iter().all(|e| !e.contains("stage failed")));
            for (index, step) in result.steps.iter().enumerate() {
                prop_assert_eq!(step.id, StepId::from_index(index));
            }
            let chain: Vec<(NodeId, NodeId)> = result
                .graph
                .edges_of_kind(EdgeKind::Sequential)
                .map(|e| (e.source, e.target))
                .collect();
            let expected: Vec<(NodeId, NodeId)> = result
                .steps
                .windows(2)
                .map(|pair| (NodeId::from(pair[0].id), NodeId::from(pair[1].id)))
                .collect();
            prop_assert_eq!(chain, expected);
        }
    }
}
