//! Batch partitioning — run this before defining the state machine.
//!
//! Rules enforced:
//! 1. No batch of the plan is empty.
//! 2. A school code appears at most once across the whole plan.
//! 3. Every code of the work domain is covered by some batch.
//!
//! Plan codes outside the domain are skipped; batches left empty are dropped
//! and the survivors re-sequenced from 0.

use std::collections::HashSet;

use crate::{
    models::{Batch, PartitionPlan, WorkDomain},
    EngineError,
};

/// Validate the hand-authored plan.
///
/// # Errors
/// - [`EngineError::EmptyBatch`] if a batch has no school.
/// - [`EngineError::DuplicateSchool`] if a code appears twice.
pub fn validate_plan(plan: &PartitionPlan) -> Result<(), EngineError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for (index, batch) in plan.batches.iter().enumerate() {
        if batch.is_empty() {
            return Err(EngineError::EmptyBatch(index));
        }
        for code in batch {
            if !seen.insert(code.as_str()) {
                return Err(EngineError::DuplicateSchool(code.clone()));
            }
        }
    }
    Ok(())
}

/// Split `domain` into ordered batches following `plan`.
///
/// # Errors
/// Plan validation errors, or [`EngineError::UncoveredSchools`] if the domain
/// holds codes the plan never mentions.
pub fn partition(domain: &WorkDomain, plan: &PartitionPlan) -> Result<Vec<Batch>, EngineError> {
    validate_plan(plan)?;

    let planned: HashSet<&str> = plan.batches.iter().flatten().map(String::as_str).collect();
    let uncovered: Vec<String> = domain
        .codes()
        .iter()
        .filter(|code| !planned.contains(code.as_str()))
        .cloned()
        .collect();
    if !uncovered.is_empty() {
        return Err(EngineError::UncoveredSchools(uncovered));
    }

    let batches = plan
        .batches
        .iter()
        .map(|group| {
            group
                .iter()
                .filter(|code| domain.contains(code))
                .cloned()
                .collect::<Vec<_>>()
        })
        .filter(|schools| !schools.is_empty())
        .enumerate()
        .map(|(index, schools)| Batch { index, schools })
        .collect();

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn full_domain_reproduces_the_plan() {
        let plan = PartitionPlan::syllabus();
        let batches = partition(&plan.domain(), &plan).expect("valid plan");

        assert_eq!(batches.len(), 9);
        for (i, batch) in batches.iter().enumerate() {
            assert_eq!(batch.index, i);
            assert_eq!(batch.schools, plan.batches[i]);
        }
    }

    #[test]
    fn small_domain_keeps_plan_order_and_resequences() {
        let plan = PartitionPlan::syllabus();
        let domain = WorkDomain::new(["GEC", "CMS", "HSS", "EDU", "FSE", "ASE", "CSE"]);
        let batches = partition(&domain, &plan).unwrap();

        let schools: Vec<Vec<&str>> = batches
            .iter()
            .map(|b| b.schools.iter().map(String::as_str).collect())
            .collect();
        assert_eq!(
            schools,
            vec![vec!["GEC"], vec!["CMS", "HSS"], vec!["EDU", "FSE"], vec!["ASE", "CSE"]]
        );
        assert_eq!(batches.iter().map(|b| b.index).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn skipped_middle_batch_is_dropped() {
        let plan = PartitionPlan::new(vec![vec!["A"], vec!["B"], vec!["C"]]);
        let batches = partition(&WorkDomain::new(["A", "C"]), &plan).unwrap();
        assert_eq!(batches, vec![
            Batch { index: 0, schools: vec!["A".into()] },
            Batch { index: 1, schools: vec!["C".into()] },
        ]);
    }

    #[test]
    fn duplicate_school_is_rejected() {
        let plan = PartitionPlan::new(vec![vec!["GEC", "CMS"], vec!["CMS"]]);
        assert!(matches!(
            validate_plan(&plan),
            Err(EngineError::DuplicateSchool(code)) if code == "CMS"
        ));
    }

    #[test]
    fn empty_batch_is_rejected() {
        let plan = PartitionPlan::new(vec![vec!["GEC"], vec![]]);
        assert!(matches!(validate_plan(&plan), Err(EngineError::EmptyBatch(1))));
    }

    #[test]
    fn uncovered_school_is_rejected_not_dropped() {
        let plan = PartitionPlan::syllabus();
        let domain = WorkDomain::new(["GEC", "XYZ"]);
        assert!(matches!(
            partition(&domain, &plan),
            Err(EngineError::UncoveredSchools(codes)) if codes == vec!["XYZ".to_string()]
        ));
    }

    #[test]
    fn unknown_codes_in_plan_are_passed_through() {
        // The worker, not the partitioner, skips codes it does not recognise.
        let plan = PartitionPlan::new(vec![vec!["NOT_A_SCHOOL", "GEC"]]);
        let batches = partition(&plan.domain(), &plan).unwrap();
        assert_eq!(batches[0].schools, vec!["NOT_A_SCHOOL", "GEC"]);
    }

    proptest! {
        #[test]
        fn batches_are_disjoint_and_concatenate_to_the_plan(
            mask in proptest::collection::vec(any::<bool>(), 39)
        ) {
            let plan = PartitionPlan::syllabus();
            let all = plan.domain();
            let domain = WorkDomain::new(
                all.codes().iter().zip(&mask).filter(|(_, keep)| **keep).map(|(c, _)| c.clone()),
            );

            let batches = partition(&domain, &plan).unwrap();
            let concatenated: Vec<String> = batches.iter().flat_map(|b| b.schools.clone()).collect();

            // Plan order, restricted to the domain: nothing dropped, nothing duplicated.
            prop_assert_eq!(&concatenated, &domain.codes().to_vec());
            let unique: HashSet<&String> = concatenated.iter().collect();
            prop_assert_eq!(unique.len(), concatenated.len());
            for (i, batch) in batches.iter().enumerate() {
                prop_assert_eq!(batch.index, i);
                prop_assert!(!batch.schools.is_empty());
            }
        }
    }
}
