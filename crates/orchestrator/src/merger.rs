//! Slot materialization from raw phase outputs.
//!
//! Slots are pure functions of `raw_phase_outputs` and the mode's slot
//! rules. Composite slots keep a fixed section order and show a pending
//! placeholder for every contributor that has not completed yet.

use std::collections::BTreeMap;

use schemaforge_core::{
    ArtifactSection, PhaseContent, PhaseId, PhaseResult, PhaseStatus, SectionBody, SlotId,
    SlotRule,
};

pub struct ContentMerger;

impl ContentMerger {
    pub fn merge(
        raw_phase_outputs: &BTreeMap<PhaseId, PhaseResult>,
        slot_rules: &[SlotRule],
    ) -> BTreeMap<SlotId, PhaseResult> {
        slot_rules
            .iter()
            .filter_map(|rule| Self::merge_slot(raw_phase_outputs, rule).map(|result| (rule.slot, result)))
            .collect()
    }

    /// Materialize one slot, or `None` while none of its sources has completed.
    pub fn merge_slot(
        raw_phase_outputs: &BTreeMap<PhaseId, PhaseResult>,
        rule: &SlotRule,
    ) -> Option<PhaseResult> {
        let completed = |phase: &PhaseId| raw_phase_outputs.get(phase).filter(|r| r.is_completed());

        if !rule.is_composite() {
            return rule.sources.first().and_then(completed).cloned();
        }

        let ready = rule.sources.iter().filter(|p| completed(*p).is_some()).count();
        if ready == 0 {
            return None;
        }

        let sections = rule
            .sources
            .iter()
            .map(|phase| match completed(phase) {
                Some(result) => ArtifactSection {
                    phase: *phase,
                    heading: result.title.clone(),
                    body: SectionBody::Ready(result.content.render()),
                },
                None => ArtifactSection {
                    phase: *phase,
                    heading: phase.title().to_string(),
                    body: SectionBody::pending(),
                },
            })
            .collect();

        Some(PhaseResult {
            phase: rule.sources[0],
            title: rule.slot.title().to_string(),
            content: PhaseContent::Composite(sections),
            rationale: format!("{} of {} sections ready", ready, rule.sources.len()),
            status: PhaseStatus::Completed,
        })
    }

    /// Slots whose value depends on `phase`.
    pub fn affected_slots(slot_rules: &[SlotRule], phase: PhaseId) -> impl Iterator<Item = &SlotRule> {
        slot_rules.iter().filter(move |rule| rule.feeds_from(phase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaforge_core::{ModeConfig, PENDING_SECTION_PLACEHOLDER};

    fn done(phase: PhaseId, text: &str) -> PhaseResult {
        PhaseResult::completed(phase, PhaseContent::Text(text.to_string()), "test")
    }

    fn outputs(results: &[PhaseResult]) -> BTreeMap<PhaseId, PhaseResult> {
        results.iter().map(|r| (r.phase, r.clone())).collect()
    }

    #[test]
    fn test_single_source_slots_mirror_completed_phases() {
        let rules = ModeConfig::standard().slot_rules;
        let raw = outputs(&[done(PhaseId::Analysis, "a"), done(PhaseId::Schema, "s")]);

        let artifacts = ContentMerger::merge(&raw, &rules);
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[&SlotId::Analysis], raw[&PhaseId::Analysis]);
        assert!(!artifacts.contains_key(&SlotId::Implementation));
    }

    #[test]
    fn test_failed_output_does_not_materialize() {
        let rules = ModeConfig::standard().slot_rules;
        let raw = outputs(&[PhaseResult::failed(PhaseId::Analysis, "boom")]);
        assert!(ContentMerger::merge(&raw, &rules).is_empty());
    }

    #[test]
    fn test_composite_slot_with_one_contributor_has_placeholder() {
        let rules = ModeConfig::enhanced().slot_rules;
        let raw = outputs(&[done(PhaseId::SampleData, "INSERT INTO books ...")]);

        let artifacts = ContentMerger::merge(&raw, &rules);
        let implementation = &artifacts[&SlotId::Implementation];
        let sections = implementation.content.sections().unwrap();

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].phase, PhaseId::SampleData);
        assert_eq!(sections[0].body, SectionBody::Ready("INSERT INTO books ...".to_string()));
        assert_eq!(sections[1].phase, PhaseId::ApiEndpoints);
        assert_eq!(sections[1].body.text(), PENDING_SECTION_PLACEHOLDER);
        assert_eq!(implementation.title, "Implementation");
    }

    #[test]
    fn test_composite_order_is_fixed_regardless_of_arrival() {
        let rules = ModeConfig::enhanced().slot_rules;
        let api_only = outputs(&[done(PhaseId::ApiEndpoints, "GET /books")]);

        let artifacts = ContentMerger::merge(&api_only, &rules);
        let sections = artifacts[&SlotId::Implementation].content.sections().unwrap();
        assert_eq!(sections[0].phase, PhaseId::SampleData);
        assert!(!sections[0].body.is_ready());
        assert!(sections[1].body.is_ready());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let rules = ModeConfig::enhanced().slot_rules;
        let raw = outputs(&[
            done(PhaseId::Analysis, "a"),
            done(PhaseId::ApiEndpoints, "api"),
        ]);

        let first = ContentMerger::merge(&raw, &rules);
        let second = ContentMerger::merge(&raw, &rules);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_affected_slots() {
        let rules = ModeConfig::enhanced().slot_rules;
        let slots: Vec<SlotId> = ContentMerger::affected_slots(&rules, PhaseId::SampleData)
            .map(|r| r.slot)
            .collect();
        assert_eq!(slots, vec![SlotId::Implementation]);
    }
}
