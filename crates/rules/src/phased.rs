//! The phased evaluator: `validate` → `enrich` → `decide`, in that order.

use std::time::Instant;

use ledgerflow_events::{RuleAction, RuleTrace};

use crate::context::RuleContext;
use crate::evaluation::{Decision, RuleEvaluation};
use crate::rule::{Phase, Rule};

/// Evaluate `rules` against `context` across the three fixed phases. Only
/// `enrich` actions run in the `enrich` phase; everywhere else `enrich`
/// actions are blocked. A `reject` in any phase stops all remaining phases.
pub fn evaluate_phased(rules: &[Rule], context: &RuleContext) -> RuleEvaluation {
    let mut working = context.clone();
    let mut traces = Vec::new();
    let mut decision = Decision::Approve;
    let mut rejection_message = None;
    let mut required_approver_role = None;

    for phase in [Phase::Validate, Phase::Enrich, Phase::Decide] {
        let mut applicable: Vec<&Rule> = rules
            .iter()
            .filter(|r| r.intent_type == working.intent_type && r.phase == phase)
            .collect();
        applicable.sort_by_key(|r| r.priority);

        for rule in applicable {
            if !rule.is_active_on(working.effective_date) {
                traces.push(RuleTrace::skipped_inactive(&rule.id));
                continue;
            }

            let is_enrich_action = matches!(rule.action, RuleAction::Enrich);
            if phase == Phase::Enrich && !is_enrich_action {
                traces.push(RuleTrace::not_applicable(
                    &rule.id,
                    "non_enrich_action_blocked_in_enrich_phase",
                ));
                continue;
            }
            if phase != Phase::Enrich && is_enrich_action {
                let reason = match phase {
                    Phase::Validate => "enrich_blocked_in_validate_phase",
                    Phase::Decide => "enrich_blocked_in_decide_phase",
                    Phase::Enrich => unreachable!(),
                };
                traces.push(RuleTrace::not_applicable(&rule.id, reason));
                continue;
            }

            let start = Instant::now();
            let fired = rule.matches_all_conditions(&working.data);
            let duration_micros = start.elapsed().as_micros() as u64;

            if !fired {
                traces.push(RuleTrace::not_fired(&rule.id, duration_micros));
                continue;
            }

            traces.push(RuleTrace::fired(&rule.id, rule.action, duration_micros));

            match rule.action {
                RuleAction::Reject => {
                    decision = Decision::Reject;
                    rejection_message = rule.rejection_message.clone();
                }
                RuleAction::RouteForApproval => {
                    decision = Decision::RouteForApproval;
                    required_approver_role = rule.approver_role.clone();
                }
                RuleAction::Enrich => {
                    if let Some(fields) = &rule.enrich_fields {
                        working.merge(fields);
                    }
                }
                RuleAction::Approve => {}
            }
        }

        if matches!(decision, Decision::Reject) {
            break;
        }
    }

    RuleEvaluation {
        decision,
        traces,
        rejection_message,
        required_approver_role,
        enriched_context: Some(working.data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, Operator};
    use chrono::NaiveDate;
    use serde_json::json;

    fn base_rule(id: &str, priority: i32, phase: Phase, action: RuleAction) -> Rule {
        Rule {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            priority,
            intent_type: "invoice.submit".to_string(),
            phase,
            conditions: vec![Condition {
                field: "amount".to_string(),
                operator: Operator::Gt,
                value: Some(json!(0)),
            }],
            action,
            rejection_message: Some("too risky".to_string()),
            approver_role: Some("ap_manager".to_string()),
            enrich_fields: None,
            effective_from: None,
            effective_to: None,
        }
    }

    fn ctx() -> RuleContext {
        RuleContext::new(
            "invoice.submit",
            json!({"amount": 500}),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        )
    }

    #[test]
    fn enrich_action_only_fires_in_enrich_phase() {
        let mut r = base_rule("r1", 1, Phase::Enrich, RuleAction::Enrich);
        r.enrich_fields = Some(json!({"_duplicate_exists": true}));
        let eval = evaluate_phased(&[r], &ctx());
        assert_eq!(
            eval.enriched_context.unwrap()["_duplicate_exists"],
            json!(true)
        );
    }

    #[test]
    fn non_enrich_action_blocked_in_enrich_phase() {
        let r = base_rule("r1", 1, Phase::Enrich, RuleAction::Reject);
        let eval = evaluate_phased(&[r], &ctx());
        assert_eq!(eval.decision, Decision::Approve);
        assert_eq!(eval.traces.len(), 1);
    }

    #[test]
    fn enrich_action_blocked_outside_enrich_phase() {
        let r = base_rule("r1", 1, Phase::Validate, RuleAction::Enrich);
        let eval = evaluate_phased(&[r], &ctx());
        assert_eq!(eval.traces.len(), 1);
        assert!(eval.enriched_context.unwrap().get("_duplicate_exists").is_none());
    }

    #[test]
    fn reject_in_validate_short_circuits_later_phases() {
        let reject = base_rule("r1", 1, Phase::Validate, RuleAction::Reject);
        let mut route = base_rule("r2", 1, Phase::Decide, RuleAction::RouteForApproval);
        route.phase = Phase::Decide;
        let eval = evaluate_phased(&[reject, route], &ctx());
        assert_eq!(eval.decision, Decision::Reject);
        assert_eq!(eval.traces.len(), 1);
    }

    #[test]
    fn unlabeled_rule_defaults_to_validate_phase() {
        let json_rule = r#"{
            "id": "r1", "name": "r1", "priority": 1,
            "intent_type": "invoice.submit",
            "conditions": [{"field": "amount", "operator": "gt", "value": 0}],
            "action": "approve"
        }"#;
        let rule: Rule = serde_json::from_str(json_rule).unwrap();
        assert_eq!(rule.phase, Phase::Validate);
    }
}

#[cfg(test)]
mod properties {
    use super::*;
    use crate::condition::{Condition, Operator};
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use serde_json::json;

    fn enrich_rule(id: &str, priority: i32) -> Rule {
        Rule {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            priority,
            intent_type: "invoice.submit".to_string(),
            phase: Phase::Enrich,
            conditions: vec![Condition {
                field: "amount".to_string(),
                operator: Operator::Gt,
                value: Some(json!(0)),
            }],
            action: RuleAction::Enrich,
            rejection_message: None,
            approver_role: None,
            enrich_fields: Some(json!({"flagged": true})),
            effective_from: None,
            effective_to: None,
        }
    }

    fn non_enrich_rule(id: &str, priority: i32, action: RuleAction) -> Rule {
        Rule {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            priority,
            intent_type: "invoice.submit".to_string(),
            phase: Phase::Enrich,
            conditions: vec![Condition {
                field: "amount".to_string(),
                operator: Operator::Gt,
                value: Some(json!(0)),
            }],
            action,
            rejection_message: Some("no".to_string()),
            approver_role: Some("ap_manager".to_string()),
            enrich_fields: None,
            effective_from: None,
            effective_to: None,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        /// Property (§8.8): no `enrich` action ever fires outside the
        /// `enrich` phase, and no non-`enrich` action ever fires inside it,
        /// regardless of how many rules of each kind are mixed together.
        #[test]
        fn enrich_actions_never_cross_phase_boundary(
            enrich_count in 0usize..5,
            other_count in 0usize..5,
            amount in 1i64..1_000_000i64,
        ) {
            let mut rules = Vec::new();
            for i in 0..enrich_count {
                rules.push(enrich_rule(&format!("enrich-{i}"), i as i32));
            }
            for i in 0..other_count {
                rules.push(non_enrich_rule(&format!("other-{i}"), 100 + i as i32, RuleAction::Approve));
            }

            let ctx = RuleContext::new(
                "invoice.submit",
                json!({"amount": amount}),
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            );
            let eval = evaluate_phased(&rules, &ctx);

            let enriched = eval.enriched_context.unwrap();
            if enrich_count > 0 {
                prop_assert_eq!(enriched["flagged"], json!(true));
            } else {
                prop_assert!(enriched.get("flagged").is_none());
            }

            let blocked_other = eval.traces.iter().filter(|t| t.rule_id.starts_with("other-")).count();
            prop_assert_eq!(blocked_other, other_count);
        }
    }
}
