//! The flat evaluator: no phases, rules run once in priority order.

use std::time::Instant;

use ledgerflow_events::{RuleAction, RuleTrace};

use crate::context::RuleContext;
use crate::evaluation::{Decision, RuleEvaluation};
use crate::rule::Rule;

/// Evaluate `rules` against `context` with no phase separation. `reject`
/// short-circuits remaining rules; `route_for_approval` sets the decision
/// but lets later rules (including a later `reject`) still run.
pub fn evaluate_flat(rules: &[Rule], context: &RuleContext) -> RuleEvaluation {
    let mut applicable: Vec<&Rule> = rules
        .iter()
        .filter(|r| r.intent_type == context.intent_type)
        .collect();
    applicable.sort_by_key(|r| r.priority);

    let mut traces = Vec::with_capacity(applicable.len());
    let mut decision = Decision::Approve;
    let mut rejection_message = None;
    let mut required_approver_role = None;

    for rule in applicable {
        if !rule.is_active_on(context.effective_date) {
            traces.push(RuleTrace::skipped_inactive(&rule.id));
            continue;
        }

        let start = Instant::now();
        let fired = rule.matches_all_conditions(&context.data);
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
                break;
            }
            RuleAction::RouteForApproval => {
                decision = Decision::RouteForApproval;
                required_approver_role = rule.approver_role.clone();
            }
            RuleAction::Approve | RuleAction::Enrich => {}
        }
    }

    RuleEvaluation {
        decision,
        traces,
        rejection_message,
        required_approver_role,
        enriched_context: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, Operator};
    use chrono::NaiveDate;
    use serde_json::json;

    fn rule(id: &str, priority: i32, field: &str, action: RuleAction) -> Rule {
        Rule {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            priority,
            intent_type: "vendor.create".to_string(),
            phase: crate::rule::Phase::Validate,
            conditions: vec![Condition {
                field: field.to_string(),
                operator: Operator::NotEmpty,
                value: None,
            }],
            action,
            rejection_message: Some("rejected".to_string()),
            approver_role: Some("ap_manager".to_string()),
            enrich_fields: None,
            effective_from: None,
            effective_to: None,
        }
    }

    fn ctx() -> RuleContext {
        RuleContext::new(
            "vendor.create",
            json!({"name": "Acme"}),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        )
    }

    #[test]
    fn reject_short_circuits_later_rules() {
        let rules = vec![
            rule("r1", 1, "name", RuleAction::Reject),
            rule("r2", 2, "name", RuleAction::RouteForApproval),
        ];
        let eval = evaluate_flat(&rules, &ctx());
        assert!(eval.is_rejected());
        assert_eq!(eval.traces.len(), 1);
    }

    #[test]
    fn route_for_approval_does_not_short_circuit() {
        let rules = vec![
            rule("r1", 1, "name", RuleAction::RouteForApproval),
            rule("r2", 2, "name", RuleAction::Reject),
        ];
        let eval = evaluate_flat(&rules, &ctx());
        assert!(eval.is_rejected());
        assert_eq!(eval.traces.len(), 2);
    }

    #[test]
    fn inactive_rule_is_skipped_without_evaluation() {
        let mut r = rule("r1", 1, "name", RuleAction::Reject);
        r.effective_from = Some(NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
        let eval = evaluate_flat(&[r], &ctx());
        assert_eq!(eval.decision, Decision::Approve);
        assert_eq!(eval.traces.len(), 1);
    }
}
