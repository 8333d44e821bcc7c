// service/booking_rules.rs
//
// Which services can share one appointment. The ruleset is built once at
// startup and injected as an immutable structure; nothing here touches the
// database or mutates shared state.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct ExclusionRule {
    pub a: &'static str,
    pub b: &'static str,
    pub reason: &'static str,
    /// Guidance surfaced to the guest, not enforced by the engine.
    pub min_days_between: i64,
}

#[derive(Debug, Clone)]
pub struct BookingRuleset {
    pub max_services_per_booking: usize,
    pub combinable_groups: Vec<Vec<&'static str>>,
    pub exclusions: Vec<ExclusionRule>,
    pub suggested_addons: HashMap<&'static str, Vec<&'static str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CombineDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "minDaysBetween", skip_serializing_if = "Option::is_none")]
    pub min_days_between: Option<i64>,
}

impl CombineDecision {
    fn allow() -> Self {
        CombineDecision {
            allowed: true,
            reason: None,
            min_days_between: None,
        }
    }

    fn deny(reason: String, min_days_between: Option<i64>) -> Self {
        CombineDecision {
            allowed: false,
            reason: Some(reason),
            min_days_between,
        }
    }
}

impl BookingRuleset {
    fn find_exclusion(&self, a: &str, b: &str) -> Option<&ExclusionRule> {
        self.exclusions
            .iter()
            .find(|rule| (rule.a == a && rule.b == b) || (rule.a == b && rule.b == a))
    }

    fn in_same_group(&self, a: &str, b: &str) -> bool {
        self.combinable_groups
            .iter()
            .any(|group| group.contains(&a) && group.contains(&b))
    }

    /// Exclusions win over combinability; absent both, default-deny.
    pub fn can_combine(&self, a: &str, b: &str) -> CombineDecision {
        if let Some(rule) = self.find_exclusion(a, b) {
            return CombineDecision::deny(rule.reason.to_string(), Some(rule.min_days_between));
        }

        if self.in_same_group(a, b) {
            CombineDecision::allow()
        } else {
            CombineDecision::deny(
                "These treatments are not offered in the same visit.".to_string(),
                None,
            )
        }
    }

    /// Cap check first, then pairwise against every existing cart item,
    /// short-circuiting on the first conflict.
    pub fn can_add_to_cart(&self, existing: &[String], candidate: &str) -> CombineDecision {
        if existing.len() >= self.max_services_per_booking {
            return CombineDecision::deny(
                format!(
                    "A booking can include at most {} services.",
                    self.max_services_per_booking
                ),
                None,
            );
        }

        for item in existing {
            let decision = self.can_combine(item, candidate);
            if !decision.allowed {
                return decision;
            }
        }

        CombineDecision::allow()
    }

    /// Add-on candidates for a primary service: group partners, minus
    /// anything excluded against the primary or anything already in the cart
    /// (exclusions compound across the whole cart), filtered to what the
    /// provider offers, suggested add-ons first in configured order, the rest
    /// alphabetical.
    pub fn compatible_addons(
        &self,
        primary: &str,
        provider_offered: &[String],
        already_selected: &[String],
    ) -> Vec<String> {
        let mut partners: Vec<&str> = Vec::new();
        for group in &self.combinable_groups {
            if group.contains(&primary) {
                for service in group {
                    if *service != primary && !partners.contains(service) {
                        partners.push(service);
                    }
                }
            }
        }

        let mut candidates: Vec<&str> = partners
            .into_iter()
            .filter(|candidate| {
                if self.find_exclusion(primary, candidate).is_some() {
                    return false;
                }
                already_selected
                    .iter()
                    .all(|selected| self.find_exclusion(selected, candidate).is_none())
            })
            .filter(|candidate| provider_offered.iter().any(|s| s == candidate))
            .filter(|candidate| !already_selected.iter().any(|s| s == candidate))
            .collect();

        let suggested = self
            .suggested_addons
            .get(primary)
            .cloned()
            .unwrap_or_default();

        let mut ordered: Vec<String> = Vec::new();
        for addon in &suggested {
            if let Some(pos) = candidates.iter().position(|c| c == addon) {
                ordered.push(candidates.remove(pos).to_string());
            }
        }

        candidates.sort_unstable();
        ordered.extend(candidates.into_iter().map(|c| c.to_string()));

        ordered
    }
}

/// Production ruleset for the spa's service menu.
pub fn default_ruleset() -> BookingRuleset {
    let mut suggested_addons: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
    suggested_addons.insert("tox", vec!["filler", "b12_shot"]);
    suggested_addons.insert("glo2facial", vec!["dermaplaning", "led_therapy"]);
    suggested_addons.insert("hydrafacial", vec!["dermaplaning", "led_therapy"]);
    suggested_addons.insert("iv_therapy", vec!["b12_shot"]);
    suggested_addons.insert("microneedling", vec!["prp"]);

    BookingRuleset {
        max_services_per_booking: 4,
        combinable_groups: vec![
            // Injectables combine with each other and quick wellness add-ons
            vec!["tox", "filler", "sculptra", "kybella", "b12_shot"],
            // Facial treatments
            vec![
                "glo2facial",
                "hydrafacial",
                "dermaplaning",
                "led_therapy",
                "chemical_peel",
            ],
            // Collagen-induction services
            vec!["microneedling", "prp", "led_therapy"],
            // Wellness drips
            vec!["iv_therapy", "b12_shot", "glutathione_push"],
        ],
        exclusions: vec![
            ExclusionRule {
                a: "tox",
                b: "glo2facial",
                reason: "Tox needs at least 2 weeks before a facial treatment.",
                min_days_between: 14,
            },
            ExclusionRule {
                a: "tox",
                b: "hydrafacial",
                reason: "Tox needs at least 2 weeks before a facial treatment.",
                min_days_between: 14,
            },
            ExclusionRule {
                a: "tox",
                b: "microneedling",
                reason: "Tox needs at least 2 weeks before microneedling.",
                min_days_between: 14,
            },
            ExclusionRule {
                a: "filler",
                b: "microneedling",
                reason: "Filler needs time to settle before microneedling.",
                min_days_between: 14,
            },
            ExclusionRule {
                a: "chemical_peel",
                b: "microneedling",
                reason: "A peel and microneedling are too aggressive for one visit.",
                min_days_between: 30,
            },
            ExclusionRule {
                a: "chemical_peel",
                b: "dermaplaning",
                reason: "Dermaplaning right after a peel can irritate fresh skin.",
                min_days_between: 7,
            },
        ],
        suggested_addons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exclusion_beats_combinability() {
        let rules = default_ruleset();
        let decision = rules.can_combine("tox", "glo2facial");
        assert!(!decision.allowed);
        assert_eq!(
            decision.reason.as_deref(),
            Some("Tox needs at least 2 weeks before a facial treatment.")
        );
        assert_eq!(decision.min_days_between, Some(14));
    }

    #[test]
    fn test_exclusion_is_symmetric() {
        let rules = default_ruleset();
        assert!(!rules.can_combine("glo2facial", "tox").allowed);
    }

    #[test]
    fn test_same_group_allowed() {
        let rules = default_ruleset();
        let decision = rules.can_combine("tox", "filler");
        assert!(decision.allowed);
        assert!(decision.reason.is_none());
    }

    #[test]
    fn test_unrelated_pair_default_denied() {
        let rules = default_ruleset();
        let decision = rules.can_combine("tox", "iv_therapy");
        assert!(!decision.allowed);
        assert!(decision.min_days_between.is_none());
    }

    #[test]
    fn test_cart_cap_checked_before_pairwise() {
        let rules = default_ruleset();
        // Cart at cap: rejected even though the candidate combines with all.
        let full = strings(&["glo2facial", "hydrafacial", "dermaplaning", "led_therapy"]);
        let decision = rules.can_add_to_cart(&full, "chemical_peel");
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("at most 4"));
    }

    #[test]
    fn test_cart_short_circuits_on_conflict() {
        let rules = default_ruleset();
        let cart = strings(&["tox"]);
        let decision = rules.can_add_to_cart(&cart, "glo2facial");
        assert!(!decision.allowed);
        assert_eq!(decision.min_days_between, Some(14));
    }

    #[test]
    fn test_cart_allows_compatible_candidate() {
        let rules = default_ruleset();
        let cart = strings(&["tox", "filler"]);
        assert!(rules.can_add_to_cart(&cart, "b12_shot").allowed);
    }

    #[test]
    fn test_addons_suggested_first_then_alphabetical() {
        let rules = default_ruleset();
        let offered = strings(&[
            "filler",
            "b12_shot",
            "kybella",
            "sculptra",
            "glo2facial",
        ]);
        let addons = rules.compatible_addons("tox", &offered, &[]);
        // Suggested order first (filler, b12_shot), rest alphabetical,
        // glo2facial excluded against tox.
        assert_eq!(addons, vec!["filler", "b12_shot", "kybella", "sculptra"]);
    }

    #[test]
    fn test_addons_exclusions_compound_across_cart() {
        let rules = default_ruleset();
        let offered = strings(&["prp", "led_therapy", "dermaplaning", "hydrafacial"]);
        // chemical_peel in the cart excludes dermaplaning even though it
        // combines fine with the hydrafacial primary.
        let addons = rules.compatible_addons("hydrafacial", &offered, &strings(&["chemical_peel"]));
        assert!(!addons.contains(&"dermaplaning".to_string()));
        assert!(addons.contains(&"led_therapy".to_string()));
    }

    #[test]
    fn test_addons_filtered_to_provider_and_cart() {
        let rules = default_ruleset();
        let offered = strings(&["filler", "b12_shot"]);
        let addons = rules.compatible_addons("tox", &offered, &strings(&["filler"]));
        assert_eq!(addons, vec!["b12_shot"]);
    }
}
