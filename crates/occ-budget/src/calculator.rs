use occ_core::types::Message;
use occ_memory::{Memory, MemoryTier};

use crate::error::{BudgetError, Result};
use crate::estimate::{estimate_memory_tokens, estimate_message_tokens};
use crate::types::{Budget, ModelConfig, TierMetadata, TierRatios};

/// `CalculateBudget(model, systemPromptTokens)` (§4.E).
pub fn calculate_budget(model: ModelConfig, system_prompt_tokens: u32, ratios: TierRatios) -> Result<Budget> {
    if model.context_window <= 0 {
        return Err(BudgetError::InvalidModelConfig(model.context_window));
    }
    let total = model.context_window as f64;

    let reserved = (total * model.response_reserve).floor() as u32;
    let reserved = reserved.max(model.min_response_tokens);

    let available = (model.context_window as i64 - reserved as i64).max(0) as u32;
    let system_tokens = system_prompt_tokens.min(model.max_system_tokens);

    let remaining = available as i64 - system_tokens as i64;
    if remaining < 0 {
        return Err(BudgetError::BudgetExceeded {
            context_window: model.context_window as u32,
            reserved,
            system_tokens,
        });
    }
    let remaining = remaining as u32;

    Ok(Budget {
        reserved,
        available,
        system_tokens,
        remaining,
        tier1: (remaining as f64 * ratios.tier1).floor() as u32,
        tier2: (remaining as f64 * ratios.tier2).floor() as u32,
        tier3: (remaining as f64 * ratios.tier3).floor() as u32,
    })
}

/// Recomputes tier-1/2/3 shares when the pending messages alone would blow
/// through the default tier-1 allocation (§4.E "Optimization").
pub fn optimize_budget(budget: Budget, message_tokens: u32) -> Budget {
    let tier1_threshold = (budget.tier1 as f64 * 1.5) as u32;
    if message_tokens <= tier1_threshold || budget.remaining == 0 {
        return budget;
    }

    let tier1_share = (message_tokens as f64 / budget.remaining as f64).min(0.6);
    let tier1 = (budget.remaining as f64 * tier1_share).floor() as u32;
    let rest = budget.remaining.saturating_sub(tier1);
    let tier2 = (rest as f64 * 0.6).floor() as u32;
    let tier3 = rest.saturating_sub(tier2);

    Budget { tier1, tier2, tier3, ..budget }
}

/// `BuildTiers(budget, messages, memories)` (§4.E "Tier assembly").
pub struct Tiers {
    pub tier1_messages: Vec<Message>,
    pub tier1_meta: TierMetadata,
    pub tier2_memories: Vec<Memory>,
    pub tier2_meta: TierMetadata,
    pub tier3_memories: Vec<Memory>,
    pub tier3_meta: TierMetadata,
}

pub fn build_tiers(budget: Budget, messages: &[Message], memories: &[Memory]) -> Tiers {
    let (tier1_messages, tier1_meta) = fill_tier1(budget.tier1, messages);

    let tier2_source: Vec<&Memory> = memories.iter().filter(|m| matches!(m.tier, MemoryTier::Summary)).collect();
    let (tier2_memories, tier2_meta) = fill_memory_tier(budget.tier2, &tier2_source);

    let tier3_source: Vec<&Memory> = memories.iter().filter(|m| matches!(m.tier, MemoryTier::LongTerm)).collect();
    let (tier3_memories, tier3_meta) = fill_memory_tier(budget.tier3, &tier3_source);

    Tiers { tier1_messages, tier1_meta, tier2_memories, tier2_meta, tier3_memories, tier3_meta }
}

fn fill_tier1(budget_tokens: u32, messages: &[Message]) -> (Vec<Message>, TierMetadata) {
    let mut used = 0u32;
    let mut picked = Vec::new();
    for message in messages.iter().rev() {
        let cost = estimate_message_tokens(message);
        if used + cost > budget_tokens && !picked.is_empty() {
            break;
        }
        used += cost;
        picked.push(message.clone());
    }
    picked.reverse();
    let meta = TierMetadata { used_tokens: used, item_count: picked.len(), average_relevance: 0.0, entities: Vec::new() };
    (picked, meta)
}

fn fill_memory_tier(budget_tokens: u32, memories: &[&Memory]) -> (Vec<Memory>, TierMetadata) {
    let mut used = 0u32;
    let mut picked: Vec<Memory> = Vec::new();
    let mut relevance_sum = 0.0;
    let mut entities = std::collections::BTreeSet::new();

    for memory in memories {
        let cost = estimate_memory_tokens(memory);
        if used + cost > budget_tokens && !picked.is_empty() {
            break;
        }
        used += cost;
        relevance_sum += memory.relevance;
        entities.extend(memory.entities.iter().cloned());
        picked.push((*memory).clone());
    }

    let average_relevance = if picked.is_empty() { 0.0 } else { relevance_sum / picked.len() as f64 };
    let meta = TierMetadata {
        used_tokens: used,
        item_count: picked.len(),
        average_relevance,
        entities: entities.into_iter().collect(),
    };
    (picked, meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// §8 scenario 4, literal.
    #[test]
    fn scenario_4_literal_budget() {
        let model = ModelConfig {
            context_window: 4096,
            response_reserve: 0.25,
            min_response_tokens: 512,
            max_system_tokens: 2000,
        };
        let budget = calculate_budget(model, 400, TierRatios { tier1: 0.5, tier2: 0.3, tier3: 0.2 }).unwrap();
        assert_eq!(budget.reserved, 1024);
        assert_eq!(budget.available, 3072);
        assert_eq!(budget.system_tokens, 400);
        assert_eq!(budget.remaining, 2672);
        assert_eq!(budget.tier1, 1336);
        assert_eq!(budget.tier2, 801);
        assert_eq!(budget.tier3, 534);
    }

    #[test]
    fn min_response_tokens_floor_applies() {
        let model = ModelConfig {
            context_window: 1000,
            response_reserve: 0.1,
            min_response_tokens: 512,
            max_system_tokens: 2000,
        };
        let budget = calculate_budget(model, 0, TierRatios::default()).unwrap();
        assert_eq!(budget.reserved, 512);
        assert_eq!(budget.available, 488);
    }

    #[test]
    fn oversized_system_prompt_fails_budget_exceeded() {
        let model = ModelConfig {
            context_window: 1000,
            response_reserve: 0.1,
            min_response_tokens: 100,
            max_system_tokens: 2000,
        };
        let err = calculate_budget(model, 5000, TierRatios::default()).unwrap_err();
        assert!(matches!(err, BudgetError::BudgetExceeded { .. }));
    }

    #[test]
    fn non_positive_context_window_is_rejected() {
        let model = ModelConfig { context_window: 0, response_reserve: 0.1, min_response_tokens: 10, max_system_tokens: 100 };
        let err = calculate_budget(model, 0, TierRatios::default()).unwrap_err();
        assert!(matches!(err, BudgetError::InvalidModelConfig(0)));
    }

    /// P3: sum(tiers.used) + systemTokens <= budget.available, even after optimization.
    #[test]
    fn p3_tiers_never_exceed_available() {
        let model = ModelConfig { context_window: 4096, response_reserve: 0.25, min_response_tokens: 512, max_system_tokens: 2000 };
        let budget = calculate_budget(model, 400, TierRatios::default()).unwrap();
        let optimized = optimize_budget(budget, 2000);
        assert!(optimized.tier1 + optimized.tier2 + optimized.tier3 <= budget.remaining);
        assert!(optimized.tier1 + optimized.tier2 + optimized.tier3 + optimized.system_tokens <= optimized.available);
    }

    #[test]
    fn optimize_raises_tier1_share_when_messages_are_large() {
        let model = ModelConfig { context_window: 4096, response_reserve: 0.25, min_response_tokens: 512, max_system_tokens: 2000 };
        let budget = calculate_budget(model, 400, TierRatios::default()).unwrap();
        let optimized = optimize_budget(budget, 2500);
        assert!(optimized.tier1 > budget.tier1);
    }
}
