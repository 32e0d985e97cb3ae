use std::collections::{HashMap, HashSet};

use occ_core::types::{Message, Role};
use tracing::warn;

/// Produces a message list the upstream model will accept on every retry,
/// without ever losing user content (§4.I). This is the single place that
/// enforces invariants I1/I2/I3 before anything reaches the completion stage.
///
/// Step 2 of the documented algorithm ("tool-call dedup: keep only ids with
/// a matching response") and steps 6-8 ("completeness validation, elide
/// whole cycles with any unmatched call") are implemented as one combined
/// completeness pass here: any assistant message that survives has, by
/// construction, only matched tool_calls, since an assistant with even one
/// unmatched call is elided wholesale along with its (matched) siblings.
/// Duplicate ids within a single assistant's own `tool_calls` are resolved
/// in the same pass via a dedup-by-id.
pub fn prepare(history: &[Message], current_turn: Option<&Message>, force_final_completion: bool) -> Vec<Message> {
    let mut messages = dedup_by_id(history);
    dedup_tool_call_ids_in_place(&mut messages);
    messages = drop_consecutive_user_turns(messages);
    messages = pattern_collapse(messages);
    messages = assistant_content_hygiene(messages);
    messages = elide_incomplete_tool_cycles(messages);
    messages = remove_orphan_tool_responses(messages);

    if !force_final_completion {
        if let Some(turn) = current_turn {
            if !messages.iter().any(|m| m.id == turn.id) {
                messages.push(turn.clone());
            }
        }
    }

    messages
}

/// Step 1: keep first occurrence of each message id.
fn dedup_by_id(history: &[Message]) -> Vec<Message> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(history.len());
    for message in history {
        if seen.insert(message.id.clone()) {
            out.push(message.clone());
        }
    }
    out
}

/// Step 2 (partial): remove duplicate tool_call ids within one assistant
/// message, keeping the first occurrence. The "has a matching response"
/// half of step 2 is enforced by `elide_incomplete_tool_cycles` below.
///
/// The source tolerates this and silently dedupes; §9 keeps that behaviour
/// but asks for a warning on every drop, since whether the upstream
/// provider would have accepted the duplicate is provider-dependent.
fn dedup_tool_call_ids_in_place(messages: &mut [Message]) {
    for message in messages.iter_mut() {
        if message.role != Role::Assistant || message.tool_calls.is_empty() {
            continue;
        }
        let mut seen = HashSet::new();
        let message_id = message.id.clone();
        message.tool_calls.retain(|call| {
            if seen.insert(call.id.clone()) {
                true
            } else {
                warn!(call_id = %call.id, message_id = %message_id, "dropped duplicate tool_call id");
                false
            }
        });
    }
}

/// Step 3: in any run of adjacent user messages with no intervening
/// assistant, keep only the last.
fn drop_consecutive_user_turns(messages: Vec<Message>) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(messages.len());
    for message in messages {
        if message.role == Role::User {
            if let Some(last) = out.last() {
                if last.role == Role::User {
                    out.pop();
                }
            }
        }
        out.push(message);
    }
    out
}

/// Step 4: within directly-adjacent (user, assistant) pairs, deduplicate by
/// `(user.content, assistant.content, count(assistant.tool_calls))`.
fn pattern_collapse(messages: Vec<Message>) -> Vec<Message> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(messages.len());
    let mut i = 0;
    while i < messages.len() {
        if i + 1 < messages.len() && messages[i].role == Role::User && messages[i + 1].role == Role::Assistant {
            let key = (messages[i].content.clone(), messages[i + 1].content.clone(), messages[i + 1].tool_calls.len());
            if !seen.insert(key) {
                i += 2;
                continue;
            }
            out.push(messages[i].clone());
            out.push(messages[i + 1].clone());
            i += 2;
        } else {
            out.push(messages[i].clone());
            i += 1;
        }
    }
    out
}

/// Step 5: assistant messages carry either content or tool_calls, never
/// neither. (`tool_calls` already serializes as absent when empty via
/// `skip_serializing_if`; the only remaining hygiene action is dropping a
/// message that ended up with both fields empty.)
fn assistant_content_hygiene(messages: Vec<Message>) -> Vec<Message> {
    messages
        .into_iter()
        .filter(|m| !(m.role == Role::Assistant && m.content.is_empty() && m.tool_calls.is_empty()))
        .collect()
}

/// Steps 6-7: index every assistant tool_call id and every tool-response
/// tool_call_id; elide an assistant (and all of its tool responses) if any
/// of its tool_call ids lacks a matching response.
fn elide_incomplete_tool_cycles(messages: Vec<Message>) -> Vec<Message> {
    let mut responded: HashSet<&str> = HashSet::new();
    for message in &messages {
        if message.role == Role::Tool {
            if let Some(id) = &message.tool_call_id {
                responded.insert(id.as_str());
            }
        }
    }

    let elided_assistant_ids: HashSet<&str> = messages
        .iter()
        .filter(|m| m.role == Role::Assistant && !m.tool_calls.is_empty())
        .filter(|m| m.tool_calls.iter().any(|c| !responded.contains(c.id.as_str())))
        .map(|m| m.id.as_str())
        .collect();

    let elided_call_ids: HashSet<&str> = messages
        .iter()
        .filter(|m| elided_assistant_ids.contains(m.id.as_str()))
        .flat_map(|m| m.tool_calls.iter().map(|c| c.id.as_str()))
        .collect();

    messages
        .into_iter()
        .filter(|m| {
            if elided_assistant_ids.contains(m.id.as_str()) {
                return false;
            }
            if let Some(tool_call_id) = &m.tool_call_id {
                if elided_call_ids.contains(tool_call_id.as_str()) {
                    return false;
                }
            }
            true
        })
        .collect()
}

/// Step 8: drop any tool-role message whose tool_call_id has no indexed
/// assistant left (orphaned by pattern collapse removing the assistant).
fn remove_orphan_tool_responses(messages: Vec<Message>) -> Vec<Message> {
    let known_call_ids: HashSet<&str> = messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .flat_map(|m| m.tool_calls.iter().map(|c| c.id.as_str()))
        .collect();

    messages
        .into_iter()
        .filter(|m| match (&m.role, &m.tool_call_id) {
            (Role::Tool, Some(id)) => known_call_ids.contains(id.as_str()),
            _ => true,
        })
        .collect()
}

/// Invariant violation kinds checked by `validate` (§4.I, §8 P1/P2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// I1: a tool message's call id has no owning assistant before it.
    UnownedToolResponse { message_id: String },
    /// I2: an assistant with tool_calls has an unmatched call id.
    UnmatchedToolCall { message_id: String, call_id: String },
    /// I3: two adjacent user-role messages.
    AdjacentUserTurns { first_id: String, second_id: String },
}

/// Asserts I1/I2/I3 hold for a prepared message list. Intended for tests and
/// for a debug-assert in the completion stage, not for production control
/// flow — by construction, `prepare`'s own output always satisfies these.
pub fn validate(messages: &[Message]) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();
    let mut owned_calls: HashMap<&str, usize> = HashMap::new();

    for (idx, message) in messages.iter().enumerate() {
        if message.role == Role::Assistant {
            for call in &message.tool_calls {
                owned_calls.insert(call.id.as_str(), idx);
            }
        }
        if message.role == Role::Tool {
            if let Some(call_id) = &message.tool_call_id {
                match owned_calls.get(call_id.as_str()) {
                    Some(&owner_idx) if owner_idx < idx => {}
                    _ => violations.push(Violation::UnownedToolResponse { message_id: message.id.clone() }),
                }
            }
        }
        if idx > 0 && message.role == Role::User && messages[idx - 1].role == Role::User {
            violations.push(Violation::AdjacentUserTurns {
                first_id: messages[idx - 1].id.clone(),
                second_id: message.id.clone(),
            });
        }
    }

    let responded: HashSet<&str> = messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    for message in messages {
        if message.role != Role::Assistant {
            continue;
        }
        for call in &message.tool_calls {
            if !responded.contains(call.id.as_str()) {
                violations.push(Violation::UnmatchedToolCall { message_id: message.id.clone(), call_id: call.id.clone() });
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use occ_core::types::ToolCall;

    use super::*;

    const SID: &str = "s1";

    fn tool_call(id: &str) -> ToolCall {
        ToolCall { id: id.to_string(), name: "read_many_files".to_string(), arguments: serde_json::json!({"paths": ["a.txt"]}) }
    }

    /// §8 scenario 1: full tool cycle, no elision.
    #[test]
    fn scenario_1_tool_cycle_completion_is_retained_in_full() {
        let history = vec![
            Message::user(SID, "u1", "list files", "t0"),
            Message::assistant_tool_calls(SID, "a1", "t1", vec![tool_call("c1")]),
            Message::tool_response(SID, "t1m", "c1", "A", "t2"),
            Message::assistant_text(SID, "a2", "Here are the files.", "t3"),
        ];
        let prepared = prepare(&history, None, false);
        assert_eq!(prepared.len(), 4);
        assert_eq!(prepared.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["u1", "a1", "t1m", "a2"]);
        assert!(validate(&prepared).is_ok());
    }

    /// §8 scenario 2: incomplete cycle elided wholesale.
    #[test]
    fn scenario_2_incomplete_cycle_is_elided() {
        let history = vec![
            Message::user(SID, "u1", "list files", "t0"),
            Message::assistant_tool_calls(SID, "a1", "t1", vec![tool_call("c1")]),
            Message::assistant_text(SID, "a2", "Here are the files.", "t2"),
        ];
        let prepared = prepare(&history, None, false);
        assert_eq!(prepared.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["u1", "a2"]);
        assert!(validate(&prepared).is_ok());
    }

    /// §8 scenario 3: consecutive user retries collapse to the last.
    #[test]
    fn scenario_3_consecutive_user_retries_keep_the_last() {
        let history = vec![
            Message::user(SID, "u1", "hi", "t0"),
            Message::user(SID, "u2", "hi", "t1"),
            Message::assistant_text(SID, "a1", "hello", "t2"),
        ];
        let prepared = prepare(&history, None, false);
        assert_eq!(prepared.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["u2", "a1"]);
    }

    #[test]
    fn dedup_by_id_keeps_first_occurrence() {
        let history = vec![Message::user(SID, "u1", "first", "t0"), Message::user(SID, "u1", "duplicate", "t1")];
        let prepared = prepare(&history, None, false);
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].content, "first");
    }

    /// §9: duplicate tool_call ids within one assistant message are
    /// dropped (keeping the first), logging a warning along the way.
    #[test]
    fn duplicate_tool_call_ids_within_one_assistant_message_are_deduped() {
        let history = vec![
            Message::user(SID, "u1", "list files", "t0"),
            Message::assistant_tool_calls(SID, "a1", "t1", vec![tool_call("c1"), tool_call("c1")]),
            Message::tool_response(SID, "t1m", "c1", "A", "t2"),
        ];
        let prepared = prepare(&history, None, false);
        let assistant = prepared.iter().find(|m| m.id == "a1").unwrap();
        assert_eq!(assistant.tool_calls.len(), 1);
        assert!(validate(&prepared).is_ok());
    }

    #[test]
    fn partial_cycle_with_one_matched_and_one_unmatched_call_elides_the_whole_group() {
        let history = vec![
            Message::user(SID, "u1", "do two things", "t0"),
            Message::assistant_tool_calls(SID, "a1", "t1", vec![tool_call("c1"), tool_call("c2")]),
            Message::tool_response(SID, "t1m", "c1", "done", "t2"),
            // c2 never gets a response.
        ];
        let prepared = prepare(&history, None, false);
        assert_eq!(prepared.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["u1"]);
    }

    #[test]
    fn orphaned_tool_response_from_pattern_collapse_is_removed() {
        // Two structurally-identical (user, assistant-with-tool_calls) pairs;
        // the second is collapsed away by pattern_collapse, orphaning its
        // tool response before the completeness pass even runs.
        let history = vec![
            Message::user(SID, "u1", "q", "t0"),
            Message::assistant_tool_calls(SID, "a1", "t1", vec![tool_call("c1")]),
            Message::tool_response(SID, "t1m", "c1", "ok", "t2"),
            Message::user(SID, "u2", "q", "t3"),
            Message::assistant_tool_calls(SID, "a2", "t4", vec![tool_call("c2")]),
            Message::tool_response(SID, "t2m", "c2", "ok", "t5"),
        ];
        let prepared = prepare(&history, None, false);
        assert!(validate(&prepared).is_ok());
        assert!(!prepared.iter().any(|m| m.id == "t2m" && !prepared.iter().any(|a| a.id == "a2")));
    }

    #[test]
    fn current_turn_is_appended_unless_already_present() {
        let history = vec![Message::assistant_text(SID, "a1", "hello", "t0")];
        let turn = Message::user(SID, "u-new", "hi again", "t1");
        let prepared = prepare(&history, Some(&turn), false);
        assert_eq!(prepared.last().unwrap().id, "u-new");

        // Re-running with the turn already in history does not duplicate it.
        let prepared_again = prepare(&prepared, Some(&turn), false);
        assert_eq!(prepared_again.iter().filter(|m| m.id == "u-new").count(), 1);
    }

    #[test]
    fn force_final_completion_never_appends_a_new_user_turn() {
        let history = vec![Message::assistant_text(SID, "a1", "hello", "t0")];
        let turn = Message::user(SID, "u-new", "hi again", "t1");
        let prepared = prepare(&history, Some(&turn), true);
        assert!(!prepared.iter().any(|m| m.id == "u-new"));
    }

    /// R2: applying preparation twice is identical to applying it once.
    #[test]
    fn r2_idempotence() {
        let history = vec![
            Message::user(SID, "u1", "list files", "t0"),
            Message::user(SID, "u1-dup", "list files", "t0b"),
            Message::assistant_tool_calls(SID, "a1", "t1", vec![tool_call("c1")]),
            Message::assistant_text(SID, "a2", "Here are the files.", "t2"),
        ];
        let once = prepare(&history, None, false);
        let twice = prepare(&once, None, false);
        assert_eq!(once, twice);
    }

    #[test]
    fn assistant_with_empty_content_and_no_tool_calls_is_dropped() {
        let history = vec![Message::assistant_text(SID, "a1", "", "t0"), Message::assistant_text(SID, "a2", "hi", "t1")];
        let prepared = prepare(&history, None, false);
        assert_eq!(prepared.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["a2"]);
    }
}
