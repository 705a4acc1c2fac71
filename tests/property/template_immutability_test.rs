//! Property-based tests: materializing requests never mutates the stored
//! template or the caller's history.

use proptest::prelude::*;
use serde_json::json;

use vocab_gateway::services::request_materializer::build_request;
use vocab_gateway::types::ai::{AIConfigurationDraft, ChatRole, ConversationTurn};

fn arb_role() -> impl Strategy<Value = ChatRole> {
    prop_oneof![
        Just(ChatRole::User),
        Just(ChatRole::Assistant),
        Just(ChatRole::System),
        "[a-z]{3,6}".prop_map(ChatRole::Other),
    ]
}

fn arb_history() -> impl Strategy<Value = Vec<ConversationTurn>> {
    proptest::collection::vec(
        (arb_role(), ".{0,30}").prop_map(|(role, text)| ConversationTurn { role, text }),
        0..8,
    )
}

fn config() -> AIConfigurationDraft {
    let mut config = AIConfigurationDraft::openai_compatible("https://api.example.com/v1/chat", "m", "");
    config.request_template = json!({"model": "m", "messages": [], "temperature": 0.5});
    config
}

proptest! {
    #[test]
    fn template_and_history_unchanged(
        history in arb_history(),
        first in ".{1,40}",
        second in ".{1,40}",
    ) {
        prop_assume!(first != second);
        let config = config();
        let snapshot = config.clone();
        let history_snapshot = history.clone();

        let a = build_request(&config, "s", &first, &history).unwrap();
        let b = build_request(&config, "s", &second, &history).unwrap();

        prop_assert_eq!(&config, &snapshot);
        prop_assert_eq!(&history, &history_snapshot);

        let a_messages = a.body["messages"].as_array().unwrap().clone();
        let b_messages = b.body["messages"].as_array().unwrap().clone();
        prop_assert_eq!(a_messages.len(), b_messages.len());
        let last = a_messages.len() - 1;
        prop_assert_eq!(&a_messages[..last], &b_messages[..last]);
        prop_assert_eq!(&a_messages[last]["content"], &json!(first));
        prop_assert_eq!(&b_messages[last]["content"], &json!(second));

        let mut a_rest = a.body.clone();
        let mut b_rest = b.body.clone();
        a_rest["messages"] = json!(null);
        b_rest["messages"] = json!(null);
        prop_assert_eq!(a_rest, b_rest);
    }

    #[test]
    fn system_turns_never_forwarded(history in arb_history()) {
        let request = build_request(&config(), "s", "prompt", &history).unwrap();
        let expected = history.iter().filter(|t| t.role != ChatRole::System).count() + 1;
        prop_assert_eq!(request.body["messages"].as_array().unwrap().len(), expected);
    }
}
