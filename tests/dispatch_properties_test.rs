//! Property tests for block assembly and callback dispatch.

#[path = "support/stream_fixture.rs"]
mod stream_fixture;

use proptest::prelude::*;
use siumai_stream_assembly::prelude::*;
use stream_fixture::{Call, Recorder};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Text,
    Thinking,
    Tool,
}

type Block = (Kind, Vec<String>);

fn block_strategy() -> impl Strategy<Value = Block> {
    (
        prop_oneof![Just(Kind::Text), Just(Kind::Thinking), Just(Kind::Tool)],
        prop::collection::vec("[a-z {}:\"]{0,8}", 0..5),
    )
}

/// Blocks plus the order in which they are closed.
fn scenario() -> impl Strategy<Value = (Vec<Block>, Vec<usize>)> {
    prop::collection::vec(block_strategy(), 1..6).prop_flat_map(|blocks| {
        let n = blocks.len();
        (Just(blocks), Just((0..n).collect::<Vec<_>>()).prop_shuffle())
    })
}

/// All starts, then deltas round-robin across blocks, then stops in `close_order`.
fn events_for(blocks: &[Block], close_order: &[usize]) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for (i, (kind, _)) in blocks.iter().enumerate() {
        let kind = match kind {
            Kind::Text => BlockKind::Text,
            Kind::Thinking => BlockKind::Thinking,
            Kind::Tool => BlockKind::tool_use(format!("call_{i}"), "lookup"),
        };
        events.push(StreamEvent::block_start(i, kind));
    }
    let rounds = blocks.iter().map(|(_, f)| f.len()).max().unwrap_or(0);
    for round in 0..rounds {
        for (i, (kind, fragments)) in blocks.iter().enumerate() {
            if let Some(fragment) = fragments.get(round) {
                events.push(match kind {
                    Kind::Text => StreamEvent::text(i, fragment.clone()),
                    Kind::Thinking => StreamEvent::thinking(i, fragment.clone()),
                    Kind::Tool => StreamEvent::tool_arguments(i, fragment.clone()),
                });
            }
        }
    }
    for &i in close_order {
        events.push(StreamEvent::block_stop(i));
    }
    events
}

fn concat_in_order(blocks: &[Block], close_order: &[usize], want: Kind) -> Option<String> {
    let mut out: Option<String> = None;
    for &i in close_order {
        let (kind, fragments) = &blocks[i];
        if *kind == want {
            out.get_or_insert_with(String::new).push_str(&fragments.concat());
        }
    }
    out
}

fn any_event() -> impl Strategy<Value = StreamEvent> {
    let idx = 0usize..3;
    prop_oneof![
        idx.clone()
            .prop_map(|i| StreamEvent::block_start(i, BlockKind::Text)),
        idx.clone()
            .prop_map(|i| StreamEvent::block_start(i, BlockKind::tool_use("t", "f"))),
        (idx.clone(), "[a-z]{0,3}").prop_map(|(i, s)| StreamEvent::text(i, s)),
        (idx.clone(), "[a-z]{0,3}").prop_map(|(i, s)| StreamEvent::tool_arguments(i, s)),
        idx.prop_map(StreamEvent::block_stop),
        Just(StreamEvent::message_stop(FinishReason::Stop)),
    ]
}

proptest! {
    #[test]
    fn blocks_assemble_in_closure_order((blocks, close_order) in scenario()) {
        let mut rec = Recorder::default();
        {
            let mut dispatcher = CallbackDispatcher::new(&mut rec);
            for event in events_for(&blocks, &close_order) {
                dispatcher.on_event(event);
            }
            dispatcher.on_event(StreamEvent::message_stop(FinishReason::Stop));
        }

        let (msg, _) = rec.completion().expect("completed");
        prop_assert_eq!(msg.text.clone(), concat_in_order(&blocks, &close_order, Kind::Text));
        prop_assert_eq!(
            msg.thinking.clone(),
            concat_in_order(&blocks, &close_order, Kind::Thinking)
        );

        let expected_tools: Vec<ToolExecutionRequest> = close_order
            .iter()
            .filter(|&&i| blocks[i].0 == Kind::Tool)
            .map(|&i| {
                let arguments = match blocks[i].1.concat() {
                    empty if empty.is_empty() => "{}".to_string(),
                    arguments => arguments,
                };
                ToolExecutionRequest::new(format!("call_{i}"), "lookup", arguments)
            })
            .collect();
        prop_assert_eq!(&msg.tool_execution_requests, &expected_tools);

        let fired: Vec<ToolExecutionRequest> = rec
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::ToolCall(r) => Some(r.clone()),
                _ => None,
            })
            .collect();
        prop_assert_eq!(fired, expected_tools);
        prop_assert!(matches!(rec.calls.last(), Some(Call::Complete(..))));
    }

    #[test]
    fn assembly_is_a_pure_function_of_state((blocks, close_order) in scenario()) {
        let mut state = PartialState::new();
        for event in events_for(&blocks, &close_order) {
            state.apply(event).unwrap();
        }
        let first = state.assemble(FinishReason::Length).unwrap();
        let second = state.assemble(FinishReason::Length).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn exactly_one_terminal_callback(events in prop::collection::vec(any_event(), 0..24)) {
        let mut rec = Recorder::default();
        {
            let mut dispatcher = CallbackDispatcher::new(&mut rec);
            for event in events {
                dispatcher.on_event(event);
            }
        }
        prop_assert_eq!(rec.terminal_count(), 1);
        prop_assert!(matches!(
            rec.calls.last(),
            Some(Call::Complete(..)) | Some(Call::Error(_))
        ));
    }
}
