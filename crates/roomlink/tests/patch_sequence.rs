//! Property tests: snapshot baselines and patch chains

mod common;

use common::*;
use proptest::prelude::*;
use roomlink::Value;
use roomlink_state::codec;

fn player() -> impl Strategy<Value = Value> {
    (any::<i32>(), "[a-z]{0,12}", any::<bool>()).prop_map(|(hp, name, ready)| {
        map(&[
            ("hp", Value::from(hp)),
            ("name", Value::from(name)),
            ("ready", Value::from(ready)),
        ])
    })
}

fn room_state() -> impl Strategy<Value = Value> {
    (
        prop::collection::vec(player(), 0..4),
        any::<u16>(),
        prop::option::of("[ -~]{0,20}"),
    )
        .prop_map(|(players, tick, motd)| {
            map(&[
                ("players", Value::Array(players)),
                ("tick", Value::from(tick)),
                ("motd", motd.map(Value::from).unwrap_or(Value::Nil)),
            ])
        })
}

proptest! {
    #[test]
    fn prop_snapshot_baseline_decodes_to_state(state in room_state()) {
        let (mut room, _transport, _time) = joined_room("lobby");

        room.handle_event(snapshot_frame(7, state.clone(), 0.0, 0.0)).unwrap();

        prop_assert_eq!(room.state(), &state);
        prop_assert_eq!(codec::decode(room.previous_state()).unwrap(), state);
    }

    #[test]
    fn prop_patches_reach_final_snapshot(
        first in room_state(),
        rest in prop::collection::vec(room_state(), 1..6),
    ) {
        let (mut patched, _t1, time) = joined_room("patched");
        let (mut direct, _t2, _time) = joined_room("direct");

        patched.handle_event(snapshot_frame(7, first.clone(), 0.0, 0.0)).unwrap();

        let mut previous = first;
        for next in &rest {
            time.advance(16.0);
            patched.handle_event(patch_frame(7, &previous, next)).unwrap();
            previous = next.clone();
        }

        let last = rest.last().cloned().unwrap_or(Value::Nil);
        direct.handle_event(snapshot_frame(7, last, 0.0, 0.0)).unwrap();

        prop_assert_eq!(patched.state(), direct.state());
        prop_assert_eq!(patched.previous_state(), direct.previous_state());
        prop_assert_eq!(patched.ping().is_some(), rest.len() > 1);
    }
}
