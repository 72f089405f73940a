use chat_transcript::{Fragment, FragmentKind, Role, Transcript};
use proptest::prelude::*;

fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::User), Just(Role::Assistant), Just(Role::Computer)]
}

fn transcript_kind_strategy() -> impl Strategy<Value = FragmentKind> {
    prop_oneof![
        Just(FragmentKind::Text),
        Just(FragmentKind::Code),
        Just(FragmentKind::Console),
        Just(FragmentKind::Error),
    ]
}

fn fragment_strategy() -> impl Strategy<Value = Fragment> {
    (
        role_strategy(),
        transcript_kind_strategy(),
        proptest::option::of("[a-z]{1,6}"),
        "[a-zA-Z0-9 ]{0,8}",
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(role, kind, format, content, start, end)| Fragment {
            role,
            kind,
            format,
            content,
            start,
            end,
        })
}

fn fold(fragments: &[Fragment]) -> Transcript {
    fragments
        .iter()
        .fold(Transcript::new(), |transcript, fragment| {
            transcript.applied(fragment)
        })
}

proptest! {
    #[test]
    fn start_fragments_always_append_one_open_entry(
        prefix in proptest::collection::vec(fragment_strategy(), 0..24),
        role in role_strategy(),
        kind in transcript_kind_strategy(),
        content in "[a-z]{0,5}",
        end in any::<bool>(),
    ) {
        let mut transcript = fold(&prefix);
        let before = transcript.len();

        let mut fragment = Fragment::new(role, kind, content.clone()).starting();
        fragment.end = end;
        transcript.apply(&fragment);

        prop_assert_eq!(transcript.len(), before + 1);
        let last = transcript.last().expect("start appends an entry");
        prop_assert!(last.open);
        prop_assert_eq!(&last.content, &content);
    }

    #[test]
    fn end_fragment_closes_open_tail_without_changing_content(
        prefix in proptest::collection::vec(fragment_strategy(), 0..24),
        role in role_strategy(),
        kind in transcript_kind_strategy(),
        content in "[a-z]{1,5}",
    ) {
        let mut transcript = fold(&prefix);
        prop_assume!(transcript.open_entry().is_some());
        let before = transcript.last().cloned().expect("open tail exists");
        let len_before = transcript.len();

        transcript.apply(&Fragment::new(role, kind, content).ending());

        let after = transcript.last().expect("tail still exists");
        prop_assert_eq!(transcript.len(), len_before);
        prop_assert_eq!(after.id, before.id);
        prop_assert!(!after.open);
        prop_assert_eq!(&after.content, &before.content);
        prop_assert_eq!(transcript.open_entries(), 0);
    }

    #[test]
    fn at_most_one_entry_is_ever_open(
        fragments in proptest::collection::vec(fragment_strategy(), 0..64),
    ) {
        let mut transcript = Transcript::new();
        for fragment in &fragments {
            transcript.apply(fragment);
            prop_assert!(transcript.open_entries() <= 1);
        }
    }

    #[test]
    fn transcript_only_grows_and_ids_are_unique(
        fragments in proptest::collection::vec(fragment_strategy(), 0..64),
    ) {
        let mut transcript = Transcript::new();
        let mut previous_ids = Vec::new();

        for fragment in &fragments {
            transcript.apply(fragment);
            let ids: Vec<_> = transcript.entries().iter().map(|entry| entry.id).collect();
            prop_assert!(ids.len() >= previous_ids.len());
            prop_assert_eq!(&ids[..previous_ids.len()], &previous_ids[..]);
            previous_ids = ids;
        }

        let mut sorted = previous_ids.clone();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), previous_ids.len());
    }
}
