use super::*;
use shared::domain::{ChatDescriptor, Contact, ParticipantDescriptor};

const ME: &str = "31600000000@c.us";
const ALICE: &str = "31600000001@c.us";
const BOB: &str = "31600000002@c.us";
const CAROL: &str = "31600000003@c.us";

fn me() -> Me {
    Me {
        self_id: ContactId::new(ME),
        push_name: "Myself".to_string(),
    }
}

fn chats() -> ChatList {
    let mut chats = ChatList::new();
    chats.get_or_insert(&ChatDescriptor {
        id: ChatId::new("120363000000000001@g.us"),
        name: "general".to_string(),
        is_group: true,
        description: None,
        participants: vec![
            ParticipantDescriptor {
                contact: Contact::new(ALICE).with_push_name("Alice"),
                is_admin: true,
            },
            ParticipantDescriptor {
                contact: Contact::new(ME),
                is_admin: false,
            },
        ],
    });
    chats.get_or_insert(&ChatDescriptor {
        id: ChatId::new(BOB),
        name: "Bobby".to_string(),
        ..ChatDescriptor::default()
    });
    chats
}

fn group(chats: &ChatList) -> &Chat {
    chats
        .get(&ChatId::new("120363000000000001@g.us"))
        .expect("group")
}

fn notification(change: GroupChange, recipients: &[&str]) -> Notification {
    Notification {
        kind: NotificationKind::Group(change),
        recipients: recipients.iter().map(|id| ContactId::new(*id)).collect(),
    }
}

fn run(author: &str, notification: &Notification) -> Result<Translation, BridgeError> {
    let me = me();
    let chats = chats();
    let ctx = NotificationContext {
        me: &me,
        nickname: "mynick",
        chats: &chats,
    };
    translate(
        &ctx,
        group(&chats),
        Some(&ContactId::new(author)),
        notification,
    )
}

#[test]
fn add_of_someone_else_emits_one_join() {
    let translation = run(ALICE, &notification(GroupChange::Add, &[CAROL])).expect("translate");
    assert_eq!(
        translation.lines,
        vec![IrcLine::Join {
            nick: "31600000003".into(),
            channel: "#general".into(),
        }]
    );
    assert!(!translation.parted);
    assert_eq!(translation.added, vec![ContactId::new(CAROL)]);
}

#[test]
fn add_or_invite_of_me_is_silent() {
    for change in [GroupChange::Add, GroupChange::Invite] {
        let translation = run(ALICE, &notification(change, &[ME])).expect("translate");
        assert!(translation.lines.is_empty());
        assert!(!translation.parted);
    }
}

#[test]
fn remove_of_me_kicks_and_parts() {
    let translation = run(ALICE, &notification(GroupChange::Remove, &[ME])).expect("translate");
    assert_eq!(
        translation.lines,
        vec![IrcLine::Kick {
            actor: "Alice".into(),
            channel: "#general".into(),
            target: "mynick".into(),
        }]
    );
    assert!(translation.parted);
}

#[test]
fn leave_resolves_names_through_direct_chats() {
    let translation = run(BOB, &notification(GroupChange::Leave, &[BOB, ME])).expect("translate");
    assert_eq!(
        translation.lines,
        vec![
            IrcLine::Part {
                nick: "Bobby".into(),
                channel: "#general".into(),
            },
            IrcLine::Part {
                nick: "mynick".into(),
                channel: "#general".into(),
            },
        ]
    );
    assert!(translation.parted);
    assert_eq!(translation.removed.len(), 2);
}

#[test]
fn create_and_unknown_subtypes_emit_nothing() {
    let created = run(ALICE, &notification(GroupChange::Create, &[ALICE])).expect("create");
    assert_eq!(created, Translation::default());

    let other = run(
        ALICE,
        &notification(GroupChange::Other("description".into()), &[ALICE]),
    )
    .expect("other");
    assert!(other.lines.is_empty());
}

#[test]
fn zero_recipients_is_a_no_op() {
    let translation = run(ALICE, &notification(GroupChange::Remove, &[])).expect("translate");
    assert_eq!(translation, Translation::default());
}

#[test]
fn non_group_notification_is_unsupported() {
    let err = run(
        ALICE,
        &Notification {
            kind: NotificationKind::Unsupported {
                tag: "call_log".into(),
            },
            recipients: vec![ContactId::new(ALICE)],
        },
    )
    .expect_err("unsupported");
    assert!(matches!(err, BridgeError::UnsupportedNotification { ref tag } if tag == "call_log"));
    assert!(!err.is_fatal());
}

#[test]
fn names_list_marks_admins_and_me() {
    let chats = chats();
    assert_eq!(
        names_list(group(&chats), &me(), "mynick"),
        vec!["@Alice".to_string(), "mynick".to_string()]
    );

    let direct = chats.get(&ChatId::new(BOB)).expect("direct");
    assert_eq!(names_list(direct, &me(), "mynick"), vec!["mynick".to_string()]);
}
