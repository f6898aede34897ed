use serenade::json::{self, json};
use serenade::model::channel::PermissionOverwrite;
use serenade::model::id::{RoleId, UserId};
use serenade::model::permissions::{compute_permissions, has_permission, Permissions};

fn overwrites() -> Vec<PermissionOverwrite> {
    json::from_value(json!([
        {"id": "100", "type": 0, "allow": "0", "deny": "2048"},
        {"id": "7", "type": "member", "allow": "2048", "deny": "0"},
        {"id": "200", "type": "role", "allow": "1024", "deny": "0"},
    ]))
    .unwrap()
}

#[test]
fn channel_overwrites_from_payload() {
    let overwrites = overwrites();
    let roles = [RoleId::new(100)];

    let base = Permissions::SEND_MESSAGES | Permissions::READ_MESSAGE_HISTORY;

    // The member overwrite comes after the role deny, so it wins.
    let member = compute_permissions(base, &overwrites, &roles, UserId::new(7), false);
    assert!(member.send_messages());
    assert!(!member.view_channel());

    // Someone else with the same role only gets the deny.
    let other = compute_permissions(base, &overwrites, &roles, UserId::new(8), false);
    assert!(!other.send_messages());
    assert!(other.read_message_history());
}

#[test]
fn owner_and_administrator() {
    let overwrites = overwrites();

    let owner = compute_permissions(Permissions::empty(), &[], &[], UserId::new(1), true);
    assert_eq!(owner, Permissions::EVERYTHING);

    let admin = compute_permissions(
        Permissions::ADMINISTRATOR,
        &overwrites,
        &[RoleId::new(100)],
        UserId::new(8),
        false,
    );
    assert_eq!(admin, Permissions::EVERYTHING);

    assert!(has_permission(Permissions::ADMINISTRATOR, Permissions::BAN_MEMBERS));
    assert!(!has_permission(Permissions::KICK_MEMBERS, Permissions::BAN_MEMBERS));
}
