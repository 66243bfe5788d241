use super::*;

#[test]
fn starts_with_initial_name() {
    assert_eq!(UsernameState::new("Guest").username, "Guest");
}

#[test]
fn non_empty_edit_updates_and_publishes() {
    let mut state = UsernameState::new("Guest");
    assert_eq!(state.change("Ann"), Some(ChangeUsername { username: "Ann".to_owned() }));
    assert_eq!(state.username, "Ann");
}

#[test]
fn empty_edit_is_ignored() {
    let mut state = UsernameState::new("Guest");
    assert_eq!(state.change(""), None);
    assert_eq!(state.username, "Guest");
}

#[test]
fn whitespace_edit_is_published() {
    let mut state = UsernameState::new("Guest");
    assert_eq!(state.change(" "), Some(ChangeUsername { username: " ".to_owned() }));
    assert_eq!(state.username, " ");
}
