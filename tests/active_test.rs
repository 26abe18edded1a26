//! Tests for ActiveMenu: deferred resolution of the current node and its path.

use menutree::application::services::{ActiveMenu, TreeRepository};
use menutree::domain::{NodeKey, NodePayload, TreeNode};
use menutree::util::testing::{init_test_setup, memory_repository};

/// main > home > news, main > login
fn menu() -> (TreeRepository, Vec<TreeNode>) {
    let mut repo = memory_repository();
    let main = repo.create_root(NodePayload::new("Main", "main")).unwrap();
    let home = repo.append_child(&main, NodePayload::new("Home", "home")).unwrap();
    let news = repo.append_child(&home, NodePayload::new("News", "news")).unwrap();
    let main = repo.get(&NodeKey::Id(main.id)).unwrap();
    let login = repo
        .append_child(&main, NodePayload::new("Login", "login"))
        .unwrap();
    (repo, vec![main, home, news, login])
}

#[test]
fn given_nothing_set_when_asking_then_no_active_node_and_empty_path() {
    init_test_setup();
    let (repo, _) = menu();
    let mut active = ActiveMenu::new(&repo);

    assert!(active.active().unwrap().is_none());
    assert!(active.active_path().unwrap().is_empty());
}

#[test]
fn given_slug_set_when_resolved_then_node_and_path_root_first() {
    let (repo, nodes) = menu();
    let mut active = ActiveMenu::new(&repo);

    active.set_active("news");

    assert_eq!(active.active().unwrap().map(|n| n.id), Some(nodes[2].id));
    assert_eq!(
        active.active_path().unwrap(),
        &[nodes[0].id, nodes[1].id, nodes[2].id]
    );
}

#[test]
fn given_id_set_when_checking_membership_then_only_path_nodes_active() {
    let (repo, nodes) = menu();
    let mut active = ActiveMenu::new(&repo);

    active.set_active(nodes[1].id);

    assert!(active.is_active(nodes[0].id).unwrap());
    assert!(active.is_active(nodes[1].id).unwrap());
    assert!(!active.is_active(nodes[2].id).unwrap(), "descendants are not on the path");
    assert!(!active.is_active(nodes[3].id).unwrap());
}

#[test]
fn given_key_set_before_tree_changes_when_resolved_then_sees_current_state() {
    let (mut repo, nodes) = menu();
    let login = nodes[3].clone();

    // resolution happens on first read, not on set_active
    {
        let mut active = ActiveMenu::new(&repo);
        active.set_active("login");
        assert_eq!(active.active_path().unwrap(), &[nodes[0].id, login.id]);
    }

    let home = repo.get(&NodeKey::Id(nodes[1].id)).unwrap();
    repo.move_to_last_child(&login, &home).unwrap();

    let mut active = ActiveMenu::new(&repo);
    active.set_active("login");
    assert_eq!(
        active.active_path().unwrap(),
        &[nodes[0].id, nodes[1].id, login.id]
    );
}

#[test]
fn given_unknown_key_when_resolved_then_none_and_empty_path() {
    let (repo, nodes) = menu();
    let mut active = ActiveMenu::new(&repo);

    active.set_active("does-not-exist");

    assert!(active.active().unwrap().is_none());
    assert!(active.active_path().unwrap().is_empty());
    assert!(!active.is_active(nodes[0].id).unwrap());
}

#[test]
fn given_resolved_node_when_reset_then_nothing_active() {
    let (repo, nodes) = menu();
    let mut active = ActiveMenu::new(&repo);
    active.set_active("home");
    assert!(active.is_active(nodes[1].id).unwrap());

    active.reset();

    assert!(active.active().unwrap().is_none());
    assert!(!active.is_active(nodes[1].id).unwrap());
}

#[test]
fn given_new_key_when_set_again_then_replaces_memo() {
    let (repo, nodes) = menu();
    let mut active = ActiveMenu::new(&repo);
    active.set_active("news");
    active.active().unwrap();

    active.set_active("login");

    assert_eq!(active.active().unwrap().map(|n| n.id), Some(nodes[3].id));
    assert!(!active.is_active(nodes[1].id).unwrap());
}
