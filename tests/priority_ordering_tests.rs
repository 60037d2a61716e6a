use agentsms::models::Priority;

#[test]
fn urgent_sorts_before_every_other_priority() {
    let mut priorities = vec![Priority::Low, Priority::Medium, Priority::Urgent, Priority::High];
    priorities.sort();

    assert_eq!(priorities, vec![Priority::Urgent, Priority::High, Priority::Medium, Priority::Low]);
}

#[test]
fn rank_is_ascending_with_urgency() {
    assert!(Priority::Urgent.rank() < Priority::High.rank());
    assert!(Priority::High.rank() < Priority::Medium.rank());
    assert!(Priority::Medium.rank() < Priority::Low.rank());
}

#[test]
fn from_str_round_trips_through_as_str() {
    for priority in [Priority::Urgent, Priority::High, Priority::Medium, Priority::Low] {
        assert_eq!(Priority::from_str(priority.as_str()), priority);
    }
}

#[test]
fn unrecognized_priority_defaults_to_medium() {
    assert_eq!(Priority::from_str("whatever"), Priority::Medium);
}
