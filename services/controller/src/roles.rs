//! Role priority ranking for member-status ordering.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use iset_api::{MemberStatus, ReplicaRole};

/// Rank of an instance with no role label.
const EMPTY_PRIORITY: i32 = 0;

fn tier(role: &ReplicaRole) -> i32 {
    if role.writable {
        4
    } else if role.serviceable {
        3
    } else if role.votable {
        2
    } else {
        1
    }
}

/// Build the rank table from the declared role list.
///
/// Writable roles rank above serviceable-only roles, which rank above
/// votable non-serviceable roles, which rank above everything else.
/// Declared position breaks ties within a tier (earlier ranks higher);
/// the empty role name ranks below all declared roles. Only the induced
/// total order is observable.
pub fn compose_role_priority_map(roles: &[ReplicaRole]) -> BTreeMap<String, i32> {
    let mut map = BTreeMap::new();
    map.insert(String::new(), EMPTY_PRIORITY);
    let width = roles.len() as i32 + 1;
    for (index, role) in roles.iter().enumerate() {
        let priority = tier(role) * width + (roles.len() as i32 - index as i32);
        map.insert(role.name.to_lowercase(), priority);
    }
    map
}

/// Order members by descending role priority.
///
/// The sort is stable: members with equal priority keep their relative
/// input order, never re-ordered by name.
pub fn sort_members_status(members: &mut [MemberStatus], priority_map: &BTreeMap<String, i32>) {
    members.sort_by_key(|member| {
        Reverse(
            priority_map
                .get(&member.role.name.to_lowercase())
                .copied()
                .unwrap_or(EMPTY_PRIORITY),
        )
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared_roles() -> Vec<ReplicaRole> {
        vec![
            ReplicaRole {
                name: "leader".to_string(),
                serviceable: true,
                writable: true,
                votable: true,
            },
            ReplicaRole {
                name: "follower".to_string(),
                serviceable: true,
                writable: false,
                votable: true,
            },
            ReplicaRole {
                name: "logger".to_string(),
                serviceable: false,
                writable: false,
                votable: true,
            },
            ReplicaRole {
                name: "learner".to_string(),
                serviceable: false,
                writable: false,
                votable: false,
            },
        ]
    }

    fn member(name: &str, role: &str) -> MemberStatus {
        MemberStatus {
            instance_name: name.to_string(),
            role: ReplicaRole::named(role),
        }
    }

    #[test]
    fn test_priority_map_orders_declared_roles() {
        let map = compose_role_priority_map(&declared_roles());

        assert!(map["leader"] > map["follower"]);
        assert!(map["follower"] > map["logger"]);
        assert!(map["logger"] > map["learner"]);
        assert!(map["learner"] > map[""]);
    }

    #[test]
    fn test_sort_matches_declared_order() {
        let map = compose_role_priority_map(&declared_roles());
        let mut members = vec![
            member("pg-0", "follower"),
            member("pg-1", "learner"),
            member("pg-2", "learner"),
            member("pg-3", "leader"),
            member("pg-4", "logger"),
        ];

        sort_members_status(&mut members, &map);

        let order: Vec<_> = members.iter().map(|m| m.instance_name.as_str()).collect();
        assert_eq!(order, ["pg-3", "pg-0", "pg-4", "pg-1", "pg-2"]);
    }

    #[test]
    fn test_sort_is_stable_and_idempotent() {
        let map = compose_role_priority_map(&declared_roles());
        let mut members = vec![
            member("pg-2", "learner"),
            member("pg-0", "learner"),
            member("pg-1", "learner"),
        ];

        sort_members_status(&mut members, &map);
        let once: Vec<_> = members.iter().map(|m| m.instance_name.clone()).collect();
        // Equal priority keeps input order
        assert_eq!(once, ["pg-2", "pg-0", "pg-1"]);

        sort_members_status(&mut members, &map);
        let twice: Vec<_> = members.iter().map(|m| m.instance_name.clone()).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unknown_role_sorts_last() {
        let map = compose_role_priority_map(&declared_roles());
        let mut members = vec![member("pg-0", "mystery"), member("pg-1", "leader")];

        sort_members_status(&mut members, &map);
        assert_eq!(members[0].instance_name, "pg-1");
    }
}
