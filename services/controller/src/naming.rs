//! Desired instance names and their total order.
//!
//! The default pool is named `{set}-{ordinal}`; each named override
//! template owns the pool `{set}-{template}-{ordinal}`. The default pool
//! sorts first, then override pools in declared order; within a pool,
//! ascending ordinal. This order is the creation order under
//! `OrderedReady`; deletion walks it backwards.

use std::cmp::Ordering;

use iset_api::{InstanceSet, InstanceTemplate};

use crate::error::{ControllerError, ControllerResult};

/// One desired instance: its name and the rendered template it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredInstance {
    pub name: String,
    pub template: InstanceTemplate,
}

/// Parse the trailing `-<ordinal>` of an instance name.
pub fn ordinal_of(name: &str) -> Option<u32> {
    let (_, tail) = name.rsplit_once('-')?;
    tail.parse().ok()
}

/// Order instance names by (stem, ordinal) so `pg-10` sorts after `pg-2`.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let split = |name: &str| match name.rsplit_once('-') {
        Some((stem, tail)) => match tail.parse::<u32>() {
            Ok(ordinal) => (stem.to_string(), Some(ordinal)),
            Err(_) => (name.to_string(), None),
        },
        None => (name.to_string(), None),
    };
    let (stem_a, ord_a) = split(a);
    let (stem_b, ord_b) = split(b);
    stem_a.cmp(&stem_b).then(ord_a.cmp(&ord_b))
}

/// The full desired instance list for a set, in creation order.
///
/// Override templates consume from `spec.replicas`; what remains fills the
/// default pool. Overrides claiming more than the set declares is a
/// malformed spec.
pub fn desired_instances(set: &InstanceSet) -> ControllerResult<Vec<DesiredInstance>> {
    let parent = &set.meta.name;
    let declared = set.spec.replicas;
    let claimed: u32 = set.spec.instances.iter().map(|t| t.replicas()).sum();
    if claimed > declared {
        return Err(ControllerError::MisconfiguredReplicas { claimed, declared });
    }

    let mut desired = Vec::with_capacity(declared as usize);
    for ordinal in 0..declared - claimed {
        desired.push(DesiredInstance {
            name: format!("{parent}-{ordinal}"),
            template: set.spec.template.clone(),
        });
    }
    for tpl in &set.spec.instances {
        let template = tpl.render(&set.spec.template);
        for ordinal in 0..tpl.replicas() {
            desired.push(DesiredInstance {
                name: format!("{parent}-{}-{ordinal}", tpl.name),
                template: template.clone(),
            });
        }
    }
    Ok(desired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use iset_api::InstanceOverride;
    use rstest::rstest;

    fn set_with_overrides(replicas: u32) -> InstanceSet {
        let mut set: InstanceSet = serde_json::from_str(
            r#"{"meta":{"name":"pg","namespace":"default"},"spec":{"template":{"image":"pg:16"}}}"#,
        )
        .unwrap();
        set.spec.replicas = replicas;
        set.spec.instances = vec![
            InstanceOverride {
                name: "hello".to_string(),
                replicas: None,
                image: None,
                resources: None,
                volume_claims: None,
            },
            InstanceOverride {
                name: "foo".to_string(),
                replicas: Some(2),
                image: Some("pg:17".to_string()),
                resources: None,
                volume_claims: None,
            },
        ];
        set
    }

    #[rstest]
    #[case("pg-0", Some(0))]
    #[case("pg-foo-12", Some(12))]
    #[case("pg", None)]
    #[case("pg-foo", None)]
    fn test_ordinal_parsing(#[case] name: &str, #[case] expected: Option<u32>) {
        assert_eq!(ordinal_of(name), expected);
    }

    #[test]
    fn test_compare_names_is_numeric_on_ordinals() {
        assert_eq!(compare_names("pg-2", "pg-10"), Ordering::Less);
        assert_eq!(compare_names("pg-2", "pg-2"), Ordering::Equal);
        assert_eq!(compare_names("pg-foo-0", "pg-foo-1"), Ordering::Less);
    }

    #[test]
    fn test_overrides_consume_from_default_pool() {
        let desired = desired_instances(&set_with_overrides(7)).unwrap();
        let names: Vec<_> = desired.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "pg-0", "pg-1", "pg-2", "pg-3", "pg-hello-0", "pg-foo-0", "pg-foo-1"
            ]
        );

        // The override image carries through
        assert_eq!(desired[5].template.image, "pg:17");
        assert_eq!(desired[0].template.image, "pg:16");
    }

    #[test]
    fn test_overclaiming_overrides_are_rejected() {
        let err = desired_instances(&set_with_overrides(2)).unwrap_err();
        assert!(matches!(
            err,
            ControllerError::MisconfiguredReplicas {
                claimed: 3,
                declared: 2
            }
        ));
        assert!(!err.is_transient());
    }
}
