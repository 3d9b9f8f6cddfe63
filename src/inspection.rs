use std::collections::{HashMap, HashSet};

use crate::types::{Ingress, Inspection, Item, Namespace, Node, Pv, Pvc, Service, WorkloadData};

/// An inspected entity: its items plus the identifier shown in an [`Inspection`].
pub trait Inspectable {
    fn items(&self) -> &[Item];
    fn display_name(&self) -> String;
}

impl Inspectable for WorkloadData {
    fn items(&self) -> &[Item] {
        self.checks.items()
    }

    fn display_name(&self) -> String {
        format!("{}: {}/{}", self.kind.as_str(), self.namespace, self.name)
    }
}

impl Inspectable for Namespace {
    fn items(&self) -> &[Item] {
        self.checks.items()
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}

impl Inspectable for Service {
    fn items(&self) -> &[Item] {
        self.checks.items()
    }

    fn display_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl Inspectable for Ingress {
    fn items(&self) -> &[Item] {
        self.checks.items()
    }

    fn display_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl Inspectable for Pvc {
    fn items(&self) -> &[Item] {
        self.checks.items()
    }

    fn display_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl Inspectable for Pv {
    fn items(&self) -> &[Item] {
        self.checks.items()
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}

impl Inspectable for Node {
    fn items(&self) -> &[Item] {
        self.checks.items()
    }

    fn display_name(&self) -> String {
        format!("{} / {}", self.name, self.host_ip)
    }
}

/// Folds failing items of many entities into one [`Inspection`] per check title.
///
/// The first failing item seen for a title fixes the group's level; later items
/// with the same title only add their entity to `names`.
#[derive(Debug, Default)]
pub struct InspectionGrouper {
    groups: HashMap<String, Inspection>,
}

impl InspectionGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_items(&mut self, items: &[Item], display_name: &str) {
        let mut seen: HashSet<&str> = HashSet::new();
        for item in items.iter().filter(|i| !i.pass) {
            if !seen.insert(item.name.as_str()) {
                continue;
            }
            self.groups
                .entry(item.name.clone())
                .or_insert_with(|| Inspection::new(item.name.clone(), item.level, Vec::new()))
                .names
                .push(display_name.to_string());
        }
    }

    pub fn add<E: Inspectable + ?Sized>(&mut self, entity: &E) {
        self.add_items(entity.items(), &entity.display_name());
    }

    pub fn add_all<'a, E, I>(&mut self, entities: I)
    where
        E: Inspectable + 'a,
        I: IntoIterator<Item = &'a E>,
    {
        for entity in entities {
            self.add(entity);
        }
    }

    /// Sorted by title; the order carries no meaning.
    pub fn finish(self) -> Vec<Inspection> {
        let mut inspections: Vec<Inspection> = self.groups.into_values().collect();
        inspections.sort_by(|a, b| a.title.cmp(&b.title));
        inspections
    }
}

/// Groups one homogeneous list of entities.
pub fn group_inspections<'a, E, I>(entities: I) -> Vec<Inspection>
where
    E: Inspectable + 'a,
    I: IntoIterator<Item = &'a E>,
{
    let mut grouper = InspectionGrouper::new();
    grouper.add_all(entities);
    grouper.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Checks, WorkloadKind};
    use std::collections::BTreeSet;

    fn deployment(namespace: &str, name: &str, items: Vec<Item>) -> WorkloadData {
        WorkloadData {
            kind: WorkloadKind::Deployment,
            name: name.to_string(),
            namespace: namespace.to_string(),
            conditions: Vec::new(),
            checks: Checks::new(items),
        }
    }

    fn as_set(inspections: &[Inspection]) -> BTreeSet<(String, i32, BTreeSet<String>)> {
        inspections
            .iter()
            .map(|i| (i.title.clone(), i.level, i.names.iter().cloned().collect()))
            .collect()
    }

    #[test]
    fn test_same_failing_check_groups_into_one() {
        let entities = vec![
            deployment("ns1", "e1", vec![Item::new("健康检查设置", "no probe", false, 1)]),
            deployment("ns2", "e2", vec![Item::new("健康检查设置", "no probe", false, 1)]),
        ];

        let inspections = group_inspections(&entities);

        assert_eq!(inspections.len(), 1);
        assert_eq!(inspections[0].title, "健康检查设置");
        assert_eq!(inspections[0].level, 1);
        let names: BTreeSet<_> = inspections[0].names.iter().cloned().collect();
        assert_eq!(
            names,
            BTreeSet::from(["Deployment: ns1/e1".to_string(), "Deployment: ns2/e2".to_string()])
        );
    }

    #[test]
    fn test_passing_items_are_ignored() {
        let entities = vec![deployment("ns", "ok", vec![Item::new("健康状态", "", true, 1)])];
        assert!(group_inspections(&entities).is_empty());
    }

    #[test]
    fn test_first_level_wins() {
        let entities = vec![
            deployment("ns", "a", vec![Item::new("HighCPU", "x", false, 1)]),
            deployment("ns", "b", vec![Item::new("HighCPU", "y", false, 3)]),
        ];
        let inspections = group_inspections(&entities);
        assert_eq!(inspections.len(), 1);
        assert_eq!(inspections[0].level, 1);
        assert_eq!(inspections[0].names.len(), 2);
    }

    #[test]
    fn test_entity_contributes_once_per_title() {
        let entities = vec![deployment(
            "ns",
            "dup",
            vec![
                Item::new("HighCPU", "native", false, 2),
                Item::new("HighCPU", "alert", false, 2),
            ],
        )];
        let inspections = group_inspections(&entities);
        assert_eq!(inspections[0].names, vec!["Deployment: ns/dup".to_string()]);
    }

    #[test]
    fn test_grouping_is_idempotent() {
        let entities = vec![
            deployment("ns", "a", vec![Item::new("x", "", false, 1), Item::new("y", "", false, 2)]),
            deployment("ns", "b", vec![Item::new("y", "", false, 2)]),
        ];
        let first = group_inspections(&entities);
        let second = group_inspections(&entities);
        assert_eq!(as_set(&first), as_set(&second));
    }

    #[test]
    fn test_display_names_per_kind() {
        let node = Node {
            name: "worker-1".to_string(),
            host_ip: "10.0.0.5".to_string(),
            checks: Checks::new(vec![Item::new("n", "", false, 2)]),
        };
        let pv = Pv {
            name: "pv-1".to_string(),
            checks: Checks::new(vec![Item::new("p", "", false, 2)]),
        };
        let svc = Service {
            name: "web".to_string(),
            namespace: "shop".to_string(),
            checks: Checks::new(vec![Item::new("s", "", false, 2)]),
        };

        let mut grouper = InspectionGrouper::new();
        grouper.add(&node);
        grouper.add(&pv);
        grouper.add(&svc);
        let inspections = grouper.finish();

        let names: BTreeSet<String> = inspections.iter().flat_map(|i| i.names.clone()).collect();
        assert_eq!(
            names,
            BTreeSet::from([
                "worker-1 / 10.0.0.5".to_string(),
                "pv-1".to_string(),
                "shop/web".to_string()
            ])
        );
    }

    #[test]
    fn test_mixed_kinds_share_titles() {
        let mut grouper = InspectionGrouper::new();
        let svc = Service {
            name: "web".to_string(),
            namespace: "shop".to_string(),
            checks: Checks::new(vec![Item::new("Down", "", false, 2)]),
        };
        grouper.add(&svc);
        grouper.add_items(&[Item::new("Down", "", false, 2)], "prod");

        let inspections = grouper.finish();
        assert_eq!(inspections.len(), 1);
        assert_eq!(inspections[0].names.len(), 2);
    }
}
