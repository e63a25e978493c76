use crate::{
    error::{TunerError, TunerResult},
    gradient::{Parameter, ParameterGroup},
};
use tuner_structs::config::GroupingStrategy;

/// Bundle a parameter belongs to: the second `/`-separated segment of its name
/// (`"model/unit_1_0/conv/weights"` belongs to `"unit_1_0"`). `None` for names without a
/// second segment; such a parameter always forms a bundle of its own.
pub fn bundle_key(name: &str) -> Option<&str> {
    name.split('/').nth(1).filter(|segment| !segment.is_empty())
}

/// Indices of `names` per group. Bundles are runs of consecutive names sharing a key, so a key
/// that reappears later starts a new group.
pub fn partition(names: &[&str], strategy: GroupingStrategy) -> Vec<Vec<usize>> {
    match strategy {
        GroupingStrategy::PerParameter => (0..names.len()).map(|i| vec![i]).collect(),
        GroupingStrategy::Global => {
            if names.is_empty() {
                Vec::new()
            } else {
                vec![(0..names.len()).collect()]
            }
        }
        GroupingStrategy::Bundle => {
            let mut groups: Vec<Vec<usize>> = Vec::new();
            let mut previous: Option<&str> = None;
            for (i, name) in names.iter().enumerate() {
                let key = bundle_key(name);
                match groups.last_mut() {
                    Some(group) if key.is_some() && previous == key => group.push(i),
                    _ => groups.push(vec![i]),
                }
                previous = key;
            }
            groups
        }
    }
}

/// Splits `flat` into the groups described by `partition`, preserving order within each group.
pub fn regroup<T>(flat: Vec<T>, partition: &[Vec<usize>]) -> TunerResult<Vec<Vec<T>>> {
    let expected: usize = partition.iter().map(|g| g.len()).sum();
    if flat.len() != expected {
        return Err(TunerError::ParameterCountMismatch {
            expected,
            actual: flat.len(),
        });
    }
    let mut slots: Vec<Option<T>> = flat.into_iter().map(Some).collect();
    partition
        .iter()
        .map(|group| {
            group
                .iter()
                .map(|&i| {
                    slots.get_mut(i).and_then(Option::take).ok_or(
                        TunerError::ParameterCountMismatch {
                            expected,
                            actual: i,
                        },
                    )
                })
                .collect::<TunerResult<Vec<T>>>()
        })
        .collect()
}

/// Partitions named parameters into groups with `strategy`.
pub fn group_parameters(
    parameters: Vec<Parameter>,
    strategy: GroupingStrategy,
) -> TunerResult<(Vec<ParameterGroup>, Vec<Vec<usize>>)> {
    let names: Vec<&str> = parameters.iter().map(|p| p.name.as_str()).collect();
    let layout = partition(&names, strategy);
    let groups = regroup(parameters, &layout)?
        .into_iter()
        .map(ParameterGroup::new)
        .collect();
    Ok((groups, layout))
}
