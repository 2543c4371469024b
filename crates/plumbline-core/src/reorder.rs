use anyhow::anyhow;

use crate::task::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderUpdate {
    pub id: TaskId,
    pub order: i64,
}

/// Assigns each id its 0-based position. Only the ids of one rendered group
/// are renumbered, so the values may collide with other groups.
pub fn order_updates(ids: &[TaskId]) -> Vec<OrderUpdate> {
    ids.iter()
        .enumerate()
        .map(|(idx, id)| OrderUpdate {
            id: *id,
            order: idx as i64,
        })
        .collect()
}

/// Applies a drag gesture: the item at `from` is dropped at `to`.
pub fn move_within(ids: &[TaskId], from: usize, to: usize) -> anyhow::Result<Vec<TaskId>> {
    if from >= ids.len() || to >= ids.len() {
        return Err(anyhow!(
            "move {from} -> {to} is outside a group of {} task(s)",
            ids.len()
        ));
    }

    let mut reordered = ids.to_vec();
    let moved = reordered.remove(from);
    reordered.insert(to, moved);
    Ok(reordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_last_to_front() {
        let a = TaskId::random();
        let b = TaskId::random();
        let c = TaskId::random();

        let moved = move_within(&[a, b, c], 2, 0).unwrap();
        assert_eq!(moved, vec![c, a, b]);

        let updates = order_updates(&moved);
        assert_eq!(
            updates,
            vec![
                OrderUpdate { id: c, order: 0 },
                OrderUpdate { id: a, order: 1 },
                OrderUpdate { id: b, order: 2 },
            ]
        );
    }

    #[test]
    fn rejects_indices_past_the_group() {
        let ids = [TaskId::random(), TaskId::random()];
        assert!(move_within(&ids, 0, 2).is_err());
        assert!(move_within(&ids, 5, 0).is_err());
        assert_eq!(move_within(&ids, 1, 1).unwrap(), ids.to_vec());
    }
}
