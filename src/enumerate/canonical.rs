//! Canonical key / canonical id computation for cycles

/// Rotate `participants` (and the parallel `items` list) so the
/// lexicographically smallest participant id is first, then return the
/// lexicographically smaller of that rotation and its reversal, joined with
/// `|`. Two cycles that are rotations or reversals of one another produce
/// the same canonical key.
pub fn canonical_key(participants: &[String], items: &[String]) -> String {
    let rotation = rotate_from_min(participants, items);
    let reversed = reverse_rotation(&rotation);

    let forward = join_key(&rotation);
    let backward = join_key(&reversed);
    forward.min(backward)
}

/// `"canonical_" + sorted(participants) + "|" + sorted(items)`. Invariant
/// under rotation and reversal by construction, since both inputs are
/// sorted before joining.
pub fn canonical_id(participants: &[String], items: &[String]) -> String {
    let mut sorted_participants = participants.to_vec();
    sorted_participants.sort();
    let mut sorted_items = items.to_vec();
    sorted_items.sort();
    format!(
        "canonical_{}|{}",
        sorted_participants.join(","),
        sorted_items.join(",")
    )
}

fn rotate_from_min(participants: &[String], items: &[String]) -> (Vec<String>, Vec<String>) {
    let k = participants.len();
    if k == 0 {
        return (Vec::new(), Vec::new());
    }
    let min_idx = participants
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let rotated_participants: Vec<String> = (0..k).map(|i| participants[(min_idx + i) % k].clone()).collect();
    let rotated_items: Vec<String> = (0..k).map(|i| items[(min_idx + i) % k].clone()).collect();
    (rotated_participants, rotated_items)
}

fn reverse_rotation(rotation: &(Vec<String>, Vec<String>)) -> (Vec<String>, Vec<String>) {
    let (participants, items) = rotation;
    let k = participants.len();
    if k == 0 {
        return (Vec::new(), Vec::new());
    }
    // Reverse the cycle direction while keeping participant[0] fixed: the
    // step that carried items[i] from participants[i] to participants[i+1]
    // becomes, reversed, the step from participants[k-i] to
    // participants[k-i+1 mod k] carrying items[i-1 mod k].
    let mut rev_participants = vec![participants[0].clone()];
    for i in 1..k {
        rev_participants.push(participants[k - i].clone());
    }
    let mut rev_items = vec![items[k - 1].clone()];
    for i in 1..k {
        rev_items.push(items[k - 1 - i].clone());
    }
    (rev_participants, rev_items)
}

fn join_key(rotation: &(Vec<String>, Vec<String>)) -> String {
    format!("{}|{}", rotation.0.join(","), rotation.1.join(","))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn rotate_pair(participants: &[String], items: &[String], by: usize) -> (Vec<String>, Vec<String>) {
        let k = participants.len();
        let rotated_p = (0..k).map(|i| participants[(i + by) % k].clone()).collect();
        let rotated_i = (0..k).map(|i| items[(i + by) % k].clone()).collect();
        (rotated_p, rotated_i)
    }

    // A tiny deterministic shuffle so the permutation test doesn't need a
    // second RNG dependency just for test fixtures.
    fn permutation_from_seed(k: usize, seed: u64) -> Vec<usize> {
        let mut state = seed | 1;
        let mut perm: Vec<usize> = (0..k).collect();
        for i in (1..k).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let j = (state as usize) % (i + 1);
            perm.swap(i, j);
        }
        perm
    }

    proptest! {
        /// §8: a cycle's canonical key is invariant under rotation.
        #[test]
        fn canonical_key_is_rotation_invariant(k in 3usize..8, rotate_by in 0usize..16) {
            let participants: Vec<String> = (0..k).map(|i| format!("p{i}")).collect();
            let items: Vec<String> = (0..k).map(|i| format!("i{i}")).collect();
            let (rotated_p, rotated_i) = rotate_pair(&participants, &items, rotate_by % k);
            prop_assert_eq!(canonical_key(&participants, &items), canonical_key(&rotated_p, &rotated_i));
        }

        /// §8: a cycle's canonical key is invariant under traversal reversal.
        #[test]
        fn canonical_key_is_reversal_invariant(k in 3usize..8) {
            let participants: Vec<String> = (0..k).map(|i| format!("p{i}")).collect();
            let items: Vec<String> = (0..k).map(|i| format!("i{i}")).collect();
            let reversed = reverse_rotation(&(participants.clone(), items.clone()));
            prop_assert_eq!(canonical_key(&participants, &items), canonical_key(&reversed.0, &reversed.1));
        }

        /// §8: a cycle's canonical id is invariant under any reordering of
        /// its participant/item lists, since both are sorted independently.
        #[test]
        fn canonical_id_is_permutation_invariant(k in 3usize..8, seed in any::<u64>()) {
            let participants: Vec<String> = (0..k).map(|i| format!("p{i}")).collect();
            let items: Vec<String> = (0..k).map(|i| format!("i{i}")).collect();
            let perm = permutation_from_seed(k, seed);
            let shuffled_p: Vec<String> = perm.iter().map(|&idx| participants[idx].clone()).collect();
            let shuffled_i: Vec<String> = perm.iter().map(|&idx| items[idx].clone()).collect();
            prop_assert_eq!(canonical_id(&participants, &items), canonical_id(&shuffled_p, &shuffled_i));
        }
    }
}
